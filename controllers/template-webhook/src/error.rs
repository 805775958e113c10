//! Webhook-specific error types.

use thiserror::Error;

/// Errors decoding the object under review
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The review carried no object for the operation
    #[error("admission request has no {0}")]
    MissingObject(&'static str),

    /// The object could not be decoded as the expected kind
    #[error("unable to decode {field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
