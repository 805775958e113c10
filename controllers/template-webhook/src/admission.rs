//! Admission handlers
//!
//! Each template kind gets a validating endpoint. The review's object (and
//! old object on update) is decoded as the kind and passed to its
//! [`Validator`]; a validation error denies the request with the full
//! field-error message.

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use crds::{ClusterTemplate, MachineDeploymentTemplate, Validator};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::WebhookError;

pub const CLUSTER_TEMPLATE_PATH: &str = "/validate-exp-cluster-x-k8s-io-v1alpha3-clustertemplate";
pub const MACHINE_DEPLOYMENT_TEMPLATE_PATH: &str =
    "/validate-exp-cluster-x-k8s-io-v1alpha3-machinedeploymenttemplate";

/// Routes for both template validators plus a health probe
pub fn router() -> Router {
    Router::new()
        .route(CLUSTER_TEMPLATE_PATH, post(validate_handler::<ClusterTemplate>))
        .route(
            MACHINE_DEPLOYMENT_TEMPLATE_PATH,
            post(validate_handler::<MachineDeploymentTemplate>),
        )
        .route("/healthz", get(|| async { StatusCode::OK }))
        .layer(TraceLayer::new_for_http())
}

async fn validate_handler<K>(
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>>
where
    K: Validator + DeserializeOwned,
{
    let request: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid admission review: {}", e);
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(review::<K>(&request).into_review())
}

/// Run the kind's validator for the request's operation
pub fn review<K>(request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse
where
    K: Validator + DeserializeOwned,
{
    let response = AdmissionResponse::from(request);
    debug!(
        "Reviewing {:?} of {} {:?}/{}",
        request.operation,
        request.kind.kind,
        request.namespace,
        request.name
    );

    match validate::<K>(request) {
        Ok(Ok(())) => response,
        Ok(Err(invalid)) => {
            info!("Denied {:?}: {}", request.operation, invalid);
            response.deny(invalid.to_string())
        }
        Err(e) => {
            warn!("Rejecting undecodable request: {}", e);
            response.deny(e.to_string())
        }
    }
}

fn validate<K>(
    request: &AdmissionRequest<DynamicObject>,
) -> Result<Result<(), crds::ValidationError>, WebhookError>
where
    K: Validator + DeserializeOwned,
{
    Ok(match request.operation {
        Operation::Create => decode::<K>(request.object.as_ref(), "object")?.validate_create(),
        Operation::Update => {
            let new = decode::<K>(request.object.as_ref(), "object")?;
            let old = decode::<K>(request.old_object.as_ref(), "oldObject")?;
            new.validate_update(&old)
        }
        Operation::Delete => decode::<K>(request.old_object.as_ref(), "oldObject")?.validate_delete(),
        Operation::Connect => Ok(()),
    })
}

fn decode<K: DeserializeOwned>(
    object: Option<&DynamicObject>,
    field: &'static str,
) -> Result<K, WebhookError> {
    let object = object.ok_or(WebhookError::MissingObject(field))?;
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|source| WebhookError::Decode { field, source })
}
