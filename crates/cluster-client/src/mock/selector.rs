//! Equality-based label selector matching for the mock store

use serde_json::Value;

/// True when `labels` satisfies every `key=value` / `key==value` / `key!=value` term
pub fn matches_selector(labels: &Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };

    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                return labels[key.trim()].as_str() != Some(value.trim());
            }
            match term.split_once('=') {
                Some((key, value)) => {
                    let value = value.trim_start_matches('=').trim();
                    labels[key.trim()].as_str() == Some(value)
                }
                // Bare key: existence
                None => labels.get(term).is_some(),
            }
        })
}
