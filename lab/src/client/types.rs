//! Request and response bodies exchanged with the lab backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::binding::BindingBuckets;
use crate::models::{is_truthy, JobHandle};

/// Body of a synchronous execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub vtl_script: String,
    pub bindings: Map<String, Value>,
    pub to_save: Map<String, Value>,
}

/// Body of an asynchronous job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub vtl_script: String,
    pub to_save: Map<String, Value>,
    #[serde(flatten)]
    pub buckets: BindingBuckets,
}

/// Message of a backend-reported error, if the body carries a truthy `error`.
///
/// `error` may be a string or an object with `message` (or `chars`).
pub fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    if !is_truthy(error) {
        return None;
    }
    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(fields) => fields
            .get("message")
            .or_else(|| fields.get("chars"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    };
    Some(message)
}

/// Job identifier from a submission body: every `"` removed, whitespace trimmed.
pub fn strip_job_id(body: &str) -> Option<JobHandle> {
    let id = body.replace('"', "");
    let id = id.trim();
    (!id.is_empty()).then(|| JobHandle::new(id))
}
