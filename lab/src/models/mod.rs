//! Domain models shared by the diagnostics engine, the bindings layer
//! and the session.
//!
//! - [`Binding`] - a named script input (dataset, S3 config or JDBC config)
//! - [`Diagnostic`] - a positioned syntax error
//! - [`JobHandle`] - identifier of a submitted distributed job
//! - [`Outcome`] - result of an execution, success or failure

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BindingError, BindingResult};

/// `type` tag of object-storage bindings.
pub const S3: &str = "S3";

/// `type` tag of query bindings.
pub const JDBC: &str = "JDBC";

// =============================================================================
// Bindings
// =============================================================================

/// A script input, routed by its `type` tag.
///
/// Anything that is not tagged `S3` or `JDBC` is treated as a dataset value,
/// including objects carrying an unknown tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Binding {
    /// Pre-loaded dataset held in memory.
    Dataset(Value),
    /// Object-storage configuration, without its `type` field.
    ObjectStorage(Map<String, Value>),
    /// Query configuration, without its `type` field.
    Query(Map<String, Value>),
}

impl Binding {
    /// Build an object-storage binding from its configuration fields.
    pub fn object_storage(fields: Value) -> Self {
        Self::from_tagged(S3, fields)
    }

    /// Build a query binding from its configuration fields.
    pub fn query(fields: Value) -> Self {
        Self::from_tagged(JDBC, fields)
    }

    fn from_tagged(tag: &str, fields: Value) -> Self {
        let mut map = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.remove("type");
        match tag {
            S3 => Binding::ObjectStorage(map),
            _ => Binding::Query(map),
        }
    }

    /// The `type` tag this binding is routed by, if any.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Binding::Dataset(_) => None,
            Binding::ObjectStorage(_) => Some(S3),
            Binding::Query(_) => Some(JDBC),
        }
    }

    /// JavaScript truthiness of the binding value. Typed bindings are objects
    /// and therefore always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Binding::Dataset(value) => is_truthy(value),
            Binding::ObjectStorage(_) | Binding::Query(_) => true,
        }
    }

    /// Wire value with the `type` tag re-attached.
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        let tag = value.get("type").and_then(Value::as_str).map(str::to_owned);
        match tag.as_deref() {
            Some(S3) => Binding::object_storage(value),
            Some(JDBC) => Binding::query(value),
            _ => Binding::Dataset(value),
        }
    }
}

impl From<Binding> for Value {
    fn from(binding: Binding) -> Self {
        match binding {
            Binding::Dataset(value) => value,
            Binding::ObjectStorage(mut map) => {
                map.insert("type".into(), Value::String(S3.into()));
                Value::Object(map)
            }
            Binding::Query(mut map) => {
                map.insert("type".into(), Value::String(JDBC.into()));
                Value::Object(map)
            }
        }
    }
}

/// Bindings keyed by name.
pub type Bindings = BTreeMap<String, Binding>;

/// Parse a JSON object of bindings.
pub fn bindings_from_value(value: Value) -> BindingResult<Bindings> {
    match value {
        Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, Binding::from(v))).collect()),
        Value::Null => Ok(Bindings::new()),
        other => Err(BindingError::NotAnObject(json_kind(&other).to_string())),
    }
}

/// Parse bindings from JSON text.
pub fn bindings_from_str(json: &str) -> BindingResult<Bindings> {
    bindings_from_value(serde_json::from_str(json)?)
}

/// JavaScript truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
/// Objects and arrays are truthy even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Severity of a diagnostic. Only errors gate execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A positioned syntax problem.
///
/// Lines and columns are 1-based; `end_col` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    /// Error spanning `len` characters on one line.
    pub fn error(line: usize, col: usize, len: usize, message: impl Into<String>) -> Self {
        Self {
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col + len.max(1),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.start_line, self.start_col, self.message)
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Identifier of a submitted distributed job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of an execution. Success and failure are exclusive by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "value")]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

impl Outcome {
    pub fn success(&self) -> Option<&Value> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(message) => Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_routing_by_tag() {
        let s3 = Binding::from(json!({ "type": "S3", "bucket": "b" }));
        let bucket = json!({ "bucket": "b" }).as_object().cloned().unwrap();
        assert_eq!(s3, Binding::ObjectStorage(bucket));

        let jdbc = Binding::from(json!({ "type": "JDBC", "query": "q" }));
        assert_eq!(jdbc.tag(), Some(JDBC));

        let unknown = Binding::from(json!({ "type": "UNKNOWN" }));
        assert_eq!(unknown, Binding::Dataset(json!({ "type": "UNKNOWN" })));
    }

    #[test]
    fn test_binding_serde_reattaches_tag() {
        let binding = Binding::object_storage(json!({ "bucket": "b", "path": "p" }));
        let value = serde_json::to_value(&binding).unwrap();
        assert_eq!(value, json!({ "type": "S3", "bucket": "b", "path": "p" }));

        let back: Binding = serde_json::from_value(value).unwrap();
        assert_eq!(back, binding);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1)));
    }

    #[test]
    fn test_bindings_from_str() {
        let text = r#"{"A": 1, "ds": {"type": "JDBC", "query": "select 1"}}"#;
        let bindings = bindings_from_str(text).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings["A"], Binding::Dataset(json!(1)));
        assert_eq!(bindings["ds"].tag(), Some(JDBC));

        assert!(bindings_from_str("[1, 2]").is_err());
        assert!(bindings_from_str("null").unwrap().is_empty());
    }

    #[test]
    fn test_outcome_exclusive_accessors() {
        let ok = Outcome::Success(json!({ "result": 3 }));
        assert!(ok.success().is_some());
        assert!(ok.error().is_none());

        let failed = Outcome::Failure("boom".into());
        assert!(failed.success().is_none());
        assert_eq!(failed.error(), Some("boom"));
    }
}
