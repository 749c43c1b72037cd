//! Reconciliation of bindings into backend payloads.
//!
//! Both shapes drop entries whose name is empty or whose value is falsy.
//!
//! ```text
//! flat (synchronous):   { A: 1, x: {type: S3, bucket: b} }
//! buckets (jobs):       { bindings: {}, s3ForBindings: { x: {bucket: b} },
//!                         queriesForBindings: {} }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{is_truthy, Binding, Bindings};

/// Bindings partitioned for a distributed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingBuckets {
    /// In-memory datasets. Jobs read their inputs from storage, so this stays empty.
    pub bindings: Map<String, Value>,
    /// Object-storage bindings, `type` stripped.
    pub s3_for_bindings: Map<String, Value>,
    /// Query bindings, `type` stripped.
    pub queries_for_bindings: Map<String, Value>,
}

fn kept(bindings: &Bindings) -> impl Iterator<Item = (&String, &Binding)> {
    bindings.iter().filter(|(name, binding)| !name.is_empty() && binding.is_truthy())
}

/// Flat name → value mapping for the synchronous backends.
pub fn reconcile_flat(bindings: &Bindings) -> Map<String, Value> {
    kept(bindings).map(|(name, binding)| (name.clone(), binding.to_value())).collect()
}

/// Partition bindings by tag for job submission.
///
/// Dataset bindings, including values with an unrecognised `type`, land in no bucket.
pub fn reconcile_buckets(bindings: &Bindings) -> BindingBuckets {
    let mut buckets = BindingBuckets::default();
    for (name, binding) in kept(bindings) {
        match binding {
            Binding::ObjectStorage(fields) => {
                buckets.s3_for_bindings.insert(name.clone(), Value::Object(fields.clone()));
            }
            Binding::Query(fields) => {
                buckets.queries_for_bindings.insert(name.clone(), Value::Object(fields.clone()));
            }
            Binding::Dataset(_) => {}
        }
    }
    buckets
}

/// Same filter as bindings, applied to the outputs to persist.
pub fn reconcile_to_save(to_save: &Map<String, Value>) -> Map<String, Value> {
    to_save
        .iter()
        .filter(|(name, value)| !name.is_empty() && is_truthy(value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
