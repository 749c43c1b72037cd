//! Initial bindings of a case.
//!
//! ```text
//! in-memory      fetch every dataset URL concurrently ─┐
//! spark-local    sparkLocalData                        ├─▶ merge ─▶ defaultBindings on top
//! spark-static   sparkClusterData                      │
//! spark-kube     sparkClusterData                     ─┘
//! ```
//!
//! Defaults are applied last, so they win over same-named values whatever
//! order the fetches complete in.

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::{fetch_json, Transport};
use crate::config::{CaseConfig, ExecutionContext};
use crate::models::{Binding, Bindings};

/// Build the bindings a case starts with in `context`.
///
/// A dataset that cannot be fetched is left out.
pub async fn load_bindings(
    transport: &dyn Transport,
    context: ExecutionContext,
    case: &CaseConfig,
) -> Bindings {
    let mut bindings = match context {
        ExecutionContext::InMemory => fetch_datasets(transport, case).await,
        remote if remote.is_remote_cluster() => from_map(&case.spark_cluster_data),
        _ => from_map(&case.spark_local_data),
    };
    bindings.extend(from_map(&case.default_bindings));
    info!(context = %context, count = bindings.len(), "bindings ready");
    bindings
}

async fn fetch_datasets(transport: &dyn Transport, case: &CaseConfig) -> Bindings {
    let fetches = case.in_memory_data.iter().map(|source| async move {
        let result = fetch_json(transport, &source.url).await;
        (source, result)
    });

    let mut bindings = Bindings::new();
    for (source, result) in join_all(fetches).await {
        match result {
            Ok(value) => {
                bindings.insert(source.name.clone(), Binding::from(value));
            }
            Err(e) => {
                warn!(
                    dataset = %source.name,
                    url = %source.url,
                    error = %e,
                    "dataset fetch failed"
                );
            }
        }
    }
    bindings
}

fn from_map(map: &Map<String, Value>) -> Bindings {
    map.iter().map(|(k, v)| (k.clone(), Binding::from(v.clone()))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockReply, MockTransport};
    use crate::config::DatasetSource;
    use serde_json::json;
    use std::time::Duration;

    fn case() -> CaseConfig {
        CaseConfig::from_json(
            r#"{
                "label": "case",
                "inMemoryData": [
                    {"name": "ds1", "url": "http://data/ds1.json"},
                    {"name": "ds2", "url": "http://data/ds2.json"}
                ],
                "sparkLocalData": {"ds1": {"type": "S3", "bucket": "local"}},
                "sparkClusterData": {
                    "ds1": {"type": "JDBC", "query": "select 1"},
                    "ds2": {"type": "S3", "bucket": "c"}
                },
                "defaultBindings": {"ds2": {"overridden": true}, "limit": 10}
            }"#,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_fetch_merge_defaults_last() {
        // ds2 completes after ds1, defaults still win over it
        let mock = MockTransport::new()
            .on_get(
                "http://data/ds1.json",
                MockReply::json(json!({ "rows": [1] })).after(Duration::from_millis(50)),
            )
            .on_get(
                "http://data/ds2.json",
                MockReply::json(json!({ "rows": [2] })).after(Duration::from_millis(100)),
            );

        let bindings = load_bindings(&mock, ExecutionContext::InMemory, &case()).await;

        assert_eq!(bindings["ds1"], Binding::Dataset(json!({ "rows": [1] })));
        assert_eq!(bindings["ds2"], Binding::Dataset(json!({ "overridden": true })));
        assert_eq!(bindings["limit"], Binding::Dataset(json!(10)));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_failed_dataset_is_skipped() {
        let mock = MockTransport::new()
            .on_get("http://data/ds1.json", MockReply::Fail("timeout".into()))
            .on_get("http://data/ds2.json", MockReply::json(json!([1, 2])));
        let mut case = case();
        case.default_bindings.clear();
        case.in_memory_data.push(DatasetSource {
            name: "ds3".into(),
            url: "http://data/missing.json".into(),
        });

        let bindings = load_bindings(&mock, ExecutionContext::InMemory, &case).await;

        assert!(!bindings.contains_key("ds1"));
        assert!(!bindings.contains_key("ds3"));
        assert_eq!(bindings["ds2"], Binding::Dataset(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_spark_contexts_do_not_fetch() {
        let mock = MockTransport::new();

        let local = load_bindings(&mock, ExecutionContext::SparkLocal, &case()).await;
        assert_eq!(local["ds1"], Binding::object_storage(json!({ "bucket": "local" })));
        assert_eq!(local["ds2"], Binding::Dataset(json!({ "overridden": true })));

        let kube = load_bindings(&mock, ExecutionContext::SparkKube, &case()).await;
        assert_eq!(kube["ds1"], Binding::query(json!({ "query": "select 1" })));
        assert_eq!(kube.len(), 3);

        assert!(mock.requests().is_empty());
    }
}
