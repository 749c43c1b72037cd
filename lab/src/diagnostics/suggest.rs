//! Variable suggestions offered by the editor.
//!
//! Fetched once from the case's suggester URL, independently of validation:
//!
//! ```text
//! {"dataStructure": [{"name": "id", "type": "STRING", "role": "IDENTIFIER"}]}
//!     ─▶ [{"name": "id", "type": "STRING", "role": "IDENTIFIER", "label": "ID (STRING)"}]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::client::{fetch_json, Transport};
use crate::error::{ClientError, ClientResult};

/// One suggested variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// `"<NAME> (<type>)"`, name upper-cased.
    #[serde(default)]
    pub label: String,
    /// Other fields of the structure entry, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Suggestions, with the flag the editor waits on before showing up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestionSet {
    pub ready: bool,
    pub items: Vec<Suggestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructureDocument {
    data_structure: Vec<Suggestion>,
}

/// Label shown in the completion list.
pub fn label(name: &str, kind: &str) -> String {
    format!("{} ({})", name.to_uppercase(), kind)
}

/// Fetch suggestions from `url`. Always ready; any failure gives no items.
pub async fn fetch_suggestions(transport: &dyn Transport, url: Option<&str>) -> SuggestionSet {
    let items = match url.filter(|u| !u.is_empty()) {
        Some(url) => match load(transport, url).await {
            Ok(items) => items,
            Err(e) => {
                warn!(%url, error = %e, "suggestions unavailable");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    SuggestionSet { ready: true, items }
}

async fn load(transport: &dyn Transport, url: &str) -> ClientResult<Vec<Suggestion>> {
    let document: StructureDocument = serde_json::from_value(fetch_json(transport, url).await?)
        .map_err(|e| ClientError::UnexpectedResponse(format!("no dataStructure: {}", e)))?;

    Ok(document
        .data_structure
        .into_iter()
        .map(|mut s| {
            s.label = label(&s.name, &s.kind);
            s
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockReply, MockTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_labels_and_passthrough() {
        let mock = MockTransport::new().on_get(
            "http://data/ds1.json",
            MockReply::json(json!({
                "dataStructure": [
                    { "name": "id", "type": "STRING", "role": "IDENTIFIER" },
                    { "name": "obs_value", "type": "NUMBER", "role": "MEASURE" }
                ],
                "dataPoints": [["a", 1]]
            })),
        );

        let set = fetch_suggestions(&mock, Some("http://data/ds1.json")).await;

        assert!(set.ready);
        assert_eq!(set.items.len(), 2);
        assert_eq!(set.items[0].label, "ID (STRING)");
        assert_eq!(set.items[1].label, "OBS_VALUE (NUMBER)");
        assert_eq!(set.items[1].extra["role"], "MEASURE");
    }

    #[tokio::test]
    async fn test_failures_are_ready_and_empty() {
        let mock = MockTransport::new()
            .on_get("http://data/flat.json", MockReply::json(json!([1, 2, 3])))
            .on_get("http://data/down.json", MockReply::Fail("refused".into()));

        let urls = [
            Some("http://data/flat.json"),
            Some("http://data/down.json"),
            Some("http://data/none"),
            None,
        ];
        for url in urls {
            let set = fetch_suggestions(&mock, url).await;
            assert!(set.ready);
            assert!(set.items.is_empty());
        }
    }
}
