//! Flipt entities exchanged with the backend.
//!
//! The serde representation follows the proto-JSON encoding used by the Flipt HTTP API: field names
//! are camelCase and fields at their default value may be omitted.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flag metadata. Fetched fresh for every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flag {
    /// Unique key within the namespace.
    pub key: String,
    /// Human-readable name.
    pub name: String,
    #[allow(missing_docs)]
    pub description: String,
    /// Disabled flags always resolve to the caller's default.
    pub enabled: bool,
    #[allow(missing_docs)]
    pub namespace_key: String,
    #[allow(missing_docs)]
    pub created_at: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of an evaluation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationRequest {
    /// Caller-supplied correlation id, empty when the context has none.
    pub request_id: String,
    #[allow(missing_docs)]
    pub flag_key: String,
    /// The context's targeting key.
    pub entity_id: String,
    /// Every context entry rendered as a string, including the targeting key.
    pub context: HashMap<String, String>,
    #[allow(missing_docs)]
    pub namespace_key: String,
}

/// Outcome of an evaluation as decided by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct EvaluationResponse {
    pub request_id: String,
    pub entity_id: String,
    pub request_context: HashMap<String, String>,
    /// Whether the entity matched one of the flag's segments.
    #[serde(rename = "match")]
    pub matched: bool,
    pub flag_key: String,
    pub segment_key: String,
    /// Raw variant value; coerced by the provider into the requested type.
    pub value: String,
    /// JSON-encoded variant attachment, empty when the variant has none.
    pub attachment: String,
    pub namespace_key: String,
}

#[cfg(test)]
mod tests {
    use super::{EvaluationRequest, EvaluationResponse, Flag};

    #[test]
    fn parse_flag_with_omitted_fields() {
        let flag: Flag = serde_json::from_str(
            r#"
              {
                "key": "foo",
                "name": "Flag Name",
                "namespaceKey": "foo-namespace",
                "createdAt": "2023-01-02T03:04:05.123456Z",
                "variants": []
              }
            "#,
        )
        .unwrap();

        assert_eq!(flag.key, "foo");
        assert_eq!(flag.name, "Flag Name");
        assert_eq!(flag.description, "");
        assert!(!flag.enabled);
        assert_eq!(flag.namespace_key, "foo-namespace");
        assert!(flag.created_at.is_some());
        assert!(flag.updated_at.is_none());
    }

    #[test]
    fn parse_evaluation_response() {
        let response: EvaluationResponse = serde_json::from_str(
            r#"
              {
                "requestId": "987654321",
                "entityId": "123456789",
                "match": true,
                "flagKey": "foo",
                "segmentKey": "foo-segment",
                "value": "42",
                "attachment": "{\"a\":1}",
                "requestDurationMillis": 0.52,
                "reason": "MATCH_EVALUATION_REASON"
              }
            "#,
        )
        .unwrap();

        assert!(response.matched);
        assert_eq!(response.value, "42");
        assert_eq!(response.segment_key, "foo-segment");
        assert_eq!(response.attachment, r#"{"a":1}"#);
        assert_eq!(response.namespace_key, "");
    }

    #[test]
    fn evaluation_request_uses_camel_case() {
        let request = EvaluationRequest {
            request_id: "r".to_owned(),
            flag_key: "foo".to_owned(),
            entity_id: "e".to_owned(),
            context: [("targetingKey".to_owned(), "e".to_owned())].into(),
            namespace_key: "default".to_owned(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "requestId": "r",
                "flagKey": "foo",
                "entityId": "e",
                "context": {"targetingKey": "e"},
                "namespaceKey": "default",
            })
        );
    }
}
