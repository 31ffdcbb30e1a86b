//! GraphQL request and response envelopes.
//!
//! These types represent the JSON bodies exchanged with the AniList endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body posted to the GraphQL endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<&'a Value>,
}

/// Top-level response body
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlErrorEntry>>,
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorEntry {
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_missing_variables() {
        let request = GraphQlRequest {
            query: "query { Viewer { id } }",
            variables: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({ "query": "query { Viewer { id } }" }));
    }

    #[test]
    fn test_response_with_errors() {
        let body = r#"{"data":null,"errors":[{"message":"Not Found.","status":404}]}"#;
        let response: GraphQlResponse = serde_json::from_str(body).unwrap();

        assert!(response.data.is_none());
        let errors = response.errors.unwrap();
        assert_eq!(errors[0].message, "Not Found.");
        assert_eq!(errors[0].status, Some(404));
    }
}
