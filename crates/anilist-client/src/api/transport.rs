//! GraphQL transport: sends a query with variables and returns the `data` member.

use super::error::ClientError;
use super::types::{GraphQlRequest, GraphQlResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything able to execute a GraphQL query
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    /// Execute `query` and return the decoded `data` member of the response
    async fn execute(&self, query: &str, variables: Option<&Value>) -> Result<Value, ClientError>;
}

/// GraphQL over HTTP POST
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client with default headers applied
    client: Client,
    /// GraphQL endpoint URL
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for `endpoint`, sending `token` as a bearer token when present
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ClientError::InvalidConfig(
                    "token contains characters not allowed in a header".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("anilist-client/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ClientError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl GraphQlTransport for HttpTransport {
    async fn execute(&self, query: &str, variables: Option<&Value>) -> Result<Value, ClientError> {
        debug!(endpoint = %self.endpoint, "Sending GraphQL request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "Request error");
                ClientError::Network(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        decode_response(status, &body)
    }
}

/// Turn a raw HTTP response into the `data` member or an error.
///
/// GraphQL errors win over the status code: AniList reports them, including
/// its 429 throttling reply, with a non-success status and a JSON body. The
/// status travels with the error so throttling stays retryable.
fn decode_response(status: StatusCode, body: &str) -> Result<Value, ClientError> {
    let parsed = serde_json::from_str::<GraphQlResponse>(body);

    if let Ok(GraphQlResponse {
        errors: Some(errors),
        ..
    }) = &parsed
    {
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            let status = if status.is_success() {
                errors
                    .iter()
                    .filter_map(|e| e.status)
                    .find_map(|code| StatusCode::from_u16(code).ok())
                    .unwrap_or(status)
            } else {
                status
            };
            warn!(status = %status, errors = ?messages, "GraphQL request returned errors");
            return Err(ClientError::GraphQl { messages, status });
        }
    }

    if !status.is_success() {
        warn!(status = %status, "Request failed");
        return Err(ClientError::Http {
            status,
            body: body.to_string(),
        });
    }

    match parsed? {
        GraphQlResponse {
            data: Some(data), ..
        } => Ok(data),
        _ => Err(ClientError::MissingData),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_success() {
        let data = decode_response(StatusCode::OK, r#"{"data":{"Media":{"id":1}}}"#).unwrap();
        assert_eq!(data, json!({ "Media": { "id": 1 } }));
    }

    #[test]
    fn test_decode_errors_with_client_status() {
        let body = r#"{"data":null,"errors":[{"message":"Not Found.","status":404}]}"#;
        match decode_response(StatusCode::NOT_FOUND, body) {
            Err(ClientError::GraphQl { messages, status }) => {
                assert_eq!(messages, vec!["Not Found."]);
                assert_eq!(status, StatusCode::NOT_FOUND);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_errors_status_from_body_on_success() {
        let body = r#"{"data":null,"errors":[{"message":"Internal Server Error","status":500}]}"#;
        match decode_response(StatusCode::OK, body) {
            Err(err @ ClientError::GraphQl { .. }) => assert!(err.is_retryable()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_plain_server_error() {
        match decode_response(StatusCode::BAD_GATEWAY, "upstream down") {
            Err(ClientError::Http { status, body }) => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_null_data() {
        assert!(matches!(
            decode_response(StatusCode::OK, r#"{"data":null}"#),
            Err(ClientError::MissingData)
        ));
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(
            decode_response(StatusCode::OK, "<html>"),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result =
            HttpTransport::new("http://localhost", Some("bad\ntoken"), Duration::from_secs(1));
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_execute_sends_query_and_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({ "variables": { "id": 1 } })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "Media": { "id": 1 } } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(server.uri(), Some("test-token"), Duration::from_secs(5)).unwrap();
        let variables = json!({ "id": 1 });
        let data = transport
            .execute("query ($id: Int) { Media(id: $id) { id } }", Some(&variables))
            .await
            .unwrap();

        assert_eq!(data["Media"]["id"], 1);
    }

    #[tokio::test]
    async fn test_execute_reports_graphql_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Invalid token", "status": 400 }]
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = transport.execute("query { Viewer { id } }", None).await.unwrap_err();

        assert_eq!(err.to_string(), "GraphQL Error: Invalid token");
    }

    #[tokio::test]
    async fn test_execute_reports_rate_limit_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = transport.execute("query { Viewer { id } }", None).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            ClientError::Http { status, .. } if status == StatusCode::TOO_MANY_REQUESTS
        ));
    }

    #[tokio::test]
    async fn test_execute_throttled_with_graphql_body_is_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Too Many Requests.", "status": 429 }]
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let err = transport.execute("query { Viewer { id } }", None).await.unwrap_err();

        assert_eq!(err.to_string(), "GraphQL Error: Too Many Requests.");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_execute_connection_refused() {
        let transport =
            HttpTransport::new("http://127.0.0.1:1", None, Duration::from_secs(5)).unwrap();
        let err = transport.execute("query { Viewer { id } }", None).await.unwrap_err();

        assert!(matches!(err, ClientError::Network(_)));
        assert!(err.to_string().starts_with("Network Error"));
    }
}
