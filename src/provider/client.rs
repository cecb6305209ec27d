//! HTTP implementation of [`ProviderClient`] for OpenAI-compatible APIs.
//!
//! Handles both plain OpenAI connections (bearer auth, `/chat/completions`)
//! and Azure-style connections (`api-key` header, deployment-scoped paths,
//! `api-version` query parameter).

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;

use super::{Connection, ProviderClient, ProviderError};

/// A configured HTTP client for the provider API.
///
/// Holds one pooled [`reqwest::Client`]; connection details (key, base URL,
/// api type) arrive per call, so one instance serves every project.
pub struct OpenAiClient {
    http: reqwest::Client,
    default_base: String,
}

impl OpenAiClient {
    /// Creates a client that falls back to `default_base` when a connection
    /// has no `api_base`. `timeout` bounds each provider call.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (e.g. TLS backend initialization fails).
    pub fn new(default_base: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            default_base: default_base.into(),
        })
    }

    fn base_url<'a>(&'a self, conn: &'a Connection) -> &'a str {
        conn.api_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.default_base)
            .trim_end_matches('/')
    }

    /// Attaches auth and organization headers for this connection.
    fn authorize(&self, req: RequestBuilder, conn: &Connection) -> RequestBuilder {
        let req = if conn.is_azure() {
            req.header("api-key", &conn.api_key)
        } else {
            req.bearer_auth(&conn.api_key)
        };
        match conn.organization.as_deref() {
            Some(org) => req.header("OpenAI-Organization", org),
            None => req,
        }
    }

    /// Builds the invocation URL for `operation` (`chat/completions`,
    /// `completions` or `embeddings`). Azure connections route through the
    /// deployment named by the request's `model` field, which is
    /// percent-encoded as a single path segment.
    fn invocation_url(&self, conn: &Connection, operation: &str, body: &Value) -> Result<Url, ProviderError> {
        let mut url = parse_base(self.base_url(conn))?;
        if !conn.is_azure() {
            push_segments(&mut url, operation.split('/'))?;
            return Ok(url);
        }
        let deployment = body
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Unsupported("Azure requests need a model deployment name".into()))?;
        let version = conn
            .api_version
            .as_deref()
            .ok_or_else(|| ProviderError::Unsupported("Azure requests need an api_version".into()))?;
        push_segments(
            &mut url,
            ["openai", "deployments", deployment].into_iter().chain(operation.split('/')),
        )?;
        url.query_pairs_mut().append_pair("api-version", version);
        Ok(url)
    }

    async fn post(&self, conn: &Connection, operation: &str, body: Value) -> Result<Value, ProviderError> {
        let url = self.invocation_url(conn, operation, &body)?;
        tracing::debug!(%url, "provider invocation");
        let req = self.authorize(self.http.post(url), conn).json(&body);
        send_json(req).await
    }
}

fn parse_base(base: &str) -> Result<Url, ProviderError> {
    Url::parse(base).map_err(|e| ProviderError::Unsupported(format!("invalid api_base '{base}': {e}")))
}

/// Appends path segments to `url`, percent-encoding each one.
fn push_segments<'a>(url: &mut Url, segments: impl IntoIterator<Item = &'a str>) -> Result<(), ProviderError> {
    let base = url.to_string();
    url.path_segments_mut()
        .map_err(|()| ProviderError::Unsupported(format!("api_base '{base}' cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}

/// Sends a request and decodes a JSON body, mapping non-2xx statuses to
/// [`ProviderError::Api`] with the provider's own error message when present.
async fn send_json(req: RequestBuilder) -> Result<Value, ProviderError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message: api_error_message(&text),
        });
    }
    Ok(resp.json::<Value>().await?)
}

/// Pulls `error.message` out of a provider error body, or returns the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn chat_completion(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        self.post(conn, "chat/completions", body).await
    }

    async fn completion(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        self.post(conn, "completions", body).await
    }

    async fn embeddings(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        self.post(conn, "embeddings", body).await
    }

    async fn list_models_legacy(&self, conn: &Connection) -> Result<Value, ProviderError> {
        let mut url = parse_base(self.base_url(conn))?;
        if conn.is_azure() {
            let version = conn.api_version.as_deref().ok_or_else(|| {
                ProviderError::Unsupported("Azure model listing needs an api_version".into())
            })?;
            push_segments(&mut url, ["openai", "models"])?;
            url.query_pairs_mut().append_pair("api-version", version);
        } else {
            push_segments(&mut url, ["models"])?;
            if let Some(version) = conn.api_version.as_deref() {
                url.query_pairs_mut().append_pair("api-version", version);
            }
        }
        let req = self.authorize(self.http.get(url), conn);
        let page = send_json(req).await?;
        // The legacy listing only ever answered with a mapping page.
        if page.get("data").is_some_and(Value::is_array) {
            Ok(page)
        } else {
            Err(ProviderError::Decode(
                "legacy listing response has no `data` array".into(),
            ))
        }
    }

    async fn list_models(&self, conn: &Connection) -> Result<Value, ProviderError> {
        let conn = conn.without_legacy_fields();
        let mut url = parse_base(self.base_url(&conn))?;
        push_segments(&mut url, ["models"])?;
        let req = self.authorize(self.http.get(url), &conn);
        send_json(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> OpenAiClient {
        OpenAiClient::new("http://unused.invalid", Duration::from_secs(5)).unwrap()
    }

    fn conn(server: &MockServer) -> Connection {
        Connection {
            api_key: "test-api-key".into(),
            api_base: Some(server.uri()),
            ..Connection::default()
        }
    }

    #[tokio::test]
    async fn test_chat_completion_posts_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-123",
                "choices": [{"message": {"role": "assistant", "content": "Hi"}}]
            })))
            .mount(&server)
            .await;

        let resp = client()
            .chat_completion(&conn(&server), json!({"model": "gpt-4", "messages": []}))
            .await
            .unwrap();
        assert_eq!(resp["id"], "chatcmpl-123");
    }

    #[tokio::test]
    async fn test_api_error_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = client()
            .completion(&conn(&server), json!({"model": "davinci-002", "prompt": "x"}))
            .await
            .unwrap_err();
        match err {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_azure_chat_uses_deployment_path_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4/chat/completions"))
            .and(query_param("api-version", "2023-05-15"))
            .and(header("api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
            .mount(&server)
            .await;

        let mut c = conn(&server);
        c.api_type = Some("azure".into());
        c.api_version = Some("2023-05-15".into());
        let resp = client()
            .chat_completion(&c, json!({"model": "gpt-4", "messages": []}))
            .await
            .unwrap();
        assert_eq!(resp["ok"], 1);
    }

    #[tokio::test]
    async fn test_azure_deployment_name_is_one_encoded_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/team%2Fgpt%3Fx%23y/chat/completions"))
            .and(query_param("api-version", "2024-02-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let mut c = conn(&server);
        c.api_type = Some("azure_ad".into());
        c.api_version = Some("2024-02-01".into());
        let resp = client()
            .chat_completion(&c, json!({"model": "team/gpt?x#y", "messages": []}))
            .await
            .unwrap();
        assert_eq!(resp["ok"], 1);
    }

    #[tokio::test]
    async fn test_embeddings_posts_to_embeddings_route() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}]
            })))
            .mount(&server)
            .await;

        let mut c = conn(&server);
        c.api_base = Some(format!("{}/v1/", server.uri()));
        let resp = client()
            .embeddings(&c, json!({"model": "text-embedding-ada-002", "input": ["a"]}))
            .await
            .unwrap();
        assert_eq!(resp["data"][0]["embedding"][1], 0.2);
    }

    #[tokio::test]
    async fn test_invalid_base_is_reported() {
        let c = Connection {
            api_base: Some("not a url".into()),
            ..Connection::new("k")
        };
        let err = client()
            .completion(&c, json!({"model": "davinci-002", "prompt": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
    }

    #[tokio::test]
    async fn test_legacy_listing_rejects_bare_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "gpt-4"}])))
            .mount(&server)
            .await;

        let err = client().list_models_legacy(&conn(&server)).await.unwrap_err();
        assert_eq!(err.kind(), "DecodeError");

        let modern = client().list_models(&conn(&server)).await.unwrap();
        assert!(modern.is_array());
    }

    #[tokio::test]
    async fn test_azure_legacy_listing_requires_version() {
        let mut c = Connection::new("k");
        c.api_type = Some("azure".into());
        let err = client().list_models_legacy(&c).await.unwrap_err();
        assert_eq!(err.kind(), "UnsupportedOperationError");
    }

    #[test]
    fn test_api_error_message_falls_back_to_text() {
        assert_eq!(api_error_message("  bad gateway \n"), "bad gateway");
    }
}
