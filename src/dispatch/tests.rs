use super::*;
use crate::provider::{Connection, OpenAiClient, ProviderError};
use crate::secrets::{CredentialReference, MemorySecretStore, ResolutionError, StoreResolver};
use crate::settings::parse;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Called {
    Chat,
    Text,
    Embed,
}

/// Provider double that records calls and replies from a script.
struct FakeProvider {
    calls: Mutex<Vec<(Called, Connection, Value)>>,
    fail_with: Option<fn() -> ProviderError>,
}

impl FakeProvider {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_with: None,
        })
    }

    fn failing(f: fn() -> ProviderError) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Some(f),
        })
    }

    fn record(&self, called: Called, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push((called, conn.clone(), body.clone()));
        if let Some(f) = self.fail_with {
            return Err(f());
        }
        Ok(json!({"id": "resp-1", "path": format!("{called:?}"), "echo": body}))
    }

    fn calls(&self) -> Vec<(Called, Connection, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn chat_completion(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        self.record(Called::Chat, conn, body)
    }
    async fn completion(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        self.record(Called::Text, conn, body)
    }
    async fn embeddings(&self, conn: &Connection, body: Value) -> Result<Value, ProviderError> {
        let inputs = body["input"].as_array().map_or(1, Vec::len);
        self.record(Called::Embed, conn, body)?;
        let data: Vec<Value> = (0..inputs)
            .map(|i| json!({"object": "embedding", "index": i, "embedding": [0.5, i]}))
            .collect();
        Ok(json!({"object": "list", "data": data}))
    }
    async fn list_models_legacy(&self, _: &Connection) -> Result<Value, ProviderError> {
        Ok(json!({"data": []}))
    }
    async fn list_models(&self, _: &Connection) -> Result<Value, ProviderError> {
        Ok(json!([]))
    }
}

/// Resolver that hands back a fixed key and counts lookups.
struct CountingResolver {
    lookups: Mutex<usize>,
}

impl CredentialResolver for CountingResolver {
    fn resolve(&self, _: &CredentialReference, _: ProjectId) -> Result<String, ResolutionError> {
        *self.lookups.lock().unwrap() += 1;
        Ok("sk-resolved".into())
    }
}

fn dispatcher(provider: Arc<FakeProvider>) -> Dispatcher {
    let resolver = Arc::new(CountingResolver {
        lookups: Mutex::new(0),
    });
    Dispatcher::new(Arc::new(CapabilityRegistry::defaults()), provider, resolver)
}

/// Base URL of a local port nothing listens on: bound, then released.
fn refused_base() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn settings(value: Value) -> IntegrationSettings {
    parse(&value).unwrap()
}

#[tokio::test]
async fn test_chat_model_uses_chat_path() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({
        "api_token": "{{secret.openai}}",
        "model_name": "gpt-4",
        "models": [{"id": "gpt-4", "capabilities": {"chat_completion": true}}]
    }));
    let prompt = PromptStruct::new(json!({"messages": [{"role": "user", "content": "Hello"}]}));

    let envelope = d.predict(1, &s, &prompt).await;

    assert!(envelope.is_ok());
    let response = envelope.response().unwrap();
    assert_eq!(response["path"], "Chat");
    assert_eq!(response["echo"]["messages"][0]["content"], "Hello");

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Called::Chat);
    assert_eq!(calls[0].1.api_key, "sk-resolved");
}

#[tokio::test]
async fn test_response_is_wrapped_unmodified() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4o"}));
    let prompt = PromptStruct::new(json!("ping"));

    let envelope = d.predict(1, &s, &prompt).await;
    let body = provider.calls()[0].2.clone();
    assert_eq!(
        envelope,
        ResultEnvelope::Ok(json!({"id": "resp-1", "path": "Chat", "echo": body}))
    );
}

#[tokio::test]
async fn test_chat_wins_when_both_modes_declared() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({
        "api_token": "k",
        "model_name": "dual",
        "models": [{"id": "dual", "capabilities": {"completion": true, "chat_completion": true}}]
    }));

    for _ in 0..3 {
        d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;
    }
    assert!(provider.calls().iter().all(|(called, _, _)| *called == Called::Chat));
}

#[tokio::test]
async fn test_preference_list_is_configurable() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone()).with_preference(vec![InvocationMode::Text, InvocationMode::Chat]);
    let s = settings(json!({
        "api_token": "k",
        "model_name": "dual",
        "models": [{"id": "dual", "capabilities": {"completion": true, "chat_completion": true}}]
    }));
    d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;
    assert_eq!(provider.calls()[0].0, Called::Text);
}

#[tokio::test]
async fn test_completion_model_uses_text_path() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    // Falls through to the global table: davinci-002 is completion-only.
    let s = settings(json!({"api_token": "k", "model_name": "davinci-002", "max_tokens": 16}));
    let envelope = d.predict(1, &s, &PromptStruct::new(json!("Once upon"))).await;

    assert!(envelope.is_ok());
    let (called, _, body) = provider.calls().remove(0);
    assert_eq!(called, Called::Text);
    assert_eq!(body["prompt"], "Once upon");
    assert_eq!(body["max_tokens"], 16);
}

#[tokio::test]
async fn test_embedding_model_rejected() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({
        "api_token": "k",
        "model_name": "text-embedding-ada-002",
        "models": [{"id": "text-embedding-ada-002", "capabilities": {"embeddings": true}}]
    }));

    let envelope = d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;

    let error = envelope.error().unwrap();
    assert!(error.ends_with("does not support chat or text completion"), "{error}");
    assert!(error.contains("text-embedding-ada-002"));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_model_rejected() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({"api_token": "k", "model_name": "mystery-model"}));

    let envelope = d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;
    assert_eq!(
        envelope.error().map(String::as_str),
        Some("UnsupportedModelError: Model mystery-model does not support chat or text completion")
    );
}

#[tokio::test]
async fn test_settings_override_global_capabilities() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    // Globally gpt-4 is chat-only; this configuration says completion-only.
    let s = settings(json!({
        "api_token": "k",
        "model_name": "gpt-4",
        "models": [{"id": "gpt-4", "capabilities": {"completion": true}}]
    }));
    d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;
    assert_eq!(provider.calls()[0].0, Called::Text);
}

#[tokio::test]
async fn test_provider_failure_becomes_error_envelope() {
    let provider = FakeProvider::failing(|| ProviderError::Api {
        status: 500,
        message: "The server had an error".into(),
    });
    let d = dispatcher(provider);
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4"}));

    let envelope = d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;
    assert_eq!(
        envelope.error().map(String::as_str),
        Some("ApiError: HTTP 500: The server had an error")
    );
}

#[tokio::test]
async fn test_transport_error_reported_with_type() {
    let client = Arc::new(OpenAiClient::new(refused_base(), Duration::from_secs(2)).unwrap());
    let resolver = Arc::new(CountingResolver {
        lookups: Mutex::new(0),
    });
    let d = Dispatcher::new(Arc::new(CapabilityRegistry::defaults()), client, resolver);
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4"}));

    let envelope = d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;

    let error = envelope.error().unwrap();
    assert!(error.starts_with("TransportError: "), "{error}");
    assert!(error.to_lowercase().contains("connection refused"), "{error}");
}

#[tokio::test]
async fn test_credentials_resolved_per_request() {
    let provider = FakeProvider::ok();
    let resolver = Arc::new(CountingResolver {
        lookups: Mutex::new(0),
    });
    let d = Dispatcher::new(
        Arc::new(CapabilityRegistry::defaults()),
        provider,
        resolver.clone(),
    );
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4"}));
    for _ in 0..3 {
        d.predict(1, &s, &PromptStruct::new(json!("hi"))).await;
    }
    assert_eq!(*resolver.lookups.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_missing_secret_reported() {
    let provider = FakeProvider::ok();
    let store = Arc::new(MemorySecretStore::new());
    let d = Dispatcher::new(
        Arc::new(CapabilityRegistry::defaults()),
        provider.clone(),
        Arc::new(StoreResolver::new(store)),
    );
    let s = settings(json!({"api_token": "{{secret.absent}}", "model_name": "gpt-4"}));

    let envelope = d.predict(42, &s, &PromptStruct::new(json!("hi"))).await;
    assert_eq!(
        envelope.error().map(String::as_str),
        Some("ResolutionError: secret 'absent' not found for project 42")
    );
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_prebuilt_requests_use_their_own_mode() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4", "organization": "org-1"}));

    let chat = d
        .chat_completion(1, &s, json!({"messages": [{"role": "user", "content": "x"}], "n": 2}))
        .await;
    let text = d.completion(1, &s, json!({"model": "davinci-002", "prompt": "y"})).await;
    assert!(chat.is_ok() && text.is_ok());

    let calls = provider.calls();
    assert_eq!(calls[0].0, Called::Chat);
    assert_eq!(calls[0].2["model"], "gpt-4");
    assert_eq!(calls[0].2["n"], 2);
    assert_eq!(calls[0].1.organization.as_deref(), Some("org-1"));
    assert_eq!(calls[1].0, Called::Text);
    assert_eq!(calls[1].2["model"], "davinci-002");
}

#[tokio::test]
async fn test_prebuilt_request_must_be_mapping() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4"}));
    let envelope = d.chat_completion(1, &s, json!("hi")).await;
    assert!(envelope.error().unwrap().starts_with("ValidationError: "));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_embed_documents_returns_provider_response() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    // Global table: text-embedding-ada-002 is embeddings-only.
    let s = settings(json!({"api_token": "k", "model_name": "text-embedding-ada-002", "temperature": 0.3}));

    let envelope = d
        .embed_documents(1, &s, &["first".to_string(), "second".to_string()])
        .await;

    let response = envelope.response().unwrap();
    assert_eq!(response["data"].as_array().unwrap().len(), 2);
    let (called, conn, body) = provider.calls().remove(0);
    assert_eq!(called, Called::Embed);
    assert_eq!(conn.api_key, "sk-resolved");
    assert_eq!(body, json!({"model": "text-embedding-ada-002", "input": ["first", "second"]}));
}

#[tokio::test]
async fn test_embed_query_returns_vector() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({
        "api_token": "k",
        "model_name": "my-embedder",
        "models": [{"id": "my-embedder", "capabilities": {"embeddings": true}}]
    }));

    let envelope = d.embed_query(1, &s, "what is rust").await;
    assert_eq!(envelope, ResultEnvelope::Ok(json!([0.5, 0])));
    assert_eq!(provider.calls()[0].2["input"], "what is rust");
}

#[tokio::test]
async fn test_chat_model_cannot_embed() {
    let provider = FakeProvider::ok();
    let d = dispatcher(provider.clone());
    let s = settings(json!({"api_token": "k", "model_name": "gpt-4"}));

    let envelope = d.embed_query(1, &s, "hi").await;
    assert_eq!(
        envelope.error().map(String::as_str),
        Some("UnsupportedModelError: Model gpt-4 does not support embeddings")
    );
    assert!(provider.calls().is_empty());
}

#[test]
fn test_first_embedding_requires_vector() {
    assert_eq!(
        first_embedding(json!({"data": [{"embedding": [1.0]}]})).unwrap(),
        json!([1.0])
    );
    let err = first_embedding(json!({"data": []})).unwrap_err();
    assert_eq!(err.kind(), "DecodeError");
}

#[test]
fn test_select_mode_precedence() {
    let mut desc = ModelDescriptor::unknown("m");
    assert_eq!(select_mode(&desc, &MODE_PREFERENCE), None);
    desc.capabilities.insert(Capability::Completion);
    assert_eq!(select_mode(&desc, &MODE_PREFERENCE), Some(InvocationMode::Text));
    desc.capabilities.insert(Capability::ChatCompletion);
    assert_eq!(select_mode(&desc, &MODE_PREFERENCE), Some(InvocationMode::Chat));
}
