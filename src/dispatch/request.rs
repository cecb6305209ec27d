//! Provider request construction.
//!
//! The prompt payload is opaque: it is forwarded as-is wherever the
//! provider accepts its shape, and only unpacked far enough to fill the
//! `messages` (chat) or `prompt` (text) field the selected mode needs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::settings::{IntegrationSettings, ValidationErrorDetail};

/// Structured prompt handed in by the host.
///
/// Recognized shapes: a bare string; a list of `{role, content}` turns; a
/// mapping with `messages`; or a mapping with `context`, `chat_history`,
/// and `prompt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptStruct(pub Value);

impl PromptStruct {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Chat-mode turns.
    pub fn messages(&self) -> Vec<Value> {
        match &self.0 {
            Value::String(s) => vec![user_turn(s)],
            Value::Array(turns) => turns.clone(),
            Value::Object(obj) => {
                if let Some(Value::Array(turns)) = obj.get("messages") {
                    return turns.clone();
                }
                let mut turns = Vec::new();
                if let Some(Value::String(ctx)) = obj.get("context") {
                    if !ctx.is_empty() {
                        turns.push(json!({"role": "system", "content": ctx}));
                    }
                }
                if let Some(Value::Array(history)) = obj.get("chat_history") {
                    turns.extend(history.iter().cloned());
                }
                match obj.get("prompt").or_else(|| obj.get("input")) {
                    Some(Value::String(p)) => turns.push(user_turn(p)),
                    Some(other) if !other.is_null() => turns.push(user_turn(&other.to_string())),
                    _ => {}
                }
                turns
            }
            Value::Null => Vec::new(),
            other => vec![user_turn(&other.to_string())],
        }
    }

    /// Text-mode `prompt` value. A mapping's own `prompt` is forwarded
    /// untouched (the provider accepts strings and lists); turns are
    /// flattened to their contents joined by newlines.
    pub fn text_prompt(&self) -> Value {
        match &self.0 {
            Value::String(_) => self.0.clone(),
            Value::Object(obj) if obj.get("prompt").is_some_and(|p| !p.is_null()) => {
                match (obj.get("context"), &obj["prompt"]) {
                    (Some(Value::String(ctx)), Value::String(p)) if !ctx.is_empty() => {
                        Value::String(format!("{ctx}\n\n{p}"))
                    }
                    (_, p) => p.clone(),
                }
            }
            _ => Value::String(join_contents(&self.messages())),
        }
    }

    /// All prompt text, for token accounting.
    pub fn token_text(&self) -> String {
        join_contents(&self.messages())
    }
}

fn user_turn(content: &str) -> Value {
    json!({"role": "user", "content": content})
}

fn join_contents(turns: &[Value]) -> String {
    turns
        .iter()
        .filter_map(|t| match t.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn base_body(settings: &IntegrationSettings) -> Map<String, Value> {
    let mut body = settings.request_params();
    body.insert("model".into(), Value::String(settings.model_name.clone()));
    body
}

/// Chat-completions request body for `prompt` under `settings`.
pub fn chat_body(settings: &IntegrationSettings, prompt: &PromptStruct) -> Value {
    let mut body = base_body(settings);
    body.insert("messages".into(), Value::Array(prompt.messages()));
    Value::Object(body)
}

/// Completions request body for `prompt` under `settings`.
pub fn text_body(settings: &IntegrationSettings, prompt: &PromptStruct) -> Value {
    let mut body = base_body(settings);
    body.insert("prompt".into(), prompt.text_prompt());
    Value::Object(body)
}

/// Embeddings request body for `input` (a string or list of strings).
pub fn embedding_body(settings: &IntegrationSettings, input: Value) -> Value {
    let mut body = settings.embedding_params();
    body.insert("model".into(), Value::String(settings.model_name.clone()));
    body.insert("input".into(), input);
    Value::Object(body)
}

/// Prepares a caller-built request: fills `model` from settings when the
/// request leaves it out and otherwise forwards every field unchanged.
pub fn prepare_request(settings: &IntegrationSettings, request: Value) -> Result<Value, ValidationErrorDetail> {
    let Value::Object(mut body) = request else {
        return Err(ValidationErrorDetail::single("request", "expected a mapping"));
    };
    body.entry("model")
        .or_insert_with(|| Value::String(settings.model_name.clone()));
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::parse;

    fn settings() -> IntegrationSettings {
        parse(&json!({"api_token": "k", "model_name": "gpt-4", "temperature": 0.5})).unwrap()
    }

    #[test]
    fn test_messages_passed_through() {
        let turns = json!([{"role": "user", "content": "hi", "name": "bob"}]);
        let prompt = PromptStruct::new(json!({"messages": turns.clone()}));
        let body = chat_body(&settings(), &prompt);
        assert_eq!(body["messages"], turns);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_structured_prompt_to_turns() {
        let prompt = PromptStruct::new(json!({
            "context": "You are terse.",
            "chat_history": [{"role": "assistant", "content": "Hello"}],
            "prompt": "Summarize"
        }));
        let turns = prompt.messages();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0]["role"], "system");
        assert_eq!(turns[2], json!({"role": "user", "content": "Summarize"}));
        assert_eq!(prompt.text_prompt(), json!("You are terse.\n\nSummarize"));
    }

    #[test]
    fn test_text_prompt_shapes() {
        assert_eq!(PromptStruct::new(json!("Say hi")).text_prompt(), json!("Say hi"));
        assert_eq!(
            PromptStruct::new(json!({"prompt": ["a", "b"]})).text_prompt(),
            json!(["a", "b"])
        );
        let from_turns = PromptStruct::new(json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Why?"}
        ]));
        assert_eq!(from_turns.text_prompt(), json!("Be brief.\nWhy?"));
    }

    #[test]
    fn test_embedding_body_skips_sampling_params() {
        let s = parse(&json!({
            "api_token": "k",
            "model_name": "text-embedding-ada-002",
            "temperature": 0.2,
            "dimensions": 256,
            "seed": 7
        }))
        .unwrap();
        let body = embedding_body(&s, json!(["a", "b"]));
        assert_eq!(
            body,
            json!({"model": "text-embedding-ada-002", "input": ["a", "b"], "dimensions": 256})
        );
    }

    #[test]
    fn test_prepare_request_keeps_caller_model() {
        let req = prepare_request(&settings(), json!({"model": "gpt-4o", "messages": []})).unwrap();
        assert_eq!(req["model"], "gpt-4o");
        let req = prepare_request(&settings(), json!({"prompt": "x", "echo": true})).unwrap();
        assert_eq!(req["model"], "gpt-4");
        assert_eq!(req["echo"], true);
        assert!(prepare_request(&settings(), json!("nope")).is_err());
    }
}
