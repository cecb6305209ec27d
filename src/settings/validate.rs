//! Settings validation.
//!
//! Walks the raw mapping field by field and records every problem instead
//! of stopping at the first, so a settings form can show all of them in
//! one pass.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use super::types::IntegrationSettings;
use crate::constants::{AZURE_API_TYPES, DEFAULT_MODEL, KNOWN_API_TYPES};
use crate::models::{Capabilities, Capability, ModelDescriptor};
use crate::secrets::CredentialReference;

/// Fields modelled directly on [`IntegrationSettings`]; anything else is extra.
const KNOWN_FIELDS: &[&str] = &[
    "model_name",
    "models",
    "api_token",
    "api_base",
    "api_type",
    "api_version",
    "organization",
    "temperature",
    "max_tokens",
    "top_p",
];

/// One violated field, addressed by a dotted/indexed path (`models[2].id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every problem found in a settings mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrorDetail {
    pub errors: Vec<FieldError>,
}

impl ValidationErrorDetail {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// Whether `field` is among the violations.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} validation {noun}: ", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrorDetail {}

/// Accumulates field errors during a single validation pass.
#[derive(Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }
}

/// Validates a raw settings mapping.
///
/// # Errors
///
/// Returns a [`ValidationErrorDetail`] naming every invalid field. This is
/// an ordinary outcome, not a fault.
pub fn parse(raw: &Value) -> Result<IntegrationSettings, ValidationErrorDetail> {
    let Some(obj) = raw.as_object() else {
        return Err(ValidationErrorDetail::single("__root__", "expected a mapping"));
    };
    let mut errors = Errors::default();

    let api_token = match present(obj, "api_token") {
        None => {
            errors.push("api_token", "field required");
            None
        }
        Some(v) => match serde_json::from_value::<CredentialReference>(v.clone()) {
            Ok(r) => Some(r),
            Err(_) => {
                errors.push("api_token", "expected a string or {value, from_secrets}");
                None
            }
        },
    };

    let model_name = match opt_string(obj, "model_name", &mut errors) {
        Some(name) if name.trim().is_empty() => {
            errors.push("model_name", "must not be empty");
            String::new()
        }
        Some(name) => name,
        None => DEFAULT_MODEL.to_string(),
    };

    let models = match present(obj, "models") {
        None => Vec::new(),
        Some(Value::Array(items)) => validate_models(items, &mut errors),
        Some(_) => {
            errors.push("models", "expected a list");
            Vec::new()
        }
    };

    let api_base = opt_string(obj, "api_base", &mut errors);
    if let Some(base) = api_base.as_deref() {
        match reqwest::Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push("api_base", format!("unsupported URL scheme '{}'", url.scheme())),
            Err(e) => errors.push("api_base", format!("invalid URL: {e}")),
        }
    }

    let api_type = opt_string(obj, "api_type", &mut errors);
    let api_version = opt_string(obj, "api_version", &mut errors);
    if let Some(t) = api_type.as_deref() {
        let t = t.to_lowercase();
        if !KNOWN_API_TYPES.contains(&t.as_str()) {
            errors.push(
                "api_type",
                format!("must be one of: {}", KNOWN_API_TYPES.join(", ")),
            );
        } else if AZURE_API_TYPES.contains(&t.as_str()) && api_version.is_none() {
            errors.push("api_version", format!("required when api_type is '{t}'"));
        }
    }
    let organization = opt_string(obj, "organization", &mut errors);

    let temperature = opt_number(obj, "temperature", 0.0, 2.0, &mut errors);
    let top_p = opt_number(obj, "top_p", 0.0, 1.0, &mut errors);
    let max_tokens = match present(obj, "max_tokens") {
        None => None,
        Some(v) => match positive_u32(v) {
            Some(n) => Some(n),
            None => {
                errors.push("max_tokens", "expected a positive integer");
                None
            }
        },
    };

    let extra: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !KNOWN_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if !errors.0.is_empty() {
        return Err(ValidationErrorDetail { errors: errors.0 });
    }
    let Some(api_token) = api_token else {
        return Err(ValidationErrorDetail::single("api_token", "field required"));
    };

    Ok(IntegrationSettings {
        model_name,
        models,
        api_token,
        api_base,
        api_type,
        api_version,
        organization,
        temperature,
        max_tokens,
        top_p,
        extra,
    })
}

/// The value at `key`, treating JSON `null` as absent.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn opt_string(obj: &Map<String, Value>, key: &str, errors: &mut Errors) -> Option<String> {
    match present(obj, key) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(key, "expected a string");
            None
        }
    }
}

fn opt_number(obj: &Map<String, Value>, key: &str, min: f64, max: f64, errors: &mut Errors) -> Option<f64> {
    let v = present(obj, key)?;
    match v.as_f64() {
        Some(n) if (min..=max).contains(&n) => Some(n),
        Some(_) => {
            errors.push(key, format!("must be between {min} and {max}"));
            None
        }
        None => {
            errors.push(key, "expected a number");
            None
        }
    }
}

fn positive_u32(v: &Value) -> Option<u32> {
    v.as_u64()
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

fn validate_models(items: &[Value], errors: &mut Errors) -> Vec<ModelDescriptor> {
    let mut seen = HashSet::new();
    let mut models = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("models[{i}]");
        let Some(obj) = item.as_object() else {
            errors.push(path, "expected a mapping");
            continue;
        };
        let before = errors.0.len();

        let id = match present(obj, "id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::String(_)) => {
                errors.push(format!("{path}.id"), "must not be empty");
                None
            }
            Some(_) => {
                errors.push(format!("{path}.id"), "expected a string");
                None
            }
            None => {
                errors.push(format!("{path}.id"), "field required");
                None
            }
        };
        if let Some(id) = &id {
            if !seen.insert(id.clone()) {
                errors.push(format!("{path}.id"), format!("duplicate model id '{id}'"));
            }
        }

        let name = match present(obj, "name") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.push(format!("{path}.name"), "expected a string");
                None
            }
        };

        let capabilities = match present(obj, "capabilities") {
            None => Capabilities::default(),
            Some(Value::Object(flags)) => validate_capabilities(&path, flags, errors),
            Some(_) => {
                errors.push(format!("{path}.capabilities"), "expected a mapping of flags");
                Capabilities::default()
            }
        };

        let token_limit = match present(obj, "token_limit") {
            None => None,
            Some(v) => match positive_u32(v) {
                Some(n) => Some(n),
                None => {
                    errors.push(
                        format!("{path}.token_limit"),
                        "expected a positive integer or null",
                    );
                    None
                }
            },
        };

        if let (Some(id), true) = (id, errors.0.len() == before) {
            models.push(ModelDescriptor {
                name: name.filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone()),
                id,
                capabilities,
                token_limit,
            });
        }
    }
    models
}

fn validate_capabilities(path: &str, flags: &Map<String, Value>, errors: &mut Errors) -> Capabilities {
    let mut caps = Capabilities::default();
    for (key, value) in flags {
        let field = format!("{path}.capabilities.{key}");
        let cap = match key.parse::<Capability>() {
            Ok(cap) => cap,
            Err(err) => {
                errors.push(field, err.to_string());
                continue;
            }
        };
        match value {
            Value::Bool(true) => caps.insert(cap),
            Value::Bool(false) => {}
            _ => errors.push(field, "expected a boolean"),
        }
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_settings_parse() {
        let settings = parse(&json!({"api_token": "sk-abc"})).unwrap();
        assert_eq!(settings.model_name, DEFAULT_MODEL);
        assert!(settings.models.is_empty());
        assert!(settings.extra.is_empty());
    }

    #[test]
    fn test_full_settings_parse() {
        let settings = parse(&json!({
            "api_token": {"value": "openai_key", "from_secrets": true},
            "model_name": "gpt-4",
            "models": [
                {"id": "gpt-4", "name": "GPT-4", "capabilities": {"chat_completion": true}, "token_limit": 8192},
                {"id": "text-embedding-ada-002", "capabilities": {"embeddings": true}, "token_limit": null}
            ],
            "api_base": "https://example.openai.azure.com",
            "api_type": "azure",
            "api_version": "2023-05-15",
            "temperature": 0.2,
            "max_tokens": 512,
            "top_p": 1,
            "stop": ["\n\n"],
            "integration_uid": "abc-123"
        }))
        .unwrap();

        assert_eq!(settings.models.len(), 2);
        assert_eq!(settings.models[1].name, "text-embedding-ada-002");
        assert_eq!(settings.models[1].token_limit, None);
        assert_eq!(settings.max_tokens, Some(512));
        assert_eq!(settings.extra["integration_uid"], "abc-123");

        let params = settings.request_params();
        assert_eq!(params["temperature"], 0.2);
        assert_eq!(params["stop"], json!(["\n\n"]));
        assert!(!params.contains_key("integration_uid"));
    }

    #[test]
    fn test_every_invalid_field_reported() {
        let err = parse(&json!({
            "model_name": 42,
            "models": [
                {"capabilities": {"chat_completion": "yes", "vision": true}},
                {"id": "gpt-4", "token_limit": 0},
                {"id": "gpt-4"},
                "gpt-3.5-turbo"
            ],
            "api_base": "ftp://example.com",
            "api_type": "bedrock",
            "temperature": 3.5,
            "max_tokens": -1
        }))
        .unwrap_err();

        for field in [
            "api_token",
            "model_name",
            "models[0].id",
            "models[0].capabilities.chat_completion",
            "models[0].capabilities.vision",
            "models[1].token_limit",
            "models[2].id",
            "models[3]",
            "api_base",
            "api_type",
            "temperature",
            "max_tokens",
        ] {
            assert!(err.has_field(field), "missing error for {field}: {err}");
        }
        assert_eq!(err.errors.len(), 12);
    }

    #[test]
    fn test_azure_requires_api_version() {
        let err = parse(&json!({"api_token": "k", "api_type": "azure"})).unwrap_err();
        assert!(err.has_field("api_version"));
        assert!(err.to_string().starts_with("1 validation error: "));
    }

    #[test]
    fn test_non_mapping_rejected() {
        let err = parse(&json!(["api_token"])).unwrap_err();
        assert!(err.has_field("__root__"));
    }

    #[test]
    fn test_unmatched_model_name_is_not_an_error() {
        let settings = parse(&json!({
            "api_token": "k",
            "model_name": "gpt-5",
            "models": [{"id": "gpt-4", "capabilities": {"chat_completion": true}}]
        }))
        .unwrap();
        assert_eq!(settings.model_name, "gpt-5");
    }
}
