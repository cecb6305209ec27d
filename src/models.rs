//! Model descriptors and the built-in capability tables.
//!
//! Defines known models with their supported modes and context window
//! sizes. These tables seed the persisted registry on first activation;
//! after that the stored copy is the source of truth.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A mode of use a model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Completion,
    ChatCompletion,
    Embeddings,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Completion,
        Capability::ChatCompletion,
        Capability::Embeddings,
    ];

    /// Wire name, as used in settings and the persisted capability map.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::ChatCompletion => "chat_completion",
            Self::Embeddings => "embeddings",
        }
    }

}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// A capability name outside [`Capability::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability '{0}'")]
pub struct UnknownCapability(pub String);

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of modes a model supports.
///
/// Serialized as a map of flags (`{"chat_completion": true, ...}`), which is
/// the shape operators edit in settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub completion: bool,
    #[serde(default)]
    pub chat_completion: bool,
    #[serde(default)]
    pub embeddings: bool,
}

impl Capabilities {
    pub fn contains(&self, capability: Capability) -> bool {
        match capability {
            Capability::Completion => self.completion,
            Capability::ChatCompletion => self.chat_completion,
            Capability::Embeddings => self.embeddings,
        }
    }

    pub fn insert(&mut self, capability: Capability) {
        match capability {
            Capability::Completion => self.completion = true,
            Capability::ChatCompletion => self.chat_completion = true,
            Capability::Embeddings => self.embeddings = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.completion || self.chat_completion || self.embeddings)
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut caps = Self::default();
        for c in iter {
            caps.insert(c);
        }
        caps
    }
}

/// Normalized record of a model's identity, modes, and context window.
///
/// `token_limit: None` means the limit is unknown or unbounded; a limit of
/// zero is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub token_limit: Option<u32>,
}

impl ModelDescriptor {
    /// A descriptor with no known modes, returned for unrecognized models.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            capabilities: Capabilities::default(),
            token_limit: None,
        }
    }
}

/// Built-in capability map: mode -> model ids.
pub const DEFAULT_CAPABILITIES: &[(Capability, &[&str])] = &[
    (
        Capability::Completion,
        &["gpt-3.5-turbo-instruct", "babbage-002", "davinci-002"],
    ),
    (
        Capability::ChatCompletion,
        &[
            "gpt-4o-mini",
            "gpt-4o",
            "gpt-4-turbo",
            "gpt-4",
            "gpt-4-0613",
            "gpt-4-32k",
            "gpt-4-32k-0613",
            "gpt-3.5-turbo",
            "gpt-3.5-turbo-0613",
            "gpt-3.5-turbo-16k",
            "gpt-3.5-turbo-16k-0613",
        ],
    ),
    (Capability::Embeddings, &["text-embedding-ada-002"]),
];

/// Built-in context window sizes. `None` marks models with no meaningful limit.
pub const DEFAULT_TOKEN_LIMITS: &[(&str, Option<u32>)] = &[
    ("gpt-3.5-turbo-instruct", Some(4_097)),
    ("babbage-002", Some(16_384)),
    ("davinci-002", Some(16_384)),
    ("gpt-4", Some(8_192)),
    ("gpt-4-0613", Some(8_192)),
    ("gpt-4-32k", Some(32_768)),
    ("gpt-4-32k-0613", Some(32_768)),
    ("gpt-3.5-turbo", Some(4_097)),
    ("gpt-3.5-turbo-0613", Some(4_097)),
    ("gpt-3.5-turbo-16k", Some(16_385)),
    ("gpt-3.5-turbo-16k-0613", Some(16_385)),
    ("text-embedding-ada-002", None),
    ("text-davinci-003", Some(4_097)),
    ("text-davinci-002", Some(4_097)),
    ("code-davinci-002", Some(8_001)),
];
