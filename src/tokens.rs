//! Token counting for llm-adapter.
//!
//! Uses tiktoken-rs for BPE tokenization. Models tiktoken knows get their
//! exact tokenizer; anything else (fine-tunes, Azure deployment names) falls
//! back to cl100k_base as a reasonable approximation.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer};
use tiktoken_rs::{get_bpe_from_tokenizer, CoreBPE};

/// Built encoders, one per tokenizer. Building one parses the whole BPE
/// table, so it happens at most once per process.
static ENCODERS: LazyLock<Mutex<HashMap<Tokenizer, Arc<CoreBPE>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn bpe_for(model: &str) -> Result<Arc<CoreBPE>> {
    let tokenizer = get_tokenizer(model).unwrap_or(Tokenizer::Cl100kBase);
    let mut encoders = ENCODERS
        .lock()
        .map_err(|_| anyhow::anyhow!("tokenizer cache lock poisoned"))?;
    if let Some(bpe) = encoders.get(&tokenizer) {
        return Ok(bpe.clone());
    }
    let bpe = Arc::new(
        get_bpe_from_tokenizer(tokenizer)
            .with_context(|| format!("Failed to load {tokenizer:?} tokenizer"))?,
    );
    encoders.insert(tokenizer, bpe.clone());
    Ok(bpe)
}

/// Count tokens for a text string using the appropriate tokenizer for the model.
pub fn count_tokens(text: &str, model: &str) -> Result<usize> {
    Ok(bpe_for(model)?.encode_ordinary(text).len())
}

/// Format a token count for display. Example: "1,234 / 8,192"
pub fn format_token_usage(used: usize, limit: Option<u32>) -> String {
    match limit {
        Some(limit) => format!("{} / {}", format_number(used), format_number(limit as usize)),
        None => format_number(used),
    }
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub const WARN_THRESHOLD: f64 = 0.80;

/// How much of a model's context window a prompt uses.
#[derive(Debug, PartialEq)]
pub enum ContextStatus {
    /// No known limit, or comfortably inside it.
    Ok,
    Warning { used: usize, limit: u32, percent: u8 },
    Exceeded { used: usize, limit: u32 },
}

pub fn check_context_usage(used: usize, limit: Option<u32>) -> ContextStatus {
    let Some(limit) = limit.filter(|&l| l > 0) else {
        return ContextStatus::Ok;
    };
    if used > limit as usize {
        return ContextStatus::Exceeded { used, limit };
    }
    let ratio = used as f64 / limit as f64;
    if ratio >= WARN_THRESHOLD {
        ContextStatus::Warning {
            used,
            limit,
            percent: (ratio * 100.0) as u8,
        }
    } else {
        ContextStatus::Ok
    }
}
