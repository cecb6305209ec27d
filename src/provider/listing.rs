//! Model discovery.
//!
//! Queries the provider for its live model list, trying the legacy listing
//! first and the modern listing second, then normalizes whatever came back
//! into [`ModelDescriptor`]s. Discovery is usually run speculatively to
//! refresh a picklist, so it never fails: total failure is an empty list.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use super::{Connection, ProviderClient};
use crate::models::{Capabilities, ModelDescriptor};
use crate::registry::CapabilityRegistry;

/// How to treat a listing where some records could not be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    /// Keep the records that did normalize. When `false`, one bad record
    /// discards the whole listing.
    pub keep_partial: bool,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self { keep_partial: true }
    }
}

/// Envelope shapes a listing may arrive in.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawListing {
    Page { data: Vec<Value> },
    Bare(Vec<Value>),
}

/// A single listing record, decoded in two stages: first as a full
/// descriptor mapping, then by plucking the attributes every provider
/// record carries.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawModelRecord {
    Mapping(MappingRecord),
    Attributes(AttributeRecord),
}

/// Records that already carry descriptor fields (operator-curated lists,
/// gateways that annotate capabilities).
#[derive(Deserialize)]
struct MappingRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
    capabilities: Capabilities,
    #[serde(default)]
    token_limit: Option<u32>,
}

/// Plain provider records (`{"id": "...", "object": "model", "owned_by": ...}`).
#[derive(Deserialize)]
struct AttributeRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl RawModelRecord {
    /// Converts the record into a descriptor. Attribute-only records borrow
    /// modes and limits from the global registry when the id is known there.
    fn into_descriptor(self, registry: &CapabilityRegistry) -> Option<ModelDescriptor> {
        let (id, name, capabilities, token_limit) = match self {
            Self::Mapping(m) => (m.id, m.name, m.capabilities, m.token_limit),
            Self::Attributes(a) => {
                let known = registry.get(&a.id);
                (
                    a.id,
                    a.name,
                    known.map(|d| d.capabilities).unwrap_or_default(),
                    known.and_then(|d| d.token_limit),
                )
            }
        };
        if id.trim().is_empty() {
            return None;
        }
        Some(ModelDescriptor {
            name: name.filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone()),
            id,
            capabilities,
            token_limit: token_limit.filter(|&limit| limit > 0),
        })
    }
}

/// Normalizes a raw listing payload into descriptors.
///
/// Unparseable records are dropped; duplicate ids keep their first
/// occurrence. With `keep_partial: false`, any dropped record empties the
/// result. An unrecognized envelope yields an empty list.
pub fn normalize_listing(
    raw: Value,
    registry: &CapabilityRegistry,
    policy: DiscoveryPolicy,
) -> Vec<ModelDescriptor> {
    let records = match serde_json::from_value::<RawListing>(raw) {
        Ok(RawListing::Page { data }) | Ok(RawListing::Bare(data)) => data,
        Err(err) => {
            tracing::error!(error = %err, "model listing has an unrecognized shape");
            return Vec::new();
        }
    };

    let total = records.len();
    let mut seen = HashSet::new();
    let mut models = Vec::with_capacity(total);
    let mut dropped = 0usize;
    for record in records {
        let descriptor = serde_json::from_value::<RawModelRecord>(record)
            .ok()
            .and_then(|r| r.into_descriptor(registry));
        match descriptor {
            Some(d) if seen.insert(d.id.clone()) => models.push(d),
            Some(d) => tracing::debug!(model = %d.id, "duplicate model id in listing"),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        if !policy.keep_partial {
            tracing::warn!(dropped, total, "discarding partially malformed model listing");
            return Vec::new();
        }
        tracing::warn!(dropped, total, "dropped unparseable model records");
    }
    models
}

/// Lists the provider's models for `conn`.
///
/// Tries [`ProviderClient::list_models_legacy`] first. On any failure, retries
/// with [`ProviderClient::list_models`] on a connection stripped of
/// `api_type`/`api_version`. If both fail the error is logged and an empty
/// list returned.
pub async fn list_models(
    client: &dyn ProviderClient,
    conn: &Connection,
    registry: &CapabilityRegistry,
    policy: DiscoveryPolicy,
) -> Vec<ModelDescriptor> {
    let raw = match client.list_models_legacy(conn).await {
        Ok(raw) => raw,
        Err(legacy_err) => {
            tracing::warn!(error = %legacy_err, "legacy model listing failed, trying modern listing");
            match client.list_models(&conn.without_legacy_fields()).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::error!(
                        legacy_error = ?legacy_err,
                        error = ?err,
                        "model discovery failed on both listing paths"
                    );
                    return Vec::new();
                }
            }
        }
    };
    normalize_listing(raw, registry, policy)
}
