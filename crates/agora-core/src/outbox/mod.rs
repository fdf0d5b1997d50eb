//! Outbox record types and the write-time dispatch policy.
//!
//! The outbox is an append-only, at-least-once log: entries are written
//! in the same transaction as the domain mutation that produced them and
//! are never deduplicated at write time. Every consumer must therefore
//! be idempotent. This module holds the database-free half of that
//! design; the SQLite store lives in the daemon crate.
//!
//! Policy (per-kind priorities and the blacklist) is process-wide and
//! immutable after load. It is modelled as a value injected at
//! construction rather than a global so tests can substitute it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Priority assigned when neither an override nor a per-kind default
/// applies.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Errors loading the dispatch policy configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read policy config: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML did not parse.
    #[error("failed to parse policy config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A candidate event produced by a domain command, before policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRecord {
    /// Event kind name.
    pub event_name: String,
    /// Event payload.
    pub event_payload: Value,
    /// Explicit priority override; wins over the per-kind default.
    pub priority: Option<i32>,
}

impl OutboxRecord {
    /// Candidate with no explicit priority.
    #[must_use]
    pub fn new(event_name: impl Into<String>, event_payload: Value) -> Self {
        Self {
            event_name: event_name.into(),
            event_payload,
            priority: None,
        }
    }

    /// Candidate with an explicit priority override.
    #[must_use]
    pub fn with_priority(event_name: impl Into<String>, event_payload: Value, priority: i32) -> Self {
        Self {
            event_name: event_name.into(),
            event_payload,
            priority: Some(priority),
        }
    }
}

/// A policy-approved entry ready for durable insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    /// Unique id assigned at emit time.
    pub event_id: Uuid,
    /// Event kind name.
    pub event_name: String,
    /// Event payload.
    pub event_payload: Value,
    /// Resolved dispatch priority.
    pub priority: i32,
    /// Emit timestamp.
    pub created_at: DateTime<Utc>,
}

/// Immutable write-time policy: per-kind priority defaults plus a
/// blacklist of kinds that are dropped instead of persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchPolicy {
    /// Per-kind priority defaults.
    #[serde(default)]
    priorities: HashMap<String, i32>,
    /// Kinds that must never reach the outbox.
    #[serde(default)]
    blacklist: HashSet<String>,
}

impl DispatchPolicy {
    /// Build a policy from explicit maps.
    #[must_use]
    pub fn new(priorities: HashMap<String, i32>, blacklist: HashSet<String>) -> Self {
        Self {
            priorities,
            blacklist,
        }
    }

    /// Parse a policy from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a policy from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Whether this kind is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self, event_name: &str) -> bool {
        self.blacklist.contains(event_name)
    }

    /// The per-kind default priority, or [`DEFAULT_PRIORITY`].
    #[must_use]
    pub fn priority_for(&self, event_name: &str) -> i32 {
        self.priorities
            .get(event_name)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Apply the policy to a batch of candidates.
    ///
    /// Blacklisted kinds are dropped with a log line and no entry;
    /// survivors get `priority` = explicit override, else the per-kind
    /// default, else zero. No deduplication happens here or anywhere
    /// downstream in the outbox.
    #[must_use]
    pub fn prepare(&self, records: Vec<OutboxRecord>) -> Vec<OutboxEntry> {
        let now = Utc::now();
        records
            .into_iter()
            .filter_map(|record| {
                if self.is_blacklisted(&record.event_name) {
                    debug!(
                        event_name = %record.event_name,
                        "event kind is blacklisted, dropping"
                    );
                    return None;
                }
                let priority = record
                    .priority
                    .unwrap_or_else(|| self.priority_for(&record.event_name));
                Some(OutboxEntry {
                    event_id: Uuid::new_v4(),
                    event_name: record.event_name,
                    event_payload: record.event_payload,
                    priority,
                    created_at: now,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn policy() -> DispatchPolicy {
        DispatchPolicy::from_toml(
            r#"
            blacklist = ["FarcasterCastCreated"]

            [priorities]
            ReferralFeeDistributed = 5
            "#,
        )
        .unwrap()
    }

    #[test]
    fn blacklisted_kinds_never_become_entries() {
        let entries = policy().prepare(vec![
            OutboxRecord::new("FarcasterCastCreated", json!({})),
            OutboxRecord::new("CommunityStakeTrade", json!({})),
        ]);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_name, "CommunityStakeTrade");
    }

    #[test]
    fn explicit_priority_beats_per_kind_default() {
        let entries = policy().prepare(vec![OutboxRecord::with_priority(
            "ReferralFeeDistributed",
            json!({}),
            9,
        )]);

        assert_eq!(entries[0].priority, 9);
    }

    #[test]
    fn per_kind_default_applies_without_override() {
        let entries =
            policy().prepare(vec![OutboxRecord::new("ReferralFeeDistributed", json!({}))]);

        assert_eq!(entries[0].priority, 5);
    }

    #[test]
    fn unknown_kinds_fall_back_to_zero_priority() {
        let entries = policy().prepare(vec![OutboxRecord::new("CommunityStakeTrade", json!({}))]);

        assert_eq!(entries[0].priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn prepare_never_deduplicates_identical_records() {
        let record = OutboxRecord::new("CommunityStakeTrade", json!({ "tx": "0xabc" }));
        let entries = policy().prepare(vec![record.clone(), record]);

        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].event_id, entries[1].event_id);
    }

    #[test]
    fn empty_toml_yields_permissive_policy() {
        let policy = DispatchPolicy::from_toml("").unwrap();
        assert!(!policy.is_blacklisted("Anything"));
        assert_eq!(policy.priority_for("Anything"), DEFAULT_PRIORITY);
    }
}
