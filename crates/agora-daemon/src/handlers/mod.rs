//! Read-model handlers for decoded chain events.
//!
//! Handlers run under at-least-once, unordered delivery, so every one of
//! them follows the same three rules:
//!
//! 1. writes are guarded by a natural-key existence check (idempotency),
//! 2. multi-row mutations run inside the handler's own transaction,
//! 3. "referenced entity not yet created" is a silent no-op, because a
//!    dependent event can legitimately arrive before its prerequisite.
//!
//! The representative set: [`StakeTradeRecorder`] records stake trades,
//! [`NamespaceLinker`] creates namespace and referral rows, and
//! [`ReferralFeeDistributor`] accrues fees onto linked referrals.

// Mutex poisoning indicates a panic in another thread, which is
// unrecoverable for the shared read-model connection.
#![allow(clippy::missing_panics_doc)]

pub mod namespace_link;
pub mod referral_fees;
pub mod stake_trade;

use agora_core::events::EventEnvelope;
use rusqlite::Connection;
use thiserror::Error;

pub use namespace_link::NamespaceLinker;
pub use referral_fees::ReferralFeeDistributor;
pub use stake_trade::StakeTradeRecorder;

/// Read-model schema SQL embedded at compile time.
const READ_MODEL_SCHEMA_SQL: &str = include_str!("read_models.sql");

/// Errors from event handlers.
///
/// These propagate through the dispatcher to the transport, which owns
/// redelivery; handlers never retry internally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HandlerError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The envelope payload did not match the expected arguments.
    #[error("invalid payload for {event_name}: {source}")]
    InvalidPayload {
        /// The event kind whose payload failed to decode.
        event_name: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A decimal-string quantity failed to parse.
    #[error("invalid quantity in {field}: {value:?}")]
    InvalidQuantity {
        /// The field holding the bad value.
        field: &'static str,
        /// The unparseable value.
        value: String,
    },

    /// A stored read-model row failed to decode.
    #[error("corrupt read-model row: {details}")]
    CorruptRow {
        /// What failed to decode.
        details: String,
    },
}

/// A handler bound to one or more event kinds.
///
/// The dispatcher invokes `handle` with the full envelope and propagates
/// any error unchanged. Idempotency is the handler's own responsibility,
/// not the dispatcher's.
pub trait EventHandler: Send + Sync {
    /// Stable handler name for logs.
    fn name(&self) -> &'static str;

    /// Apply one event to the read model.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected failures (database errors,
    /// malformed payloads). Duplicates and missing prerequisites are
    /// silent no-ops.
    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError>;
}

/// Referral lifecycle states.
///
/// The initial "unlinked" state is the absence of the referral row; it
/// never appears in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralState {
    /// Linked to a namespace deployment, no fees yet.
    Linked,
    /// At least one fee distribution has accrued.
    FeesAccrued,
}

impl ReferralState {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::FeesAccrued => "fees_accrued",
        }
    }

    /// Parse the stored representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "linked" => Some(Self::Linked),
            "fees_accrued" => Some(Self::FeesAccrued),
            _ => None,
        }
    }
}

/// Create the read-model tables if absent.
///
/// # Errors
///
/// Returns an error if schema execution fails.
pub fn init_read_models(conn: &Connection) -> Result<(), HandlerError> {
    conn.execute_batch(READ_MODEL_SCHEMA_SQL)?;
    Ok(())
}

/// Parse a decimal-string quantity from a chain event.
fn parse_quantity(field: &'static str, value: &str) -> Result<u128, HandlerError> {
    value
        .parse::<u128>()
        .map_err(|_| HandlerError::InvalidQuantity {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_state_round_trips() {
        for state in [ReferralState::Linked, ReferralState::FeesAccrued] {
            assert_eq!(ReferralState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ReferralState::parse("unlinked"), None);
    }

    #[test]
    fn parse_quantity_rejects_non_decimal_values() {
        assert_eq!(parse_quantity("amount", "1000").unwrap(), 1000);
        assert!(parse_quantity("amount", "0x10").is_err());
        assert!(parse_quantity("amount", "-5").is_err());
    }
}
