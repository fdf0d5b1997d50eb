//! Referral-fee distributor.

use std::sync::{Arc, Mutex};

use agora_core::events::{EventEnvelope, ReferralFeeDistributedArgs};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{parse_quantity, EventHandler, HandlerError, ReferralState};

/// Accrues `ReferralFeeDistributed` events onto linked referrals.
///
/// Fee rows are deduplicated by (chain id, transaction hash). A fee for
/// a (namespace, recipient) pair with no referral row yet is a silent
/// no-op: under unordered at-least-once delivery the deploy event that
/// links the referral may still be in flight, and the fee event will be
/// redelivered after it lands.
pub struct ReferralFeeDistributor {
    conn: Arc<Mutex<Connection>>,
}

impl ReferralFeeDistributor {
    /// Create a distributor over the shared read-model connection.
    #[must_use]
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl EventHandler for ReferralFeeDistributor {
    fn name(&self) -> &'static str {
        "ReferralFeeDistributor"
    }

    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let args: ReferralFeeDistributedArgs =
            envelope
                .parsed_args()
                .map_err(|source| HandlerError::InvalidPayload {
                    event_name: envelope.name.clone(),
                    source,
                })?;
        let fee = parse_quantity("recipientAmount", &args.recipient_amount)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let accrued: Option<String> = tx
            .query_row(
                "SELECT accrued_amount FROM referrals WHERE namespace = ?1 AND referrer = ?2",
                params![args.namespace, args.recipient],
                |row| row.get(0),
            )
            .optional()?;
        let Some(accrued) = accrued else {
            // Prerequisite not linked yet; expected eventual-consistency
            // race, not an error.
            debug!(
                namespace = %args.namespace,
                referrer = %args.recipient,
                "fee for unlinked referral, skipping"
            );
            return Ok(());
        };

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO referral_fees
                 (chain_id, transaction_hash, namespace, referrer, token,
                  amount, recipient_amount, block_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                envelope.event_source.chain_id,
                envelope.raw_log.transaction_hash,
                args.namespace,
                args.recipient,
                args.token,
                args.amount,
                args.recipient_amount,
                envelope.block.timestamp,
            ],
        )?;
        if inserted == 0 {
            debug!(
                transaction_hash = %envelope.raw_log.transaction_hash,
                "fee distribution already recorded, skipping"
            );
            return Ok(());
        }

        let total = parse_quantity("accrued_amount", &accrued)? + fee;
        tx.execute(
            "UPDATE referrals SET accrued_amount = ?1, state = ?2
             WHERE namespace = ?3 AND referrer = ?4",
            params![
                total.to_string(),
                ReferralState::FeesAccrued.as_str(),
                args.namespace,
                args.recipient,
            ],
        )?;
        tx.commit()?;

        info!(
            namespace = %args.namespace,
            referrer = %args.recipient,
            accrued = %total,
            "accrued referral fee"
        );
        Ok(())
    }
}

/// Current lifecycle state and accrued total for a referral, if linked.
///
/// # Errors
///
/// Returns an error on query failure or if stored values are corrupt.
pub fn referral_status(
    conn: &Connection,
    namespace: &str,
    referrer: &str,
) -> Result<Option<(ReferralState, u128)>, HandlerError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT state, accrued_amount FROM referrals
             WHERE namespace = ?1 AND referrer = ?2",
            params![namespace, referrer],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((state, accrued)) = row else {
        return Ok(None);
    };
    let state = ReferralState::parse(&state).ok_or_else(|| HandlerError::CorruptRow {
        details: format!("unknown referral state {state:?}"),
    })?;
    Ok(Some((state, parse_quantity("accrued_amount", &accrued)?)))
}
