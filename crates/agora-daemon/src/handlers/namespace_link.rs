//! Namespace-deploy linker.

use std::sync::{Arc, Mutex};

use agora_core::events::{EventEnvelope, NamespaceDeployedWithReferralArgs};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::{EventHandler, HandlerError, ReferralState};

/// Links referrals on `NamespaceDeployedWithReferral` events.
///
/// Writes the namespace row and the (namespace, referrer) referral row
/// in one transaction. Both inserts are conflict-ignoring on their
/// natural keys, so redelivery is a no-op.
pub struct NamespaceLinker {
    conn: Arc<Mutex<Connection>>,
}

impl NamespaceLinker {
    /// Create a linker over the shared read-model connection.
    #[must_use]
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl EventHandler for NamespaceLinker {
    fn name(&self) -> &'static str {
        "NamespaceLinker"
    }

    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let args: NamespaceDeployedWithReferralArgs =
            envelope
                .parsed_args()
                .map_err(|source| HandlerError::InvalidPayload {
                    event_name: envelope.name.clone(),
                    source,
                })?;

        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO namespaces
                 (namespace_address, name, deployer, fee_manager, chain_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                args.name_space_address,
                args.name,
                args.namespace_deployer,
                args.fee_manager,
                envelope.event_source.chain_id,
                now,
            ],
        )?;

        let linked = tx.execute(
            "INSERT OR IGNORE INTO referrals (namespace, referrer, state, linked_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                args.name_space_address,
                args.referrer,
                ReferralState::Linked.as_str(),
                now,
            ],
        )?;
        tx.commit()?;

        if linked == 0 {
            debug!(
                namespace = %args.name_space_address,
                referrer = %args.referrer,
                "referral already linked, skipping"
            );
        } else {
            info!(
                namespace = %args.name_space_address,
                referrer = %args.referrer,
                "linked referral for deployed namespace"
            );
        }
        Ok(())
    }
}
