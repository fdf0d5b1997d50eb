//! Stake-trade recorder.

use std::sync::{Arc, Mutex};

use agora_core::events::{EventEnvelope, StakeTradeArgs};
use rusqlite::{params, Connection};
use tracing::debug;

use super::{EventHandler, HandlerError};

/// Records `CommunityStakeTrade` events as stake-trade rows.
///
/// Natural key: (chain id, transaction hash). A redelivered trade hits
/// the same key and is ignored.
pub struct StakeTradeRecorder {
    conn: Arc<Mutex<Connection>>,
}

impl StakeTradeRecorder {
    /// Create a recorder over the shared read-model connection.
    #[must_use]
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl EventHandler for StakeTradeRecorder {
    fn name(&self) -> &'static str {
        "StakeTradeRecorder"
    }

    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let args: StakeTradeArgs =
            envelope
                .parsed_args()
                .map_err(|source| HandlerError::InvalidPayload {
                    event_name: envelope.name.clone(),
                    source,
                })?;

        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO stake_trades
                 (chain_id, transaction_hash, namespace, trader, is_buy,
                  community_token_amount, eth_amount, block_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                envelope.event_source.chain_id,
                envelope.raw_log.transaction_hash,
                args.namespace,
                args.trader,
                args.is_buy,
                args.community_token_amount,
                args.eth_amount,
                envelope.block.timestamp,
            ],
        )?;

        if inserted == 0 {
            debug!(
                transaction_hash = %envelope.raw_log.transaction_hash,
                "stake trade already recorded, skipping"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use agora_core::events::{BlockInfo, EventSource, RawLog, COMMUNITY_STAKE_TRADE};
    use serde_json::json;

    use super::super::init_read_models;
    use super::*;

    fn trade_envelope(tx_hash: &str) -> EventEnvelope {
        EventEnvelope {
            name: COMMUNITY_STAKE_TRADE.to_string(),
            payload: json!({
                "parsedArgs": {
                    "trader": "0xtrader",
                    "namespace": "0xns",
                    "isBuy": true,
                    "communityTokenAmount": "1000000",
                    "ethAmount": "42000000000000000",
                    "protocolEthAmount": "2100000000000000",
                    "nameSpaceEthAmount": "2100000000000000",
                    "supply": "7",
                    "exchangeToken": "0x0000000000000000000000000000000000000000"
                }
            }),
            raw_log: RawLog {
                transaction_hash: tx_hash.into(),
                block_hash: "0xblock".into(),
                block_number: 100,
                removed: false,
            },
            event_source: EventSource { chain_id: 8453 },
            block: BlockInfo {
                timestamp: 1_700_000_000,
            },
        }
    }

    fn shared_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        init_read_models(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn trade_count(conn: &Arc<Mutex<Connection>>) -> i64 {
        conn.lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM stake_trades", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn records_a_trade_once() {
        let db = shared_db();
        let handler = StakeTradeRecorder::new(Arc::clone(&db));

        handler.handle(&trade_envelope("0xaaa")).unwrap();
        assert_eq!(trade_count(&db), 1);
    }

    #[test]
    fn redelivery_converges_to_single_row() {
        let db = shared_db();
        let handler = StakeTradeRecorder::new(Arc::clone(&db));

        handler.handle(&trade_envelope("0xaaa")).unwrap();
        handler.handle(&trade_envelope("0xaaa")).unwrap();
        assert_eq!(trade_count(&db), 1);
    }

    #[test]
    fn distinct_transactions_record_distinct_rows() {
        let db = shared_db();
        let handler = StakeTradeRecorder::new(Arc::clone(&db));

        handler.handle(&trade_envelope("0xaaa")).unwrap();
        handler.handle(&trade_envelope("0xbbb")).unwrap();
        assert_eq!(trade_count(&db), 2);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let db = shared_db();
        let handler = StakeTradeRecorder::new(db);

        let mut envelope = trade_envelope("0xaaa");
        envelope.payload = json!({ "parsedArgs": { "trader": 7 } });
        assert!(matches!(
            handler.handle(&envelope),
            Err(HandlerError::InvalidPayload { .. })
        ));
    }
}
