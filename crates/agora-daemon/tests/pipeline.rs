//! End-to-end pipeline test: domain commands emit durable outbox
//! entries, a transport loop drains them, and the dispatcher applies
//! them to the read models, including duplicate and out-of-order
//! delivery, which the handlers must absorb.

use std::sync::{Arc, Mutex};

use agora_core::events::{
    BlockInfo, EventEnvelope, EventSource, RawLog, NAMESPACE_DEPLOYED_WITH_REFERRAL,
    REFERRAL_FEE_DISTRIBUTED,
};
use agora_core::outbox::{DispatchPolicy, OutboxRecord};
use agora_daemon::dispatch::PolicyDispatcher;
use agora_daemon::handlers::{
    init_read_models, referral_fees::referral_status, NamespaceLinker, ReferralFeeDistributor,
    ReferralState,
};
use agora_daemon::outbox_store::Outbox;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

fn deploy_envelope() -> EventEnvelope {
    EventEnvelope {
        name: NAMESPACE_DEPLOYED_WITH_REFERRAL.to_string(),
        payload: json!({
            "parsedArgs": {
                "name": "guild",
                "feeManager": "0xfee",
                "referrer": "0xref",
                "referralFeeManager": "0xrfm",
                "signature": "0xsig",
                "namespaceDeployer": "0xdeployer",
                "nameSpaceAddress": "0xns"
            }
        }),
        raw_log: RawLog {
            transaction_hash: "0xdeploy".into(),
            block_hash: "0xb1".into(),
            block_number: 50,
            removed: false,
        },
        event_source: EventSource { chain_id: 8453 },
        block: BlockInfo {
            timestamp: 1_700_000_000,
        },
    }
}

fn fee_envelope(tx_hash: &str, recipient_amount: &str) -> EventEnvelope {
    EventEnvelope {
        name: REFERRAL_FEE_DISTRIBUTED.to_string(),
        payload: json!({
            "parsedArgs": {
                "namespace": "0xns",
                "token": "0x0000000000000000000000000000000000000000",
                "amount": "1000000",
                "recipient": "0xref",
                "recipientAmount": recipient_amount
            }
        }),
        raw_log: RawLog {
            transaction_hash: tx_hash.into(),
            block_hash: "0xb2".into(),
            block_number: 60,
            removed: false,
        },
        event_source: EventSource { chain_id: 8453 },
        block: BlockInfo {
            timestamp: 1_700_000_100,
        },
    }
}

fn record_for(envelope: &EventEnvelope) -> OutboxRecord {
    OutboxRecord::new(
        envelope.name.clone(),
        serde_json::to_value(envelope).unwrap(),
    )
}

/// Drain everything unrelayed, dispatch it, and mark the successfully
/// dispatched entries relayed. Failed entries stay unrelayed for the
/// next pass, mirroring at-least-once transport behavior.
fn relay_pass(outbox_conn: &Connection, dispatcher: &PolicyDispatcher) -> usize {
    let entries = Outbox::drain_unrelayed(outbox_conn, 100).unwrap();
    let mut relayed = Vec::new();
    for entry in &entries {
        let envelope: EventEnvelope = serde_json::from_value(entry.event_payload.clone()).unwrap();
        if dispatcher.dispatch(&envelope).is_ok() {
            relayed.push(entry.event_id);
        }
    }
    Outbox::mark_relayed(outbox_conn, &relayed).unwrap()
}

#[test]
fn outbox_to_read_models_under_unordered_redelivery() {
    let dir = TempDir::new().unwrap();
    let mut outbox_conn = Connection::open(dir.path().join("outbox.db")).unwrap();
    Outbox::init_schema(&outbox_conn).unwrap();
    let outbox = Outbox::new(DispatchPolicy::default());

    let read_models = Arc::new(Mutex::new(
        Connection::open(dir.path().join("read_models.db")).unwrap(),
    ));
    init_read_models(&read_models.lock().unwrap()).unwrap();

    let mut dispatcher = PolicyDispatcher::new();
    dispatcher.bind(
        NAMESPACE_DEPLOYED_WITH_REFERRAL,
        Arc::new(NamespaceLinker::new(Arc::clone(&read_models))),
    );
    dispatcher.bind(
        REFERRAL_FEE_DISTRIBUTED,
        Arc::new(ReferralFeeDistributor::new(Arc::clone(&read_models))),
    );

    // A fee event is committed to the outbox before the deploy event
    // that links its referral, and the fee is emitted twice.
    let fee = fee_envelope("0xf1", "200");
    let tx = outbox_conn.transaction().unwrap();
    outbox
        .emit(&tx, vec![record_for(&fee), record_for(&fee)])
        .unwrap();
    tx.commit().unwrap();

    // First relay pass: both fee deliveries dispatch cleanly but the
    // referral is still unlinked, so nothing accrues.
    relay_pass(&outbox_conn, &dispatcher);
    assert_eq!(
        referral_status(&read_models.lock().unwrap(), "0xns", "0xref").unwrap(),
        None
    );

    // The deploy command lands, then the transport redelivers the fee.
    let tx = outbox_conn.transaction().unwrap();
    outbox
        .emit(&tx, vec![record_for(&deploy_envelope()), record_for(&fee)])
        .unwrap();
    tx.commit().unwrap();
    relay_pass(&outbox_conn, &dispatcher);

    // One accrual despite three total fee deliveries: the fee row's
    // natural key absorbed the duplicates.
    assert_eq!(
        referral_status(&read_models.lock().unwrap(), "0xns", "0xref").unwrap(),
        Some((ReferralState::FeesAccrued, 200))
    );

    // A second, distinct fee accumulates on top.
    let tx = outbox_conn.transaction().unwrap();
    outbox
        .emit(&tx, vec![record_for(&fee_envelope("0xf2", "50"))])
        .unwrap();
    tx.commit().unwrap();
    relay_pass(&outbox_conn, &dispatcher);

    assert_eq!(
        referral_status(&read_models.lock().unwrap(), "0xns", "0xref").unwrap(),
        Some((ReferralState::FeesAccrued, 250))
    );
}

#[test]
fn blacklisted_kind_never_reaches_handlers() {
    let dir = TempDir::new().unwrap();
    let mut outbox_conn = Connection::open(dir.path().join("outbox.db")).unwrap();
    Outbox::init_schema(&outbox_conn).unwrap();

    let policy = DispatchPolicy::from_toml(
        r#"blacklist = ["ReferralFeeDistributed"]"#,
    )
    .unwrap();
    let outbox = Outbox::new(policy);

    let tx = outbox_conn.transaction().unwrap();
    let inserted = outbox
        .emit(&tx, vec![record_for(&fee_envelope("0xf1", "200"))])
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(inserted, 0);
    assert!(Outbox::drain_unrelayed(&outbox_conn, 10).unwrap().is_empty());
}
