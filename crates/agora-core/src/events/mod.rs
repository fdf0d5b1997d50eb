//! Decoded chain-event envelopes and typed argument payloads.
//!
//! An [`EventEnvelope`] is what the transport hands the dispatcher: the
//! event name, the decoded payload, and enough provenance (raw log,
//! source chain, block timestamp) for handlers to build natural keys.
//! Wire field names are camelCase to match the upstream decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name for community stake trades.
pub const COMMUNITY_STAKE_TRADE: &str = "CommunityStakeTrade";

/// Event name for namespace deployments carrying a referral.
pub const NAMESPACE_DEPLOYED_WITH_REFERRAL: &str = "NamespaceDeployedWithReferral";

/// Event name for referral fee distributions.
pub const REFERRAL_FEE_DISTRIBUTED: &str = "ReferralFeeDistributed";

/// The raw chain log an event was decoded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Transaction that emitted the log.
    pub transaction_hash: String,
    /// Hash of the containing block.
    pub block_hash: String,
    /// Number of the containing block.
    pub block_number: u64,
    /// Set when the log was removed by a chain reorganization.
    pub removed: bool,
}

/// Where the event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    /// Chain the emitting contract lives on.
    pub chain_id: u64,
}

/// Block-level context for the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block timestamp, Unix seconds.
    pub timestamp: u64,
}

/// A decoded event as delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Event kind name, e.g. [`REFERRAL_FEE_DISTRIBUTED`].
    pub name: String,
    /// Decoded payload; handlers deserialize the typed argument structs
    /// out of its `parsedArgs` field.
    pub payload: Value,
    /// The originating chain log.
    pub raw_log: RawLog,
    /// Source chain.
    pub event_source: EventSource,
    /// Containing block context.
    pub block: BlockInfo,
}

impl EventEnvelope {
    /// Deserialize the `parsedArgs` field of the payload.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if `parsedArgs` is missing or
    /// does not match `T`.
    pub fn parsed_args<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let args = self.payload.get("parsedArgs").cloned().unwrap_or(Value::Null);
        serde_json::from_value(args)
    }
}

/// Decoded arguments of a community stake trade.
///
/// 256-bit quantities travel as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeTradeArgs {
    /// Address that bought or sold stake.
    pub trader: String,
    /// Namespace the stake belongs to.
    pub namespace: String,
    /// Buy vs sell.
    pub is_buy: bool,
    /// Stake units traded.
    pub community_token_amount: String,
    /// Total ETH moved.
    pub eth_amount: String,
    /// Portion routed to the protocol.
    pub protocol_eth_amount: String,
    /// Portion routed to the namespace.
    pub name_space_eth_amount: String,
    /// Post-trade stake supply.
    pub supply: String,
    /// Token used for settlement.
    pub exchange_token: String,
}

/// Decoded arguments of a namespace deployment with a referral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDeployedWithReferralArgs {
    /// Human-readable namespace name.
    pub name: String,
    /// Fee manager contract for the namespace.
    pub fee_manager: String,
    /// Referrer credited for the deployment.
    pub referrer: String,
    /// Fee manager contract handling referral payouts.
    pub referral_fee_manager: String,
    /// Deployment signature.
    pub signature: String,
    /// Deployer address.
    pub namespace_deployer: String,
    /// Deployed namespace contract address.
    pub name_space_address: String,
}

/// Decoded arguments of a referral fee distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralFeeDistributedArgs {
    /// Namespace the fees were earned on.
    pub namespace: String,
    /// Token the fees were paid in.
    pub token: String,
    /// Total amount distributed (decimal string).
    pub amount: String,
    /// Referrer receiving the referral cut.
    pub recipient: String,
    /// The referrer's share (decimal string).
    pub recipient_amount: String,
}
