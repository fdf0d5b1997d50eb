//! Chain storage access and historical event reconstruction.
//!
//! The protocol family handled here predates structured event capture:
//! its contract emits no logs we can tail, so history is *synthesized*
//! from current storage state instead. This module provides:
//!
//! - [`ContractReader`] / [`BlockTimeOracle`]: blocking read ports onto
//!   the chain node. Implementations live outside this crate and own the
//!   per-call timeout; expiry surfaces as [`ChainReadError::Timeout`].
//! - [`EventSynthesizer`]: turns one proposal's storage snapshot into an
//!   ordered list of synthetic events.
//! - [`StorageBackfill`]: walks a DAO's proposal queue backward within a
//!   block range and accumulates synthesized events.
//!
//! # Failure model
//!
//! "Not found" and "transient network failure" are distinct error
//! variants because they drive different decisions upstream: a missing
//! proposal ends that candidate for good, while a network failure is a
//! skip-and-continue during a scan.

pub mod backfill;
pub mod synthesizer;
pub mod types;
pub mod version;

use std::time::Duration;

use thiserror::Error;

pub use backfill::{FetchRange, ScanControl, StorageBackfill};
pub use synthesizer::EventSynthesizer;
pub use types::{
    BlockEstimate, CurrentBlock, DaoConstants, EventKind, ProposalEventData, ProposalRecord,
    SynthesizedEvent,
};
pub use version::{ProtocolVersion, QueueIndexStrategy};

/// Errors from contract storage reads.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChainReadError {
    /// The requested item does not exist in storage.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient network failure talking to the chain node.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete within the adapter's timeout.
    #[error("chain read timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from the timestamp-to-block oracle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    /// No block exists near the requested timestamp.
    #[error("no block found for timestamp {unix_millis}")]
    NotFound {
        /// The requested timestamp in Unix milliseconds.
        unix_millis: u64,
    },

    /// Transient network failure talking to the oracle.
    #[error("oracle network error: {0}")]
    Network(String),
}

/// The block the oracle resolved a timestamp to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMatch {
    /// Number of the block nearest the requested timestamp.
    pub block_number: u64,
    /// The block's own timestamp in Unix seconds.
    pub timestamp: u64,
}

/// Read port onto current contract storage.
///
/// All methods are blocking I/O; implementations must bound each call
/// with a timeout and return [`ChainReadError::Timeout`] on expiry.
pub trait ContractReader: Send + Sync {
    /// Read a named protocol constant (e.g. `periodDuration`).
    fn get_constant(&self, name: &str) -> Result<u64, ChainReadError>;

    /// Current length of the proposal queue.
    fn queue_length(&self) -> Result<u64, ChainReadError>;

    /// Read the proposal index stored at a queue position.
    ///
    /// Only meaningful for protocol versions whose queue holds indices
    /// rather than records; see [`QueueIndexStrategy`].
    fn queue_entry(&self, position: u64) -> Result<u64, ChainReadError>;

    /// Read one proposal record by its index.
    fn proposal(&self, index: u64) -> Result<ProposalRecord, ChainReadError>;

    /// Current block number and timestamp.
    fn current_block(&self) -> Result<CurrentBlock, ChainReadError>;
}

/// Timestamp-to-nearest-block lookup.
///
/// Network-bound and fallible; callers in this module treat a failure as
/// a per-candidate degradation, never a scan abort.
pub trait BlockTimeOracle: Send + Sync {
    /// Resolve a Unix-millisecond timestamp to the nearest block.
    fn block_for_timestamp(&self, unix_millis: u64) -> Result<BlockMatch, OracleError>;
}
