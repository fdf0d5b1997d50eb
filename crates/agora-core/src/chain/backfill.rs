//! Backward queue scan reconstructing proposal history within a range.
//!
//! [`StorageBackfill`] orchestrates the [`EventSynthesizer`] across a
//! DAO's proposal queue. Scans walk the queue newest-first and rely on
//! proposals being monotonically ordered by submission: the first
//! candidate whose start block falls below the window start ends the
//! whole scan. A candidate that is merely too new for the window is
//! skipped without halting, since older proposals may still qualify.
//!
//! Independent scans (different DAOs, different chains) share no mutable
//! state and may run concurrently; within one scan, candidates are
//! evaluated strictly in order because the halt condition depends on the
//! previous iteration's conclusion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::synthesizer::EventSynthesizer;
use super::types::{CurrentBlock, DaoConstants, EventKind, SynthesizedEvent};
use super::version::{ProtocolVersion, QueueIndexStrategy};
use super::{BlockTimeOracle, ChainReadError, ContractReader};

/// Block range selector for a scan.
///
/// Unset bounds default to `[0, current_block]` at scan time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchRange {
    /// Inclusive lower block bound.
    pub start_block: Option<u64>,
    /// Inclusive upper block bound.
    pub end_block: Option<u64>,
    /// Stop after this many matching proposals.
    pub max_results: Option<usize>,
}

/// Cooperative cancellation and deadline for a scan.
///
/// Checked once per queue iteration; a tripped control makes the scan
/// return whatever it has accumulated so far rather than run unbounded
/// over a large range.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ScanControl {
    /// A control that never trips.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A control with an absolute deadline.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Handle for requesting cancellation from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Whether the scan should stop now.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        if self.cancel.load(Ordering::Acquire) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Range with defaults applied and bounds validated.
#[derive(Debug, Clone, Copy)]
struct NormalizedRange {
    start: u64,
    end: u64,
    max_results: Option<usize>,
}

/// Scans contract storage and synthesizes historical proposal events.
pub struct StorageBackfill<'a> {
    reader: &'a dyn ContractReader,
    oracle: &'a dyn BlockTimeOracle,
    version: ProtocolVersion,
    strategy: Box<dyn QueueIndexStrategy>,
}

impl<'a> StorageBackfill<'a> {
    /// Create a backfill over one DAO's contract.
    ///
    /// The queue index strategy is fixed here from the protocol version;
    /// the scan loop itself never branches on version.
    #[must_use]
    pub fn new(
        reader: &'a dyn ContractReader,
        oracle: &'a dyn BlockTimeOracle,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            reader,
            oracle,
            version,
            strategy: version.index_strategy(),
        }
    }

    /// Synthesize events for a single proposal by index.
    ///
    /// Returns an empty list on any read or oracle failure; the failure
    /// is logged and never propagated.
    #[must_use]
    pub fn fetch_one(&self, index: u64) -> Vec<SynthesizedEvent> {
        let (constants, current) = match self.init() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "failed to snapshot constants, aborting fetch");
                return Vec::new();
            }
        };

        let proposal = match self.strategy.read_proposal(self.reader, index) {
            Ok(proposal) => proposal,
            Err(e) => {
                error!(index, error = %e, "proposal not readable");
                return Vec::new();
            }
        };
        debug!(index, "fetched proposal from storage");

        let start_time = constants.proposal_start_time(proposal.starting_period);
        let start_block = match self.oracle.block_for_timestamp(start_time * 1000) {
            Ok(found) => found.block_number,
            Err(e) => {
                error!(
                    index,
                    timestamp = start_time,
                    error = %e,
                    "unable to fetch closest block to start time, skipping proposal"
                );
                return Vec::new();
            }
        };

        let synth = EventSynthesizer::new(self.oracle, constants, current, self.version);
        synth.events_from_proposal(index, &proposal, start_time, start_block)
    }

    /// Scan the proposal queue backward and synthesize events for every
    /// proposal whose start block falls inside `range`.
    ///
    /// Unless `fetch_all_completed` is set, the scan halts at the first
    /// candidate yielding a `ProcessProposal` event. That heuristic
    /// assumes queue-order finality; the flag exists for protocols where
    /// that assumption is wrong.
    #[must_use]
    pub fn fetch(
        &self,
        range: FetchRange,
        fetch_all_completed: bool,
        control: &ScanControl,
    ) -> Vec<SynthesizedEvent> {
        let (constants, current) = match self.init() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "failed to snapshot constants, aborting fetch");
                return Vec::new();
            }
        };

        let Some(range) = normalize_range(range, current.number) else {
            return Vec::new();
        };
        info!(
            start_block = range.start,
            end_block = range.end,
            "fetching proposal entities for range"
        );

        let queue_length = match self.reader.queue_length() {
            Ok(len) => len,
            Err(e) => {
                error!(error = %e, "failed to read queue length, aborting fetch");
                return Vec::new();
            }
        };

        let synth = EventSynthesizer::new(self.oracle, constants, current, self.version);
        let mut results = Vec::new();
        let mut fetched = 0usize;

        for i in 0..queue_length {
            if control.is_tripped() {
                warn!(fetched, "scan cancelled, returning partial results");
                break;
            }

            // Work backward through the queue, newest proposal first.
            let queue_position = queue_length - i - 1;
            let index = match self.strategy.resolve_index(self.reader, queue_position) {
                Ok(index) => index,
                Err(e) => {
                    error!(queue_position, error = %e, "failed to resolve queue entry, skipping");
                    continue;
                }
            };

            let proposal = match self.strategy.read_proposal(self.reader, index) {
                Ok(proposal) => proposal,
                Err(e) => {
                    error!(index, error = %e, "failed to read proposal, skipping");
                    continue;
                }
            };
            debug!(index, "fetched proposal from storage");

            let start_time = constants.proposal_start_time(proposal.starting_period);
            let start_block = match self.oracle.block_for_timestamp(start_time * 1000) {
                Ok(found) => found.block_number,
                Err(e) => {
                    error!(
                        index,
                        timestamp = start_time,
                        error = %e,
                        "unable to fetch closest block to start time, skipping proposal"
                    );
                    continue;
                }
            };

            if start_block < range.start {
                // Monotonic submission order: everything older is out of
                // the window too.
                debug!(
                    index,
                    start_block,
                    range_start = range.start,
                    "proposal start block before range, ending fetch"
                );
                break;
            }
            if start_block > range.end {
                debug!(
                    index,
                    start_block,
                    range_end = range.end,
                    "proposal start block after range, continuing backward"
                );
                continue;
            }

            let events = synth.events_from_proposal(index, &proposal, start_time, start_block);
            let found_processed = events
                .iter()
                .any(|e| e.kind() == EventKind::ProcessProposal);
            results.extend(events);
            fetched += 1;

            if !fetch_all_completed && found_processed {
                debug!(index, "proposal is marked processed, halting fetch");
                break;
            }
            if range.max_results.is_some_and(|max| fetched >= max) {
                debug!(fetched, "reached max results, halting fetch");
                break;
            }
        }

        results
    }

    /// Snapshot protocol constants and the chain head for one
    /// invocation.
    fn init(&self) -> Result<(DaoConstants, CurrentBlock), ChainReadError> {
        let constants = DaoConstants {
            period_duration: self.reader.get_constant("periodDuration")?,
            summoning_time: self.reader.get_constant("summoningTime")?,
            voting_period: self.reader.get_constant("votingPeriodLength")?,
            grace_period: self.reader.get_constant("gracePeriodLength")?,
            abort_period: match self.version {
                ProtocolVersion::V1 => Some(self.reader.get_constant("abortWindow")?),
                ProtocolVersion::V2 => None,
            },
        };
        let current = self.reader.current_block()?;
        info!(
            block = current.number,
            timestamp = current.timestamp,
            "snapshotted chain head"
        );
        Ok((constants, current))
    }
}

/// Apply range defaults and validate bounds.
///
/// Returns `None` (with an error-severity log) for ranges the scan must
/// refuse outright.
fn normalize_range(range: FetchRange, current_block: u64) -> Option<NormalizedRange> {
    let start = range.start_block.unwrap_or(0);
    if start >= current_block {
        error!(
            start,
            current_block, "start block not below current block, aborting fetch"
        );
        return None;
    }
    let end = range.end_block.unwrap_or(current_block);
    if start >= end {
        error!(start, end, "invalid fetch range, aborting fetch");
        return None;
    }
    Some(NormalizedRange {
        start,
        end,
        max_results: range.max_results,
    })
}
