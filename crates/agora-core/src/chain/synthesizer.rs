//! Synthetic event reconstruction from proposal storage snapshots.
//!
//! The contract emits no structured logs, so historical events are
//! inferred from the flags frozen into each proposal record: every
//! proposal yields a `SubmitProposal`, followed by at most one of
//! `Abort` or `ProcessProposal`. Block numbers for the follow-up events
//! are derived from protocol timing constants and resolved through the
//! block-time oracle; when the oracle fails, a neighbor of the start
//! block is substituted and marked [`BlockEstimate::Estimated`].

use tracing::{debug, error, info, warn};

use super::types::{
    BlockEstimate, CurrentBlock, DaoConstants, ProposalEventData, ProposalRecord, SynthesizedEvent,
};
use super::version::ProtocolVersion;
use super::BlockTimeOracle;

/// Converts one proposal's storage snapshot into synthesized events.
///
/// Constructed per operation invocation with a single constants
/// snapshot; see [`DaoConstants`] for the staleness contract.
pub struct EventSynthesizer<'a> {
    oracle: &'a dyn BlockTimeOracle,
    constants: DaoConstants,
    current: CurrentBlock,
    version: ProtocolVersion,
}

impl<'a> EventSynthesizer<'a> {
    /// Create a synthesizer over one constants/head snapshot.
    pub fn new(
        oracle: &'a dyn BlockTimeOracle,
        constants: DaoConstants,
        current: CurrentBlock,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            oracle,
            constants,
            current,
            version,
        }
    }

    /// Synthesize the ordered event list for one proposal.
    ///
    /// Returns an empty list for the second protocol generation, whose
    /// storage layout is not reconstructed yet; this is a documented
    /// gap, not an approximation. If both `aborted` and `processed` are
    /// set (never observed on-chain, and not provably impossible),
    /// `Abort` wins.
    #[must_use]
    pub fn events_from_proposal(
        &self,
        index: u64,
        proposal: &ProposalRecord,
        start_time: u64,
        start_block: u64,
    ) -> Vec<SynthesizedEvent> {
        if self.version == ProtocolVersion::V2 {
            // TODO(protocol-v2): reconstruct from the v2 proposal layout.
            warn!(index, "v2 proposal storage is not synthesized, skipping");
            return Vec::new();
        }

        let mut events = vec![SynthesizedEvent {
            proposal_index: index,
            block: BlockEstimate::Confirmed(start_block),
            data: ProposalEventData::SubmitProposal {
                member: proposal.proposer.clone(),
                applicant: proposal.applicant.clone(),
                token_tribute: proposal.token_tribute.clone(),
                shares_requested: proposal.shares_requested.clone(),
                details: proposal.details.clone(),
                start_time,
            },
        }];

        if proposal.aborted {
            let block = self.abort_block(index, start_time, start_block);
            events.push(SynthesizedEvent {
                proposal_index: index,
                block,
                data: ProposalEventData::Abort {
                    applicant: proposal.applicant.clone(),
                },
            });
        } else if proposal.processed {
            let block = self.process_block(index, start_time, start_block);
            events.push(SynthesizedEvent {
                proposal_index: index,
                block,
                data: ProposalEventData::ProcessProposal {
                    applicant: proposal.applicant.clone(),
                    member: proposal.proposer.clone(),
                    token_tribute: proposal.token_tribute.clone(),
                    shares_requested: proposal.shares_requested.clone(),
                    did_pass: proposal.did_pass,
                    yes_votes: proposal.yes_votes.clone(),
                    no_votes: proposal.no_votes.clone(),
                },
            });
        }

        events
    }

    /// Derive the block for an abort event from the abort window.
    fn abort_block(&self, index: u64, start_time: u64, start_block: u64) -> BlockEstimate {
        let Some(abort_period) = self.constants.abort_period else {
            warn!(index, "no abort window constant, estimating abort block");
            return BlockEstimate::Estimated(start_block + 1);
        };

        let current_ts_ms = self.current.timestamp * 1000;
        let window_end_ms = (start_time + abort_period * self.constants.period_duration) * 1000;
        let maximal_abort_time = current_ts_ms.min(window_end_ms);

        if maximal_abort_time == current_ts_ms {
            info!(index, "still in abort window, using current block");
            return BlockEstimate::Estimated(self.current.number);
        }

        info!(
            index,
            timestamp = maximal_abort_time,
            "passed abort window, fetching block for abort timestamp"
        );
        match self.oracle.block_for_timestamp(maximal_abort_time) {
            Ok(found) => BlockEstimate::Confirmed(found.block_number),
            Err(e) => {
                // Fake it if we can't fetch it.
                error!(
                    index,
                    timestamp = maximal_abort_time,
                    error = %e,
                    "unable to fetch abort block, estimating from start block"
                );
                BlockEstimate::Estimated(start_block + 1)
            }
        }
    }

    /// Derive the block for a process event from the voting + grace
    /// windows.
    fn process_block(&self, index: u64, start_time: u64, start_block: u64) -> BlockEstimate {
        let minimal_process_time = start_time
            + (self.constants.voting_period + self.constants.grace_period)
                * self.constants.period_duration;
        debug!(
            index,
            timestamp = minimal_process_time,
            "fetching minimum processed block"
        );
        match self.oracle.block_for_timestamp(minimal_process_time * 1000) {
            Ok(found) => BlockEstimate::Confirmed(found.block_number),
            Err(e) => {
                // Fake it if we can't fetch it.
                error!(
                    index,
                    timestamp = minimal_process_time,
                    error = %e,
                    "unable to fetch processed block, estimating from start block"
                );
                BlockEstimate::Estimated(start_block + 2)
            }
        }
    }
}
