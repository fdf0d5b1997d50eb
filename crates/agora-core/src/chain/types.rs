//! Storage-shaped records and the synthesized events derived from them.

use serde::{Deserialize, Serialize};

/// One proposal as read from contract storage.
///
/// Pre-submission fields are immutable; `aborted` and `processed` each
/// mutate at most once after submission, then freeze. Vote counts only
/// settle once `processed` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    /// Queue index of the proposal.
    pub index: u64,
    /// Member address that submitted the proposal.
    pub proposer: String,
    /// Address applying for membership.
    pub applicant: String,
    /// Tribute offered, in token base units (decimal string; the chain
    /// value is a 256-bit integer).
    pub token_tribute: String,
    /// Voting shares requested (decimal string).
    pub shares_requested: String,
    /// Free-form details attached at submission.
    pub details: String,
    /// Voting period in which the proposal starts.
    pub starting_period: u64,
    /// Set once if the applicant aborted within the abort window.
    pub aborted: bool,
    /// Set once when the proposal has been processed.
    pub processed: bool,
    /// Outcome; only meaningful when `processed` is set.
    pub did_pass: bool,
    /// Final yes-vote tally (decimal string).
    pub yes_votes: String,
    /// Final no-vote tally (decimal string).
    pub no_votes: String,
}

/// Protocol constants fetched once per operation invocation.
///
/// A live parameter change mid-call is an accepted staleness window, not
/// a bug: the constants are read as one snapshot and used consistently
/// for the duration of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaoConstants {
    /// Length of one voting period, in seconds.
    pub period_duration: u64,
    /// Contract deployment time, Unix seconds.
    pub summoning_time: u64,
    /// Voting window length, in periods.
    pub voting_period: u64,
    /// Grace window length, in periods.
    pub grace_period: u64,
    /// Abort window length, in periods. Absent on protocol versions
    /// without an abort mechanism.
    pub abort_period: Option<u64>,
}

impl DaoConstants {
    /// Unix-second start time for a proposal's starting period.
    #[must_use]
    pub const fn proposal_start_time(&self, starting_period: u64) -> u64 {
        starting_period * self.period_duration + self.summoning_time
    }
}

/// Current chain head as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentBlock {
    /// Head block number.
    pub number: u64,
    /// Head block timestamp, Unix seconds.
    pub timestamp: u64,
}

/// Kinds of synthesized proposal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Proposal entered the queue.
    SubmitProposal,
    /// Applicant aborted within the abort window.
    Abort,
    /// Proposal was processed and settled.
    ProcessProposal,
}

/// A block number attribution for a synthesized event.
///
/// Synthesis sometimes cannot confirm a block with the oracle and falls
/// back to a fabricated neighbor of the start block. Downstream
/// consumers must be able to tell the two apart, so the fallback is a
/// distinct variant rather than a flag that could be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEstimate {
    /// Resolved via the block-time oracle.
    Confirmed(u64),
    /// Degraded-confidence fallback; not oracle-confirmed.
    Estimated(u64),
}

impl BlockEstimate {
    /// The block number regardless of confidence.
    #[must_use]
    pub const fn number(&self) -> u64 {
        match self {
            Self::Confirmed(n) | Self::Estimated(n) => *n,
        }
    }

    /// Whether this block was confirmed by the oracle.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Typed payload of a synthesized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalEventData {
    /// Submission, reconstructed from the immutable storage fields.
    SubmitProposal {
        /// Submitting member address.
        member: String,
        /// Membership applicant address.
        applicant: String,
        /// Tribute offered (decimal string).
        token_tribute: String,
        /// Shares requested (decimal string).
        shares_requested: String,
        /// Free-form submission details.
        details: String,
        /// Proposal start time, Unix seconds.
        start_time: u64,
    },
    /// Abort by the applicant.
    Abort {
        /// Membership applicant address.
        applicant: String,
    },
    /// Settlement, carrying the vote outcome verbatim from storage.
    ProcessProposal {
        /// Membership applicant address.
        applicant: String,
        /// Submitting member address.
        member: String,
        /// Tribute offered (decimal string).
        token_tribute: String,
        /// Shares requested (decimal string).
        shares_requested: String,
        /// Whether the proposal passed.
        did_pass: bool,
        /// Final yes-vote tally (decimal string).
        yes_votes: String,
        /// Final no-vote tally (decimal string).
        no_votes: String,
    },
}

impl ProposalEventData {
    /// The kind tag for this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::SubmitProposal { .. } => EventKind::SubmitProposal,
            Self::Abort { .. } => EventKind::Abort,
            Self::ProcessProposal { .. } => EventKind::ProcessProposal,
        }
    }
}

/// One event reconstructed from a proposal's storage snapshot.
///
/// Ephemeral: produced per call and handed to the ingestion sink, never
/// persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedEvent {
    /// Index of the proposal this event was derived from.
    pub proposal_index: u64,
    /// Block attribution, confirmed or estimated.
    pub block: BlockEstimate,
    /// Typed payload.
    pub data: ProposalEventData,
}

impl SynthesizedEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.data.kind()
    }
}
