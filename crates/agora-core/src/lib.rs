//! Core domain logic for the governance event pipeline.
//!
//! This crate holds everything that does not touch a database:
//!
//! - [`chain`]: read ports onto on-chain contract storage, the
//!   protocol-version strategies, the event synthesizer that reconstructs
//!   proposal history from storage snapshots, and the backfill
//!   orchestrator that scans a DAO's proposal queue.
//! - [`events`]: the decoded-event envelope handed to the dispatcher and
//!   the typed argument structs for the chain events we derive read
//!   models from.
//! - [`outbox`]: the durable-event record types and the immutable
//!   priority/blacklist dispatch policy applied at write time.
//!
//! Persistence (the SQLite outbox store, the dispatcher and the domain
//! handlers) lives in `agora-daemon`.

pub mod chain;
pub mod events;
pub mod outbox;
