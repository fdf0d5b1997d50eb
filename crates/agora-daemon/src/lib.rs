//! Durable side of the governance event pipeline.
//!
//! - [`outbox_store`]: the SQLite-backed outbox. Entries are appended
//!   inside the caller's ambient transaction so the outbox write and the
//!   domain mutation commit or roll back together.
//! - [`dispatch`]: routes decoded event envelopes to their bound
//!   handlers. No internal retries; handler errors propagate to the
//!   transport, which owns redelivery.
//! - [`handlers`]: the representative read-model handlers. All of them
//!   are idempotent under at-least-once, unordered delivery: writes are
//!   guarded by natural keys and a missing prerequisite is a silent
//!   no-op, not an error.

pub mod dispatch;
pub mod handlers;
pub mod outbox_store;
