//! Local store contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Durable per-profile persistence of memories, todos and settings.
//! - Keep SQL details out of reconciliation and shell code.
//!
//! # Invariants
//! - Every call is atomic on its own; there is no multi-call transaction.
//! - Storage failures are returned to the caller and never retried here.

pub mod local_store;
