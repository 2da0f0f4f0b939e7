//! Application-level services.
//!
//! # Responsibility
//! - Own the session context (local store, remote adapters, readiness).
//! - Turn user intents into reconciliation calls and keep in-memory state
//!   for the presentation layer.

pub mod context;
pub mod shell;
