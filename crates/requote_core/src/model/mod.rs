//! Domain model for quotes, delivery schedules and mail recipients.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep per-owner invariants (partition ordering, rotation cursor) next to
//!   the data they constrain.
//!
//! # Invariants
//! - Every quote and schedule is owned by exactly one user.
//! - Quote positions are ranks within one partition, never global.

pub mod quote;
pub mod schedule;
pub mod user;
