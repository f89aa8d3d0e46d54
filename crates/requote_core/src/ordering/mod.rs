//! Quote ordering and selection rules.
//!
//! # Responsibility
//! - Keep each partition's positions contiguous after any mutation.
//! - Gate select transitions behind the selection cap.
//!
//! # Invariants
//! - Everything here is pure over in-memory quotes; persistence and locking
//!   belong to the service layer.

pub mod reconcile;
pub mod selection;
