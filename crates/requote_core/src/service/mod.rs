//! Core use-case services.
//!
//! # Responsibility
//! - `quote_service`: dashboard intents, each one transaction.
//! - `rotator`: scheduled delivery over the store and mailer seams.

pub mod quote_service;
pub mod rotator;
