//! Core domain logic for reQuote.
//!
//! Quote ordering and selection, the 21-quote selection cap, and the
//! round-robin morning mail. Front ends (CLI, web) call into this crate and
//! hold no ordering logic of their own.

pub mod config;
pub mod db;
pub mod logging;
pub mod mail;
pub mod model;
pub mod ordering;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use mail::{compose_quote_email, MailError, MailSettings, Mailer, QuoteEmail, SpoolMailer};
pub use model::quote::{
    source_search_link, truncate_preview, OwnerId, Partition, Quote, QuoteDraft, QuoteId,
    QuoteValidationError,
};
pub use model::schedule::{ScheduleEntry, ScheduleState};
pub use model::user::{User, UserValidationError};
pub use ordering::reconcile::{place_quote, reconcile, InvalidQuoteState, ReconcileError};
pub use ordering::selection::{can_select, ensure_can_select, SelectionLimitExceeded, SELECTION_CAP};
pub use repo::quote_repo::{QuoteRepository, SqliteQuoteRepository};
pub use repo::schedule_repo::{ScheduleRepository, SqliteScheduleRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::quote_service::{
    DashboardLayout, MoveTarget, QuoteBoard, QuoteService, QuoteServiceError,
};
pub use service::rotator::{DeliveryError, DeliveryOutcome, EmailRotator, OwnerDelivery, TickReport};

/// Health-check probe for front ends.
pub fn ping() -> &'static str {
    "pong"
}

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
