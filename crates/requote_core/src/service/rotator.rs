//! Round-robin quote delivery.
//!
//! # Responsibility
//! - Once per tick, send every owner the quote at their schedule cursor.
//! - Advance the cursor only after the mailer accepted the message.
//!
//! # Invariants
//! - One owner's failure never stops the tick.
//! - A failed send leaves the cursor in place, so the same quote is retried
//!   on the next tick.
//! - The cursor is advanced through `ScheduleRepository::advance_past`, so a
//!   dashboard edit that moved it during the send is not overwritten.

use crate::mail::{compose_quote_email, MailError, MailSettings, Mailer};
use crate::model::quote::{OwnerId, QuoteId};
use crate::model::schedule::ScheduleEntry;
use crate::repo::quote_repo::QuoteRepository;
use crate::repo::schedule_repo::ScheduleRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

/// Why one owner got no mail this tick.
#[derive(Debug)]
pub enum DeliveryError {
    /// Cursor points at a quote that is gone or belongs to someone else.
    QuoteNotFound(QuoteId),
    UserNotFound(OwnerId),
    DeliveryFailed(MailError),
    /// Store read or cursor write failed.
    Persist(RepoError),
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuoteNotFound(id) => write!(f, "scheduled quote not found: {id}"),
            Self::UserNotFound(id) => write!(f, "schedule owner not found: {id}"),
            Self::DeliveryFailed(err) => write!(f, "delivery failed: {err}"),
            Self::Persist(err) => write!(f, "delivery store error: {err}"),
        }
    }
}

impl Error for DeliveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DeliveryFailed(err) => Some(err),
            Self::Persist(err) => Some(err),
            _ => None,
        }
    }
}

impl DeliveryError {
    fn reason(&self) -> &'static str {
        match self {
            Self::QuoteNotFound(_) => "quote_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::Persist(_) => "store_error",
        }
    }
}

/// Result of one owner's turn in a tick.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Sent {
        quote_id: QuoteId,
        /// `false` when the schedule changed under the send and the cursor
        /// was left where the dashboard put it.
        advanced: bool,
    },
    /// Nothing selected.
    Empty,
    Failed(DeliveryError),
}

#[derive(Debug)]
pub struct OwnerDelivery {
    pub owner_id: OwnerId,
    pub outcome: DeliveryOutcome,
}

/// Summary of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub deliveries: Vec<OwnerDelivery>,
    /// Set when cancellation stopped the tick before every owner was seen.
    pub cancelled: bool,
}

impl TickReport {
    pub fn sent(&self) -> usize {
        self.count(|outcome| matches!(outcome, DeliveryOutcome::Sent { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, DeliveryOutcome::Empty))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, DeliveryOutcome::Failed(_)))
    }

    pub fn outcome_for(&self, owner_id: OwnerId) -> Option<&DeliveryOutcome> {
        self.deliveries
            .iter()
            .find(|delivery| delivery.owner_id == owner_id)
            .map(|delivery| &delivery.outcome)
    }

    fn count(&self, predicate: impl Fn(&DeliveryOutcome) -> bool) -> usize {
        self.deliveries
            .iter()
            .filter(|delivery| predicate(&delivery.outcome))
            .count()
    }
}

/// Sends each owner's next scheduled quote.
pub struct EmailRotator<S, Q, U, M> {
    schedules: S,
    quotes: Q,
    users: U,
    mailer: M,
    settings: MailSettings,
}

impl<S, Q, U, M> EmailRotator<S, Q, U, M>
where
    S: ScheduleRepository,
    Q: QuoteRepository,
    U: UserRepository,
    M: Mailer,
{
    pub fn new(schedules: S, quotes: Q, users: U, mailer: M, settings: MailSettings) -> Self {
        Self {
            schedules,
            quotes,
            users,
            mailer,
            settings,
        }
    }

    /// Runs one tick over every stored schedule.
    ///
    /// # Errors
    /// Only when the owner list itself cannot be read; per-owner failures,
    /// including an unreadable schedule, land in the report.
    pub fn run_tick(&self) -> RepoResult<TickReport> {
        self.run_tick_with_cancel(&AtomicBool::new(false))
    }

    /// Like [`Self::run_tick`], checking `cancel` before each owner.
    pub fn run_tick_with_cancel(&self, cancel: &AtomicBool) -> RepoResult<TickReport> {
        let owners = self.schedules.list_schedule_owners()?;
        let mut report = TickReport {
            deliveries: Vec::with_capacity(owners.len()),
            cancelled: false,
        };

        for &owner_id in &owners {
            if cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
            let outcome = match self.schedules.find_schedule(owner_id) {
                Ok(Some(entry)) => self.deliver_next(&entry),
                // Removed between listing and loading.
                Ok(None) => DeliveryOutcome::Empty,
                Err(err) => {
                    warn!(
                        "event=deliver module=rotator status=skip owner={} reason=schedule_unreadable error={}",
                        owner_id, err
                    );
                    DeliveryOutcome::Failed(DeliveryError::Persist(err))
                }
            };
            report.deliveries.push(OwnerDelivery { owner_id, outcome });
        }

        info!(
            "event=tick module=rotator status={} owners={} sent={} skipped={} failed={}",
            if report.cancelled { "cancelled" } else { "ok" },
            owners.len(),
            report.sent(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    /// Delivers the quote at `entry`'s cursor.
    pub fn deliver_next(&self, entry: &ScheduleEntry) -> DeliveryOutcome {
        let owner_id = entry.owner_id();
        let Some(quote_id) = entry.next_for_delivery() else {
            return DeliveryOutcome::Empty;
        };

        match self.send_one(owner_id, quote_id) {
            Ok(advanced) => {
                info!(
                    "event=deliver module=rotator status=ok owner={} quote={} index={} advanced={}",
                    owner_id,
                    quote_id,
                    entry.next_index(),
                    advanced
                );
                DeliveryOutcome::Sent { quote_id, advanced }
            }
            Err(err) => {
                warn!(
                    "event=deliver module=rotator status=skip owner={} quote={} reason={}",
                    owner_id,
                    quote_id,
                    err.reason()
                );
                DeliveryOutcome::Failed(err)
            }
        }
    }

    fn send_one(&self, owner_id: OwnerId, quote_id: QuoteId) -> Result<bool, DeliveryError> {
        let quote = self
            .quotes
            .get_quote(quote_id)
            .map_err(DeliveryError::Persist)?
            .filter(|quote| quote.owner_id == owner_id)
            .ok_or(DeliveryError::QuoteNotFound(quote_id))?;
        let user = self
            .users
            .get_user(owner_id)
            .map_err(DeliveryError::Persist)?
            .ok_or(DeliveryError::UserNotFound(owner_id))?;

        let message = compose_quote_email(&quote, &self.settings);
        self.mailer
            .send(&user.email, &message)
            .map_err(DeliveryError::DeliveryFailed)?;

        self.schedules
            .advance_past(owner_id, quote_id)
            .map_err(DeliveryError::Persist)
    }
}
