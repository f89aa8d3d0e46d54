//! Dashboard use-case service.
//!
//! # Responsibility
//! - Execute dashboard intents: add, edit, delete, toggle, drag, bulk layout.
//! - Route every ordering change through `ordering::reconcile`.
//! - Keep the owner's rotation schedule in step with the selected partition.
//!
//! # Invariants
//! - Each intent is one IMMEDIATE transaction: the selected count read by
//!   the selection guard and the writes that follow cannot interleave with
//!   another writer.
//! - A rejected intent leaves the store untouched.
//! - Quotes of other owners are reported as not found.

use crate::db::{begin_immediate, DbError};
use crate::model::quote::{OwnerId, Partition, Quote, QuoteDraft, QuoteId, QuoteValidationError};
use crate::model::schedule::ScheduleEntry;
use crate::ordering::reconcile::{
    changed_quotes, partition_order, place_quote, reconcile, toggle_quote, InvalidQuoteState,
};
use crate::ordering::selection::{ensure_can_select, SelectionLimitExceeded, SELECTION_CAP};
use crate::repo::quote_repo::{QuoteRepository, SqliteQuoteRepository};
use crate::repo::schedule_repo::{ScheduleRepository, SqliteScheduleRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors returned synchronously to the dashboard caller.
#[derive(Debug)]
pub enum QuoteServiceError {
    Validation(QuoteValidationError),
    QuoteNotFound(QuoteId),
    UserNotFound(OwnerId),
    SelectionLimitExceeded(SelectionLimitExceeded),
    InvalidQuoteState(InvalidQuoteState),
    Repo(RepoError),
}

impl Display for QuoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::QuoteNotFound(id) => write!(f, "quote not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::SelectionLimitExceeded(err) => write!(f, "{err}"),
            Self::InvalidQuoteState(err) => write!(f, "invalid quote state: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QuoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::SelectionLimitExceeded(err) => Some(err),
            Self::InvalidQuoteState(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for QuoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::QuoteNotFound(id) => Self::QuoteNotFound(id),
            RepoError::UserNotFound(id) => Self::UserNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for QuoteServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for QuoteServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl From<QuoteValidationError> for QuoteServiceError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SelectionLimitExceeded> for QuoteServiceError {
    fn from(value: SelectionLimitExceeded) -> Self {
        Self::SelectionLimitExceeded(value)
    }
}

impl From<InvalidQuoteState> for QuoteServiceError {
    fn from(value: InvalidQuoteState) -> Self {
        Self::InvalidQuoteState(value)
    }
}

/// Drop target of a drag: destination partition plus the quote to insert
/// before (`None` appends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTarget {
    pub partition: Partition,
    pub before: Option<QuoteId>,
}

/// Full dashboard layout as arranged by the user.
///
/// Quotes not listed keep their partition and follow the listed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardLayout {
    pub selected: Vec<QuoteId>,
    pub unselected: Vec<QuoteId>,
}

/// Both partitions of one owner, each in position order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteBoard {
    pub selected: Vec<Quote>,
    pub unselected: Vec<Quote>,
}

/// Dashboard service over one SQLite connection.
pub struct QuoteService<'conn> {
    conn: &'conn Connection,
    affiliate_tag: String,
}

struct WriteScope<'tx> {
    quotes: SqliteQuoteRepository<'tx>,
    schedules: SqliteScheduleRepository<'tx>,
    users: SqliteUserRepository<'tx>,
}

impl<'conn> QuoteService<'conn> {
    /// Creates a service; `affiliate_tag` is appended to source links.
    pub fn new(conn: &'conn Connection, affiliate_tag: impl Into<String>) -> Self {
        Self {
            conn,
            affiliate_tag: affiliate_tag.into(),
        }
    }

    /// Adds a quote at the end of the owner's unselected partition.
    pub fn add_quote(
        &self,
        owner_id: OwnerId,
        draft: &QuoteDraft,
    ) -> Result<Quote, QuoteServiceError> {
        let quote = self.write(|scope| {
            if scope.users.get_user(owner_id)?.is_none() {
                return Err(QuoteServiceError::UserNotFound(owner_id));
            }
            let existing = scope.quotes.list_quotes(owner_id)?;
            let unselected = existing.iter().filter(|quote| !quote.selected).count();

            let mut quote = Quote::new(owner_id, draft.content.clone(), draft.author.clone());
            quote.apply_draft(draft, &self.affiliate_tag);
            quote.position = unselected as i64;
            scope.quotes.create_quote(&quote)?;
            Ok(quote)
        })?;

        info!(
            "event=quote_add module=service status=ok owner={} quote={} position={}",
            owner_id, quote.id, quote.position
        );
        Ok(quote)
    }

    /// Replaces content, author and source; ordering is untouched.
    pub fn edit_quote(
        &self,
        owner_id: OwnerId,
        quote_id: QuoteId,
        draft: &QuoteDraft,
    ) -> Result<Quote, QuoteServiceError> {
        let quote = self.write(|scope| {
            let mut quote = scope
                .quotes
                .get_quote(quote_id)?
                .filter(|quote| quote.owner_id == owner_id)
                .ok_or(QuoteServiceError::QuoteNotFound(quote_id))?;
            quote.apply_draft(draft, &self.affiliate_tag);
            scope.quotes.save_quote(&quote)?;
            Ok(quote)
        })?;

        info!(
            "event=quote_edit module=service status=ok owner={} quote={}",
            owner_id, quote_id
        );
        Ok(quote)
    }

    /// Deletes a quote, closes the gap it leaves and drops it from the
    /// rotation.
    pub fn delete_quote(
        &self,
        owner_id: OwnerId,
        quote_id: QuoteId,
    ) -> Result<(), QuoteServiceError> {
        let was_selected = self.write(|scope| {
            let before = scope.quotes.list_quotes(owner_id)?;
            let was_selected = before
                .iter()
                .find(|quote| quote.id == quote_id)
                .map(|quote| quote.selected)
                .ok_or(QuoteServiceError::QuoteNotFound(quote_id))?;

            scope.quotes.delete_quote(owner_id, quote_id)?;
            let remaining: Vec<Quote> = before
                .iter()
                .filter(|quote| quote.id != quote_id)
                .cloned()
                .collect();
            let after = reconcile(remaining.clone())?;
            persist_changes(scope, &remaining, &after)?;
            sync_schedule(scope, owner_id, &[(quote_id, false)], &after)?;
            Ok(was_selected)
        })?;

        info!(
            "event=quote_delete module=service status=ok owner={} quote={} was_selected={}",
            owner_id, quote_id, was_selected
        );
        Ok(())
    }

    /// Selects or deselects one quote.
    ///
    /// Selecting checks the cap against the stored count and appends to the
    /// selected partition; deselecting always succeeds and puts the quote
    /// back where it was before it was selected.
    pub fn set_selected(
        &self,
        owner_id: OwnerId,
        quote_id: QuoteId,
        selected: bool,
    ) -> Result<Quote, QuoteServiceError> {
        let result = self.write(|scope| {
            let before = scope.quotes.list_quotes(owner_id)?;
            let current = find_quote(&before, quote_id)?;
            if selected && !current.selected {
                ensure_can_select(scope.quotes.count_selected(owner_id)?)?;
            }

            let mut working = before.clone();
            if !toggle_quote(&mut working, quote_id, selected)? {
                return Ok(current.clone());
            }
            let after = reconcile(working)?;
            persist_changes(scope, &before, &after)?;
            sync_schedule(scope, owner_id, &[(quote_id, selected)], &after)?;
            find_quote(&after, quote_id).cloned()
        });

        match &result {
            Ok(quote) => info!(
                "event=quote_select module=service status=ok owner={} quote={} selected={} position={}",
                owner_id, quote_id, quote.selected, quote.position
            ),
            Err(QuoteServiceError::SelectionLimitExceeded(err)) => warn!(
                "event=quote_select module=service status=rejected owner={} quote={} reason=selection_limit selected_count={}",
                owner_id, quote_id, err.current
            ),
            Err(_) => {}
        }
        result
    }

    /// Applies one drag: moves `quote_id` into `target.partition` before
    /// `target.before`.
    pub fn move_quote(
        &self,
        owner_id: OwnerId,
        quote_id: QuoteId,
        target: MoveTarget,
    ) -> Result<Quote, QuoteServiceError> {
        let quote = self.write(|scope| {
            let before = scope.quotes.list_quotes(owner_id)?;
            let current = find_quote(&before, quote_id)?;
            let crosses = current.partition() != target.partition;
            if crosses && target.partition.is_selected() {
                ensure_can_select(scope.quotes.count_selected(owner_id)?)?;
            }

            let mut working = before.clone();
            place_quote(&mut working, quote_id, target.partition, target.before)?;
            let after = reconcile(working)?;
            persist_changes(scope, &before, &after)?;
            let changes = if crosses {
                vec![(quote_id, target.partition.is_selected())]
            } else {
                Vec::new()
            };
            sync_schedule(scope, owner_id, &changes, &after)?;
            find_quote(&after, quote_id).cloned()
        })?;

        info!(
            "event=quote_move module=service status=ok owner={} quote={} partition={:?} position={}",
            owner_id, quote_id, target.partition, quote.position
        );
        Ok(quote)
    }

    /// Persists a whole dashboard arrangement in one step.
    pub fn apply_layout(
        &self,
        owner_id: OwnerId,
        layout: &DashboardLayout,
    ) -> Result<QuoteBoard, QuoteServiceError> {
        let board = self.write(|scope| {
            let before = scope.quotes.list_quotes(owner_id)?;
            let working = arrange_layout(&before, layout)?;
            let selected_count = working.iter().filter(|quote| quote.selected).count();
            if selected_count > SELECTION_CAP {
                return Err(SelectionLimitExceeded {
                    cap: SELECTION_CAP,
                    current: selected_count,
                }
                .into());
            }

            let after = reconcile(working)?;
            persist_changes(scope, &before, &after)?;
            let previous: HashMap<QuoteId, bool> =
                before.iter().map(|quote| (quote.id, quote.selected)).collect();
            let changes: Vec<(QuoteId, bool)> = after
                .iter()
                .filter(|quote| previous.get(&quote.id) != Some(&quote.selected))
                .map(|quote| (quote.id, quote.selected))
                .collect();
            sync_schedule(scope, owner_id, &changes, &after)?;
            Ok(split_board(after))
        })?;

        info!(
            "event=layout_apply module=service status=ok owner={} selected={} unselected={}",
            owner_id,
            board.selected.len(),
            board.unselected.len()
        );
        Ok(board)
    }

    /// Reads the owner's dashboard.
    pub fn board(&self, owner_id: OwnerId) -> Result<QuoteBoard, QuoteServiceError> {
        let quotes = SqliteQuoteRepository::try_new(self.conn)?.list_quotes(owner_id)?;
        Ok(split_board(quotes))
    }

    /// Reads the owner's rotation schedule, if one was ever created.
    pub fn schedule(&self, owner_id: OwnerId) -> Result<Option<ScheduleEntry>, QuoteServiceError> {
        Ok(SqliteScheduleRepository::try_new(self.conn)?.find_schedule(owner_id)?)
    }

    fn write<T>(
        &self,
        work: impl FnOnce(&WriteScope<'_>) -> Result<T, QuoteServiceError>,
    ) -> Result<T, QuoteServiceError> {
        let tx = begin_immediate(self.conn)?;
        let value = {
            let scope = WriteScope {
                quotes: SqliteQuoteRepository::try_new(&tx)?,
                schedules: SqliteScheduleRepository::try_new(&tx)?,
                users: SqliteUserRepository::try_new(&tx)?,
            };
            work(&scope)?
        };
        tx.commit()?;
        Ok(value)
    }
}

fn find_quote(quotes: &[Quote], quote_id: QuoteId) -> Result<&Quote, QuoteServiceError> {
    quotes
        .iter()
        .find(|quote| quote.id == quote_id)
        .ok_or(QuoteServiceError::QuoteNotFound(quote_id))
}

fn persist_changes(
    scope: &WriteScope<'_>,
    before: &[Quote],
    after: &[Quote],
) -> Result<(), QuoteServiceError> {
    for quote in changed_quotes(before, after) {
        scope.quotes.save_quote(quote)?;
    }
    Ok(())
}

/// Applies selection changes to the owner's schedule and re-aligns it to
/// the selected partition order. The schedule row is only written when
/// something changed.
fn sync_schedule(
    scope: &WriteScope<'_>,
    owner_id: OwnerId,
    changes: &[(QuoteId, bool)],
    quotes: &[Quote],
) -> Result<(), QuoteServiceError> {
    let existing = scope.schedules.find_schedule(owner_id)?;
    if existing.is_none() && !changes.iter().any(|(_, selected)| *selected) {
        return Ok(());
    }
    let mut entry = existing.unwrap_or_else(|| ScheduleEntry::new(owner_id));

    let mut changed = false;
    // Removals first, so a layout that swaps quotes in and out never trips
    // the cap clamp.
    for (quote_id, _) in changes.iter().filter(|(_, selected)| !*selected) {
        changed |= entry.sync(false, *quote_id);
    }
    let order = partition_order(quotes, Partition::Selected);
    let position_of: HashMap<QuoteId, usize> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();
    let mut additions: Vec<QuoteId> = changes
        .iter()
        .filter(|(_, selected)| *selected)
        .map(|(quote_id, _)| *quote_id)
        .collect();
    additions.sort_by_key(|id| position_of.get(id).copied().unwrap_or(usize::MAX));
    for quote_id in additions {
        changed |= entry.sync(true, quote_id);
    }
    changed |= entry.align_to(&order);

    if changed {
        scope.schedules.upsert_schedule(&entry)?;
    }
    Ok(())
}

fn arrange_layout(
    before: &[Quote],
    layout: &DashboardLayout,
) -> Result<Vec<Quote>, QuoteServiceError> {
    let owned: HashSet<QuoteId> = before.iter().map(|quote| quote.id).collect();
    let mut placement: HashMap<QuoteId, (bool, i64)> = HashMap::new();
    for (selected, ids) in [(true, &layout.selected), (false, &layout.unselected)] {
        for (index, id) in ids.iter().enumerate() {
            if !owned.contains(id) {
                return Err(QuoteServiceError::QuoteNotFound(*id));
            }
            if placement.insert(*id, (selected, index as i64)).is_some() {
                return Err(InvalidQuoteState::DuplicateQuote(*id).into());
            }
        }
    }

    let listed_selected = layout.selected.len() as i64;
    let listed_unselected = layout.unselected.len() as i64;
    let arranged = before
        .iter()
        .cloned()
        .map(|mut quote| {
            match placement.get(&quote.id) {
                Some((selected, position)) => {
                    quote.unselected_slot = None;
                    quote.selected = *selected;
                    quote.position = *position;
                }
                None => {
                    let offset = if quote.selected {
                        listed_selected
                    } else {
                        listed_unselected
                    };
                    quote.position += offset;
                }
            }
            quote
        })
        .collect();
    Ok(arranged)
}

fn split_board(quotes: Vec<Quote>) -> QuoteBoard {
    let (mut selected, mut unselected): (Vec<Quote>, Vec<Quote>) =
        quotes.into_iter().partition(|quote| quote.selected);
    selected.sort_by_key(|quote| quote.position);
    unselected.sort_by_key(|quote| quote.position);
    QuoteBoard {
        selected,
        unselected,
    }
}
