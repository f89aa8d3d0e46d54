//! Per-user delivery schedule.
//!
//! # Responsibility
//! - Track the ordered list of quote ids in a user's email rotation.
//! - Own the rotation cursor and its movement rules.
//!
//! # Invariants
//! - Ids are unique and at most `SELECTION_CAP` long.
//! - `next_index < len`, or `next_index == 0` when empty.
//! - Removing an id below the cursor keeps the cursor on the same logical
//!   next quote.

use crate::model::quote::{OwnerId, QuoteId};
use crate::ordering::selection::SELECTION_CAP;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rotation state for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    owner_id: OwnerId,
    selected_quote_ids: Vec<QuoteId>,
    next_index: usize,
}

/// Coarse lifecycle state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Empty,
    Populated,
}

/// Persisted schedule parts that break schedule invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleStateError {
    DuplicateQuote(QuoteId),
    TooManyQuotes(usize),
    CursorOutOfRange { next_index: usize, len: usize },
}

impl Display for ScheduleStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateQuote(id) => write!(f, "quote {id} appears twice in schedule"),
            Self::TooManyQuotes(len) => write!(
                f,
                "schedule holds {len} quotes, more than the cap of {SELECTION_CAP}"
            ),
            Self::CursorOutOfRange { next_index, len } => write!(
                f,
                "schedule cursor {next_index} is out of range for {len} quotes"
            ),
        }
    }
}

impl Error for ScheduleStateError {}

impl ScheduleEntry {
    /// Creates an empty schedule for one owner.
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            selected_quote_ids: Vec::new(),
            next_index: 0,
        }
    }

    /// Rebuilds a schedule from stored parts, rejecting broken state.
    pub fn from_parts(
        owner_id: OwnerId,
        selected_quote_ids: Vec<QuoteId>,
        next_index: usize,
    ) -> Result<Self, ScheduleStateError> {
        if selected_quote_ids.len() > SELECTION_CAP {
            return Err(ScheduleStateError::TooManyQuotes(selected_quote_ids.len()));
        }
        let mut seen = HashSet::new();
        for id in &selected_quote_ids {
            if !seen.insert(*id) {
                return Err(ScheduleStateError::DuplicateQuote(*id));
            }
        }
        let in_range = if selected_quote_ids.is_empty() {
            next_index == 0
        } else {
            next_index < selected_quote_ids.len()
        };
        if !in_range {
            return Err(ScheduleStateError::CursorOutOfRange {
                next_index,
                len: selected_quote_ids.len(),
            });
        }

        Ok(Self {
            owner_id,
            selected_quote_ids,
            next_index,
        })
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    /// Quote ids in rotation order.
    pub fn selected_quote_ids(&self) -> &[QuoteId] {
        &self.selected_quote_ids
    }

    /// Index of the quote due on the next send.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn len(&self) -> usize {
        self.selected_quote_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_quote_ids.is_empty()
    }

    pub fn state(&self) -> ScheduleState {
        if self.is_empty() {
            ScheduleState::Empty
        } else {
            ScheduleState::Populated
        }
    }

    pub fn contains(&self, quote_id: QuoteId) -> bool {
        self.selected_quote_ids.contains(&quote_id)
    }

    /// Applies one selection change to the rotation list.
    ///
    /// Selecting appends to the tail; it is a no-op when the id is already
    /// present or the list is full. Deselecting removes the id and pulls the
    /// cursor back by one when the removed id sat before it.
    ///
    /// Returns whether the list changed.
    pub fn sync(&mut self, selected: bool, quote_id: QuoteId) -> bool {
        if selected {
            if self.contains(quote_id) || self.len() >= SELECTION_CAP {
                return false;
            }
            self.selected_quote_ids.push(quote_id);
            return true;
        }

        let Some(removed_index) = self
            .selected_quote_ids
            .iter()
            .position(|id| *id == quote_id)
        else {
            return false;
        };
        self.selected_quote_ids.remove(removed_index);
        if removed_index < self.next_index {
            self.next_index -= 1;
        }
        self.clamp_cursor();
        true
    }

    /// Returns the quote due next, if any.
    pub fn next_for_delivery(&self) -> Option<QuoteId> {
        self.selected_quote_ids.get(self.next_index).copied()
    }

    /// Moves the cursor one step, wrapping to the start.
    pub fn advance(&mut self) {
        if self.is_empty() {
            return;
        }
        self.next_index = (self.next_index + 1) % self.len();
    }

    /// Advances only while the cursor still points at `quote_id`.
    ///
    /// A send races with dashboard edits: if the delivered quote was
    /// deselected meanwhile, the cursor already points at its successor.
    pub fn advance_past(&mut self, quote_id: QuoteId) -> bool {
        if self.next_for_delivery() != Some(quote_id) {
            return false;
        }
        self.advance();
        true
    }

    /// Re-sequences ids to follow `order` (the selected partition order).
    ///
    /// Ids absent from `order` keep their relative order after the aligned
    /// ones. The cursor stays on the same quote id.
    pub fn align_to(&mut self, order: &[QuoteId]) -> bool {
        let due = self.next_for_delivery();
        let current: HashSet<QuoteId> = self.selected_quote_ids.iter().copied().collect();

        let mut aligned: Vec<QuoteId> = Vec::with_capacity(self.len());
        let mut placed = HashSet::new();
        for id in order {
            if current.contains(id) && placed.insert(*id) {
                aligned.push(*id);
            }
        }
        for id in &self.selected_quote_ids {
            if !placed.contains(id) {
                aligned.push(*id);
            }
        }

        if aligned == self.selected_quote_ids {
            return false;
        }
        self.selected_quote_ids = aligned;
        if let Some(due) = due {
            self.next_index = self
                .selected_quote_ids
                .iter()
                .position(|id| *id == due)
                .unwrap_or(0);
        }
        true
    }

    fn clamp_cursor(&mut self) {
        if self.is_empty() {
            self.next_index = 0;
        } else if self.next_index >= self.len() {
            self.next_index = self.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ScheduleEntry, ScheduleState, ScheduleStateError};
    use crate::ordering::selection::SELECTION_CAP;
    use uuid::Uuid;

    fn ids(count: usize) -> Vec<Uuid> {
        (0..count).map(|_| Uuid::new_v4()).collect()
    }

    fn populated(ids: &[Uuid], next_index: usize) -> ScheduleEntry {
        ScheduleEntry::from_parts(Uuid::new_v4(), ids.to_vec(), next_index).unwrap()
    }

    #[test]
    fn select_sync_appends_once_and_transitions_to_populated() {
        let mut entry = ScheduleEntry::new(Uuid::new_v4());
        assert_eq!(entry.state(), ScheduleState::Empty);

        let id = Uuid::new_v4();
        assert!(entry.sync(true, id));
        assert!(!entry.sync(true, id));
        assert_eq!(entry.selected_quote_ids(), &[id]);
        assert_eq!(entry.state(), ScheduleState::Populated);
    }

    #[test]
    fn select_sync_is_clamped_at_cap() {
        let mut entry = ScheduleEntry::new(Uuid::new_v4());
        for id in ids(SELECTION_CAP) {
            assert!(entry.sync(true, id));
        }
        assert!(!entry.sync(true, Uuid::new_v4()));
        assert_eq!(entry.len(), SELECTION_CAP);
    }

    #[test]
    fn removing_below_cursor_keeps_same_next_quote() {
        let all = ids(4);
        let mut entry = populated(&all, 2);
        assert_eq!(entry.next_for_delivery(), Some(all[2]));

        assert!(entry.sync(false, all[0]));
        assert_eq!(entry.next_index(), 1);
        assert_eq!(entry.next_for_delivery(), Some(all[2]));
    }

    #[test]
    fn removing_at_or_after_cursor_keeps_index() {
        let all = ids(4);
        let mut entry = populated(&all, 1);

        entry.sync(false, all[3]);
        assert_eq!(entry.next_index(), 1);
        entry.sync(false, all[1]);
        assert_eq!(entry.next_index(), 1);
        assert_eq!(entry.next_for_delivery(), Some(all[2]));
    }

    #[test]
    fn removing_last_cursor_item_clamps_into_range() {
        let all = ids(3);
        let mut entry = populated(&all, 2);

        entry.sync(false, all[2]);
        assert_eq!(entry.len(), 2);
        assert_eq!(entry.next_index(), 1);
    }

    #[test]
    fn removing_last_id_returns_to_empty() {
        let all = ids(1);
        let mut entry = populated(&all, 0);

        assert!(entry.sync(false, all[0]));
        assert_eq!(entry.state(), ScheduleState::Empty);
        assert_eq!(entry.next_index(), 0);
        assert_eq!(entry.next_for_delivery(), None);
        assert!(!entry.sync(false, all[0]));
    }

    #[test]
    fn advance_cycles_back_after_len_calls() {
        let all = ids(5);
        let mut entry = populated(&all, 3);
        for _ in 0..all.len() {
            entry.advance();
        }
        assert_eq!(entry.next_index(), 3);

        let mut empty = ScheduleEntry::new(Uuid::new_v4());
        empty.advance();
        assert_eq!(empty.next_index(), 0);
    }

    #[test]
    fn advance_past_only_moves_when_cursor_matches() {
        let all = ids(3);
        let mut entry = populated(&all, 0);

        assert!(!entry.advance_past(all[1]));
        assert_eq!(entry.next_index(), 0);
        assert!(entry.advance_past(all[0]));
        assert_eq!(entry.next_index(), 1);
    }

    #[test]
    fn align_to_reorders_and_keeps_cursor_on_same_id() {
        let all = ids(3);
        let mut entry = populated(&all, 1);

        assert!(entry.align_to(&[all[2], all[1], all[0]]));
        assert_eq!(entry.selected_quote_ids(), &[all[2], all[1], all[0]]);
        assert_eq!(entry.next_for_delivery(), Some(all[1]));
        assert!(!entry.align_to(&[all[2], all[1], all[0]]));
    }

    #[test]
    fn from_parts_rejects_broken_state() {
        let owner = Uuid::new_v4();
        let id = Uuid::new_v4();
        assert_eq!(
            ScheduleEntry::from_parts(owner, vec![id, id], 0).unwrap_err(),
            ScheduleStateError::DuplicateQuote(id)
        );
        assert!(matches!(
            ScheduleEntry::from_parts(owner, vec![id], 1),
            Err(ScheduleStateError::CursorOutOfRange { .. })
        ));
        assert!(matches!(
            ScheduleEntry::from_parts(owner, ids(SELECTION_CAP + 1), 0),
            Err(ScheduleStateError::TooManyQuotes(_))
        ));
    }
}
