//! Selection cap guard.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of quotes one user may keep in email rotation.
pub const SELECTION_CAP: usize = 21;

/// Veto returned when a select would exceed the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimitExceeded {
    pub cap: usize,
    pub current: usize,
}

impl Display for SelectionLimitExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "you can only select up to {} quotes ({} already selected)",
            self.cap, self.current
        )
    }
}

impl Error for SelectionLimitExceeded {}

/// Returns whether one more quote may be selected.
///
/// `current_selected_count` must be read from the store inside the same
/// write transaction that performs the select.
pub fn can_select(current_selected_count: usize) -> bool {
    current_selected_count < SELECTION_CAP
}

/// Same as [`can_select`], as a `Result` for `?` call sites.
pub fn ensure_can_select(current_selected_count: usize) -> Result<(), SelectionLimitExceeded> {
    if can_select(current_selected_count) {
        Ok(())
    } else {
        Err(SelectionLimitExceeded {
            cap: SELECTION_CAP,
            current: current_selected_count,
        })
    }
}
