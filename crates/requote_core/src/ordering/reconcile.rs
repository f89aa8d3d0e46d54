//! Position reconciliation for the selected/unselected partitions.
//!
//! # Responsibility
//! - Renumber each partition to a contiguous `0..n-1` ordering.
//! - Place a moved quote inside its destination partition before
//!   renumbering (drag and toggle).
//!
//! # Invariants
//! - Relative order inside a partition survives reconciliation.
//! - Position ties are broken by input order, never by id or content.
//! - Input must belong to one owner with unique ids and non-negative
//!   positions; anything else is a caller bug.

use crate::model::quote::{OwnerId, Partition, Quote, QuoteId};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Malformed quote set handed to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidQuoteState {
    NegativePosition { quote_id: QuoteId, position: i64 },
    DuplicateQuote(QuoteId),
    MixedOwners {
        quote_id: QuoteId,
        expected: OwnerId,
        found: OwnerId,
    },
    UnknownQuote(QuoteId),
    SelfAnchor(QuoteId),
    AnchorInOtherPartition {
        anchor_id: QuoteId,
        expected: Partition,
    },
}

impl Display for InvalidQuoteState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativePosition { quote_id, position } => {
                write!(f, "quote {quote_id} has negative position {position}")
            }
            Self::DuplicateQuote(id) => write!(f, "quote {id} appears more than once"),
            Self::MixedOwners {
                quote_id,
                expected,
                found,
            } => write!(
                f,
                "quote {quote_id} belongs to {found}, expected owner {expected}"
            ),
            Self::UnknownQuote(id) => write!(f, "quote {id} is not part of the set"),
            Self::SelfAnchor(id) => write!(f, "quote {id} cannot be placed before itself"),
            Self::AnchorInOtherPartition {
                anchor_id,
                expected,
            } => write!(
                f,
                "anchor quote {anchor_id} is not in the {expected:?} partition"
            ),
        }
    }
}

impl Error for InvalidQuoteState {}

pub type ReconcileError = InvalidQuoteState;

/// Renumbers both partitions to contiguous positions.
///
/// Returns the selected partition first, then the unselected one, each in
/// position order.
pub fn reconcile(quotes: Vec<Quote>) -> Result<Vec<Quote>, InvalidQuoteState> {
    validate_quote_set(&quotes)?;

    let (mut selected, mut unselected): (Vec<Quote>, Vec<Quote>) =
        quotes.into_iter().partition(|quote| quote.selected);
    // `sort_by_key` is stable, so equal positions keep input order.
    selected.sort_by_key(|quote| quote.position);
    unselected.sort_by_key(|quote| quote.position);

    for (index, quote) in selected.iter_mut().enumerate() {
        quote.position = index as i64;
    }
    for (index, quote) in unselected.iter_mut().enumerate() {
        quote.position = index as i64;
    }

    selected.extend(unselected);
    Ok(selected)
}

/// Moves one quote into `partition`, directly before `before` (or at the
/// end when `None`).
///
/// Only the destination partition is renumbered; the gap left in the source
/// partition is closed by a following [`reconcile`]. Clears the remembered
/// unselected slot, since the caller chose an explicit place.
pub fn place_quote(
    quotes: &mut [Quote],
    quote_id: QuoteId,
    partition: Partition,
    before: Option<QuoteId>,
) -> Result<(), InvalidQuoteState> {
    validate_quote_set(quotes)?;
    let moved = index_of(quotes, quote_id)?;
    if before == Some(quote_id) {
        return Err(InvalidQuoteState::SelfAnchor(quote_id));
    }

    let mut destination = sorted_partition_indexes(quotes, partition);
    destination.retain(|index| *index != moved);

    let target_index = match before {
        None => destination.len(),
        Some(anchor_id) => match destination
            .iter()
            .position(|index| quotes[*index].id == anchor_id)
        {
            Some(position) => position,
            None => {
                index_of(quotes, anchor_id)?;
                return Err(InvalidQuoteState::AnchorInOtherPartition {
                    anchor_id,
                    expected: partition,
                });
            }
        },
    };
    destination.insert(target_index, moved);

    quotes[moved].selected = partition.is_selected();
    quotes[moved].unselected_slot = None;
    for (rank, index) in destination.into_iter().enumerate() {
        quotes[index].position = rank as i64;
    }
    Ok(())
}

/// Toggles selection for one quote.
///
/// Selecting appends to the selected tail and remembers the quote's
/// unselected rank. Deselecting reinserts at that remembered rank (clamped),
/// or at the unselected tail when none is remembered.
///
/// Returns `false` without touching anything when the quote is already in
/// the requested state.
pub fn toggle_quote(
    quotes: &mut [Quote],
    quote_id: QuoteId,
    selected: bool,
) -> Result<bool, InvalidQuoteState> {
    validate_quote_set(quotes)?;
    let moved = index_of(quotes, quote_id)?;
    if quotes[moved].selected == selected {
        return Ok(false);
    }

    if selected {
        let slot = sorted_partition_indexes(quotes, Partition::Unselected)
            .iter()
            .position(|index| *index == moved)
            .unwrap_or(0) as i64;
        place_quote(quotes, quote_id, Partition::Selected, None)?;
        quotes[moved].unselected_slot = Some(slot);
    } else {
        let unselected = sorted_partition_indexes(quotes, Partition::Unselected);
        let anchor = quotes[moved]
            .unselected_slot
            .and_then(|slot| usize::try_from(slot).ok())
            .and_then(|slot| unselected.get(slot))
            .map(|index| quotes[*index].id);
        place_quote(quotes, quote_id, Partition::Unselected, anchor)?;
    }
    Ok(true)
}

/// Returns quotes in `after` whose ordering state differs from `before`.
///
/// Quotes missing from `before` count as changed.
pub fn changed_quotes<'a>(before: &[Quote], after: &'a [Quote]) -> Vec<&'a Quote> {
    let previous: HashMap<QuoteId, &Quote> =
        before.iter().map(|quote| (quote.id, quote)).collect();
    after
        .iter()
        .filter(|quote| match previous.get(&quote.id) {
            Some(old) => {
                old.position != quote.position
                    || old.selected != quote.selected
                    || old.unselected_slot != quote.unselected_slot
            }
            None => true,
        })
        .collect()
}

/// Ids of one partition in position order.
pub fn partition_order(quotes: &[Quote], partition: Partition) -> Vec<QuoteId> {
    sorted_partition_indexes(quotes, partition)
        .into_iter()
        .map(|index| quotes[index].id)
        .collect()
}

fn sorted_partition_indexes(quotes: &[Quote], partition: Partition) -> Vec<usize> {
    let mut indexes: Vec<usize> = quotes
        .iter()
        .enumerate()
        .filter(|(_, quote)| quote.partition() == partition)
        .map(|(index, _)| index)
        .collect();
    indexes.sort_by_key(|index| quotes[*index].position);
    indexes
}

fn index_of(quotes: &[Quote], quote_id: QuoteId) -> Result<usize, InvalidQuoteState> {
    quotes
        .iter()
        .position(|quote| quote.id == quote_id)
        .ok_or(InvalidQuoteState::UnknownQuote(quote_id))
}

fn validate_quote_set(quotes: &[Quote]) -> Result<(), InvalidQuoteState> {
    let Some(first) = quotes.first() else {
        return Ok(());
    };
    let owner = first.owner_id;
    let mut seen = HashSet::with_capacity(quotes.len());
    for quote in quotes {
        if quote.owner_id != owner {
            return Err(InvalidQuoteState::MixedOwners {
                quote_id: quote.id,
                expected: owner,
                found: quote.owner_id,
            });
        }
        if !seen.insert(quote.id) {
            return Err(InvalidQuoteState::DuplicateQuote(quote.id));
        }
        if quote.position < 0 {
            return Err(InvalidQuoteState::NegativePosition {
                quote_id: quote.id,
                position: quote.position,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        changed_quotes, partition_order, place_quote, reconcile, toggle_quote, InvalidQuoteState,
    };
    use crate::model::quote::{Partition, Quote};
    use uuid::Uuid;

    fn quote(owner: Uuid, label: &str, position: i64, selected: bool) -> Quote {
        let mut quote = Quote::new(owner, label, "author");
        quote.position = position;
        quote.selected = selected;
        quote
    }

    fn labels(quotes: &[Quote], partition: Partition) -> Vec<String> {
        let mut items: Vec<&Quote> = quotes
            .iter()
            .filter(|quote| quote.partition() == partition)
            .collect();
        items.sort_by_key(|quote| quote.position);
        items.iter().map(|quote| quote.content.clone()).collect()
    }

    fn assert_contiguous(quotes: &[Quote]) {
        for partition in [Partition::Selected, Partition::Unselected] {
            let mut positions: Vec<i64> = quotes
                .iter()
                .filter(|quote| quote.partition() == partition)
                .map(|quote| quote.position)
                .collect();
            positions.sort_unstable();
            let expected: Vec<i64> = (0..positions.len() as i64).collect();
            assert_eq!(positions, expected, "{partition:?} is not contiguous");
        }
    }

    #[test]
    fn reconcile_closes_gaps_and_keeps_relative_order() {
        let owner = Uuid::new_v4();
        let input = vec![
            quote(owner, "u-late", 9, false),
            quote(owner, "s-b", 4, true),
            quote(owner, "u-early", 2, false),
            quote(owner, "s-a", 1, true),
            quote(owner, "u-mid", 5, false),
        ];

        let output = reconcile(input).unwrap();
        assert_contiguous(&output);
        assert_eq!(labels(&output, Partition::Selected), ["s-a", "s-b"]);
        assert_eq!(
            labels(&output, Partition::Unselected),
            ["u-early", "u-mid", "u-late"]
        );
    }

    #[test]
    fn reconcile_breaks_ties_by_input_order() {
        let owner = Uuid::new_v4();
        let input = vec![
            quote(owner, "first", 0, false),
            quote(owner, "second", 0, false),
            quote(owner, "third", 0, false),
        ];
        let output = reconcile(input).unwrap();
        assert_eq!(
            labels(&output, Partition::Unselected),
            ["first", "second", "third"]
        );
    }

    #[test]
    fn reconcile_handles_empty_and_single_sets() {
        assert!(reconcile(Vec::new()).unwrap().is_empty());

        let owner = Uuid::new_v4();
        let output = reconcile(vec![quote(owner, "only", 7, true)]).unwrap();
        assert_eq!(output[0].position, 0);
    }

    #[test]
    fn reconcile_rejects_malformed_sets() {
        let owner = Uuid::new_v4();
        let negative = quote(owner, "neg", -1, false);
        assert!(matches!(
            reconcile(vec![negative]),
            Err(InvalidQuoteState::NegativePosition { position: -1, .. })
        ));

        let dup = quote(owner, "dup", 0, false);
        assert_eq!(
            reconcile(vec![dup.clone(), dup.clone()]).unwrap_err(),
            InvalidQuoteState::DuplicateQuote(dup.id)
        );

        let foreign = quote(Uuid::new_v4(), "foreign", 1, false);
        assert!(matches!(
            reconcile(vec![quote(owner, "mine", 0, false), foreign]),
            Err(InvalidQuoteState::MixedOwners { .. })
        ));
    }

    #[test]
    fn place_quote_moves_across_partitions_before_anchor() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![
            quote(owner, "s0", 0, true),
            quote(owner, "s1", 1, true),
            quote(owner, "u0", 0, false),
            quote(owner, "u1", 1, false),
        ];
        let moved = quotes[3].id;
        let anchor = quotes[1].id;

        place_quote(&mut quotes, moved, Partition::Selected, Some(anchor)).unwrap();
        let output = reconcile(quotes).unwrap();

        assert_contiguous(&output);
        assert_eq!(labels(&output, Partition::Selected), ["s0", "u1", "s1"]);
        assert_eq!(labels(&output, Partition::Unselected), ["u0"]);
    }

    #[test]
    fn place_quote_reorders_within_partition() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![
            quote(owner, "a", 0, false),
            quote(owner, "b", 1, false),
            quote(owner, "c", 2, false),
        ];
        let moved = quotes[2].id;
        let anchor = quotes[0].id;

        place_quote(&mut quotes, moved, Partition::Unselected, Some(anchor)).unwrap();
        assert_eq!(labels(&quotes, Partition::Unselected), ["c", "a", "b"]);

        let a = quotes[0].id;
        place_quote(&mut quotes, a, Partition::Unselected, None).unwrap();
        assert_eq!(labels(&quotes, Partition::Unselected), ["c", "b", "a"]);
        assert_contiguous(&quotes);
    }

    #[test]
    fn place_quote_rejects_bad_anchors() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![quote(owner, "s", 0, true), quote(owner, "u", 0, false)];
        let selected_id = quotes[0].id;
        let unselected_id = quotes[1].id;

        assert_eq!(
            place_quote(&mut quotes, unselected_id, Partition::Unselected, Some(unselected_id))
                .unwrap_err(),
            InvalidQuoteState::SelfAnchor(unselected_id)
        );
        assert!(matches!(
            place_quote(&mut quotes, unselected_id, Partition::Unselected, Some(selected_id)),
            Err(InvalidQuoteState::AnchorInOtherPartition { .. })
        ));
        let missing = Uuid::new_v4();
        assert_eq!(
            place_quote(&mut quotes, unselected_id, Partition::Selected, Some(missing))
                .unwrap_err(),
            InvalidQuoteState::UnknownQuote(missing)
        );
    }

    #[test]
    fn select_appends_to_selected_tail() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![
            quote(owner, "A", 0, false),
            quote(owner, "B", 1, false),
            quote(owner, "C", 0, true),
        ];
        let b = quotes[1].id;

        assert!(toggle_quote(&mut quotes, b, true).unwrap());
        let output = reconcile(quotes).unwrap();

        assert_eq!(labels(&output, Partition::Selected), ["C", "B"]);
        assert_eq!(labels(&output, Partition::Unselected), ["A"]);
        let b_quote = output.iter().find(|quote| quote.id == b).unwrap();
        assert_eq!(b_quote.position, 1);
    }

    #[test]
    fn select_then_deselect_restores_position_without_drift() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![
            quote(owner, "a", 0, false),
            quote(owner, "b", 1, false),
            quote(owner, "c", 2, false),
            quote(owner, "d", 3, false),
            quote(owner, "s", 0, true),
        ];
        let c = quotes[2].id;

        for _ in 0..3 {
            toggle_quote(&mut quotes, c, true).unwrap();
            quotes = reconcile(quotes).unwrap();
            toggle_quote(&mut quotes, c, false).unwrap();
            quotes = reconcile(quotes).unwrap();
        }

        assert_eq!(
            labels(&quotes, Partition::Unselected),
            ["a", "b", "c", "d"]
        );
        assert_eq!(labels(&quotes, Partition::Selected), ["s"]);
        let c_quote = quotes.iter().find(|quote| quote.id == c).unwrap();
        assert_eq!(c_quote.unselected_slot, None);
    }

    #[test]
    fn deselect_without_slot_goes_to_unselected_tail() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![
            quote(owner, "u0", 0, false),
            quote(owner, "u1", 1, false),
            quote(owner, "s0", 0, true),
        ];
        let s0 = quotes[2].id;

        toggle_quote(&mut quotes, s0, false).unwrap();
        let output = reconcile(quotes).unwrap();
        assert_eq!(labels(&output, Partition::Unselected), ["u0", "u1", "s0"]);
    }

    #[test]
    fn toggle_to_current_state_is_a_noop() {
        let owner = Uuid::new_v4();
        let mut quotes = vec![quote(owner, "s", 0, true)];
        let id = quotes[0].id;
        assert!(!toggle_quote(&mut quotes, id, true).unwrap());
        assert_eq!(quotes[0].position, 0);
    }

    #[test]
    fn changed_quotes_reports_only_moved_records() {
        let owner = Uuid::new_v4();
        let before = vec![
            quote(owner, "a", 0, false),
            quote(owner, "b", 1, false),
            quote(owner, "c", 2, false),
        ];
        let mut after = before.clone();
        let c = after[2].id;
        let b = after[1].id;
        place_quote(&mut after, c, Partition::Unselected, Some(b)).unwrap();

        let changed: Vec<String> = changed_quotes(&before, &after)
            .into_iter()
            .map(|quote| quote.content.clone())
            .collect();
        assert_eq!(changed, ["b", "c"]);
        assert_eq!(partition_order(&after, Partition::Unselected).len(), 3);
    }
}
