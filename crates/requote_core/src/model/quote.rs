//! Quote domain model.
//!
//! # Responsibility
//! - Define the canonical quote record and its editable fields.
//! - Normalize and validate user-entered quote text.
//! - Derive the source search link shown next to a sourced quote.
//!
//! # Invariants
//! - `id` is stable and never reused for another quote.
//! - `position` is a zero-based rank inside the quote's partition
//!   (`selected` or not), never a global index.
//! - `content` and `author` are non-blank after trimming.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable quote identifier.
pub type QuoteId = Uuid;

/// Stable identifier of the user account owning quotes and schedules.
pub type OwnerId = Uuid;

const SOURCE_SEARCH_BASE_URL: &str = "https://www.amazon.com/s";
const PREVIEW_WORD_LIMIT: usize = 7;
// Characters `encodeURIComponent` leaves as-is.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Which ordering partition a quote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Quotes picked for email rotation.
    Selected,
    /// Everything else on the dashboard.
    Unselected,
}

impl Partition {
    /// Returns the partition matching a `selected` flag.
    pub fn of(selected: bool) -> Self {
        if selected {
            Self::Selected
        } else {
            Self::Unselected
        }
    }

    /// Returns whether quotes in this partition are selected.
    pub fn is_selected(self) -> bool {
        matches!(self, Self::Selected)
    }
}

/// Canonical quote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Stable quote ID.
    pub id: QuoteId,
    /// Owning user account.
    pub owner_id: OwnerId,
    /// Quote text.
    pub content: String,
    /// Who said or wrote it.
    pub author: String,
    /// Book or other work the quote comes from.
    pub source: Option<String>,
    /// Search link derived from `author` + `source`.
    pub source_link: Option<String>,
    /// Zero-based rank within the quote's partition.
    pub position: i64,
    /// Whether the quote is part of the email rotation.
    pub selected: bool,
    /// Unselected rank remembered while the quote is selected, so a later
    /// deselect puts it back where it came from.
    pub unselected_slot: Option<i64>,
}

impl Quote {
    /// Creates a new unselected quote with a generated stable ID.
    ///
    /// The caller assigns `position`; it starts at 0.
    pub fn new(owner_id: OwnerId, content: impl Into<String>, author: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), owner_id, content, author)
    }

    /// Creates a new unselected quote with a caller-provided stable ID.
    pub fn with_id(
        id: QuoteId,
        owner_id: OwnerId,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id,
            owner_id,
            content: content.into(),
            author: author.into(),
            source: None,
            source_link: None,
            position: 0,
            selected: false,
            unselected_slot: None,
        }
    }

    /// Returns the partition this quote is ordered in.
    pub fn partition(&self) -> Partition {
        Partition::of(self.selected)
    }

    /// Replaces the editable text fields from a normalized draft.
    ///
    /// Position and selection are left untouched.
    pub fn apply_draft(&mut self, draft: &QuoteDraft, affiliate_tag: &str) {
        self.content = draft.content.clone();
        self.author = draft.author.clone();
        self.source = draft.source.clone();
        self.source_link = draft
            .source
            .as_deref()
            .and_then(|source| source_search_link(&draft.author, source, affiliate_tag));
    }

    /// Validates record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if self.content.trim().is_empty() {
            return Err(QuoteValidationError::EmptyContent);
        }
        if self.author.trim().is_empty() {
            return Err(QuoteValidationError::EmptyAuthor);
        }
        if self.position < 0 {
            return Err(QuoteValidationError::NegativePosition(self.position));
        }
        Ok(())
    }
}

/// Validation failures for quote text and ordering fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyContent,
    EmptyAuthor,
    NegativePosition(i64),
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "quote content is required"),
            Self::EmptyAuthor => write!(f, "quote author is required"),
            Self::NegativePosition(value) => {
                write!(f, "quote position must not be negative, got {value}")
            }
        }
    }
}

impl Error for QuoteValidationError {}

/// User-entered quote text, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteDraft {
    pub content: String,
    pub author: String,
    pub source: Option<String>,
}

impl QuoteDraft {
    /// Trims all fields and rejects blank content/author.
    ///
    /// A blank source is treated as no source.
    pub fn new(
        content: impl Into<String>,
        author: impl Into<String>,
        source: Option<String>,
    ) -> Result<Self, QuoteValidationError> {
        let content = content.into().trim().to_string();
        if content.is_empty() {
            return Err(QuoteValidationError::EmptyContent);
        }
        let author = author.into().trim().to_string();
        if author.is_empty() {
            return Err(QuoteValidationError::EmptyAuthor);
        }
        let source = source
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            content,
            author,
            source,
        })
    }
}

/// Builds the book search link for a sourced quote.
///
/// Returns `None` when author or source is blank.
pub fn source_search_link(author: &str, source: &str, affiliate_tag: &str) -> Option<String> {
    let author = author.trim();
    let source = source.trim();
    if author.is_empty() || source.is_empty() {
        return None;
    }

    let query = percent_encode_component(&format!("{author} {source}"));
    let mut link = format!("{SOURCE_SEARCH_BASE_URL}?k={query}");
    let tag = affiliate_tag.trim();
    if !tag.is_empty() {
        link.push_str("&tag=");
        link.push_str(&percent_encode_component(tag));
    }
    Some(link)
}

/// Shortens quote text to its first few words for listings.
pub fn truncate_preview(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.len() > PREVIEW_WORD_LIMIT {
        format!("{}...", words[..PREVIEW_WORD_LIMIT].join(" "))
    } else {
        words.join(" ")
    }
}

fn percent_encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}
