//! Quote repository contract and SQLite implementation.
//!
//! # Invariants
//! - `list_quotes` returns selected quotes first, each partition by
//!   `position ASC`, ties by insertion time then id.
//! - Deletes are hard deletes scoped to the owner.

use super::{bool_to_int, ensure_schema_ready, parse_flag, parse_uuid, RepoError, RepoResult};
use crate::model::quote::{OwnerId, Quote, QuoteId};
use rusqlite::{params, Connection, Row};

const QUOTE_SELECT_SQL: &str = "SELECT
    quote_uuid,
    owner_uuid,
    content,
    author,
    source,
    source_link,
    position,
    selected,
    unselected_slot
FROM quotes";

/// Store contract for quote records.
pub trait QuoteRepository {
    /// All quotes of one owner, selected partition first.
    fn list_quotes(&self, owner_id: OwnerId) -> RepoResult<Vec<Quote>>;
    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>>;
    fn create_quote(&self, quote: &Quote) -> RepoResult<QuoteId>;
    /// Overwrites every stored field of an existing quote.
    fn save_quote(&self, quote: &Quote) -> RepoResult<()>;
    fn delete_quote(&self, owner_id: OwnerId, id: QuoteId) -> RepoResult<()>;
    fn count_selected(&self, owner_id: OwnerId) -> RepoResult<usize>;
}

impl<R: QuoteRepository + ?Sized> QuoteRepository for &R {
    fn list_quotes(&self, owner_id: OwnerId) -> RepoResult<Vec<Quote>> {
        (**self).list_quotes(owner_id)
    }
    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>> {
        (**self).get_quote(id)
    }
    fn create_quote(&self, quote: &Quote) -> RepoResult<QuoteId> {
        (**self).create_quote(quote)
    }
    fn save_quote(&self, quote: &Quote) -> RepoResult<()> {
        (**self).save_quote(quote)
    }
    fn delete_quote(&self, owner_id: OwnerId, id: QuoteId) -> RepoResult<()> {
        (**self).delete_quote(owner_id, id)
    }
    fn count_selected(&self, owner_id: OwnerId) -> RepoResult<usize> {
        (**self).count_selected(owner_id)
    }
}

/// SQLite-backed quote repository.
pub struct SqliteQuoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuoteRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl QuoteRepository for SqliteQuoteRepository<'_> {
    fn list_quotes(&self, owner_id: OwnerId) -> RepoResult<Vec<Quote>> {
        let mut stmt = self.conn.prepare(&format!(
            "{QUOTE_SELECT_SQL}
             WHERE owner_uuid = ?1
             ORDER BY selected DESC, position ASC, created_at ASC, quote_uuid ASC;"
        ))?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut quotes = Vec::new();
        while let Some(row) = rows.next()? {
            quotes.push(parse_quote_row(row)?);
        }
        Ok(quotes)
    }

    fn get_quote(&self, id: QuoteId) -> RepoResult<Option<Quote>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{QUOTE_SELECT_SQL} WHERE quote_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_quote_row(row)?));
        }
        Ok(None)
    }

    fn create_quote(&self, quote: &Quote) -> RepoResult<QuoteId> {
        quote.validate()?;

        self.conn.execute(
            "INSERT INTO quotes (
                quote_uuid,
                owner_uuid,
                content,
                author,
                source,
                source_link,
                position,
                selected,
                unselected_slot
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                quote.id.to_string(),
                quote.owner_id.to_string(),
                quote.content.as_str(),
                quote.author.as_str(),
                quote.source.as_deref(),
                quote.source_link.as_deref(),
                quote.position,
                bool_to_int(quote.selected),
                quote.unselected_slot,
            ],
        )?;
        Ok(quote.id)
    }

    fn save_quote(&self, quote: &Quote) -> RepoResult<()> {
        quote.validate()?;

        let changed = self.conn.execute(
            "UPDATE quotes
             SET
                content = ?3,
                author = ?4,
                source = ?5,
                source_link = ?6,
                position = ?7,
                selected = ?8,
                unselected_slot = ?9,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE quote_uuid = ?1
               AND owner_uuid = ?2;",
            params![
                quote.id.to_string(),
                quote.owner_id.to_string(),
                quote.content.as_str(),
                quote.author.as_str(),
                quote.source.as_deref(),
                quote.source_link.as_deref(),
                quote.position,
                bool_to_int(quote.selected),
                quote.unselected_slot,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::QuoteNotFound(quote.id));
        }
        Ok(())
    }

    fn delete_quote(&self, owner_id: OwnerId, id: QuoteId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM quotes WHERE quote_uuid = ?1 AND owner_uuid = ?2;",
            params![id.to_string(), owner_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::QuoteNotFound(id));
        }
        Ok(())
    }

    fn count_selected(&self, owner_id: OwnerId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quotes WHERE owner_uuid = ?1 AND selected = 1;",
            [owner_id.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("invalid selected count `{count}`")))
    }
}

fn parse_quote_row(row: &Row<'_>) -> RepoResult<Quote> {
    let id_text: String = row.get("quote_uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    let selected: i64 = row.get("selected")?;

    let quote = Quote {
        id: parse_uuid(&id_text, "quotes.quote_uuid")?,
        owner_id: parse_uuid(&owner_text, "quotes.owner_uuid")?,
        content: row.get("content")?,
        author: row.get("author")?,
        source: row.get("source")?,
        source_link: row.get("source_link")?,
        position: row.get("position")?,
        selected: parse_flag(selected, "quotes.selected")?,
        unselected_slot: row.get("unselected_slot")?,
    };
    quote.validate().map_err(|err| {
        RepoError::InvalidData(format!("quote {} failed validation: {err}", quote.id))
    })?;
    Ok(quote)
}
