//! Delivery schedule repository contract and SQLite implementation.
//!
//! # Invariants
//! - One schedule row per owner; ids are stored with an explicit `seq`.
//! - Multi-statement writes are atomic: they join the caller's transaction
//!   when one is open, otherwise they open an IMMEDIATE one.

use super::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use crate::db::begin_immediate;
use crate::model::quote::{OwnerId, QuoteId};
use crate::model::schedule::ScheduleEntry;
use rusqlite::{params, Connection, OptionalExtension};

/// Store contract for per-owner rotation schedules.
pub trait ScheduleRepository {
    fn find_schedule(&self, owner_id: OwnerId) -> RepoResult<Option<ScheduleEntry>>;
    /// Owners with a stored schedule, empty ones included, ordered by id.
    ///
    /// Schedules are loaded one by one through [`Self::find_schedule`], so a
    /// corrupt row only fails its own owner.
    fn list_schedule_owners(&self) -> RepoResult<Vec<OwnerId>>;
    fn upsert_schedule(&self, entry: &ScheduleEntry) -> RepoResult<()>;

    /// Re-reads the owner's schedule and advances it past `quote_id` when the
    /// cursor still points there.
    ///
    /// Returns whether the cursor moved.
    fn advance_past(&self, owner_id: OwnerId, quote_id: QuoteId) -> RepoResult<bool> {
        let Some(mut entry) = self.find_schedule(owner_id)? else {
            return Ok(false);
        };
        if !entry.advance_past(quote_id) {
            return Ok(false);
        }
        self.upsert_schedule(&entry)?;
        Ok(true)
    }
}

impl<R: ScheduleRepository + ?Sized> ScheduleRepository for &R {
    fn find_schedule(&self, owner_id: OwnerId) -> RepoResult<Option<ScheduleEntry>> {
        (**self).find_schedule(owner_id)
    }
    fn list_schedule_owners(&self) -> RepoResult<Vec<OwnerId>> {
        (**self).list_schedule_owners()
    }
    fn upsert_schedule(&self, entry: &ScheduleEntry) -> RepoResult<()> {
        (**self).upsert_schedule(entry)
    }
    fn advance_past(&self, owner_id: OwnerId, quote_id: QuoteId) -> RepoResult<bool> {
        (**self).advance_past(owner_id, quote_id)
    }
}

/// SQLite-backed schedule repository.
pub struct SqliteScheduleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScheduleRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn find_schedule(&self, owner_id: OwnerId) -> RepoResult<Option<ScheduleEntry>> {
        load_schedule(self.conn, owner_id)
    }

    fn list_schedule_owners(&self) -> RepoResult<Vec<OwnerId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT owner_uuid FROM schedules ORDER BY owner_uuid ASC;")?;
        let mut rows = stmt.query([])?;
        let mut owners = Vec::new();
        while let Some(row) = rows.next()? {
            let owner_text: String = row.get(0)?;
            owners.push(parse_uuid(&owner_text, "schedules.owner_uuid")?);
        }
        Ok(owners)
    }

    fn upsert_schedule(&self, entry: &ScheduleEntry) -> RepoResult<()> {
        in_write_scope(self.conn, |conn| write_schedule(conn, entry))
    }

    fn advance_past(&self, owner_id: OwnerId, quote_id: QuoteId) -> RepoResult<bool> {
        in_write_scope(self.conn, |conn| {
            let Some(mut entry) = load_schedule(conn, owner_id)? else {
                return Ok(false);
            };
            if !entry.advance_past(quote_id) {
                return Ok(false);
            }
            write_schedule(conn, &entry)?;
            Ok(true)
        })
    }
}

fn in_write_scope<T>(
    conn: &Connection,
    work: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    if !conn.is_autocommit() {
        return work(conn);
    }
    let tx = begin_immediate(conn)?;
    let value = work(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn load_schedule(conn: &Connection, owner_id: OwnerId) -> RepoResult<Option<ScheduleEntry>> {
    let next_index: Option<i64> = conn
        .query_row(
            "SELECT next_index FROM schedules WHERE owner_uuid = ?1;",
            [owner_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(next_index) = next_index else {
        return Ok(None);
    };
    let next_index = usize::try_from(next_index).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid next_index `{next_index}` in schedules.next_index"
        ))
    })?;

    let mut stmt = conn.prepare(
        "SELECT quote_uuid
         FROM schedule_quotes
         WHERE owner_uuid = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([owner_id.to_string()])?;
    let mut ids: Vec<QuoteId> = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "schedule_quotes.quote_uuid")?);
    }

    ScheduleEntry::from_parts(owner_id, ids, next_index)
        .map(Some)
        .map_err(|err| RepoError::InvalidData(format!("schedule for {owner_id}: {err}")))
}

fn write_schedule(conn: &Connection, entry: &ScheduleEntry) -> RepoResult<()> {
    let owner = entry.owner_id().to_string();
    conn.execute(
        "INSERT INTO schedules (owner_uuid, next_index)
         VALUES (?1, ?2)
         ON CONFLICT(owner_uuid) DO UPDATE SET
            next_index = excluded.next_index,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![owner, entry.next_index() as i64],
    )?;
    conn.execute(
        "DELETE FROM schedule_quotes WHERE owner_uuid = ?1;",
        [owner.as_str()],
    )?;
    for (seq, quote_id) in entry.selected_quote_ids().iter().enumerate() {
        conn.execute(
            "INSERT INTO schedule_quotes (owner_uuid, seq, quote_uuid) VALUES (?1, ?2, ?3);",
            params![owner, seq as i64, quote_id.to_string()],
        )?;
    }
    Ok(())
}
