//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the store contracts the services and the rotator consume.
//! - Isolate SQLite query details from ordering and delivery logic.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories are only built over fully migrated connections.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::quote::{OwnerId, QuoteId, QuoteValidationError};
use crate::model::user::UserValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod quote_repo;
pub mod schedule_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error shared by quote, schedule and user repositories.
#[derive(Debug)]
pub enum RepoError {
    Validation(QuoteValidationError),
    InvalidUser(UserValidationError),
    Db(DbError),
    QuoteNotFound(QuoteId),
    UserNotFound(OwnerId),
    DuplicateEmail(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidUser(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::QuoteNotFound(id) => write!(f, "quote not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::DuplicateEmail(email) => write!(f, "email already registered: {email}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidUser(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuoteValidationError> for RepoError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::InvalidUser(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
