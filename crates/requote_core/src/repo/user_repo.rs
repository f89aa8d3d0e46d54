//! Mail recipient repository.

use super::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use crate::model::quote::OwnerId;
use crate::model::user::{normalize_email, User};
use rusqlite::{Connection, ErrorCode, OptionalExtension};

/// Store contract for user records visible to core.
pub trait UserRepository {
    /// Registers a new address; fails with `DuplicateEmail` when taken.
    fn create_user(&self, email: &str) -> RepoResult<User>;
    fn get_user(&self, id: OwnerId) -> RepoResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
}

impl<R: UserRepository + ?Sized> UserRepository for &R {
    fn create_user(&self, email: &str) -> RepoResult<User> {
        (**self).create_user(email)
    }
    fn get_user(&self, id: OwnerId) -> RepoResult<Option<User>> {
        (**self).get_user(id)
    }
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        (**self).find_user_by_email(email)
    }
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, email: &str) -> RepoResult<User> {
        let user = User::new(email)?;
        let inserted = self.conn.execute(
            "INSERT INTO users (user_uuid, email) VALUES (?1, ?2);",
            [user.id.to_string(), user.email.clone()],
        );
        match inserted {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepoError::DuplicateEmail(user.email))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_user(&self, id: OwnerId) -> RepoResult<Option<User>> {
        let email: Option<String> = self
            .conn
            .query_row(
                "SELECT email FROM users WHERE user_uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(email.map(|email| User { id, email }))
    }

    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let normalized = normalize_email(email)?;
        let id_text: Option<String> = self
            .conn
            .query_row(
                "SELECT user_uuid FROM users WHERE email = ?1;",
                [normalized.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id_text) = id_text else {
            return Ok(None);
        };
        Ok(Some(User {
            id: parse_uuid(&id_text, "users.user_uuid")?,
            email: normalized,
        }))
    }
}
