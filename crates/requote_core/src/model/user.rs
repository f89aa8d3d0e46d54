//! Mail recipient model.
//!
//! Account credentials live outside core; this is only the part the
//! rotator needs to address a delivery.

use crate::model::quote::OwnerId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

/// User account as seen by core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: OwnerId,
    /// Normalized (trimmed, lowercase) delivery address.
    pub email: String,
}

impl User {
    /// Creates a user with a generated ID and a normalized address.
    pub fn new(email: &str) -> Result<Self, UserValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            email: normalize_email(email)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    InvalidEmail(String),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
        }
    }
}

impl Error for UserValidationError {}

/// Trims and lowercases an address, rejecting values without `local@domain.tld` shape.
pub fn normalize_email(value: &str) -> Result<String, UserValidationError> {
    let normalized = value.trim().to_ascii_lowercase();
    if !EMAIL_RE.is_match(&normalized) {
        return Err(UserValidationError::InvalidEmail(value.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, UserValidationError};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Reader@Example.COM ").unwrap(),
            "reader@example.com"
        );
    }

    #[test]
    fn normalize_email_rejects_malformed_values() {
        for bad in ["", "reader", "reader@", "@example.com", "a b@example.com", "x@host"] {
            assert!(matches!(
                normalize_email(bad),
                Err(UserValidationError::InvalidEmail(_))
            ));
        }
    }
}
