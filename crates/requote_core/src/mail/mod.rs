//! Outgoing quote mail: composition and transport seam.
//!
//! # Responsibility
//! - Render one quote into a deliverable message.
//! - Define the `Mailer` contract the rotator sends through.
//!
//! # Invariants
//! - `Mailer::send` returns only after the message is accepted or refused;
//!   the rotator treats `Ok` as delivered.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod message;
pub mod spool;

pub use message::{compose_quote_email, MailSettings, QuoteEmail};
pub use spool::SpoolMailer;

/// Transport for composed quote mail.
pub trait Mailer {
    fn send(&self, recipient: &str, message: &QuoteEmail) -> Result<(), MailError>;
}

impl<M: Mailer + ?Sized> Mailer for &M {
    fn send(&self, recipient: &str, message: &QuoteEmail) -> Result<(), MailError> {
        (**self).send(recipient, message)
    }
}

#[derive(Debug)]
pub enum MailError {
    /// Local write failure (spool directory, temp file).
    Io(std::io::Error),
    Encode(serde_json::Error),
    /// Remote side refused the message or was unreachable.
    Transport(String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "mail spool io error: {err}"),
            Self::Encode(err) => write!(f, "mail encode error: {err}"),
            Self::Transport(message) => write!(f, "mail transport error: {message}"),
        }
    }
}

impl Error for MailError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Transport(_) => None,
        }
    }
}

impl From<std::io::Error> for MailError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MailError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}
