use std::time::Duration;

use crate::{error::ErrorKind, Error};

/// The caller-supplied deadline expired before the migration finished.
#[derive(Debug)]
pub(super) struct DeadlineExceeded {
    database: Box<str>,
    duration: Duration,
}

impl Error {
    /// Returned when a migration call outlives its deadline. The enclosing
    /// transaction has been rolled back and no ledger record was written.
    pub fn deadline_exceeded(database: impl Into<String>, duration: Duration) -> Error {
        ErrorKind::DeadlineExceeded(DeadlineExceeded {
            database: database.into().into(),
            duration,
        })
        .into()
    }

    /// Returns `true` if this error is a deadline expiry.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.kind(), ErrorKind::DeadlineExceeded(_))
    }
}

impl std::error::Error for DeadlineExceeded {}

impl core::fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "migration on `{}` exceeded its deadline of {:?} and was rolled back",
            self.database, self.duration
        )
    }
}
