use super::Error;

/// Error when a concurrent migration against the same database collided
/// with this one.
///
/// This occurs when:
/// - The migration lock could not be acquired within the configured timeout
/// - The table was migrated by another caller between planning and execution
///
/// The caller may retry with backoff.
#[derive(Debug)]
pub(super) struct LockContention {
    database: Box<str>,
    message: Box<str>,
}

impl std::error::Error for LockContention {}

impl core::fmt::Display for LockContention {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "migration lock contention on `{}`: {}",
            self.database, self.message
        )
    }
}

impl Error {
    /// Creates a lock contention error for the given database.
    pub fn lock_contention(database: impl Into<String>, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::LockContention(LockContention {
            database: database.into().into(),
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a lock contention error.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::LockContention(_))
    }
}
