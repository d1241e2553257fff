use super::Error;

/// A down-migration was requested for a checksum the database never
/// recorded.
#[derive(Debug)]
pub(super) struct NotApplied {
    database: Box<str>,
    subject: Box<str>,
}

impl std::error::Error for NotApplied {}

impl core::fmt::Display for NotApplied {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{} has not been applied to `{}`",
            self.subject, self.database
        )
    }
}

impl Error {
    /// Creates a not-applied error. `subject` names what was looked up, for
    /// example a checksum or a table.
    pub fn not_applied(database: impl Into<String>, subject: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::NotApplied(NotApplied {
            database: database.into().into(),
            subject: subject.into().into(),
        }))
    }

    /// Returns `true` if this error is a not-applied error.
    pub fn is_not_applied(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::NotApplied(_))
    }
}
