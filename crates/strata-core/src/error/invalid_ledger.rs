use super::Error;

/// Error when the migration ledger of a database is inconsistent with the
/// plan being applied or reverted.
///
/// This occurs when:
/// - A stored definition no longer parses
/// - Recompiling a stored definition yields a different checksum
/// - A ledger row names a scope that does not exist
#[derive(Debug)]
pub(super) struct InvalidLedger {
    message: Box<str>,
}

impl std::error::Error for InvalidLedger {}

impl core::fmt::Display for InvalidLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "invalid migration ledger: {}", self.message)
    }
}

impl Error {
    /// Creates an invalid ledger error.
    pub fn invalid_ledger(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidLedger(InvalidLedger {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is an invalid ledger error.
    pub fn is_invalid_ledger(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::InvalidLedger(_))
    }
}
