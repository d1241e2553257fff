use super::Error;
use crate::Scope;

/// Error when a request or operation targets a database outside its scope.
///
/// Never retried automatically.
#[derive(Debug)]
pub(super) struct ScopeMismatch {
    scope: Scope,
    message: Box<str>,
}

impl std::error::Error for ScopeMismatch {}

impl core::fmt::Display for ScopeMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "scope mismatch ({}): {}", self.scope, self.message)
    }
}

impl Error {
    /// Creates a scope mismatch error for a request declared in `scope`.
    pub fn scope_mismatch(scope: Scope, message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ScopeMismatch(ScopeMismatch {
            scope,
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a scope mismatch.
    pub fn is_scope_mismatch(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::ScopeMismatch(_))
    }
}
