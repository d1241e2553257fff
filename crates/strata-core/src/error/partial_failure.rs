use super::Error;
use crate::schema::operation::OperationKind;

/// The position and identity of the schema operation that failed while a
/// migration was executing.
///
/// Every operation applied before it in the same call has been rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    position: usize,
    kind: OperationKind,
    target: String,
}

impl PartialFailure {
    pub fn new(position: usize, kind: OperationKind, target: impl Into<String>) -> Self {
        Self {
            position,
            kind,
            target: target.into(),
        }
    }

    /// Zero-based index of the failed operation in the plan.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// `table` or `table.column` identifying what the operation touched.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl std::error::Error for PartialFailure {}

impl core::fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "operation #{} ({} `{}`) failed, migration rolled back",
            self.position, self.kind, self.target
        )
    }
}

impl Error {
    /// Creates a partial failure error. The driver error that caused it is
    /// attached with [`Error::context`].
    pub fn partial_failure(failure: PartialFailure) -> Error {
        Error::from(super::ErrorKind::PartialFailure(failure))
    }

    /// Returns `true` if this error is a partial failure.
    pub fn is_partial_failure(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::PartialFailure(_))
    }

    /// Returns the failure details if this error is a partial failure.
    pub fn partial_failure_details(&self) -> Option<&PartialFailure> {
        match self.kind() {
            super::ErrorKind::PartialFailure(failure) => Some(failure),
            _ => None,
        }
    }
}
