use serde::Serialize;

use super::Error;

/// A single rule a definition failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Path of the offending field, for example `name` or `fields[2].options`.
    pub field: String,

    /// Short identifier of the rule that failed.
    pub rule: String,

    /// Human readable explanation.
    pub message: String,
}

impl Violation {
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}: {} [{}]", self.field, self.message, self.rule)
    }
}

/// Error when a table or field definition is rejected.
///
/// Carries every violation found, not only the first.
#[derive(Debug)]
pub(super) struct ValidationError {
    violations: Box<[Violation]>,
}

impl std::error::Error for ValidationError {}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("validation failed: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            core::fmt::Display::fmt(violation, f)?;
        }
        Ok(())
    }
}

impl Error {
    /// Creates a validation error from a list of violations.
    pub fn validation(violations: Vec<Violation>) -> Error {
        debug_assert!(!violations.is_empty());
        Error::from(super::ErrorKind::Validation(ValidationError {
            violations: violations.into(),
        }))
    }

    /// Creates a validation error with a single violation.
    pub fn violation(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Error {
        Error::validation(vec![Violation::new(field, rule, message)])
    }

    /// Returns `true` if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Validation(_))
    }

    /// Returns the violations if this error is a validation error.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self.kind() {
            super::ErrorKind::Validation(err) => Some(&err.violations),
            _ => None,
        }
    }
}
