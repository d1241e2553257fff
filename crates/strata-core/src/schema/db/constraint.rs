use serde::{Deserialize, Serialize};

/// A named table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    Unique(UniqueConstraint),
    ForeignKey(ForeignKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,

    /// Referencing columns on the owning table.
    pub columns: Vec<String>,

    /// Physical name of the referenced table.
    pub foreign_table: String,

    pub foreign_columns: Vec<String>,
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::Unique(unique) => &unique.name,
            Constraint::ForeignKey(fk) => &fk.name,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Constraint::Unique(unique) => &unique.columns,
            Constraint::ForeignKey(fk) => &fk.columns,
        }
    }

    pub fn covers(&self, column: &str) -> bool {
        self.columns().iter().any(|c| c == column)
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self, Constraint::ForeignKey(_))
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKey> {
        match self {
            Constraint::ForeignKey(fk) => Some(fk),
            Constraint::Unique(_) => None,
        }
    }
}

impl From<UniqueConstraint> for Constraint {
    fn from(value: UniqueConstraint) -> Self {
        Constraint::Unique(value)
    }
}

impl From<ForeignKey> for Constraint {
    fn from(value: ForeignKey) -> Self {
        Constraint::ForeignKey(value)
    }
}
