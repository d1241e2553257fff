use super::{Name, Statement};

/// A statement to alter a table.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    /// Current name of the table.
    pub name: Name,

    /// The alteration to apply.
    pub action: AlterTableAction,
}

/// The action to perform in an ALTER TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableAction {
    /// Rename the table to a new name.
    RenameTo(Name),
}

impl Statement {
    /// Renames a table.
    pub fn rename_table(from: &str, to: &str) -> Self {
        AlterTable {
            name: from.into(),
            action: AlterTableAction::RenameTo(to.into()),
        }
        .into()
    }
}

impl From<AlterTable> for Statement {
    fn from(value: AlterTable) -> Self {
        Self::AlterTable(value)
    }
}
