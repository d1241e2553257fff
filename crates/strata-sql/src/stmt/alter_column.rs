use super::{ColumnDef, Name, Statement};

use strata_core::schema::db::{Literal, Type};

/// A statement to alter one property of a column.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterColumn {
    /// Name of the table containing the column.
    pub table: Name,

    pub column: Name,

    pub change: AlterColumnChange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterColumnChange {
    /// Convert the column to a new type.
    SetType(Type),

    /// Add or remove `NOT NULL`.
    SetNotNull(bool),

    /// Replace or remove the default.
    SetDefault(Option<Literal>),

    /// Redefine the whole column in one statement (MySQL `MODIFY COLUMN`).
    Redefine(ColumnDef),
}

impl Statement {
    pub fn alter_column(table: &str, column: &str, change: AlterColumnChange) -> Self {
        AlterColumn {
            table: table.into(),
            column: column.into(),
            change,
        }
        .into()
    }
}

impl From<AlterColumn> for Statement {
    fn from(value: AlterColumn) -> Self {
        Self::AlterColumn(value)
    }
}
