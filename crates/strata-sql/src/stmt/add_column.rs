use super::{ColumnDef, Name, Statement};

use strata_core::schema::db::Column;

/// A statement to add a column to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct AddColumn {
    /// Name of the table to add the column to.
    pub table: Name,

    /// The column definition.
    pub column: ColumnDef,
}

/// A statement to drop a column from a table.
#[derive(Debug, Clone, PartialEq)]
pub struct DropColumn {
    pub table: Name,

    pub column: Name,

    /// Whether or not to add an `IF EXISTS` clause.
    pub if_exists: bool,
}

impl Statement {
    /// Adds a column to a table.
    pub fn add_column(table: &str, column: &Column) -> Self {
        AddColumn {
            table: table.into(),
            column: ColumnDef::from_schema(table, column),
        }
        .into()
    }

    /// Drops a column.
    pub fn drop_column(table: &str, column: &Column) -> Self {
        DropColumn {
            table: table.into(),
            column: Name::from(&column.name),
            if_exists: false,
        }
        .into()
    }
}

impl From<AddColumn> for Statement {
    fn from(value: AddColumn) -> Self {
        Self::AddColumn(value)
    }
}

impl From<DropColumn> for Statement {
    fn from(value: DropColumn) -> Self {
        Self::DropColumn(value)
    }
}
