use super::{ColumnDef, Name, Statement};

use strata_core::schema::db::{ForeignKey, Table};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    /// Name of the table
    pub name: Name,

    /// Column definitions
    pub columns: Vec<ColumnDef>,

    /// Foreign keys declared inline with the table.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Statement {
    /// Creates `table` with all its columns and foreign keys under the name
    /// `name`.
    pub fn create_table(name: &str, table: &Table) -> Self {
        CreateTable {
            name: name.into(),
            columns: table
                .columns
                .iter()
                .map(|column| ColumnDef::from_schema(&table.name, column))
                .collect(),
            foreign_keys: table.foreign_keys().cloned().collect(),
        }
        .into()
    }
}

impl From<CreateTable> for Statement {
    fn from(value: CreateTable) -> Self {
        Self::CreateTable(value)
    }
}
