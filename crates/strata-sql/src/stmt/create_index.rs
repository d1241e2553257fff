use super::{Name, Statement};

use strata_core::schema::db::Index;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    /// Name of the index
    pub name: Name,

    /// Which table to index
    pub on: Name,

    /// The columns to index
    pub columns: Vec<Name>,

    /// When true, the index is unique
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndex {
    pub name: Name,

    /// Table the index belongs to. MySQL needs it to drop the index.
    pub on: Name,
}

impl Statement {
    pub fn create_index(table: &str, index: &Index) -> Self {
        CreateIndex {
            name: Name::from(&index.name),
            on: table.into(),
            columns: index.columns.iter().map(Name::from).collect(),
            unique: index.unique,
        }
        .into()
    }

    pub fn drop_index(table: &str, name: &str) -> Self {
        DropIndex {
            name: name.into(),
            on: table.into(),
        }
        .into()
    }
}

impl From<CreateIndex> for Statement {
    fn from(value: CreateIndex) -> Self {
        Self::CreateIndex(value)
    }
}

impl From<DropIndex> for Statement {
    fn from(value: DropIndex) -> Self {
        Self::DropIndex(value)
    }
}
