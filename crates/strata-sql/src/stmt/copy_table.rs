use super::{Name, Statement};

/// A statement to copy rows from one table to another.
///
/// Generates: `INSERT INTO "target" ("col1", "col2") SELECT "col1", "col2" FROM "source"`
#[derive(Debug, Clone, PartialEq)]
pub struct CopyTable {
    /// Source table name.
    pub source: Name,

    /// Target table name.
    pub target: Name,

    /// Columns present in both tables.
    pub columns: Vec<Name>,
}

impl Statement {
    /// Creates a statement that copies rows from one table to another.
    pub fn copy_table(source: &str, target: &str, columns: Vec<Name>) -> Self {
        CopyTable {
            source: source.into(),
            target: target.into(),
            columns,
        }
        .into()
    }
}

impl From<CopyTable> for Statement {
    fn from(value: CopyTable) -> Self {
        Self::CopyTable(value)
    }
}
