use super::{Name, Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    /// Name of the table
    pub name: Name,

    /// Whether or not to add an `IF EXISTS` clause.
    pub if_exists: bool,
}

impl Statement {
    pub fn drop_table(name: &str) -> Self {
        DropTable {
            name: name.into(),
            if_exists: false,
        }
        .into()
    }
}

impl From<DropTable> for Statement {
    fn from(value: DropTable) -> Self {
        Self::DropTable(value)
    }
}
