use super::{Name, Statement};

/// `CONSTRAINT name CHECK (column IN (values))`
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: Name,
    pub column: Name,
    pub values: Vec<String>,
}

/// Adds a check constraint to an existing table.
#[derive(Debug, Clone, PartialEq)]
pub struct AddCheck {
    pub table: Name,
    pub check: Check,
}

/// Drops a check constraint by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DropCheck {
    pub table: Name,
    pub name: Name,
}

impl Statement {
    pub fn add_check(table: &str, check: Check) -> Self {
        AddCheck {
            table: table.into(),
            check,
        }
        .into()
    }

    pub fn drop_check(table: &str, name: Name) -> Self {
        DropCheck {
            table: table.into(),
            name,
        }
        .into()
    }
}

impl From<AddCheck> for Statement {
    fn from(value: AddCheck) -> Self {
        Self::AddCheck(value)
    }
}

impl From<DropCheck> for Statement {
    fn from(value: DropCheck) -> Self {
        Self::DropCheck(value)
    }
}
