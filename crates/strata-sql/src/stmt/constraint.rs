use super::{Name, Statement};

use strata_core::schema::db::Constraint;

/// A statement to add a unique or foreign key constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct AddConstraint {
    pub table: Name,
    pub constraint: Constraint,
}

/// A statement to drop a unique or foreign key constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct DropConstraint {
    pub table: Name,
    pub constraint: Constraint,
}

impl Statement {
    pub fn add_constraint(table: &str, constraint: &Constraint) -> Self {
        AddConstraint {
            table: table.into(),
            constraint: constraint.clone(),
        }
        .into()
    }

    pub fn drop_constraint(table: &str, constraint: &Constraint) -> Self {
        DropConstraint {
            table: table.into(),
            constraint: constraint.clone(),
        }
        .into()
    }
}

impl From<AddConstraint> for Statement {
    fn from(value: AddConstraint) -> Self {
        Self::AddConstraint(value)
    }
}

impl From<DropConstraint> for Statement {
    fn from(value: DropConstraint) -> Self {
        Self::DropConstraint(value)
    }
}
