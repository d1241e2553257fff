use super::{Check, Name};

use strata_core::schema::{
    check_name,
    db::{Column, Literal, Type},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Name,
    pub ty: Type,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub default: Option<Literal>,
    pub check: Option<Check>,
}

impl ColumnDef {
    /// Builds the definition of `column` on `table`. A choice column's
    /// allowed values become a named check constraint.
    pub fn from_schema(table: &str, column: &Column) -> ColumnDef {
        ColumnDef {
            name: Name::from(&column.name),
            ty: column.ty.clone(),
            not_null: !column.nullable,
            primary_key: column.primary_key,
            auto_increment: column.auto_increment,
            default: column.default.clone(),
            check: Check::from_column(table, column),
        }
    }

    /// The same column without its check constraint.
    pub fn without_check(&self) -> ColumnDef {
        ColumnDef {
            check: None,
            ..self.clone()
        }
    }
}

impl Check {
    pub fn from_column(table: &str, column: &Column) -> Option<Check> {
        (!column.allowed.is_empty()).then(|| Check {
            name: Name(check_name(table, &column.name)),
            column: Name::from(&column.name),
            values: column.allowed.clone(),
        })
    }
}
