use super::{Column, Constraint, Index};
use crate::{bail, schema::operation::SchemaOperation, Result};

use serde::{Deserialize, Serialize};

/// A database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Name of the table
    pub name: String,

    /// The table's columns, the system primary key first
    pub columns: Vec<Column>,

    pub indices: Vec<Index>,

    pub constraints: Vec<Constraint>,
}

impl Table {
    /// A table holding only the system primary key.
    pub fn new(name: impl Into<String>) -> Table {
        Table {
            name: name.into(),
            columns: vec![Column::primary_key()],
            indices: vec![],
            constraints: vec![],
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indices.iter().find(|index| index.name == name)
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|constraint| constraint.name() == name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &super::ForeignKey> {
        self.constraints.iter().filter_map(Constraint::as_foreign_key)
    }

    /// Builds the state produced by replaying `operations` from nothing.
    pub fn replay<'a>(
        name: &str,
        operations: impl IntoIterator<Item = &'a SchemaOperation>,
    ) -> Result<Option<Table>> {
        let mut table: Option<Table> = None;

        for op in operations {
            if op.table() != name {
                continue;
            }

            match op {
                SchemaOperation::CreateTable { table: t, primary_key } => {
                    if table.is_some() {
                        bail!("table `{t}` created twice");
                    }
                    table = Some(Table {
                        columns: vec![primary_key.clone()],
                        ..Table::new(t.clone())
                    });
                }
                SchemaOperation::DropTable { .. } => table = None,
                op => match &mut table {
                    Some(table) => table.apply(op)?,
                    None => bail!("{} on missing table `{name}`", op.kind()),
                },
            }
        }

        Ok(table)
    }

    /// Applies a column, index or constraint operation to this table.
    ///
    /// Fails when the operation does not fit the current state, for example
    /// adding a column that already exists.
    pub fn apply(&mut self, op: &SchemaOperation) -> Result<()> {
        if op.table() != self.name {
            bail!(
                "{} targets `{}`, not `{}`",
                op.kind(),
                op.table(),
                self.name
            );
        }

        match op {
            SchemaOperation::CreateTable { .. } | SchemaOperation::DropTable { .. } => {
                bail!("{} cannot be applied to an existing table", op.kind())
            }
            SchemaOperation::AddColumn { column, .. } => {
                if self.column(&column.name).is_some() {
                    bail!("column `{}.{}` already exists", self.name, column.name);
                }
                self.columns.push(column.clone());
            }
            SchemaOperation::DropColumn { column, .. } => {
                let Some(pos) = self.columns.iter().position(|c| c.name == column.name) else {
                    bail!("column `{}.{}` does not exist", self.name, column.name);
                };
                if self.indices.iter().any(|index| index.covers(&column.name))
                    || self.constraints.iter().any(|c| c.covers(&column.name))
                {
                    bail!(
                        "column `{}.{}` is still referenced by an index or constraint",
                        self.name,
                        column.name
                    );
                }
                self.columns.remove(pos);
            }
            SchemaOperation::AlterColumn { from, to, .. } => {
                if from.name != to.name {
                    bail!("renaming `{}` to `{}` is not supported", from.name, to.name);
                }
                let Some(column) = self.columns.iter_mut().find(|c| c.name == from.name) else {
                    bail!("column `{}.{}` does not exist", self.name, from.name);
                };
                *column = to.clone();
            }
            SchemaOperation::AddIndex { index, .. } => {
                if self.index(&index.name).is_some() {
                    bail!("index `{}` already exists", index.name);
                }
                self.check_columns(&index.columns)?;
                self.indices.push(index.clone());
            }
            SchemaOperation::DropIndex { index, .. } => {
                let before = self.indices.len();
                self.indices.retain(|i| i.name != index.name);
                if self.indices.len() == before {
                    bail!("index `{}` does not exist", index.name);
                }
            }
            SchemaOperation::AddConstraint { constraint, .. } => {
                if self.constraint(constraint.name()).is_some() {
                    bail!("constraint `{}` already exists", constraint.name());
                }
                self.check_columns(constraint.columns())?;
                self.constraints.push(constraint.clone());
            }
            SchemaOperation::DropConstraint { constraint, .. } => {
                let before = self.constraints.len();
                self.constraints.retain(|c| c.name() != constraint.name());
                if self.constraints.len() == before {
                    bail!("constraint `{}` does not exist", constraint.name());
                }
            }
        }

        Ok(())
    }

    fn check_columns(&self, columns: &[String]) -> Result<()> {
        for name in columns {
            if self.column(name).is_none() {
                bail!("column `{}.{}` does not exist", self.name, name);
            }
        }
        Ok(())
    }
}
