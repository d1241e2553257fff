use super::db::{Column, Constraint, Index};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One atomic physical change with a computable inverse.
///
/// Every variant carries the full physical definition it touches, so the
/// inverse of a drop can recreate exactly what was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SchemaOperation {
    /// Create a table holding only its system primary key.
    CreateTable { table: String, primary_key: Column },

    /// Drop a table holding only its system primary key.
    DropTable { table: String, primary_key: Column },

    AddColumn { table: String, column: Column },

    DropColumn { table: String, column: Column },

    AlterColumn {
        table: String,
        from: Column,
        to: Column,
    },

    AddIndex { table: String, index: Index },

    DropIndex { table: String, index: Index },

    AddConstraint {
        table: String,
        constraint: Constraint,
    },

    DropConstraint {
        table: String,
        constraint: Constraint,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    AlterColumn,
    AddIndex,
    DropIndex,
    AddConstraint,
    DropConstraint,
}

impl SchemaOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable { .. } => OperationKind::CreateTable,
            Self::DropTable { .. } => OperationKind::DropTable,
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::AlterColumn { .. } => OperationKind::AlterColumn,
            Self::AddIndex { .. } => OperationKind::AddIndex,
            Self::DropIndex { .. } => OperationKind::DropIndex,
            Self::AddConstraint { .. } => OperationKind::AddConstraint,
            Self::DropConstraint { .. } => OperationKind::DropConstraint,
        }
    }

    /// Physical name of the table the operation applies to.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddConstraint { table, .. }
            | Self::DropConstraint { table, .. } => table,
        }
    }

    /// `table` for table operations, `table.object` for everything else.
    pub fn target(&self) -> String {
        let object = match self {
            Self::CreateTable { .. } | Self::DropTable { .. } => None,
            Self::AddColumn { column, .. } | Self::DropColumn { column, .. } => Some(&column.name),
            Self::AlterColumn { to, .. } => Some(&to.name),
            Self::AddIndex { index, .. } | Self::DropIndex { index, .. } => Some(&index.name),
            Self::AddConstraint { constraint, .. } | Self::DropConstraint { constraint, .. } => {
                return format!("{}.{}", self.table(), constraint.name())
            }
        };

        match object {
            Some(object) => format!("{}.{}", self.table(), object),
            None => self.table().to_string(),
        }
    }

    /// Returns the operation that undoes this one.
    pub fn inverse(&self) -> SchemaOperation {
        match self.clone() {
            Self::CreateTable { table, primary_key } => Self::DropTable { table, primary_key },
            Self::DropTable { table, primary_key } => Self::CreateTable { table, primary_key },
            Self::AddColumn { table, column } => Self::DropColumn { table, column },
            Self::DropColumn { table, column } => Self::AddColumn { table, column },
            Self::AlterColumn { table, from, to } => Self::AlterColumn {
                table,
                from: to,
                to: from,
            },
            Self::AddIndex { table, index } => Self::DropIndex { table, index },
            Self::DropIndex { table, index } => Self::AddIndex { table, index },
            Self::AddConstraint { table, constraint } => Self::DropConstraint { table, constraint },
            Self::DropConstraint { table, constraint } => Self::AddConstraint { table, constraint },
        }
    }

    /// Destructive operations lose stored data and need explicit
    /// confirmation.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }
}

/// Computes the inverse sequence of `operations`, in replay order.
pub fn inverse_of(operations: &[SchemaOperation]) -> Vec<SchemaOperation> {
    operations.iter().rev().map(SchemaOperation::inverse).collect()
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::CreateTable => "CreateTable",
            OperationKind::DropTable => "DropTable",
            OperationKind::AddColumn => "AddColumn",
            OperationKind::DropColumn => "DropColumn",
            OperationKind::AlterColumn => "AlterColumn",
            OperationKind::AddIndex => "AddIndex",
            OperationKind::DropIndex => "DropIndex",
            OperationKind::AddConstraint => "AddConstraint",
            OperationKind::DropConstraint => "DropConstraint",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
