//! Lowering of schema operations into flavor-specific statements.
//!
//! Most operations map to one statement. Where a database cannot perform a
//! mutation in place (SQLite cannot alter columns or constraints), the
//! operation is lowered to a table rebuild: create the new shape under a
//! temporary name, copy the rows, drop the old table, rename, recreate the
//! indices.
//!
//! A fresh table is created with its columns and foreign keys in a single
//! `CREATE TABLE`, and drops leading up to a `DROP TABLE` are folded into it.

use crate::stmt::{AlterColumnChange, Check, ColumnDef, Name, Statement};

use strata_core::{
    driver::{Capability, Dialect},
    err,
    schema::{
        db::{Column, Constraint, Index, Table},
        operation::SchemaOperation,
    },
    Result,
};

/// Prefix of the temporary table used while rebuilding.
pub const REBUILD_PREFIX: &str = "__strata_rebuild_";

/// One statement produced for the operation at `position` of the lowered
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub position: usize,
    pub statement: Statement,
}

/// Lowers `operations` for a database with `capability`.
///
/// `before` is the physical state of the table the operations start from,
/// `None` when the first operation creates it.
pub fn lower(
    operations: &[SchemaOperation],
    before: Option<&Table>,
    capability: &Capability,
) -> Result<Vec<Step>> {
    let mut absorbed = absorbed_by_drop(operations);
    let mut state = before.cloned();
    let mut steps = vec![];

    for (position, op) in operations.iter().enumerate() {
        if absorbed[position] {
            continue;
        }

        let previous = state.take();

        let next = match op {
            SchemaOperation::CreateTable { table, primary_key } => {
                let mut created = Table {
                    columns: vec![primary_key.clone()],
                    ..Table::new(table.clone())
                };

                // Columns and foreign keys of a fresh table are declared in
                // its CREATE TABLE
                for (offset, following) in operations[position + 1..].iter().enumerate() {
                    if following.table() != table {
                        break;
                    }

                    match following {
                        SchemaOperation::AddColumn { .. }
                        | SchemaOperation::AddConstraint {
                            constraint: Constraint::ForeignKey(_),
                            ..
                        } => {
                            created.apply(following)?;
                            absorbed[position + 1 + offset] = true;
                        }
                        SchemaOperation::AddConstraint { .. } | SchemaOperation::AddIndex { .. } => {}
                        _ => break,
                    }
                }

                Some(created)
            }
            SchemaOperation::DropTable { .. } => None,
            op => {
                let mut table = previous.clone().ok_or_else(|| {
                    err!("{} on `{}` without a known table state", op.kind(), op.table())
                })?;
                table.apply(op)?;
                Some(table)
            }
        };

        let statements = lower_op(op, previous.as_ref(), next.as_ref(), capability)?;
        steps.extend(
            statements
                .into_iter()
                .map(|statement| Step { position, statement }),
        );

        state = next;
    }

    Ok(steps)
}

/// Marks the drops immediately preceding a `DropTable` of the same table.
/// Dropping the table removes them anyway.
fn absorbed_by_drop(operations: &[SchemaOperation]) -> Vec<bool> {
    let mut absorbed = vec![false; operations.len()];

    for (position, op) in operations.iter().enumerate() {
        if !matches!(op, SchemaOperation::DropTable { .. }) {
            continue;
        }

        for earlier in (0..position).rev() {
            let candidate = &operations[earlier];

            let droppable = matches!(
                candidate,
                SchemaOperation::DropColumn { .. }
                    | SchemaOperation::DropIndex { .. }
                    | SchemaOperation::DropConstraint { .. }
            );

            if candidate.table() != op.table() || !droppable {
                break;
            }

            absorbed[earlier] = true;
        }
    }

    absorbed
}

fn lower_op(
    op: &SchemaOperation,
    previous: Option<&Table>,
    next: Option<&Table>,
    capability: &Capability,
) -> Result<Vec<Statement>> {
    let mutations = &capability.schema_mutations;

    let statements = match op {
        SchemaOperation::CreateTable { table, .. } => match next {
            Some(next) => vec![Statement::create_table(table, next)],
            None => return Err(err!("CreateTable `{table}` produced no table")),
        },
        SchemaOperation::DropTable { table, .. } => vec![Statement::drop_table(table)],
        SchemaOperation::AddColumn { table, column } => {
            if column.requires_backfill() && !mutations.add_required_column {
                rebuild(previous, next)?
            } else {
                vec![Statement::add_column(table, column)]
            }
        }
        SchemaOperation::DropColumn { table, column } => vec![Statement::drop_column(table, column)],
        SchemaOperation::AlterColumn { table, from, to } => {
            if !mutations.alter_column {
                rebuild(previous, next)?
            } else {
                alter_column(table, from, to, capability.dialect)
            }
        }
        SchemaOperation::AddIndex { table, index } => vec![Statement::create_index(table, index)],
        SchemaOperation::DropIndex { table, index } => {
            vec![Statement::drop_index(table, &index.name)]
        }
        SchemaOperation::AddConstraint { table, constraint } => {
            match (constraint, mutations.alter_constraints) {
                (_, true) => vec![Statement::add_constraint(table, constraint)],
                (Constraint::Unique(unique), false) => vec![Statement::create_index(
                    table,
                    &Index {
                        name: unique.name.clone(),
                        columns: unique.columns.clone(),
                        unique: true,
                    },
                )],
                (Constraint::ForeignKey(_), false) => rebuild(previous, next)?,
            }
        }
        SchemaOperation::DropConstraint { table, constraint } => {
            match (constraint, mutations.alter_constraints) {
                (_, true) => vec![Statement::drop_constraint(table, constraint)],
                (Constraint::Unique(unique), false) => {
                    vec![Statement::drop_index(table, &unique.name)]
                }
                (Constraint::ForeignKey(_), false) => rebuild(previous, next)?,
            }
        }
    };

    Ok(statements)
}

fn alter_column(table: &str, from: &Column, to: &Column, dialect: Dialect) -> Vec<Statement> {
    let from_check = Check::from_column(table, from);
    let to_check = Check::from_column(table, to);
    let check_changed = from_check != to_check;

    let mut statements = vec![];

    if check_changed {
        if let Some(check) = from_check {
            statements.push(Statement::drop_check(table, check.name));
        }
    }

    if dialect == Dialect::Mysql {
        // MySQL redefines the column in one statement; omitted properties
        // revert to their defaults
        let def = ColumnDef::from_schema(table, to).without_check();
        statements.push(Statement::alter_column(
            table,
            &to.name,
            AlterColumnChange::Redefine(def),
        ));
    } else {
        if from.ty != to.ty {
            statements.push(Statement::alter_column(
                table,
                &to.name,
                AlterColumnChange::SetType(to.ty.clone()),
            ));
        }

        if from.nullable != to.nullable {
            statements.push(Statement::alter_column(
                table,
                &to.name,
                AlterColumnChange::SetNotNull(!to.nullable),
            ));
        }

        if from.default != to.default {
            statements.push(Statement::alter_column(
                table,
                &to.name,
                AlterColumnChange::SetDefault(to.default.clone()),
            ));
        }
    }

    if check_changed {
        if let Some(check) = to_check {
            statements.push(Statement::add_check(table, check));
        }
    }

    statements
}

/// Replaces `previous` with `next` by copying rows through a temporary
/// table.
fn rebuild(previous: Option<&Table>, next: Option<&Table>) -> Result<Vec<Statement>> {
    let (Some(previous), Some(next)) = (previous, next) else {
        return Err(err!("table rebuild without a known table state"));
    };

    let temporary = format!("{REBUILD_PREFIX}{}", next.name);

    let common = next
        .columns
        .iter()
        .filter(|column| previous.column(&column.name).is_some())
        .map(|column| Name::from(&column.name))
        .collect();

    let mut statements = vec![
        Statement::create_table(&temporary, next),
        Statement::copy_table(&previous.name, &temporary, common),
        Statement::drop_table(&previous.name),
        Statement::rename_table(&temporary, &next.name),
    ];

    for index in &next.indices {
        statements.push(Statement::create_index(&next.name, index));
    }

    for constraint in &next.constraints {
        if let Constraint::Unique(unique) = constraint {
            statements.push(Statement::create_index(
                &next.name,
                &Index {
                    name: unique.name.clone(),
                    columns: unique.columns.clone(),
                    unique: true,
                },
            ));
        }
    }

    Ok(statements)
}
