//! Turns table definitions into ordered physical operations.

use super::{
    app::{Definitions, FieldDefinition, TableDefinition},
    catalog,
    db::{self, Constraint, ForeignKey, Index, UniqueConstraint},
    operation::{inverse_of, SchemaOperation},
};
use crate::{migration::Checksum, Error, Result, Scope, Violation};

/// The definition a delta is computed against, and the checksum of the
/// ledger record that realized it.
#[derive(Debug, Clone, Copy)]
pub struct Prior<'a> {
    pub definition: &'a TableDefinition,
    pub checksum: &'a Checksum,
}

/// A compiled migration for one table in one scope.
#[derive(Debug, Clone)]
pub struct Plan {
    pub scope: Scope,

    /// The definition this plan realizes.
    pub definition: TableDefinition,

    /// Forward operations in execution order.
    pub operations: Vec<SchemaOperation>,

    /// Inverse operations, already reversed and ready to replay.
    pub inverse: Vec<SchemaOperation>,

    /// Physical table before the plan runs. `None` for a fresh table.
    pub before: Option<db::Table>,

    /// Physical table after the plan runs.
    pub after: db::Table,

    pub checksum: Checksum,

    /// Checksum of the record this plan builds on.
    pub parent: Option<Checksum>,
}

impl Plan {
    /// Logical table name.
    pub fn table(&self) -> &str {
        &self.definition.name
    }

    pub fn is_destructive(&self) -> bool {
        self.operations.iter().any(SchemaOperation::is_destructive)
    }
}

/// Compiles `definition` for `scope`.
///
/// Without a prior definition the plan creates the table. With one, the
/// plan is the delta between the two: dependents of changed or removed
/// fields are dropped first, then removed columns, then new and altered
/// columns, then the new dependents.
///
/// `definition` must already have passed [`verify`](super::verify::verify).
/// `tables` resolves the physical names of referenced tables.
pub fn compile(
    scope: Scope,
    definition: &TableDefinition,
    prior: Option<Prior<'_>>,
    tables: &dyn Definitions,
) -> Result<Plan> {
    let Some(prior) = prior else {
        let operations = create(definition, tables)?;
        let after = db::Table::replay(definition.table_name(), &operations)?
            .ok_or_else(|| crate::err!("plan for `{}` creates no table", definition.name))?;

        return finish(scope, definition, operations, None, after, None);
    };

    immutable(prior.definition, definition)?;

    let before = db::Table::replay(
        prior.definition.table_name(),
        &create(prior.definition, tables)?,
    )?
    .ok_or_else(|| crate::err!("prior definition of `{}` creates no table", definition.name))?;

    let operations = delta(prior.definition, definition, tables)?;

    let mut after = before.clone();
    for op in &operations {
        after.apply(op)?;
    }

    finish(
        scope,
        definition,
        operations,
        Some(before),
        after,
        Some(prior.checksum.clone()),
    )
}

fn finish(
    scope: Scope,
    definition: &TableDefinition,
    operations: Vec<SchemaOperation>,
    before: Option<db::Table>,
    after: db::Table,
    parent: Option<Checksum>,
) -> Result<Plan> {
    let checksum = Checksum::of(&operations, parent.as_ref())?;

    Ok(Plan {
        scope,
        definition: definition.clone(),
        inverse: inverse_of(&operations),
        operations,
        before,
        after,
        checksum,
        parent,
    })
}

fn create(definition: &TableDefinition, tables: &dyn Definitions) -> Result<Vec<SchemaOperation>> {
    let table = definition.table_name();

    let mut operations = vec![SchemaOperation::CreateTable {
        table: table.to_string(),
        primary_key: db::Column::primary_key(),
    }];

    for field in &definition.fields {
        operations.push(SchemaOperation::AddColumn {
            table: table.to_string(),
            column: catalog::column(field),
        });
    }

    for field in &definition.fields {
        operations.extend(dependents(definition, field, tables)?);
    }

    Ok(operations)
}

fn delta(
    from: &TableDefinition,
    to: &TableDefinition,
    tables: &dyn Definitions,
) -> Result<Vec<SchemaOperation>> {
    let table = to.table_name();

    let mut drop_dependents = vec![];
    let mut drop_columns = vec![];
    let mut columns = vec![];
    let mut add_dependents = vec![];

    for old in &from.fields {
        let old_dependents = dependents(from, old, tables)?;

        match to.field(&old.name) {
            Some(new) => {
                let new_dependents = dependents(to, new, tables)?;
                drop_dependents.extend(
                    old_dependents
                        .iter()
                        .filter(|op| !new_dependents.contains(op))
                        .map(SchemaOperation::inverse),
                );
            }
            None => {
                drop_dependents.extend(old_dependents.iter().map(SchemaOperation::inverse));
                drop_columns.push(SchemaOperation::DropColumn {
                    table: table.to_string(),
                    column: catalog::column(old),
                });
            }
        }
    }

    for new in &to.fields {
        let column = catalog::column(new);
        let new_dependents = dependents(to, new, tables)?;

        match from.field(&new.name) {
            Some(old) => {
                let previous = catalog::column(old);
                if previous != column {
                    columns.push(SchemaOperation::AlterColumn {
                        table: table.to_string(),
                        from: previous,
                        to: column,
                    });
                }

                let old_dependents = dependents(from, old, tables)?;
                add_dependents.extend(
                    new_dependents
                        .into_iter()
                        .filter(|op| !old_dependents.contains(op)),
                );
            }
            None => {
                columns.push(SchemaOperation::AddColumn {
                    table: table.to_string(),
                    column,
                });
                add_dependents.extend(new_dependents);
            }
        }
    }

    let mut operations = drop_dependents;
    operations.append(&mut drop_columns);
    operations.append(&mut columns);
    operations.append(&mut add_dependents);
    Ok(operations)
}

/// Index and constraint operations a field carries, in the order they are
/// created.
fn dependents(
    definition: &TableDefinition,
    field: &FieldDefinition,
    tables: &dyn Definitions,
) -> Result<Vec<SchemaOperation>> {
    let table = definition.table_name();
    let column = field.column_name();
    let mut operations = vec![];

    if field.is_unique {
        operations.push(SchemaOperation::AddConstraint {
            table: table.to_string(),
            constraint: Constraint::Unique(UniqueConstraint {
                name: super::unique_name(table, column),
                columns: vec![column.to_string()],
            }),
        });
    } else if field.is_indexed {
        // A unique constraint is already backed by an index
        operations.push(SchemaOperation::AddIndex {
            table: table.to_string(),
            index: Index::new(super::index_name(table, column), column),
        });
    }

    if let Some(reference) = &field.reference {
        let target = if reference.table == definition.name {
            Some(definition)
        } else {
            tables.definition(&reference.table)
        };

        let Some(target) = target else {
            return Err(Error::violation(
                format!("{}.reference", field.name),
                "reference",
                format!("table `{}` is not defined in this scope", reference.table),
            ));
        };

        let foreign_column = target
            .field(&reference.column)
            .map(FieldDefinition::column_name)
            .unwrap_or(reference.column.as_str());

        operations.push(SchemaOperation::AddConstraint {
            table: table.to_string(),
            constraint: Constraint::ForeignKey(ForeignKey {
                name: super::foreign_key_name(table, column),
                columns: vec![column.to_string()],
                foreign_table: target.table_name().to_string(),
                foreign_columns: vec![foreign_column.to_string()],
            }),
        });
    }

    Ok(operations)
}

/// Physical names cannot change through an update.
fn immutable(from: &TableDefinition, to: &TableDefinition) -> Result<()> {
    let mut violations = vec![];

    if from.storage_table != to.storage_table {
        violations.push(Violation::new(
            "storageTable",
            "immutable",
            "cannot change once the table exists",
        ));
    }

    for (i, new) in to.fields.iter().enumerate() {
        if let Some(old) = from.field(&new.name) {
            if old.storage_path != new.storage_path {
                violations.push(Violation::new(
                    format!("fields[{i}].storagePath"),
                    "immutable",
                    "cannot change once the column exists",
                ));
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(violations))
    }
}
