//! Reads a table's physical schema back from the SQLite catalog.

use rusqlite::{params, Connection};
use strata_core::{
    schema::{
        db::{Column, Constraint, ForeignKey, Index, Literal, Table, Type, UniqueConstraint},
        foreign_key_name,
    },
    Error, Result,
};

pub(crate) fn table(connection: &Connection, name: &str, sql: &str) -> Result<Table> {
    let mut table = Table {
        columns: vec![],
        ..Table::new(name)
    };

    let mut stmt = connection
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk
             FROM pragma_table_info(?1) ORDER BY cid",
        )
        .map_err(Error::driver_operation_failed)?;

    let rows = stmt
        .query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .map_err(Error::driver_operation_failed)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Error::driver_operation_failed)?;

    for (column, declared, not_null, default, pk) in rows {
        if pk != 0 {
            table.columns.push(Column {
                name: column,
                ..Column::primary_key()
            });
            continue;
        }

        let ty = Type::parse_sql(&declared).ok_or_else(|| {
            Error::unsupported_feature(format!(
                "column `{name}.{column}` has unsupported type `{declared}`"
            ))
        })?;

        table.columns.push(Column {
            allowed: checked_values(sql, &column),
            name: column,
            ty,
            nullable: !not_null,
            primary_key: false,
            auto_increment: false,
            default: default.map(Literal::Raw),
        });
    }

    indices(connection, &mut table)?;
    foreign_keys(connection, &mut table)?;

    Ok(table)
}

fn indices(connection: &Connection, table: &mut Table) -> Result<()> {
    let mut stmt = connection
        .prepare("SELECT name, \"unique\" FROM pragma_index_list(?1) WHERE origin = 'c' ORDER BY name")
        .map_err(Error::driver_operation_failed)?;

    let listed = stmt
        .query_map(params![table.name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })
        .map_err(Error::driver_operation_failed)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Error::driver_operation_failed)?;

    let mut columns_of = connection
        .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
        .map_err(Error::driver_operation_failed)?;

    for (name, unique) in listed {
        let columns = columns_of
            .query_map(params![name], |row| row.get::<_, String>(0))
            .map_err(Error::driver_operation_failed)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::driver_operation_failed)?;

        // Unique constraints are stored as unique indices
        if unique && name.starts_with("uq_") {
            table
                .constraints
                .push(Constraint::Unique(UniqueConstraint { name, columns }));
        } else {
            table.indices.push(Index {
                name,
                columns,
                unique,
            });
        }
    }

    Ok(())
}

fn foreign_keys(connection: &Connection, table: &mut Table) -> Result<()> {
    let mut stmt = connection
        .prepare(
            "SELECT id, \"table\", \"from\", \"to\"
             FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )
        .map_err(Error::driver_operation_failed)?;

    let rows = stmt
        .query_map(params![table.name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(Error::driver_operation_failed)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Error::driver_operation_failed)?;

    let mut current: Option<(i64, ForeignKey)> = None;

    for (id, foreign_table, from, to) in rows {
        let to = to.unwrap_or_else(|| "id".to_string());

        if let Some((_, fk)) = current.as_mut().filter(|(current_id, _)| *current_id == id) {
            fk.columns.push(from);
            fk.foreign_columns.push(to);
            continue;
        }

        if let Some((_, fk)) = current.take() {
            table.constraints.push(Constraint::ForeignKey(fk));
        }

        // SQLite does not keep foreign key names
        current = Some((
            id,
            ForeignKey {
                name: foreign_key_name(&table.name, &from),
                columns: vec![from],
                foreign_table,
                foreign_columns: vec![to],
            },
        ));
    }

    if let Some((_, fk)) = current {
        table.constraints.push(Constraint::ForeignKey(fk));
    }

    Ok(())
}

/// Values of a `CHECK ("column" IN ('a', 'b'))` constraint in a
/// `CREATE TABLE` statement.
fn checked_values(sql: &str, column: &str) -> Vec<String> {
    let needle = format!("CHECK (\"{}\" IN (", column.replace('"', "\"\""));

    let Some(start) = sql.find(&needle) else {
        return vec![];
    };

    let mut values = vec![];
    let mut chars = sql[start + needle.len()..].chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                let mut value = String::new();
                while let Some(c) = chars.next() {
                    if c == '\'' {
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    value.push(c);
                }
                values.push(value);
            }
            ')' => break,
            _ => {}
        }
    }

    values
}
