//! Reads a table's physical schema back from `information_schema`.

use mysql_async::{prelude::Queryable, Conn};
use std::collections::HashSet;
use strata_core::{
    schema::{
        check_name,
        db::{Column, Constraint, ForeignKey, Index, Literal, Table, Type, UniqueConstraint},
    },
    Error, Result,
};

pub(crate) async fn table(conn: &mut Conn, name: &str) -> Result<Option<Table>> {
    let columns: Vec<(String, String, String, Option<String>, String)> = conn
        .exec(
            "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, EXTRA
             FROM information_schema.COLUMNS
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
             ORDER BY ORDINAL_POSITION",
            (name,),
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    if columns.is_empty() {
        return Ok(None);
    }

    let checks: Vec<(String, String)> = conn
        .exec(
            "SELECT cc.CONSTRAINT_NAME, cc.CHECK_CLAUSE
             FROM information_schema.CHECK_CONSTRAINTS cc
             JOIN information_schema.TABLE_CONSTRAINTS tc
               ON tc.CONSTRAINT_SCHEMA = cc.CONSTRAINT_SCHEMA
              AND tc.CONSTRAINT_NAME = cc.CONSTRAINT_NAME
             WHERE tc.TABLE_SCHEMA = DATABASE() AND tc.TABLE_NAME = ?",
            (name,),
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    let mut table = Table {
        columns: vec![],
        ..Table::new(name)
    };

    for (column, declared, nullable, default, extra) in columns {
        if column == "id" && extra.contains("auto_increment") {
            table.columns.push(Column::primary_key());
            continue;
        }

        let ty = Type::parse_sql(&declared).ok_or_else(|| {
            Error::unsupported_feature(format!(
                "column `{name}.{column}` has unsupported type `{declared}`"
            ))
        })?;

        let check = check_name(name, &column);
        let allowed = checks
            .iter()
            .find(|(constraint, _)| *constraint == check)
            .map(|(_, clause)| literals(clause))
            .unwrap_or_default();

        table.columns.push(Column {
            name: column,
            ty,
            nullable: nullable == "YES",
            primary_key: false,
            auto_increment: false,
            default: default.map(Literal::Raw),
            allowed,
        });
    }

    let foreign_keys: Vec<(String, String, String, String)> = conn
        .exec(
            "SELECT CONSTRAINT_NAME, COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
             FROM information_schema.KEY_COLUMN_USAGE
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
               AND REFERENCED_TABLE_NAME IS NOT NULL
             ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION",
            (name,),
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    let indices: Vec<(String, String, i64)> = conn
        .exec(
            "SELECT INDEX_NAME, COLUMN_NAME, NON_UNIQUE
             FROM information_schema.STATISTICS
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY'
             ORDER BY INDEX_NAME, SEQ_IN_INDEX",
            (name,),
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    // MySQL backs every foreign key with an index of the same name
    let fk_names: HashSet<&str> = foreign_keys.iter().map(|(name, ..)| name.as_str()).collect();
    let unique: HashSet<&str> = indices
        .iter()
        .filter(|(_, _, non_unique)| *non_unique == 0)
        .map(|(name, ..)| name.as_str())
        .collect();

    let groups = grouped(
        indices
            .iter()
            .filter(|(name, ..)| !fk_names.contains(name.as_str()))
            .map(|(name, column, _)| (name.clone(), column.clone())),
    );

    for (name, columns) in groups {
        let is_unique = unique.contains(name.as_str());

        if is_unique && name.starts_with("uq_") {
            table
                .constraints
                .push(Constraint::Unique(UniqueConstraint { name, columns }));
        } else {
            table.indices.push(Index {
                name,
                columns,
                unique: is_unique,
            });
        }
    }

    let mut current: Option<ForeignKey> = None;
    for (constraint, column, foreign_table, foreign_column) in foreign_keys {
        if let Some(fk) = current.as_mut().filter(|fk| fk.name == constraint) {
            fk.columns.push(column);
            fk.foreign_columns.push(foreign_column);
            continue;
        }

        if let Some(fk) = current.take() {
            table.constraints.push(Constraint::ForeignKey(fk));
        }

        current = Some(ForeignKey {
            name: constraint,
            columns: vec![column],
            foreign_table,
            foreign_columns: vec![foreign_column],
        });
    }

    if let Some(fk) = current {
        table.constraints.push(Constraint::ForeignKey(fk));
    }

    Ok(Some(table))
}

/// Single-quoted literals in a check clause such as
/// ``(`status` in (_utf8mb4'draft',_utf8mb4'paid'))``.
fn literals(clause: &str) -> Vec<String> {
    let mut values = vec![];
    let mut chars = clause.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }

        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    value.push('\'');
                }
                '\'' => break,
                c => value.push(c),
            }
        }
        values.push(value);
    }

    values
}

fn grouped(rows: impl Iterator<Item = (String, String)>) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = vec![];

    for (name, column) in rows {
        if let Some((_, columns)) = groups.last_mut().filter(|(last, _)| *last == name) {
            columns.push(column);
            continue;
        }
        groups.push((name, vec![column]));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_check_clause_literals() {
        let clause = r"(`status` in (_utf8mb4'draft',_utf8mb4'it\'s paid'))";
        assert_eq!(literals(clause), ["draft", "it's paid"]);
    }
}
