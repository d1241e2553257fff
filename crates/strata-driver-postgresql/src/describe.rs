//! Reads a table's physical schema back from the PostgreSQL catalog.

use strata_core::{
    schema::{
        check_name,
        db::{Column, Constraint, ForeignKey, Index, Literal, Table, Type, UniqueConstraint},
    },
    Error, Result,
};
use tokio_postgres::Client;

pub(crate) async fn table(client: &Client, name: &str) -> Result<Option<Table>> {
    let rows = client
        .query(
            "SELECT column_name::text, data_type::text,
                    character_maximum_length::int4, numeric_precision::int4, numeric_scale::int4,
                    is_nullable::text = 'YES', column_default::text, is_identity::text = 'YES'
             FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name = $1
             ORDER BY ordinal_position",
            &[&name],
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    if rows.is_empty() {
        return Ok(None);
    }

    let checks = checks(client, name).await?;

    let mut table = Table {
        columns: vec![],
        ..Table::new(name)
    };

    for row in rows {
        let column: String = row.get(0);
        let data_type: String = row.get(1);
        let length: Option<i32> = row.get(2);
        let precision: Option<i32> = row.get(3);
        let scale: Option<i32> = row.get(4);
        let nullable: bool = row.get(5);
        let default: Option<String> = row.get(6);
        let identity: bool = row.get(7);

        if identity && column == "id" {
            table.columns.push(Column::primary_key());
            continue;
        }

        let declared = match (data_type.as_str(), length, precision, scale) {
            ("character varying", Some(length), _, _) => format!("VARCHAR({length})"),
            ("numeric", _, Some(precision), Some(scale)) => format!("NUMERIC({precision},{scale})"),
            (data_type, ..) => data_type.to_string(),
        };

        let ty = Type::parse_sql(&declared).ok_or_else(|| {
            Error::unsupported_feature(format!(
                "column `{name}.{column}` has unsupported type `{data_type}`"
            ))
        })?;

        let allowed = checks
            .iter()
            .find(|(constraint, _)| *constraint == check_name(name, &column))
            .map(|(_, values)| values.clone())
            .unwrap_or_default();

        table.columns.push(Column {
            name: column,
            ty,
            nullable,
            primary_key: false,
            auto_increment: false,
            default: default.map(Literal::Raw),
            allowed,
        });
    }

    let uniques = client
        .query(
            "SELECT tc.constraint_name::text, kcu.column_name::text
             FROM information_schema.table_constraints tc
             JOIN information_schema.key_column_usage kcu
               ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema
             WHERE tc.table_schema = current_schema() AND tc.table_name = $1
               AND tc.constraint_type = 'UNIQUE'
             ORDER BY tc.constraint_name, kcu.ordinal_position",
            &[&name],
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    for (name, columns) in grouped(uniques.iter().map(|row| (row.get(0), row.get(1)))) {
        table
            .constraints
            .push(Constraint::Unique(UniqueConstraint { name, columns }));
    }

    let foreign_keys = client
        .query(
            "SELECT tc.constraint_name::text, kcu.column_name::text,
                    ccu.table_name::text, ccu.column_name::text
             FROM information_schema.table_constraints tc
             JOIN information_schema.key_column_usage kcu
               ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema
             JOIN information_schema.constraint_column_usage ccu
               ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema
             WHERE tc.table_schema = current_schema() AND tc.table_name = $1
               AND tc.constraint_type = 'FOREIGN KEY'
             ORDER BY tc.constraint_name, kcu.ordinal_position",
            &[&name],
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    let mut foreign_table = std::collections::HashMap::new();
    let mut foreign_columns = std::collections::HashMap::new();
    for row in &foreign_keys {
        let constraint: String = row.get(0);
        foreign_table.insert(constraint.clone(), row.get::<_, String>(2));
        foreign_columns
            .entry(constraint)
            .or_insert_with(Vec::new)
            .push(row.get::<_, String>(3));
    }

    for (name, columns) in grouped(foreign_keys.iter().map(|row| (row.get(0), row.get(1)))) {
        table.constraints.push(Constraint::ForeignKey(ForeignKey {
            foreign_table: foreign_table.remove(&name).unwrap_or_default(),
            foreign_columns: foreign_columns.remove(&name).unwrap_or_default(),
            name,
            columns,
        }));
    }

    // Indices not backing a constraint
    let indices = client
        .query(
            "SELECT i.relname::text, a.attname::text, ix.indisunique
             FROM pg_index ix
             JOIN pg_class t ON t.oid = ix.indrelid
             JOIN pg_class i ON i.oid = ix.indexrelid
             JOIN pg_namespace n ON n.oid = t.relnamespace
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
             WHERE n.nspname = current_schema() AND t.relname = $1
               AND NOT ix.indisprimary
               AND NOT EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conindid = ix.indexrelid)
             ORDER BY i.relname, a.attnum",
            &[&name],
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    let unique: std::collections::HashSet<String> = indices
        .iter()
        .filter(|row| row.get::<_, bool>(2))
        .map(|row| row.get(0))
        .collect();

    for (name, columns) in grouped(indices.iter().map(|row| (row.get(0), row.get(1)))) {
        table.indices.push(Index {
            unique: unique.contains(&name),
            name,
            columns,
        });
    }

    Ok(Some(table))
}

/// Named check constraints of `table` with the string literals they allow.
async fn checks(client: &Client, table: &str) -> Result<Vec<(String, Vec<String>)>> {
    let rows = client
        .query(
            "SELECT c.conname::text, pg_get_constraintdef(c.oid)
             FROM pg_constraint c
             JOIN pg_class t ON t.oid = c.conrelid
             JOIN pg_namespace n ON n.oid = t.relnamespace
             WHERE n.nspname = current_schema() AND t.relname = $1 AND c.contype = 'c'",
            &[&table],
        )
        .await
        .map_err(Error::driver_operation_failed)?;

    Ok(rows
        .iter()
        .map(|row| (row.get(0), literals(row.get(1))))
        .collect())
}

/// Single-quoted literals in a constraint definition, in order.
fn literals(definition: &str) -> Vec<String> {
    let mut values = vec![];
    let mut chars = definition.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }

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

    values
}

/// Groups consecutive `(name, column)` rows by name.
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
