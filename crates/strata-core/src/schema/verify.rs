//! Identifier and type rules for table definitions.
//!
//! [`verify`] is pure: it evaluates every rule in [`TABLE_RULES`] and
//! [`FIELD_RULES`] and reports all violations at once. The remaining
//! functions are context rules evaluated once the target database is known.

use super::{
    app::{Definitions, FieldDefinition, TableDefinition},
    catalog, check_name, db,
    operation::SchemaOperation,
};
use crate::{driver::Capability, Error, Result, Violation};

use std::collections::{HashMap, HashSet};

pub const IDENTIFIER_PATTERN: &str = "^[A-Za-z_][A-Za-z0-9_]*$";

pub const MAX_TABLE_NAME: usize = 100;
pub const MAX_FIELD_NAME: usize = 100;
pub const MAX_LABEL: usize = 255;
pub const MAX_DISPLAY_NAME: usize = 255;
pub const MAX_CATEGORY: usize = 100;
pub const MAX_OPTION: usize = 255;

/// The system primary key column every table carries.
pub const RESERVED_COLUMN: &str = "id";

/// Returns `true` if `s` matches [`IDENTIFIER_PATTERN`].
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One row of a rule table: the rule name reported in violations, the path
/// of the checked attribute and a predicate returning the failure message.
pub struct Rule<T: ?Sized + 'static> {
    pub rule: &'static str,
    pub path: &'static str,
    pub check: fn(&T) -> Option<String>,
}

pub static TABLE_RULES: &[Rule<TableDefinition>] = &[
    Rule {
        rule: "identifier",
        path: "name",
        check: |def| identifier(&def.name),
    },
    Rule {
        rule: "length",
        path: "name",
        check: |def| length(&def.name, 1, MAX_TABLE_NAME),
    },
    Rule {
        rule: "length",
        path: "displayName",
        check: |def| length(&def.display_name, 0, MAX_DISPLAY_NAME),
    },
    Rule {
        rule: "length",
        path: "category",
        check: |def| length(&def.category, 0, MAX_CATEGORY),
    },
    Rule {
        rule: "identifier",
        path: "storageTable",
        check: |def| def.storage_table.as_deref().and_then(identifier),
    },
    Rule {
        rule: "length",
        path: "storageTable",
        check: |def| {
            def.storage_table
                .as_deref()
                .and_then(|name| length(name, 1, MAX_TABLE_NAME))
        },
    },
    Rule {
        rule: "fields",
        path: "fields",
        check: |def| def.fields.is_empty().then(|| "at least one field is required".into()),
    },
    Rule {
        rule: "unique",
        path: "fields",
        check: |def| duplicates(def.fields.iter().map(|field| field.name.as_str()), "field name"),
    },
    Rule {
        rule: "unique",
        path: "fields",
        check: |def| {
            // Column names compare case-insensitively in SQLite and MySQL
            let columns = def.fields.iter().map(|f| f.column_name().to_ascii_lowercase());
            let columns: Vec<_> = columns.collect();
            duplicates(columns.iter().map(String::as_str), "column name")
        },
    },
];

pub static FIELD_RULES: &[Rule<FieldDefinition>] = &[
    Rule {
        rule: "identifier",
        path: "name",
        check: |field| identifier(&field.name),
    },
    Rule {
        rule: "length",
        path: "name",
        check: |field| length(&field.name, 1, MAX_FIELD_NAME),
    },
    Rule {
        rule: "reserved",
        path: "name",
        check: |field| reserved(field.column_name()),
    },
    Rule {
        rule: "length",
        path: "label",
        check: |field| length(&field.label, 0, MAX_LABEL),
    },
    Rule {
        rule: "identifier",
        path: "storagePath",
        check: |field| field.storage_path.as_deref().and_then(identifier),
    },
    Rule {
        rule: "length",
        path: "storagePath",
        check: |field| {
            field
                .storage_path
                .as_deref()
                .and_then(|path| length(path, 1, MAX_FIELD_NAME))
        },
    },
    Rule {
        rule: "options",
        path: "options",
        check: |field| match (field.ty.is_choice(), field.options.is_empty()) {
            (true, true) => Some("required for choice fields".into()),
            (false, false) => Some(format!("not allowed for {} fields", field.ty)),
            _ => None,
        },
    },
    Rule {
        rule: "options",
        path: "options",
        check: |field| {
            if field.options.iter().any(String::is_empty) {
                return Some("option values must not be empty".into());
            }
            if let Some(option) = field.options.iter().find(|o| o.chars().count() > MAX_OPTION) {
                return Some(format!(
                    "option `{option}` exceeds {MAX_OPTION} characters"
                ));
            }
            duplicates(field.options.iter().map(String::as_str), "option")
        },
    },
    Rule {
        rule: "reference",
        path: "reference",
        check: |field| match (field.ty.is_reference(), &field.reference) {
            (true, None) => Some("required for reference fields".into()),
            (false, Some(_)) => Some(format!("not allowed for {} fields", field.ty)),
            (true, Some(reference)) => identifier(&reference.table)
                .or_else(|| identifier(&reference.column))
                .map(|message| format!("target {message}")),
            (false, None) => None,
        },
    },
    Rule {
        rule: "unique",
        path: "isUnique",
        check: |field| {
            (field.is_unique && !catalog::entry(field.ty).unique)
                .then(|| format!("{} fields cannot be unique", field.ty))
        },
    },
    Rule {
        rule: "indexed",
        path: "isIndexed",
        check: |field| {
            (field.is_indexed && !catalog::entry(field.ty).indexable)
                .then(|| format!("{} fields cannot be indexed", field.ty))
        },
    },
    Rule {
        rule: "default",
        path: "defaultValue",
        check: |field| {
            let value = field.default_value.as_ref()?;
            catalog::entry(field.ty)
                .default_literal(field, value)
                .err()
        },
    },
    Rule {
        rule: "config",
        path: "config.maxLength",
        check: |field| {
            let value = field.config.get("maxLength")?;
            if !matches!(field.ty, super::app::FieldType::String) {
                return None;
            }
            match value.as_u64() {
                Some(len) if (1..=catalog::MAX_STRING_LENGTH).contains(&len) => None,
                _ => Some(format!(
                    "must be an integer between 1 and {}",
                    catalog::MAX_STRING_LENGTH
                )),
            }
        },
    },
    Rule {
        rule: "config",
        path: "config.precision",
        check: |field| {
            let value = field.config.get("precision")?;
            if !matches!(field.ty, super::app::FieldType::Number) {
                return None;
            }
            match value.as_u64() {
                Some(p) if (1..=catalog::MAX_PRECISION as u64).contains(&p) => None,
                _ => Some(format!(
                    "must be an integer between 1 and {}",
                    catalog::MAX_PRECISION
                )),
            }
        },
    },
    Rule {
        rule: "config",
        path: "config.scale",
        check: |field| {
            let value = field.config.get("scale")?;
            if !matches!(field.ty, super::app::FieldType::Number) {
                return None;
            }
            let precision = field
                .config_u64("precision")
                .unwrap_or(catalog::DEFAULT_PRECISION as u64);
            match value.as_u64() {
                Some(s) if s <= precision => None,
                _ => Some(format!("must be an integer no greater than precision ({precision})")),
            }
        },
    },
];

/// Evaluates every rule against `def` and returns all violations.
pub fn verify(def: &TableDefinition) -> Result<()> {
    let mut violations = vec![];

    for rule in TABLE_RULES {
        if let Some(message) = (rule.check)(def) {
            violations.push(Violation::new(rule.path, rule.rule, message));
        }
    }

    for (i, field) in def.fields.iter().enumerate() {
        for rule in FIELD_RULES {
            if let Some(message) = (rule.check)(field) {
                violations.push(Violation::new(
                    format!("fields[{i}].{}", rule.path),
                    rule.rule,
                    message,
                ));
            }
        }
    }

    finish(violations)
}

/// Checks that every reference field targets a table defined in the same
/// database, and either its `id` or a unique field of it.
pub fn verify_references(def: &TableDefinition, tables: &dyn Definitions) -> Result<()> {
    let mut violations = vec![];

    for (i, field) in def.fields.iter().enumerate() {
        let Some(reference) = &field.reference else {
            continue;
        };

        let target = if reference.table == def.name {
            Some(def)
        } else {
            tables.definition(&reference.table)
        };

        let path = format!("fields[{i}].reference");

        match target {
            None => violations.push(Violation::new(
                path,
                "reference",
                format!("table `{}` is not defined in this scope", reference.table),
            )),
            Some(_) if reference.column == RESERVED_COLUMN => {}
            Some(target) => match target.field(&reference.column) {
                None => violations.push(Violation::new(
                    path,
                    "reference",
                    format!(
                        "field `{}` does not exist on `{}`",
                        reference.column, reference.table
                    ),
                )),
                Some(field) if !field.is_unique => violations.push(Violation::new(
                    path,
                    "reference",
                    format!(
                        "field `{}.{}` must be unique to be referenced",
                        reference.table, reference.column
                    ),
                )),
                Some(_) => {}
            },
        }
    }

    finish(violations)
}

/// Rejects plans containing destructive operations unless `confirmed`.
pub fn verify_destructive(operations: &[SchemaOperation], confirmed: bool) -> Result<()> {
    if confirmed {
        return Ok(());
    }

    let violations = operations
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_destructive())
        .map(|(i, op)| {
            Violation::new(
                format!("operations[{i}]"),
                "confirm_destructive",
                format!(
                    "{} `{}` destroys data and requires allow_destructive",
                    op.kind(),
                    op.target()
                ),
            )
        })
        .collect();

    finish(violations)
}

/// Checks a plan against what the target database can store: every
/// physical identifier must fit its identifier limit and every `VARCHAR`
/// its maximum length.
pub fn verify_capability(operations: &[SchemaOperation], capability: &Capability) -> Result<()> {
    let max = capability.max_identifier_length;
    let mut seen = HashSet::new();
    let mut violations = vec![];

    for op in operations {
        let mut names: Vec<&str> = vec![op.table()];
        let mut column = None;
        match op {
            SchemaOperation::AddColumn { column: c, .. }
            | SchemaOperation::DropColumn { column: c, .. }
            | SchemaOperation::AlterColumn { to: c, .. } => {
                names.push(&c.name);
                column = Some(c);
            }
            SchemaOperation::AddIndex { index, .. } | SchemaOperation::DropIndex { index, .. } => {
                names.push(&index.name)
            }
            SchemaOperation::AddConstraint { constraint, .. }
            | SchemaOperation::DropConstraint { constraint, .. } => names.push(constraint.name()),
            SchemaOperation::CreateTable { .. } | SchemaOperation::DropTable { .. } => {}
        }

        for name in names {
            if name.len() > max && seen.insert(name) {
                violations.push(Violation::new(
                    op.target(),
                    "identifier_limit",
                    format!("`{name}` is longer than the database limit of {max} characters"),
                ));
            }
        }

        if let (Some(column), Some(limit)) = (column, capability.varchar) {
            if column.ty.max_len().is_some_and(|len| len > limit) {
                violations.push(Violation::new(
                    op.target(),
                    "storage",
                    format!("the database limits VARCHAR columns to {limit} characters"),
                ));
            }
        }
    }

    finish(violations)
}

/// Rejects names a plan creates that another table of the database already
/// uses.
///
/// Tables, indices and constraints share one namespace per database, and
/// generated names join table and column with `_`: `a_b.c` and `a.b_c` both
/// index as `idx_a_b_c`.
pub fn verify_names(operations: &[SchemaOperation], others: &[db::Table]) -> Result<()> {
    let mut taken: HashMap<String, &str> = HashMap::new();
    for table in others {
        let owner = table.name.as_str();
        taken.insert(table.name.clone(), owner);
        for index in &table.indices {
            taken.insert(index.name.clone(), owner);
        }
        for constraint in &table.constraints {
            taken.insert(constraint.name().to_string(), owner);
        }
        for column in table.columns.iter().filter(|c| !c.allowed.is_empty()) {
            taken.insert(check_name(owner, &column.name), owner);
        }
    }

    let mut violations = vec![];
    for op in operations {
        let created = match op {
            SchemaOperation::CreateTable { table, .. } => Some(table.clone()),
            SchemaOperation::AddColumn { table, column }
            | SchemaOperation::AlterColumn {
                table, to: column, ..
            } => (!column.allowed.is_empty()).then(|| check_name(table, &column.name)),
            SchemaOperation::AddIndex { index, .. } => Some(index.name.clone()),
            SchemaOperation::AddConstraint { constraint, .. } => Some(constraint.name().to_string()),
            _ => None,
        };

        let Some(name) = created else {
            continue;
        };
        if let Some(owner) = taken.get(&name) {
            violations.push(Violation::new(
                op.target(),
                "name",
                format!("`{name}` is already used by table `{owner}`"),
            ));
        }
    }

    finish(violations)
}

fn finish(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(violations))
    }
}

fn identifier(s: &str) -> Option<String> {
    (!is_identifier(s)).then(|| format!("must match {IDENTIFIER_PATTERN}"))
}

fn length(s: &str, min: usize, max: usize) -> Option<String> {
    let len = s.chars().count();
    if len < min {
        Some(format!("must be at least {min} characters"))
    } else if len > max {
        Some(format!("must be at most {max} characters"))
    } else {
        None
    }
}

fn reserved(column: &str) -> Option<String> {
    column
        .eq_ignore_ascii_case(RESERVED_COLUMN)
        .then(|| format!("`{RESERVED_COLUMN}` is the reserved system primary key"))
}

fn duplicates<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let mut dups = vec![];
    for name in names {
        if !seen.insert(name) && !dups.contains(&name) {
            dups.push(name);
        }
    }

    if dups.is_empty() {
        None
    } else {
        let dups: Vec<_> = dups.iter().map(|d| format!("`{d}`")).collect();
        Some(format!("duplicate {what} {}", dups.join(", ")))
    }
}


#[cfg(test)]
mod capability_tests {
    use super::*;
    use crate::schema::db::{Column, Index, Type};

    #[test]
    fn identifiers_must_fit_the_database() {
        let name = "t".repeat(64);
        let ops = [SchemaOperation::AddIndex {
            table: "invoices".into(),
            index: Index::new(name, "id"),
        }];

        verify_capability(&ops, &Capability::SQLITE).unwrap();
        verify_capability(&ops, &Capability::MYSQL).unwrap();
        let err = verify_capability(&ops, &Capability::POSTGRESQL).unwrap_err();
        assert_eq!(err.violations().unwrap()[0].rule, "identifier_limit");
    }

    #[test]
    fn varchar_must_fit_the_database() {
        let ops = [SchemaOperation::AddColumn {
            table: "notes".into(),
            column: Column {
                ty: Type::VarChar(100_000),
                name: "body".into(),
                ..Column::primary_key()
            },
        }];

        verify_capability(&ops, &Capability::POSTGRESQL).unwrap();
        let err = verify_capability(&ops, &Capability::MYSQL).unwrap_err();
        assert_eq!(err.violations().unwrap()[0].rule, "storage");
    }

    #[test]
    fn destructive_needs_confirmation() {
        let ops = [SchemaOperation::DropColumn {
            table: "invoices".into(),
            column: Column::primary_key(),
        }];

        let err = verify_destructive(&ops, false).unwrap_err();
        assert_eq!(err.violations().unwrap()[0].rule, "confirm_destructive");
        verify_destructive(&ops, true).unwrap();
    }
}
