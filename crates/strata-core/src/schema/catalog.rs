//! The closed registry of field kinds.
//!
//! Each [`FieldType`] maps to one [`Entry`] describing its storage type,
//! the constraints it admits and how its `defaultValue` is encoded. Adding
//! a kind means adding an entry here; no call site changes.

use super::{
    app::{FieldDefinition, FieldType},
    db::{Column, Literal, Type},
};

use chrono::NaiveDate;
use serde_json::Value;

/// `VARCHAR` length of a string field without `config.maxLength`.
pub const DEFAULT_STRING_LENGTH: u64 = 255;

/// Largest accepted `config.maxLength`.
pub const MAX_STRING_LENGTH: u64 = 10_485_760;

pub const DEFAULT_PRECISION: u32 = 18;
pub const DEFAULT_SCALE: u32 = 4;
pub const MAX_PRECISION: u32 = 38;

/// Choice columns are at least this wide so new options rarely need a
/// column alteration.
pub const MIN_CHOICE_LENGTH: u64 = 50;

#[derive(Debug)]
pub struct Entry {
    pub kind: FieldType,

    /// The field may carry `isUnique`.
    pub unique: bool,

    /// The field may carry `isIndexed`.
    pub indexable: bool,

    /// The field carries a foreign key to another table.
    pub reference: bool,

    storage: fn(&FieldDefinition) -> Type,

    default: fn(&FieldDefinition, &Value) -> Result<Literal, String>,
}

static STRING: Entry = Entry {
    kind: FieldType::String,
    unique: true,
    indexable: true,
    reference: false,
    storage: |field| Type::VarChar(string_length(field)),
    default: |field, value| match value {
        Value::String(s) if s.chars().count() as u64 <= string_length(field) => {
            Ok(Literal::String(s.clone()))
        }
        Value::String(_) => Err(format!(
            "must be at most {} characters",
            string_length(field)
        )),
        _ => Err("must be a string".to_string()),
    },
};

static NUMBER: Entry = Entry {
    kind: FieldType::Number,
    unique: true,
    indexable: true,
    reference: false,
    storage: |field| {
        let (precision, scale) = numeric_precision(field);
        Type::Numeric { precision, scale }
    },
    default: |_, value| match value {
        Value::Number(n) => Ok(Literal::Number(n.to_string())),
        _ => Err("must be a number".to_string()),
    },
};

static BOOLEAN: Entry = Entry {
    kind: FieldType::Boolean,
    unique: false,
    indexable: true,
    reference: false,
    storage: |_| Type::Boolean,
    default: |_, value| match value {
        Value::Bool(b) => Ok(Literal::Boolean(*b)),
        _ => Err("must be a boolean".to_string()),
    },
};

static DATE: Entry = Entry {
    kind: FieldType::Date,
    unique: true,
    indexable: true,
    reference: false,
    storage: |_| Type::Date,
    default: |_, value| match value {
        Value::String(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => {
            Ok(Literal::String(s.clone()))
        }
        _ => Err("must be an ISO date (YYYY-MM-DD)".to_string()),
    },
};

static CHOICE: Entry = Entry {
    kind: FieldType::Choice,
    unique: true,
    indexable: true,
    reference: false,
    storage: |field| {
        let longest = field
            .options
            .iter()
            .map(|option| option.chars().count() as u64)
            .max()
            .unwrap_or(0);
        Type::VarChar(longest.max(MIN_CHOICE_LENGTH))
    },
    default: |field, value| match value {
        Value::String(s) if field.options.contains(s) => Ok(Literal::String(s.clone())),
        _ => Err("must be one of the field's options".to_string()),
    },
};

static REFERENCE: Entry = Entry {
    kind: FieldType::Reference,
    unique: true,
    indexable: true,
    reference: true,
    storage: |_| Type::Integer(8),
    default: |_, value| match value.as_i64() {
        Some(id) => Ok(Literal::Integer(id)),
        None => Err("must be an integer id".to_string()),
    },
};

/// Returns the catalog entry for `kind`.
pub fn entry(kind: FieldType) -> &'static Entry {
    match kind {
        FieldType::String => &STRING,
        FieldType::Number => &NUMBER,
        FieldType::Boolean => &BOOLEAN,
        FieldType::Date => &DATE,
        FieldType::Choice => &CHOICE,
        FieldType::Reference => &REFERENCE,
    }
}

impl Entry {
    pub fn storage(&self, field: &FieldDefinition) -> Type {
        (self.storage)(field)
    }

    /// Type-checks `value` against the field and encodes it as a column
    /// default. The error is a human readable reason.
    pub fn default_literal(&self, field: &FieldDefinition, value: &Value) -> Result<Literal, String> {
        (self.default)(field, value)
    }
}

/// Maps a field to its physical column.
///
/// Expects a verified field; an ill-typed default is dropped here and
/// reported by verification instead.
pub fn column(field: &FieldDefinition) -> Column {
    let entry = entry(field.ty);

    Column {
        name: field.column_name().to_string(),
        ty: entry.storage(field),
        nullable: !field.required,
        primary_key: false,
        auto_increment: false,
        default: field
            .default_value
            .as_ref()
            .and_then(|value| entry.default_literal(field, value).ok()),
        allowed: if field.ty.is_choice() {
            field.options.clone()
        } else {
            vec![]
        },
    }
}

fn string_length(field: &FieldDefinition) -> u64 {
    field
        .config_u64("maxLength")
        .unwrap_or(DEFAULT_STRING_LENGTH)
}

fn numeric_precision(field: &FieldDefinition) -> (u32, u32) {
    let precision = field
        .config_u64("precision")
        .map(|p| p as u32)
        .unwrap_or(DEFAULT_PRECISION);
    let scale = field
        .config_u64("scale")
        .map(|s| s as u32)
        .unwrap_or(DEFAULT_SCALE.min(precision));
    (precision, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_mapping() {
        let cases = [
            (FieldType::String, Type::VarChar(255)),
            (
                FieldType::Number,
                Type::Numeric {
                    precision: 18,
                    scale: 4,
                },
            ),
            (FieldType::Boolean, Type::Boolean),
            (FieldType::Date, Type::Date),
            (FieldType::Reference, Type::Integer(8)),
        ];

        for (kind, expected) in cases {
            let field = FieldDefinition::new("f", kind);
            assert_eq!(column(&field).ty, expected, "{kind}");
            assert_eq!(entry(kind).kind, kind);
        }
    }

    #[test]
    fn choice_width_follows_longest_option() {
        let mut field = FieldDefinition::new("status", FieldType::Choice);
        field.options = vec!["open".into(), "paid".into()];
        assert_eq!(column(&field).ty, Type::VarChar(50));
        assert_eq!(column(&field).allowed, field.options);

        field.options.push("x".repeat(80));
        assert_eq!(column(&field).ty, Type::VarChar(80));
    }

    #[test]
    fn config_overrides_storage() {
        let mut field = FieldDefinition::new("code", FieldType::String);
        field.config.insert("maxLength".into(), json!(12));
        assert_eq!(column(&field).ty, Type::VarChar(12));

        let mut field = FieldDefinition::new("rate", FieldType::Number);
        field.config.insert("precision".into(), json!(10));
        field.config.insert("scale".into(), json!(2));
        assert_eq!(
            column(&field).ty,
            Type::Numeric {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn defaults_are_type_checked() {
        let boolean = FieldDefinition::new("paid", FieldType::Boolean);
        let entry = entry(FieldType::Boolean);
        assert_eq!(
            entry.default_literal(&boolean, &json!(true)),
            Ok(Literal::Boolean(true))
        );
        assert!(entry.default_literal(&boolean, &json!("yes")).is_err());

        let date = FieldDefinition::new("due", FieldType::Date);
        let entry = super::entry(FieldType::Date);
        assert!(entry.default_literal(&date, &json!("2024-02-29")).is_ok());
        assert!(entry.default_literal(&date, &json!("2023-02-29")).is_err());
        assert!(entry.default_literal(&date, &json!("29/02/2024")).is_err());
    }

    #[test]
    fn required_maps_to_not_null() {
        let mut field = FieldDefinition::new("amount", FieldType::Number);
        assert!(column(&field).nullable);
        field.required = true;
        assert!(!column(&field).nullable);
    }
}
