use super::{FieldDefinition, FieldType};
use crate::{schema::verify::verify, Error, Result, Violation};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative description of a user-defined table.
///
/// Mutated only through full-definition replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_table: Option<String>,

    pub fields: Vec<FieldDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            category: String::new(),
            storage_table: None,
            fields,
        }
    }

    /// Decodes the camelCase JSON wire form.
    ///
    /// Unknown field types are reported as `type` violations, one per field,
    /// instead of as an opaque decode failure. When any are found the rest
    /// of the definition is verified too, so the error lists every rule the
    /// request breaks.
    pub fn from_json(json: &str) -> Result<TableDefinition> {
        let mut value: Value = serde_json::from_str(json)
            .map_err(|err| Error::violation("definition", "format", err.to_string()))?;

        let mut violations = vec![];
        let mut untyped = vec![];

        if let Some(fields) = value.get_mut("fields").and_then(Value::as_array_mut) {
            for (i, field) in fields.iter_mut().enumerate() {
                let Some(ty) = field.get_mut("type") else {
                    continue;
                };

                let known = ty
                    .as_str()
                    .is_some_and(|ty| ty.parse::<FieldType>().is_ok());

                if !known {
                    violations.push(Violation::new(
                        format!("fields[{i}].type"),
                        "type",
                        format!("{ty} is not a known field type"),
                    ));

                    // Stand-in so the remaining attributes still decode
                    *ty = Value::from(FieldType::String.as_str());
                    untyped.push(i);
                }
            }
        }

        let def: TableDefinition = serde_json::from_value(value)
            .map_err(|err| Error::violation("definition", "format", err.to_string()))?;

        if violations.is_empty() {
            return Ok(def);
        }

        if let Err(err) = verify(&def) {
            let found = err.violations().unwrap_or_default();
            violations.extend(
                found
                    .iter()
                    .filter(|violation| !depends_on_type(&violation.field, &untyped))
                    .cloned(),
            );
        }

        Err(Error::validation(violations))
    }

    /// The physical table name: `storageTable` when present, else `name`.
    pub fn table_name(&self) -> &str {
        self.storage_table.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Iterates over the fields of type `reference`.
    pub fn references(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| field.ty.is_reference())
    }
}

/// Whether a violation at `path` judged a field by its stand-in type.
fn depends_on_type(path: &str, untyped: &[usize]) -> bool {
    untyped.iter().any(|i| {
        path.strip_prefix(&format!("fields[{i}]."))
            .is_some_and(|attr| !matches!(attr, "name" | "label" | "storagePath"))
    })
}
