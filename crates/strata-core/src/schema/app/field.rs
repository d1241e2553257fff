use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// The kind of a field, one entry of the field type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Choice,
    Reference,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Choice,
        FieldType::Reference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Choice => "choice",
            FieldType::Reference => "reference",
        }
    }

    pub fn is_choice(self) -> bool {
        matches!(self, FieldType::Choice)
    }

    pub fn is_reference(self) -> bool {
        matches!(self, FieldType::Reference)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| crate::err!("unknown field type `{s}`"))
    }
}

/// Target of a `reference` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Logical name of the referenced table, defined in the same scope.
    pub table: String,

    /// Referenced column. Defaults to the system `id` column.
    #[serde(default = "Reference::default_column")]
    pub column: String,
}

impl Reference {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: Self::default_column(),
        }
    }

    fn default_column() -> String {
        "id".to_string()
    }
}

/// A declarative description of one column of a user-defined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,

    #[serde(default)]
    pub label: String,

    #[serde(rename = "type")]
    pub ty: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub is_unique: bool,

    #[serde(default)]
    pub is_indexed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
}

impl FieldDefinition {
    /// Creates an optional, non-unique, non-indexed field labelled with its
    /// own name.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            ty,
            required: false,
            is_unique: false,
            is_indexed: false,
            default_value: None,
            options: vec![],
            config: Map::new(),
            storage_path: None,
            reference: None,
        }
    }

    /// The physical column name: `storagePath` when present, else `name`.
    pub fn column_name(&self) -> &str {
        self.storage_path.as_deref().unwrap_or(&self.name)
    }

    /// Reads an integer `config` entry. Returns `None` when the key is absent
    /// or holds something other than a non-negative integer.
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(Value::as_u64)
    }
}
