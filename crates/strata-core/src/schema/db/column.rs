use super::Type;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// The name of the column in the database.
    pub name: String,

    /// The database storage type of the column.
    pub ty: Type,

    /// Whether or not the column is nullable
    pub nullable: bool,

    /// True if the column is the table's primary key
    pub primary_key: bool,

    /// True if the column is an integer that should be auto-incremented
    /// with each insertion of a new row.
    pub auto_increment: bool,

    /// Column default, if any.
    pub default: Option<Literal>,

    /// When non-empty, the column only accepts these values. Serialized as a
    /// named `CHECK (col IN (...))` constraint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl Column {
    /// The system primary key every strata table carries.
    pub fn primary_key() -> Column {
        Column {
            name: "id".to_string(),
            ty: Type::Integer(8),
            nullable: false,
            primary_key: true,
            auto_increment: true,
            default: None,
            allowed: vec![],
        }
    }

    /// Adding this column to a populated table needs a value for every
    /// existing row.
    pub fn requires_backfill(&self) -> bool {
        !self.nullable && self.default.is_none()
    }
}

/// A constant used as a column default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Boolean(bool),

    Integer(i64),

    /// Decimal text, kept verbatim to avoid float rounding.
    Number(String),

    String(String),

    /// A default expression read back from a database catalog.
    Raw(String),
}
