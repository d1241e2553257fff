use serde::{Deserialize, Serialize};
use std::fmt;

/// Database storage types.
///
/// These are the physical types that appear in `CREATE TABLE` statements.
/// Each SQL flavor spells them its own way; see the serializer in
/// `strata-sql`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A boolean value
    Boolean,

    /// A signed integer of `n` bytes
    Integer(u8),

    /// An exact decimal with the given precision and scale
    Numeric { precision: u32, scale: u32 },

    /// Unconstrained text. Only produced when reading back a schema.
    Text,

    /// Text with a maximum length
    VarChar(u64),

    /// A calendar date without time zone
    Date,
}

impl Type {
    /// Parses a declared column type as reported by the database, for
    /// example `VARCHAR(255)`, `numeric(18,4)` or `character varying`.
    ///
    /// Returns `None` for types strata never creates.
    pub fn parse_sql(declared: &str) -> Option<Type> {
        let declared = declared.trim().to_ascii_uppercase();
        let (base, args) = match declared.find('(') {
            Some(open) => {
                let close = declared.rfind(')')?;
                (declared[..open].trim(), Some(&declared[open + 1..close]))
            }
            None => (declared.as_str(), None),
        };

        let args: Vec<u64> = match args {
            Some(args) => args
                .split(',')
                .map(|arg| arg.trim().parse().ok())
                .collect::<Option<_>>()?,
            None => vec![],
        };

        match (base, &args[..]) {
            ("BOOLEAN" | "BOOL", []) | ("TINYINT", [1]) => Some(Type::Boolean),
            ("SMALLINT" | "INT2", _) => Some(Type::Integer(2)),
            ("INT" | "INTEGER" | "INT4", _) => Some(Type::Integer(4)),
            ("BIGINT" | "INT8", _) => Some(Type::Integer(8)),
            ("NUMERIC" | "DECIMAL", [precision, scale]) => Some(Type::Numeric {
                precision: *precision as u32,
                scale: *scale as u32,
            }),
            ("NUMERIC" | "DECIMAL", [precision]) => Some(Type::Numeric {
                precision: *precision as u32,
                scale: 0,
            }),
            ("VARCHAR" | "CHARACTER VARYING", [len]) => Some(Type::VarChar(*len)),
            ("TEXT" | "CHARACTER VARYING" | "VARCHAR", []) => Some(Type::Text),
            ("DATE", []) => Some(Type::Date),
            _ => None,
        }
    }

    /// Longest string the type can hold, if it is a string type.
    pub fn max_len(&self) -> Option<u64> {
        match self {
            Type::VarChar(len) => Some(*len),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => f.write_str("BOOLEAN"),
            Type::Integer(2) => f.write_str("SMALLINT"),
            Type::Integer(4) => f.write_str("INTEGER"),
            Type::Integer(_) => f.write_str("BIGINT"),
            Type::Numeric { precision, scale } => write!(f, "NUMERIC({precision},{scale})"),
            Type::Text => f.write_str("TEXT"),
            Type::VarChar(len) => write!(f, "VARCHAR({len})"),
            Type::Date => f.write_str("DATE"),
        }
    }
}
