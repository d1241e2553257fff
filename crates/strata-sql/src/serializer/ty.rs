use super::{Flavor, Formatter, ToSql};

use strata_core::schema::db::Type;

impl ToSql for &Type {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let flavor = f.serializer.flavor;

        match self {
            Type::Boolean => fmt!(f, "BOOLEAN"),
            Type::Integer(1 | 2) => fmt!(f, "SMALLINT"),
            Type::Integer(3 | 4) => fmt!(f, match flavor {
                Flavor::Mysql => "INT",
                _ => "INTEGER",
            }),
            Type::Integer(_) => fmt!(f, "BIGINT"),
            Type::Numeric { precision, scale } => {
                let name = match flavor {
                    Flavor::Mysql => "DECIMAL",
                    _ => "NUMERIC",
                };
                fmt!(f, name "(" precision.to_string() "," scale.to_string() ")")
            }
            Type::Text => fmt!(f, "TEXT"),
            Type::VarChar(size) => fmt!(f, "VARCHAR(" size.to_string() ")"),
            Type::Date => fmt!(f, "DATE"),
        }
    }
}
