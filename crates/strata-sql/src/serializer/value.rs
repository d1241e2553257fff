use super::{Formatter, ToSql};

use strata_core::schema::db::Literal;

/// A single-quoted string literal.
pub(super) struct Quoted<S>(pub(super) S);

impl<S: AsRef<str>> ToSql for Quoted<S> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        f.dst.push('\'');
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                f.dst.push('\'');
            }
            // MySQL treats backslash as an escape inside string literals
            if c == '\\' && f.serializer.is_mysql() {
                f.dst.push('\\');
            }
            f.dst.push(c);
        }
        f.dst.push('\'');
    }
}

impl ToSql for &Literal {
    fn to_sql(self, f: &mut Formatter<'_>) {
        match self {
            Literal::Boolean(true) => fmt!(f, "TRUE"),
            Literal::Boolean(false) => fmt!(f, "FALSE"),
            Literal::Integer(v) => fmt!(f, v.to_string()),
            Literal::Number(v) => fmt!(f, v),
            Literal::String(v) => fmt!(f, Quoted(v)),
            Literal::Raw(v) => fmt!(f, v),
        }
    }
}
