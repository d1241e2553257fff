use super::{value::Quoted, Comma, Flavor, Formatter, ToSql};

use crate::stmt::{self, Check};

impl ToSql for &stmt::ColumnDef {
    fn to_sql(self, f: &mut Formatter<'_>) {
        if self.primary_key {
            return primary_key(self, f);
        }

        let name = &self.name;
        let ty = &self.ty;
        fmt!(f, name " " ty);

        if self.not_null {
            fmt!(f, " NOT NULL");
        }

        if let Some(default) = &self.default {
            fmt!(f, " DEFAULT " default);
        }

        if let Some(check) = &self.check {
            fmt!(f, " " check);
        }
    }
}

fn primary_key(column: &stmt::ColumnDef, f: &mut Formatter<'_>) {
    let name = &column.name;
    let ty = &column.ty;

    match f.serializer.flavor {
        // SQLite only auto increments an `INTEGER PRIMARY KEY`, which aliases
        // the rowid
        Flavor::Sqlite => fmt!(f, name " INTEGER PRIMARY KEY"),
        Flavor::Postgresql if column.auto_increment => {
            fmt!(f, name " " ty " GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY")
        }
        Flavor::Mysql if column.auto_increment => {
            fmt!(f, name " " ty " NOT NULL AUTO_INCREMENT PRIMARY KEY")
        }
        _ => fmt!(f, name " " ty " NOT NULL PRIMARY KEY"),
    }
}

impl ToSql for &Check {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let name = &self.name;
        let column = &self.column;
        let values = Comma(self.values.iter().map(Quoted));
        fmt!(f, "CONSTRAINT " name " CHECK (" column " IN (" values "))");
    }
}
