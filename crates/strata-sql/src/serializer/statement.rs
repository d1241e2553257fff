use super::{Comma, Flavor, Formatter, Ident, ToSql};

use crate::stmt::{self, AlterColumnChange, Statement};
use strata_core::schema::db::Constraint;

impl ToSql for &Statement {
    fn to_sql(self, f: &mut Formatter<'_>) {
        match self {
            Statement::AddCheck(stmt) => stmt.to_sql(f),
            Statement::AddColumn(stmt) => stmt.to_sql(f),
            Statement::AddConstraint(stmt) => stmt.to_sql(f),
            Statement::AlterColumn(stmt) => stmt.to_sql(f),
            Statement::AlterTable(stmt) => stmt.to_sql(f),
            Statement::CopyTable(stmt) => stmt.to_sql(f),
            Statement::CreateIndex(stmt) => stmt.to_sql(f),
            Statement::CreateTable(stmt) => stmt.to_sql(f),
            Statement::DropCheck(stmt) => stmt.to_sql(f),
            Statement::DropColumn(stmt) => stmt.to_sql(f),
            Statement::DropConstraint(stmt) => stmt.to_sql(f),
            Statement::DropIndex(stmt) => stmt.to_sql(f),
            Statement::DropTable(stmt) => stmt.to_sql(f),
        }
    }
}

impl ToSql for &stmt::CreateTable {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let name = &self.name;
        let columns = Comma(&self.columns);

        fmt!(f, "CREATE TABLE " name " (" columns);

        for fk in &self.foreign_keys {
            fmt!(f, ", " ForeignKey(fk));
        }

        fmt!(f, ")");
    }
}

impl ToSql for &stmt::DropTable {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let name = &self.name;
        let if_exists = self.if_exists.then_some("IF EXISTS ");

        fmt!(f, "DROP TABLE " if_exists name);
    }
}

impl ToSql for &stmt::AddColumn {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;
        let column = &self.column;

        fmt!(f, "ALTER TABLE " table " ADD COLUMN " column);
    }
}

impl ToSql for &stmt::DropColumn {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;
        let column = &self.column;
        let if_exists = self.if_exists.then_some("IF EXISTS ");

        fmt!(f, "ALTER TABLE " table " DROP COLUMN " if_exists column);
    }
}

impl ToSql for &stmt::AlterColumn {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;
        let column = &self.column;

        match (&self.change, f.serializer.flavor) {
            (AlterColumnChange::Redefine(def), _) => {
                fmt!(f, "ALTER TABLE " table " MODIFY COLUMN " def)
            }
            (AlterColumnChange::SetType(ty), Flavor::Postgresql) => {
                fmt!(f, "ALTER TABLE " table " ALTER COLUMN " column " TYPE " ty " USING " column "::" ty)
            }
            (AlterColumnChange::SetType(ty), _) => {
                fmt!(f, "ALTER TABLE " table " ALTER COLUMN " column " TYPE " ty)
            }
            (AlterColumnChange::SetNotNull(true), _) => {
                fmt!(f, "ALTER TABLE " table " ALTER COLUMN " column " SET NOT NULL")
            }
            (AlterColumnChange::SetNotNull(false), _) => {
                fmt!(f, "ALTER TABLE " table " ALTER COLUMN " column " DROP NOT NULL")
            }
            (AlterColumnChange::SetDefault(Some(default)), _) => {
                fmt!(f, "ALTER TABLE " table " ALTER COLUMN " column " SET DEFAULT " default)
            }
            (AlterColumnChange::SetDefault(None), _) => {
                fmt!(f, "ALTER TABLE " table " ALTER COLUMN " column " DROP DEFAULT")
            }
        }
    }
}

impl ToSql for &stmt::AlterTable {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let name = &self.name;

        match &self.action {
            stmt::AlterTableAction::RenameTo(new_name) => {
                fmt!(f, "ALTER TABLE " name " RENAME TO " new_name);
            }
        }
    }
}

impl ToSql for &stmt::CopyTable {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let target = &self.target;
        let source = &self.source;
        let target_cols = Comma(&self.columns);
        let source_cols = Comma(&self.columns);

        fmt!(f, "INSERT INTO " target " (" target_cols ") SELECT " source_cols " FROM " source);
    }
}

impl ToSql for &stmt::CreateIndex {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let index_name = &self.name;
        let table_name = &self.on;
        let columns = Comma(&self.columns);
        let unique = if self.unique { "UNIQUE " } else { "" };

        fmt!(f, "CREATE " unique "INDEX " index_name " ON " table_name " (" columns ")");
    }
}

impl ToSql for &stmt::DropIndex {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let name = &self.name;
        let table = &self.on;

        if f.serializer.is_mysql() {
            fmt!(f, "DROP INDEX " name " ON " table);
        } else {
            fmt!(f, "DROP INDEX " name);
        }
    }
}

impl ToSql for &stmt::AddConstraint {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;

        match &self.constraint {
            Constraint::Unique(unique) => {
                let name = Ident(&unique.name);
                let columns = Comma(unique.columns.iter().map(Ident));
                fmt!(f, "ALTER TABLE " table " ADD CONSTRAINT " name " UNIQUE (" columns ")");
            }
            Constraint::ForeignKey(fk) => {
                fmt!(f, "ALTER TABLE " table " ADD " ForeignKey(fk));
            }
        }
    }
}

impl ToSql for &stmt::DropConstraint {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;
        let name = Ident(self.constraint.name());

        match (&self.constraint, f.serializer.flavor) {
            (Constraint::Unique(_), Flavor::Mysql) => {
                fmt!(f, "ALTER TABLE " table " DROP INDEX " name)
            }
            (Constraint::ForeignKey(_), Flavor::Mysql) => {
                fmt!(f, "ALTER TABLE " table " DROP FOREIGN KEY " name)
            }
            _ => fmt!(f, "ALTER TABLE " table " DROP CONSTRAINT " name),
        }
    }
}

impl ToSql for &stmt::AddCheck {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;
        let check = &self.check;

        fmt!(f, "ALTER TABLE " table " ADD " check);
    }
}

impl ToSql for &stmt::DropCheck {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let table = &self.table;
        let name = &self.name;

        if f.serializer.is_mysql() {
            fmt!(f, "ALTER TABLE " table " DROP CHECK " name);
        } else {
            fmt!(f, "ALTER TABLE " table " DROP CONSTRAINT " name);
        }
    }
}

/// `CONSTRAINT name FOREIGN KEY (cols) REFERENCES table (cols)`
struct ForeignKey<'a>(&'a strata_core::schema::db::ForeignKey);

impl ToSql for ForeignKey<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let name = Ident(&self.0.name);
        let columns = Comma(self.0.columns.iter().map(Ident));
        let foreign_table = Ident(&self.0.foreign_table);
        let foreign_columns = Comma(self.0.foreign_columns.iter().map(Ident));

        fmt!(
            f,
            "CONSTRAINT " name " FOREIGN KEY (" columns ") REFERENCES " foreign_table " (" foreign_columns ")"
        );
    }
}
