mod add_column;
pub use add_column::{AddColumn, DropColumn};

mod alter_column;
pub use alter_column::{AlterColumn, AlterColumnChange};

mod alter_table;
pub use alter_table::{AlterTable, AlterTableAction};

mod check;
pub use check::{AddCheck, Check, DropCheck};

mod column_def;
pub use column_def::ColumnDef;

mod constraint;
pub use constraint::{AddConstraint, DropConstraint};

mod copy_table;
pub use copy_table::CopyTable;

mod create_index;
pub use create_index::{CreateIndex, DropIndex};

mod create_table;
pub use create_table::CreateTable;

mod drop_table;
pub use drop_table::DropTable;

mod name;
pub use name::Name;

/// A DDL statement, independent of SQL flavor.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    AddCheck(AddCheck),
    AddColumn(AddColumn),
    AddConstraint(AddConstraint),
    AlterColumn(AlterColumn),
    AlterTable(AlterTable),
    CopyTable(CopyTable),
    CreateIndex(CreateIndex),
    CreateTable(CreateTable),
    DropCheck(DropCheck),
    DropColumn(DropColumn),
    DropConstraint(DropConstraint),
    DropIndex(DropIndex),
    DropTable(DropTable),
}
