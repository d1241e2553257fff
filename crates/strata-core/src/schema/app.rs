mod field;
pub use field::{FieldDefinition, FieldType, Reference};

mod table;
pub use table::TableDefinition;

use std::collections::HashMap;

/// Read access to the table definitions already realized in one database.
pub trait Definitions {
    fn definition(&self, table: &str) -> Option<&TableDefinition>;
}

impl Definitions for HashMap<String, TableDefinition> {
    fn definition(&self, table: &str) -> Option<&TableDefinition> {
        self.get(table)
    }
}

impl Definitions for [TableDefinition] {
    fn definition(&self, table: &str) -> Option<&TableDefinition> {
        self.iter().find(|def| def.name == table)
    }
}
