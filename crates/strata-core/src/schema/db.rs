mod column;
pub use column::{Column, Literal};

mod constraint;
pub use constraint::{Constraint, ForeignKey, UniqueConstraint};

mod index;
pub use index::Index;

mod table;
pub use table::Table;

mod ty;
pub use ty::Type;
