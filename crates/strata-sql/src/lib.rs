pub mod lower;
pub use lower::{lower, Step};

pub mod serializer;
pub use serializer::Serializer;

pub mod stmt;
pub use stmt::Statement;
