//! Logical table definitions and their physical realization.
//!
//! [`app`] holds the declarative model operators submit. [`db`] holds the
//! physical model the drivers understand. [`verify`], [`catalog`] and
//! [`compile`] sit between the two.

pub mod app;
pub mod catalog;
pub mod compile;
pub mod db;
pub mod operation;
pub mod verify;

mod name;
pub use name::{check_name, foreign_key_name, index_name, unique_name};
