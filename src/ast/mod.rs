//! Abstract Syntax Tree definitions
mod class_table;
pub mod typed;

pub use class_table::*;
pub use typed::*;
