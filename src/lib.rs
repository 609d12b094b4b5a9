//! Three-address code generation for Cool.
//!
//! Method bodies from the typed syntax tree are lowered into SSA three-address code, one
//! listing per method, which is then optimised. See [`il::generate`].

pub mod ast;
pub mod builtins;
pub mod error;
pub mod il;
pub mod listing;
mod prelude;

#[cfg(test)]
mod test_support;
