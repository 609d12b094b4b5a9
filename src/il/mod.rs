//! Intermediate code generation.

mod generator;
mod label_generator;
mod name_generator;
mod optimiser;
mod program;
mod scope;
mod stream;
mod tac;

pub use generator::lower;
pub use optimiser::{optimise, Options};
pub use program::{generate, generate_method, TacMethod, TacProgram};
pub use scope::{Binding, Bindings};
pub use stream::{InstructionStream, MethodContext};
pub use tac::*;
