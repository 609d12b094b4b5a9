use thiserror::Error;

use crate::ast::ExprId;

/// Construct a new error result.
pub fn error<S>(kind: LowerErrorKind, line: usize) -> Result<S, LowerError> {
    Err(LowerError::new(kind, line))
}

/// An internal compiler error raised while lowering a method body to three-address code.
///
/// Every one of these means an earlier compiler stage let something through that it should
/// have rejected or resolved, so lowering of the affected method is abandoned.
#[derive(Debug, Error)]
#[error("internal compiler error at line {line}: {kind}")]
pub struct LowerError {
    kind: LowerErrorKind,
    line: usize,
}
impl LowerError {
    pub fn new(kind: LowerErrorKind, line: usize) -> Self {
        Self { kind, line }
    }

    pub fn kind(&self) -> &LowerErrorKind {
        &self.kind
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LowerErrorKind {
    #[error("cannot lower an expression of kind '{0}'")]
    UnhandledNode(&'static str),
    #[error("{0} does not belong to the syntax tree")]
    DanglingNode(ExprId),
    #[error("dispatch on unknown class '{0}'")]
    UnresolvedClass(String),
    #[error("class '{class}' has no method '{method}'")]
    UnresolvedMethod { class: String, method: String },
    #[error("no method at index {method_index} of class {class_index}")]
    UnknownMethod {
        class_index: usize,
        method_index: usize,
    },
    #[error("method '{0}' has no body")]
    MissingBody(String),
}
