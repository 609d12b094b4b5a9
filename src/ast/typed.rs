//! Typed expression trees, as produced by semantic analysis.
//!
//! Expressions live in an [`Ast`] arena and refer to each other through [`ExprId`] handles.
//! Handles are stable for the lifetime of the arena, which makes them usable as node
//! identities (see [`crate::il::Symbol::Expression`]).
use std::fmt::{self, Display, Formatter};

use crate::builtins::Builtin;

/// Handle to an expression stored in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(usize);
impl Display for ExprId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "expr#{}", self.0)
    }
}

/// Arena owning every expression of the method bodies handed to the IL generator.
#[derive(Debug, Default)]
pub struct Ast {
    exprs: Vec<Expr>,
}
impl Ast {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn push(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() - 1)
    }

    /// Add an expression of type `Object` without a meaningful line number.
    pub fn add(&mut self, kind: ExprKind) -> ExprId {
        self.push(Expr::new(kind, 0))
    }

    pub fn get(&self, id: ExprId) -> Option<&Expr> {
        self.exprs.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    /// Name of the static type semantic analysis assigned to this expression.
    pub static_type: String,
}
impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Self {
            kind,
            line,
            static_type: Builtin::Object.name().to_string(),
        }
    }

    pub fn with_type<S: Into<String>>(mut self, static_type: S) -> Self {
        self.static_type = static_type.into();
        self
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// `name <- value`
    Assign { name: String, value: ExprId },
    /// `receiver.method(args)`
    Dispatch {
        receiver: ExprId,
        method: String,
        args: Vec<ExprId>,
    },
    /// `receiver@type_name.method(args)`
    StaticDispatch {
        receiver: ExprId,
        type_name: String,
        method: String,
        args: Vec<ExprId>,
    },
    /// `method(args)`, dispatched on `self`.
    SelfDispatch { method: String, args: Vec<ExprId> },
    /// Body of a method implemented by the runtime.
    Internal(String),
    If {
        predicate: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    While { predicate: ExprId, body: ExprId },
    Block(Vec<ExprId>),
    Let {
        bindings: Vec<LetBinding>,
        body: ExprId,
    },
    Case {
        scrutinee: ExprId,
        arms: Vec<CaseArm>,
    },
    New(String),
    IsVoid(ExprId),
    Binary(BinOp, ExprId, ExprId),
    Unary(UnOp, ExprId),
    Integer(i64),
    Str(String),
    Bool(bool),
    Identifier(String),
    /// Placeholder for an absent optional expression.
    NoExpr,
}
impl ExprKind {
    /// Short name of the node kind, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Assign { .. } => "assign",
            ExprKind::Dispatch { .. } => "dispatch",
            ExprKind::StaticDispatch { .. } => "static dispatch",
            ExprKind::SelfDispatch { .. } => "self dispatch",
            ExprKind::Internal(_) => "internal",
            ExprKind::If { .. } => "if",
            ExprKind::While { .. } => "while",
            ExprKind::Block(_) => "block",
            ExprKind::Let { .. } => "let",
            ExprKind::Case { .. } => "case",
            ExprKind::New(_) => "new",
            ExprKind::IsVoid(_) => "isvoid",
            ExprKind::Binary(_, _, _) => "binary",
            ExprKind::Unary(_, _) => "unary",
            ExprKind::Integer(_) => "integer",
            ExprKind::Str(_) => "string",
            ExprKind::Bool(_) => "bool",
            ExprKind::Identifier(_) => "identifier",
            ExprKind::NoExpr => "no_expr",
        }
    }
}

/// One `name : type_name [<- init]` entry of a `let`.
#[derive(Debug, Clone)]
pub struct LetBinding {
    pub name: String,
    pub type_name: String,
    pub init: Option<ExprId>,
}
impl LetBinding {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, type_name: T, init: Option<ExprId>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            init,
        }
    }
}

/// One `name : type_name => body` arm of a `case`.
#[derive(Debug, Clone)]
pub struct CaseArm {
    pub name: String,
    pub type_name: String,
    pub body: ExprId,
}
impl CaseArm {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, type_name: T, body: ExprId) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    LessThan,
    LessThanEqual,
    Equal,
}
impl BinOp {
    /// Comparisons yield a `Bool` rather than an `Int`.
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::LessThan | BinOp::LessThanEqual | BinOp::Equal)
    }
}
impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        use BinOp::*;
        let ch = match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            LessThan => "<",
            LessThanEqual => "<=",
            Equal => "=",
        };
        f.write_str(ch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Not,
    Negate,
}
impl Display for UnOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            UnOp::Not => f.write_str("not"),
            UnOp::Negate => f.write_str("~"),
        }
    }
}
