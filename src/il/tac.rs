//! Three-Address Code

use std::fmt::{self, Display, Formatter};

use crate::{
    ast::{BinOp, ExprId, UnOp},
    listing::Listing,
};

pub type TacListing = Listing<Instruction>;

/// A jump target. Labels are numbered per method, in the order they are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);
impl Label {
    pub fn new(id: usize) -> Self {
        Self(id)
    }
}
impl Display for Label {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// Resolved at run time through the receiver's dispatch table.
    Virtual,
    /// Resolved at compile time, as for `receiver@Type.method()`.
    Static,
}

/// A resolved call target: a method slot in the class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class_index: usize,
    pub method_index: usize,
    pub dispatch: DispatchKind,
}
impl MethodRef {
    pub fn new(class_index: usize, method_index: usize, dispatch: DispatchKind) -> Self {
        Self {
            class_index,
            method_index,
            dispatch,
        }
    }
}
impl Display for MethodRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.dispatch {
            DispatchKind::Virtual => write!(f, "method({}, {})", self.class_index, self.method_index),
            DispatchKind::Static => write!(f, "static({}, {})", self.class_index, self.method_index),
        }
    }
}

/// A source variable at a specific SSA version.
///
/// Every assignment to a variable that is not tracked by the binding table produces the next
/// version, so given:
/// ```text
/// x <- 10;
/// x <- x + 1
/// ```
/// the two writes target `x^1` and `x^2`. Two versions of a variable are unrelated values.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub version: usize,
}
impl Variable {
    pub fn new<S: Into<String>>(name: S, version: usize) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}
impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}^{}", self.name, self.version)
    }
}

/// An operand or destination of a TAC instruction.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Symbol {
    /// A generated SSA register.
    Fresh(usize),
    /// A source variable at some version.
    Variable(Variable),
    Integer(i64),
    Bool(bool),
    Str(String),
    /// A call target.
    Method(MethodRef),
    /// A call target implemented by the runtime.
    Intrinsic(String),
    /// The `case` expression a case instruction was lowered from. Compared by identity.
    Expression(ExprId),
}
impl Symbol {
    pub fn variable<S: Into<String>>(name: S, version: usize) -> Self {
        Self::Variable(Variable::new(name, version))
    }

    /// Whether this symbol names a storage slot, as opposed to a constant or a reference.
    pub fn is_storage(&self) -> bool {
        matches!(self, Symbol::Fresh(_) | Symbol::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Symbol::Variable(var) => Some(var),
            _ => None,
        }
    }
}
impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Symbol::Fresh(id) => write!(f, "%t{}", id),
            Symbol::Variable(var) => var.fmt(f),
            Symbol::Integer(i) => write!(f, "{}", i),
            Symbol::Bool(b) => write!(f, "{}", b),
            Symbol::Str(s) => write!(f, "{:?}", s),
            Symbol::Method(method) => method.fmt(f),
            Symbol::Intrinsic(name) => write!(f, "@{}", name),
            Symbol::Expression(expr) => expr.fmt(f),
        }
    }
}

/// The operation performed by an [`Instruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Comment(String),
    Label(Label),
    /// `lhs = rhs1`
    Assign,
    /// Load the literal in `rhs1`.
    Const,
    /// Call the target in `rhs1` with `args`. The receiver is the last argument.
    Call,
    /// Jump to the label if `rhs1` is true.
    Branch(Label),
    Jump(Label),
    Binary(BinOp),
    Unary(UnOp),
    New(String),
    IsVoid,
    /// The default value of a type.
    Default(String),
    Return,
    /// The ɸ-function.
    Phi,
    /// Dispatch on the run-time type of `rhs1`; one branch listing per arm.
    Case,
    /// Reserved slot for a later pass.
    Ignore,
}
impl Op {
    /// Whether an instruction with this operation assigns to its `lhs`.
    pub fn defines_value(&self) -> bool {
        !matches!(
            self,
            Op::Comment(_) | Op::Label(_) | Op::Branch(_) | Op::Jump(_) | Op::Return | Op::Ignore
        )
    }

    /// Whether an instruction with this operation must be kept even if nothing reads its
    /// result.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Op::Comment(_)
                | Op::Label(_)
                | Op::Call
                | Op::Branch(_)
                | Op::Jump(_)
                | Op::Return
                | Op::Case
                | Op::Ignore
        )
    }
}

/// A single TAC instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Op,
    /// Source line the instruction was lowered from, 0 if it has none.
    pub line: usize,
    pub lhs: Option<Symbol>,
    pub rhs1: Option<Symbol>,
    pub rhs2: Option<Symbol>,
    pub args: Vec<Symbol>,
    pub branches: Vec<TacListing>,
}
impl Instruction {
    fn with_op(op: Op) -> Self {
        Self {
            op,
            line: 0,
            lhs: None,
            rhs1: None,
            rhs2: None,
            args: vec![],
            branches: vec![],
        }
    }

    fn defining(op: Op, lhs: Symbol, rhs1: Symbol) -> Self {
        Self {
            lhs: Some(lhs),
            rhs1: Some(rhs1),
            ..Self::with_op(op)
        }
    }

    pub fn comment<S: Into<String>>(text: S) -> Self {
        Self::with_op(Op::Comment(text.into()))
    }

    pub fn label(label: Label) -> Self {
        Self::with_op(Op::Label(label))
    }

    pub fn assign(lhs: Symbol, value: Symbol) -> Self {
        Self::defining(Op::Assign, lhs, value)
    }

    pub fn constant(lhs: Symbol, literal: Symbol) -> Self {
        Self::defining(Op::Const, lhs, literal)
    }

    pub fn call(lhs: Symbol, target: Symbol, args: Vec<Symbol>) -> Self {
        Self {
            args,
            ..Self::defining(Op::Call, lhs, target)
        }
    }

    pub fn branch(condition: Symbol, target: Label) -> Self {
        Self {
            rhs1: Some(condition),
            ..Self::with_op(Op::Branch(target))
        }
    }

    pub fn jump(target: Label) -> Self {
        Self::with_op(Op::Jump(target))
    }

    pub fn binary(op: BinOp, lhs: Symbol, left: Symbol, right: Symbol) -> Self {
        Self {
            rhs2: Some(right),
            ..Self::defining(Op::Binary(op), lhs, left)
        }
    }

    pub fn unary(op: UnOp, lhs: Symbol, operand: Symbol) -> Self {
        Self::defining(Op::Unary(op), lhs, operand)
    }

    pub fn new_object<S: Into<String>>(lhs: Symbol, type_name: S) -> Self {
        Self {
            lhs: Some(lhs),
            ..Self::with_op(Op::New(type_name.into()))
        }
    }

    pub fn is_void(lhs: Symbol, value: Symbol) -> Self {
        Self::defining(Op::IsVoid, lhs, value)
    }

    pub fn default_value<S: Into<String>>(lhs: Symbol, type_name: S) -> Self {
        Self {
            lhs: Some(lhs),
            ..Self::with_op(Op::Default(type_name.into()))
        }
    }

    pub fn ret(value: Symbol) -> Self {
        Self {
            rhs1: Some(value),
            ..Self::with_op(Op::Return)
        }
    }

    pub fn phi(lhs: Symbol, first: Symbol, second: Symbol) -> Self {
        Self {
            rhs2: Some(second),
            ..Self::defining(Op::Phi, lhs, first)
        }
    }

    pub fn case(lhs: Symbol, scrutinee: Symbol, expr: ExprId, branches: Vec<TacListing>) -> Self {
        Self {
            rhs2: Some(Symbol::Expression(expr)),
            branches,
            ..Self::defining(Op::Case, lhs, scrutinee)
        }
    }

    pub fn ignore() -> Self {
        Self::with_op(Op::Ignore)
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// The symbol this instruction assigns to, if any.
    pub fn write(&self) -> Option<&Symbol> {
        self.lhs.as_ref()
    }

    /// Every storage symbol this instruction reads. For a case instruction, this includes the
    /// symbols read anywhere inside its branches.
    pub fn reads(&self) -> Vec<Symbol> {
        let mut result: Vec<Symbol> = self
            .rhs1
            .iter()
            .chain(self.rhs2.iter())
            .chain(self.args.iter())
            .filter(|s| s.is_storage())
            .cloned()
            .collect();

        for branch in &self.branches {
            for instr in branch.iter_instructions() {
                result.extend(instr.reads());
            }
        }
        result
    }

    pub fn is_phi(&self) -> bool {
        self.op == Op::Phi
    }

    /// The target and operands of a ɸ-function.
    pub fn as_phi(&self) -> Option<(&Symbol, &Symbol, &Symbol)> {
        match (&self.op, &self.lhs, &self.rhs1, &self.rhs2) {
            (Op::Phi, Some(target), Some(first), Some(second)) => Some((target, first, second)),
            _ => None,
        }
    }

    /// Turn this instruction into a ɸ-function over two values, keeping its target.
    pub fn make_phi(&mut self, first: Symbol, second: Symbol) {
        self.op = Op::Phi;
        self.rhs1 = Some(first);
        self.rhs2 = Some(second);
    }

    /// Replace every occurrence of `src` in this instruction, written or read, with `dest`.
    /// Branch listings of case instructions are renamed as well.
    pub fn rename(&mut self, src: &Symbol, dest: &Symbol) {
        fn try_replace(tgt: &mut Option<Symbol>, src: &Symbol, dest: &Symbol) {
            if tgt.as_ref() == Some(src) {
                *tgt = Some(dest.clone());
            }
        }

        try_replace(&mut self.lhs, src, dest);
        try_replace(&mut self.rhs1, src, dest);
        try_replace(&mut self.rhs2, src, dest);
        for arg in self.args.iter_mut().filter(|arg| **arg == *src) {
            *arg = dest.clone();
        }
        for branch in self.branches.iter_mut() {
            for instr in branch.iter_instructions_mut() {
                instr.rename(src, dest);
            }
        }
    }
}
impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        struct Opt<'a>(&'a Option<Symbol>);
        impl Display for Opt<'_> {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                match self.0 {
                    Some(symbol) => symbol.fmt(f),
                    None => f.write_str("_"),
                }
            }
        }

        let lhs = Opt(&self.lhs);
        let rhs1 = Opt(&self.rhs1);
        let rhs2 = Opt(&self.rhs2);

        match &self.op {
            Op::Comment(text) => write!(f, "# {}", text),
            Op::Label(label) => write!(f, "{}:", label),
            Op::Assign | Op::Const => write!(f, "{} = {}", lhs, rhs1),
            Op::Call => {
                let args = self
                    .args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{} = call {} ({})", lhs, rhs1, args)
            }
            Op::Branch(label) => write!(f, "if {} goto {}", rhs1, label),
            Op::Jump(label) => write!(f, "goto {}", label),
            Op::Binary(op) => write!(f, "{} = {} {} {}", lhs, rhs1, op, rhs2),
            Op::Unary(op) => write!(f, "{} = {} {}", lhs, op, rhs1),
            Op::New(type_name) => write!(f, "{} = new {}", lhs, type_name),
            Op::IsVoid => write!(f, "{} = isvoid {}", lhs, rhs1),
            Op::Default(type_name) => write!(f, "{} = default {}", lhs, type_name),
            Op::Return => write!(f, "return {}", rhs1),
            Op::Phi => write!(f, "{} = ɸ({}, {})", lhs, rhs1, rhs2),
            Op::Case => write!(
                f,
                "{} = case {} of {} ({} branches)",
                lhs,
                rhs1,
                rhs2,
                self.branches.len()
            ),
            Op::Ignore => f.write_str("ignore"),
        }
    }
}
