//! Fixtures shared by the unit tests.
use std::{collections::HashMap, sync::Once};

use anyhow::{anyhow, bail, Result};

use crate::{
    ast::*,
    il::{Instruction, InstructionStream, Label, MethodContext, Op, Options, Symbol, TacListing},
};

static LOGGER: Once = Once::new();

/// Send log output to stderr. The verbosity is read from `COOLTAC_LOG`, from 0 (errors only)
/// up to 4 (trace).
pub fn init_logging() {
    LOGGER.call_once(|| {
        let verbosity = std::env::var("COOLTAC_LOG")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        stderrlog::new()
            .module("cooltac")
            .verbosity(verbosity)
            .init()
            .ok();
    });
}

pub const MAIN: usize = 5;
pub const MAIN_METHOD: usize = 5;
pub const COUNTER: usize = 6;

/// The basic classes, a `Main` class inheriting from `IO` and a `Counter` class.
pub fn class_table(main_body: Option<ExprId>) -> ClassTable {
    let object = |name: &str| ClassMethod::new(name, "Object", None);
    let io = |name: &str| ClassMethod::new(name, "IO", None);
    let string = |name: &str| ClassMethod::new(name, "String", None);

    ClassTable::new(vec![
        ClassNode::new("Object", vec![object("abort"), object("type_name"), object("copy")]),
        ClassNode::new(
            "IO",
            vec![
                object("abort"),
                object("type_name"),
                object("copy"),
                io("out_string"),
                io("out_int"),
            ],
        ),
        ClassNode::new("Int", vec![object("abort"), object("type_name"), object("copy")]),
        ClassNode::new(
            "String",
            vec![
                object("abort"),
                object("type_name"),
                object("copy"),
                string("length"),
                string("concat"),
            ],
        ),
        ClassNode::new("Bool", vec![object("abort"), object("type_name"), object("copy")]),
        ClassNode::new(
            "Main",
            vec![
                object("abort"),
                object("type_name"),
                object("copy"),
                io("out_string"),
                io("out_int"),
                ClassMethod::new("main", "Main", main_body),
            ],
        ),
        ClassNode::new(
            "Counter",
            vec![
                object("abort"),
                object("type_name"),
                object("copy"),
                ClassMethod::new("inc", "Counter", None),
            ],
        ),
    ])
}

/// A stream for lowering the body of `Main.main`.
pub fn main_stream(classes: &ClassTable) -> InstructionStream {
    InstructionStream::new(
        MethodContext::new(classes, MAIN, MAIN_METHOD, "main"),
        Options::default(),
    )
}

/// Builds syntax trees without spelling out every node.
#[derive(Default)]
pub struct TreeBuilder {
    pub ast: Ast,
}
impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ExprKind) -> ExprId {
        self.ast.add(kind)
    }

    pub fn typed(&mut self, kind: ExprKind, static_type: &str) -> ExprId {
        self.ast.push(Expr::new(kind, 0).with_type(static_type))
    }

    pub fn int(&mut self, i: i64) -> ExprId {
        self.typed(ExprKind::Integer(i), "Int")
    }

    pub fn boolean(&mut self, b: bool) -> ExprId {
        self.typed(ExprKind::Bool(b), "Bool")
    }

    pub fn string(&mut self, s: &str) -> ExprId {
        self.typed(ExprKind::Str(s.to_string()), "String")
    }

    pub fn id(&mut self, name: &str) -> ExprId {
        self.add(ExprKind::Identifier(name.to_string()))
    }

    pub fn assign(&mut self, name: &str, value: ExprId) -> ExprId {
        self.add(ExprKind::Assign {
            name: name.to_string(),
            value,
        })
    }

    pub fn binary(&mut self, op: BinOp, left: ExprId, right: ExprId) -> ExprId {
        self.add(ExprKind::Binary(op, left, right))
    }

    pub fn if_(&mut self, predicate: ExprId, then_branch: ExprId, else_branch: ExprId) -> ExprId {
        self.add(ExprKind::If {
            predicate,
            then_branch,
            else_branch,
        })
    }

    pub fn while_(&mut self, predicate: ExprId, body: ExprId) -> ExprId {
        self.add(ExprKind::While { predicate, body })
    }

    pub fn block(&mut self, exprs: Vec<ExprId>) -> ExprId {
        self.add(ExprKind::Block(exprs))
    }

    pub fn let_(&mut self, bindings: Vec<LetBinding>, body: ExprId) -> ExprId {
        self.add(ExprKind::Let { bindings, body })
    }

    pub fn case(&mut self, scrutinee: ExprId, arms: Vec<CaseArm>) -> ExprId {
        self.add(ExprKind::Case { scrutinee, arms })
    }

    pub fn new_object(&mut self, type_name: &str) -> ExprId {
        self.typed(ExprKind::New(type_name.to_string()), type_name)
    }

    pub fn dispatch(&mut self, receiver: ExprId, method: &str, args: Vec<ExprId>) -> ExprId {
        self.add(ExprKind::Dispatch {
            receiver,
            method: method.to_string(),
            args,
        })
    }

    pub fn static_dispatch(
        &mut self,
        receiver: ExprId,
        type_name: &str,
        method: &str,
        args: Vec<ExprId>,
    ) -> ExprId {
        self.add(ExprKind::StaticDispatch {
            receiver,
            type_name: type_name.to_string(),
            method: method.to_string(),
            args,
        })
    }

    pub fn self_dispatch(&mut self, method: &str, args: Vec<ExprId>) -> ExprId {
        self.add(ExprKind::SelfDispatch {
            method: method.to_string(),
            args,
        })
    }
}

/// A value computed by [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Object(String),
    Void,
}

const STEP_LIMIT: usize = 10_000;

/// Run a listing that has been through the optimiser and return the value it returns.
/// Calls are not supported, and a case runs its first branch.
pub fn evaluate(listing: &TacListing) -> Result<Value> {
    let mut evaluator = Evaluator::default();
    match evaluator.run(listing)? {
        Some(value) => Ok(value),
        None => bail!("listing ended without a return"),
    }
}

#[derive(Default)]
struct Evaluator {
    values: HashMap<Symbol, Value>,
    steps: usize,
}
impl Evaluator {
    fn run(&mut self, listing: &TacListing) -> Result<Option<Value>> {
        let instrs: Vec<&Instruction> = listing.iter_instructions().collect();
        let labels: HashMap<Label, usize> = instrs
            .iter()
            .enumerate()
            .filter_map(|(index, instr)| match instr.op {
                Op::Label(label) => Some((label, index)),
                _ => None,
            })
            .collect();
        let jump = |label: &Label| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| anyhow!("jump to unknown label {}", label))
        };

        let mut pc = 0;
        while let Some(instr) = instrs.get(pc) {
            self.steps += 1;
            if self.steps > STEP_LIMIT {
                bail!("no return after {} steps", STEP_LIMIT);
            }
            pc += 1;

            let value = match &instr.op {
                Op::Comment(_) | Op::Label(_) | Op::Ignore => continue,
                Op::Assign | Op::Const => self.read(&instr.rhs1)?,
                Op::Binary(op) => {
                    let left = self.read(&instr.rhs1)?;
                    let right = self.read(&instr.rhs2)?;
                    binary(*op, left, right)?
                }
                Op::Unary(op) => match (op, self.read(&instr.rhs1)?) {
                    (UnOp::Not, Value::Bool(b)) => Value::Bool(!b),
                    (UnOp::Negate, Value::Int(i)) => Value::Int(-i),
                    (op, value) => bail!("cannot apply {} to {:?}", op, value),
                },
                Op::New(type_name) => Value::Object(type_name.clone()),
                Op::IsVoid => Value::Bool(self.read(&instr.rhs1)? == Value::Void),
                Op::Default(type_name) => match type_name.as_str() {
                    "Int" => Value::Int(0),
                    "Bool" => Value::Bool(false),
                    "String" => Value::Str(String::new()),
                    _ => Value::Void,
                },
                Op::Branch(label) => {
                    if self.read(&instr.rhs1)? == Value::Bool(true) {
                        pc = jump(label)?;
                    }
                    continue;
                }
                Op::Jump(label) => {
                    pc = jump(label)?;
                    continue;
                }
                Op::Return => return self.read(&instr.rhs1).map(Some),
                Op::Case => {
                    let branch = instr
                        .branches
                        .first()
                        .ok_or_else(|| anyhow!("case without branches: {}", instr))?;
                    if let Some(value) = self.run(branch)? {
                        return Ok(Some(value));
                    }
                    continue;
                }
                Op::Call | Op::Phi => bail!("cannot evaluate {}", instr),
            };

            match &instr.lhs {
                Some(lhs) => {
                    self.values.insert(lhs.clone(), value);
                }
                None => bail!("no target in {}", instr),
            }
        }
        Ok(None)
    }

    fn read(&self, symbol: &Option<Symbol>) -> Result<Value> {
        match symbol {
            Some(Symbol::Integer(i)) => Ok(Value::Int(*i)),
            Some(Symbol::Bool(b)) => Ok(Value::Bool(*b)),
            Some(Symbol::Str(s)) => Ok(Value::Str(s.clone())),
            Some(symbol) => self
                .values
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow!("read of undefined {}", symbol)),
            None => bail!("missing operand"),
        }
    }
}

fn binary(op: BinOp, left: Value, right: Value) -> Result<Value> {
    let value = match (op, left, right) {
        (BinOp::Equal, left, right) => Value::Bool(left == right),
        (BinOp::Add, Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        (BinOp::Subtract, Value::Int(a), Value::Int(b)) => Value::Int(a - b),
        (BinOp::Multiply, Value::Int(a), Value::Int(b)) => Value::Int(a * b),
        (BinOp::Divide, Value::Int(_), Value::Int(0)) => bail!("division by zero"),
        (BinOp::Divide, Value::Int(a), Value::Int(b)) => Value::Int(a / b),
        (BinOp::LessThan, Value::Int(a), Value::Int(b)) => Value::Bool(a < b),
        (BinOp::LessThanEqual, Value::Int(a), Value::Int(b)) => Value::Bool(a <= b),
        (op, left, right) => bail!("cannot evaluate {:?} {} {:?}", left, op, right),
    };
    Ok(value)
}
