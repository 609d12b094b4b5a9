use std::fmt::{self, Display, Formatter};

use anyhow::{Context, Result};

use crate::{
    ast::{Ast, ClassTable},
    error::{error, LowerError, LowerErrorKind},
    prelude::*,
};

use super::{
    generator::lower,
    optimiser::{optimise, Options},
    stream::{InstructionStream, MethodContext},
    Instruction, Op, TacListing,
};

/// The three-address code of every user-defined method in a program.
#[derive(Debug, Default)]
pub struct TacProgram {
    pub methods: Vec<TacMethod>,
}
impl TacProgram {
    pub fn new() -> Self {
        Self { methods: vec![] }
    }

    pub fn method(&self, class_name: &str, method_name: &str) -> Option<&TacMethod> {
        self.methods
            .iter()
            .find(|method| method.class_name == class_name && method.method_name == method_name)
    }
}
impl Display for TacProgram {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for method in &self.methods {
            method.fmt(f)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct TacMethod {
    pub class_index: usize,
    pub method_index: usize,
    pub class_name: String,
    pub method_name: String,
    pub listing: TacListing,
}
impl Display for TacMethod {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "function {}.{}", self.class_name, self.method_name)?;
        write_listing(f, &self.listing, 0)
    }
}

/// Write one instruction per line. Labels stick out to the left; case branches are nested
/// below the case instruction.
fn write_listing(f: &mut Formatter, listing: &TacListing, depth: usize) -> fmt::Result {
    let indent = "    ".repeat(depth);
    for instr in listing.iter_instructions() {
        if let Op::Label(_) = instr.op {
            writeln!(f, "{}    {}", indent, instr)?;
        } else {
            writeln!(f, "{}        {}", indent, instr)?;
        }

        for (index, branch) in instr.branches.iter().enumerate() {
            writeln!(f, "{}        branch {}:", indent, index)?;
            write_listing(f, branch, depth + 2)?;
        }
    }
    Ok(())
}

/// Generate three-address code for every method of every class in `classes`, except those
/// provided by the runtime.
pub fn generate(ast: &Ast, classes: &ClassTable, options: &Options) -> Result<TacProgram> {
    let mut program = TacProgram::new();

    for (class_index, method_index, method) in classes.user_methods() {
        let class_name = classes
            .class(class_index)
            .map(|class| class.name.clone())
            .unwrap_or_default();

        let listing = generate_method(ast, classes, class_index, method_index, options)
            .with_context(|| {
                format!("Failed to generate code for {}.{}", class_name, method.name)
            })?;

        program.methods.push(TacMethod {
            class_index,
            method_index,
            class_name,
            method_name: method.name.clone(),
            listing,
        });
    }

    Ok(program)
}

/// Generate three-address code for a single method: its body, preceded by an entry label and
/// followed by a return of the body's value.
pub fn generate_method(
    ast: &Ast,
    classes: &ClassTable,
    class_index: usize,
    method_index: usize,
    options: &Options,
) -> Result<TacListing, LowerError> {
    let method = match classes
        .class(class_index)
        .and_then(|class| class.methods.get(method_index))
    {
        Some(method) => method,
        None => {
            return error(
                LowerErrorKind::UnknownMethod {
                    class_index,
                    method_index,
                },
                0,
            )
        }
    };
    let body = match method.body {
        Some(body) => body,
        None => return error(LowerErrorKind::MissingBody(method.name.clone()), 0),
    };

    let context = MethodContext::new(classes, class_index, method_index, &method.name);
    info!("Generating code for {}.{}", context.class_name(), method.name);

    let mut stream = InstructionStream::new(context, *options);
    stream.append(Instruction::comment("start"), false);
    let entry = stream.next_label();
    stream.append(Instruction::label(entry), false);

    let result = lower(ast, body, &mut stream, None, false)?;
    stream.append(Instruction::ret(result.clone()), false);
    debug!("{} instructions before optimisation", stream.len());

    Ok(optimise(stream.into_listing(), &[result], options))
}
