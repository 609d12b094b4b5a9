//! The instruction stream a method body is lowered into.
//!
//! Besides the instructions themselves, a stream carries everything lowering needs to keep
//! track of while it walks the syntax tree: the symbol and label counters, the binding table
//! and the method being lowered.
use std::{collections::HashMap, ops::Range};

use crate::{ast::ClassTable, listing::Position, prelude::*};

use super::{
    label_generator::LabelGenerator,
    name_generator::NameGenerator,
    optimiser::Options,
    scope::{Binding, Bindings},
    Instruction, Label, Op, Symbol, TacListing,
};

/// The method whose body is being lowered.
#[derive(Debug, Clone)]
pub struct MethodContext<'c> {
    pub classes: &'c ClassTable,
    pub class_index: usize,
    pub method_index: usize,
    pub method_name: String,
}
impl<'c> MethodContext<'c> {
    pub fn new<S: Into<String>>(
        classes: &'c ClassTable,
        class_index: usize,
        method_index: usize,
        method_name: S,
    ) -> Self {
        Self {
            classes,
            class_index,
            method_index,
            method_name: method_name.into(),
        }
    }

    pub fn class_name(&self) -> &str {
        self.classes
            .class(self.class_index)
            .map(|class| class.name.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct InstructionStream<'c> {
    listing: TacListing,
    names: NameGenerator,
    labels: LabelGenerator,
    bindings: Bindings,
    /// Latest versions of the variables written by the streams this one branched off from.
    outer_versions: HashMap<String, usize>,
    context: MethodContext<'c>,
    options: Options,
}
impl<'c> InstructionStream<'c> {
    pub fn new(context: MethodContext<'c>, options: Options) -> Self {
        Self {
            listing: TacListing::new(),
            names: NameGenerator::new(),
            labels: LabelGenerator::new(),
            bindings: Bindings::new(),
            outer_versions: HashMap::new(),
            context,
            options,
        }
    }

    /// Add an instruction to the end of the stream, after rewriting its variables through the
    /// binding table. Returns the position it was added at.
    pub fn append(&mut self, instr: Instruction, resolve_phi: bool) -> Position {
        let instr = self.rewrite(instr, resolve_phi);
        trace!("{}: {}", self.listing.end(), instr);
        self.listing.push(instr)
    }

    /// Like [`Self::append`], but places the instruction at `position`, moving everything at or
    /// after it down by one.
    pub fn insert_at(&mut self, instr: Instruction, position: Position, resolve_phi: bool) -> Position {
        let instr = self.rewrite(instr, resolve_phi);
        trace!("{} (inserted): {}", position, instr);
        self.listing.insert(position, instr);
        position
    }

    /// Rewrite the variables of an instruction about to enter the stream.
    ///
    /// A bound variable that is written to gets a fresh symbol, and the binding moves along
    /// with it. Bound variables that are read are replaced by the symbol they are bound to,
    /// unless `resolve_phi` asks for a read of a rebound variable to be merged with its
    /// original value instead.
    fn rewrite(&mut self, mut instr: Instruction, resolve_phi: bool) -> Instruction {
        let written = instr.lhs.as_ref().and_then(Symbol::as_variable);
        if let Some(index) = written.and_then(|var| self.bindings.position_of(&var.name)) {
            let fresh = self.names.next_temp();
            self.bindings.rebind(index, fresh.clone());
            instr.lhs = Some(fresh);
        }

        let read = instr.rhs1.as_ref().and_then(Symbol::as_variable);
        match read.and_then(|var| self.bindings.lookup(&var.name)) {
            Some(binding) if resolve_phi && binding.symbol != binding.original => {
                let (original, current) = (binding.original.clone(), binding.symbol.clone());
                instr.make_phi(original, current);
            }
            Some(binding) => instr.rhs1 = Some(binding.symbol.clone()),
            None => (),
        }

        instr.rhs2 = instr.rhs2.take().map(|symbol| self.resolve_binding(symbol));
        instr.args = std::mem::take(&mut instr.args)
            .into_iter()
            .map(|symbol| self.resolve_binding(symbol))
            .collect();
        instr
    }

    pub fn request_fresh_symbol(&mut self) -> Symbol {
        self.names.next_temp()
    }

    pub fn next_label(&mut self) -> Label {
        self.labels.next_label()
    }

    /// The symbol currently holding the value of `symbol`. Only bound variables resolve to
    /// something other than themselves.
    pub fn resolve_binding(&self, symbol: Symbol) -> Symbol {
        match symbol.as_variable().and_then(|var| self.bindings.lookup(&var.name)) {
            Some(binding) => binding.symbol.clone(),
            None => symbol,
        }
    }

    /// The version of the most recent definition of variable `name`, or 0 if it has not been
    /// defined. Definitions made before a case arm's stream was branched off count as well.
    pub fn latest_version_of(&self, name: &str) -> usize {
        self.listing
            .iter_instructions()
            .rev()
            .filter_map(|instr| instr.write().and_then(Symbol::as_variable))
            .find(|var| var.name == name)
            .map(|var| var.version)
            .or_else(|| self.outer_versions.get(name).copied())
            .unwrap_or(0)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn push_binding(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    /// Drop every binding pushed since the table was `depth` bindings deep.
    pub fn truncate_bindings(&mut self, depth: usize) {
        self.bindings.truncate(depth);
    }

    pub fn restore_bindings(&mut self, snapshot: Bindings) {
        self.bindings = snapshot;
    }

    pub fn rebind(&mut self, index: usize, symbol: Symbol) {
        self.bindings.rebind(index, symbol);
    }

    /// Find the first assignment in `range` that copies `original`, and turn it into a
    /// ɸ-function merging `original` with `current`. Returns whether one was found.
    pub fn convert_read_to_phi(
        &mut self,
        range: Range<Position>,
        original: &Symbol,
        current: &Symbol,
    ) -> bool {
        let found = self
            .listing
            .iter_range_mut(range)
            .find(|(_, instr)| instr.op == Op::Assign && instr.rhs1.as_ref() == Some(original));

        match found {
            Some((position, instr)) => {
                instr.make_phi(original.clone(), current.clone());
                trace!("{}: now {}", position, instr);
                true
            }
            None => false,
        }
    }

    /// Start a child stream for one arm of a `case`, in which `name` is bound to the value
    /// being dispatched on. The child continues from this stream's counters; see
    /// [`Self::absorb_counters`] for the way back.
    pub fn branch<S: Into<String>>(&self, name: S, scrutinee: Symbol) -> InstructionStream<'c> {
        let mut bindings = self.bindings.clone();
        bindings.push(Binding::new(name, scrutinee));

        let mut outer_versions = self.outer_versions.clone();
        for var in self
            .listing
            .iter_instructions()
            .filter_map(|instr| instr.write().and_then(Symbol::as_variable))
        {
            outer_versions.insert(var.name.clone(), var.version);
        }

        Self {
            listing: TacListing::new(),
            names: self.names,
            labels: self.labels,
            bindings,
            outer_versions,
            context: self.context.clone(),
            options: self.options,
        }
    }

    /// Continue counting symbols and labels after those used by `child`.
    pub fn absorb_counters(&mut self, child: &InstructionStream) {
        self.names.catch_up(&child.names);
        self.labels.catch_up(&child.labels);
    }

    pub fn context(&self) -> &MethodContext<'c> {
        &self.context
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn get(&self, position: Position) -> Option<&Instruction> {
        self.listing.get(position)
    }

    pub fn len(&self) -> usize {
        self.listing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listing.is_empty()
    }

    /// The position the next appended instruction will get.
    pub fn end(&self) -> Position {
        self.listing.end()
    }

    pub fn listing(&self) -> &TacListing {
        &self.listing
    }

    pub fn into_listing(self) -> TacListing {
        self.listing
    }
}
