//! The binding table: which SSA value each source variable in scope currently refers to.
use super::Symbol;

/// A source variable in scope, bound to the symbol that currently holds its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub symbol: Symbol,
    /// The symbol the variable held when it came into scope.
    pub original: Symbol,
}
impl Binding {
    pub fn new<S: Into<String>>(name: S, symbol: Symbol) -> Self {
        Self {
            name: name.into(),
            original: symbol.clone(),
            symbol,
        }
    }
}

/// A stack of bindings. Later bindings shadow earlier ones with the same name; lookups scan
/// from the top of the stack down. Snapshots are taken by cloning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(Vec<Binding>);
impl Bindings {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn push(&mut self, binding: Binding) {
        self.0.push(binding);
    }

    /// The number of bindings on the stack.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Pop bindings until only `depth` remain.
    pub fn truncate(&mut self, depth: usize) {
        self.0.truncate(depth);
    }

    /// The index of the innermost binding for `name`.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.0.iter().rposition(|binding| binding.name == name)
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.position_of(name).map(|index| &self.0[index])
    }

    /// Point the binding at `index` to a new symbol.
    pub fn rebind(&mut self, index: usize, symbol: Symbol) {
        if let Some(binding) = self.0.get_mut(index) {
            binding.symbol = symbol;
        }
    }

    /// Determines, among the bottom `depth` bindings, those that are bound to different symbols
    /// in `self` and `other`. These are the variables a join point needs a ɸ-function for.
    /// Returns the index of each such binding with its symbol in `self` and in `other`.
    pub fn diverging(&self, other: &Bindings, depth: usize) -> Vec<(usize, Symbol, Symbol)> {
        self.0
            .iter()
            .zip(other.0.iter())
            .take(depth)
            .enumerate()
            .filter(|(_, (ours, theirs))| ours.symbol != theirs.symbol)
            .map(|(index, (ours, theirs))| (index, ours.symbol.clone(), theirs.symbol.clone()))
            .collect()
    }
}
