use super::Symbol;

/// Hands out fresh SSA registers. Registers are never reused within a method, including
/// across the child streams of `case` arms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameGenerator {
    index: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    /// Generates a new unique temporary name.
    pub fn next_temp(&mut self) -> Symbol {
        let symbol = Symbol::Fresh(self.index);
        self.index += 1;
        symbol
    }

    /// Continue counting from wherever `other` got to, if it got further.
    pub fn catch_up(&mut self, other: &NameGenerator) {
        self.index = self.index.max(other.index);
    }
}
