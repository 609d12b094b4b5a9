use super::Label;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelGenerator {
    next: usize,
}
impl LabelGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Generates a new unique label.
    pub fn next_label(&mut self) -> Label {
        let label = Label::new(self.next);
        self.next += 1;
        label
    }

    /// Continue numbering from wherever `other` got to, if it got further.
    pub fn catch_up(&mut self, other: &LabelGenerator) {
        self.next = self.next.max(other.next);
    }
}
