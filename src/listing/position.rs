use std::{
    fmt::{self, Display, Formatter},
    ops::Add,
};

/// The index of a line in a [`Listing`](super::Listing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub usize);
impl Position {
    /// The position of the line before this one, if there is one.
    pub fn previous(self) -> Option<Position> {
        self.0.checked_sub(1).map(Position)
    }
}

impl Add<usize> for Position {
    type Output = Self;

    fn add(self, lines: usize) -> Self::Output {
        Self(self.0 + lines)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:>4}", self.0)
    }
}
