use std::{
    fmt::{self, Display, Formatter},
    ops::Range,
    slice::{Iter, IterMut},
};

use super::position::*;

/// An ordered sequence of lines, addressed by [`Position`].
///
/// Positions are logical indices: growing the listing never changes which line a position
/// refers to. Only [`Listing::insert`], [`Listing::remove`] and [`Listing::retain_lines`]
/// shift the lines that follow them.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    lines: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Self { lines: vec![] }
    }

    pub fn push(&mut self, line: T) -> Position {
        self.lines.push(line);
        Position(self.lines.len() - 1)
    }

    /// Insert a line at `position`, moving every line at or after it one position later.
    pub fn insert(&mut self, position: Position, line: T) {
        self.lines.insert(position.0, line);
    }

    pub fn remove(&mut self, position: Position) -> T {
        self.lines.remove(position.0)
    }

    pub fn get(&self, position: Position) -> Option<&T> {
        self.lines.get(position.0)
    }

    pub fn last(&self) -> Option<&T> {
        self.lines.last()
    }

    /// Keep only the lines for which `keep` returns `true`, compacting the listing.
    pub fn retain_lines<F>(&mut self, mut keep: F)
    where
        F: FnMut(Position, &T) -> bool,
    {
        let mut position = Position(0);
        self.lines.retain(|line| {
            let kept = keep(position, line);
            position = position + 1;
            kept
        });
    }

    pub fn iter_lines(&self) -> LinesIter<T> {
        LinesIter {
            inner: self.lines.iter(),
            position: Position(0),
        }
    }

    /// Iterate over the lines within `range`, together with their positions.
    pub fn iter_range_mut(&mut self, range: Range<Position>) -> LinesIterMut<T> {
        let end = range.end.0.min(self.lines.len());
        let start = range.start.0.min(end);
        LinesIterMut {
            inner: self.lines[start..end].iter_mut(),
            position: range.start,
        }
    }

    pub fn iter_instructions(&self) -> Iter<T> {
        self.lines.iter()
    }

    pub fn iter_instructions_mut(&mut self) -> IterMut<T> {
        self.lines.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The position one past the last line, i.e. where the next pushed line will end up.
    pub fn end(&self) -> Position {
        Position(self.lines.len())
    }
}
impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: Display> Display for Listing<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

pub struct LinesIter<'item, T> {
    inner: Iter<'item, T>,
    position: Position,
}

impl<'item, T> Iterator for LinesIter<'item, T> {
    type Item = (Position, &'item T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|v| {
            let current = self.position;
            self.position = current + 1;
            (current, v)
        })
    }
}
impl<'item, T> DoubleEndedIterator for LinesIter<'item, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let remaining = self.inner.len();
        self.inner
            .next_back()
            .map(|v| (self.position + (remaining - 1), v))
    }
}

pub struct LinesIterMut<'item, T> {
    inner: IterMut<'item, T>,
    position: Position,
}

impl<'item, T> Iterator for LinesIterMut<'item, T> {
    type Item = (Position, &'item mut T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|v| {
            let current = self.position;
            self.position = current + 1;
            (current, v)
        })
    }
}

impl<T> FromIterator<T> for Listing<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}
