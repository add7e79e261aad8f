//! Batch of items returned by a single fetch

use crate::domain::cursor::Cursor;

/// One fetch response's worth of items plus continuation state
///
/// `next == None` is the explicit "exhausted" marker: the source has
/// nothing beyond this batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub next: Option<Cursor>,
}

impl<T> Batch<T> {
    pub fn new(items: Vec<T>, next: Option<Cursor>) -> Self {
        Self { items, next }
    }

    /// A batch followed by more data at `next`
    pub fn continuing(items: Vec<T>, next: Cursor) -> Self {
        Self {
            items,
            next: Some(next),
        }
    }

    /// The final batch of the sequence
    pub fn exhausted(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Transforms every item, keeping the continuation untouched
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Batch<U> {
        Batch {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }

    pub fn into_parts(self) -> (Vec<T>, Option<Cursor>) {
        (self.items, self.next)
    }
}
