//! Independent cursors over a shared ring.

use super::RotationRing;
use crate::error::IndexError;

/// A cursor into a [`RotationRing`].
///
/// Every iterator owns its position; moving one never affects another,
/// even over the same ring. All moves are O(1) modular arithmetic.
#[derive(Debug)]
pub struct RingIterator<T> {
    ring: RotationRing<T>,
    /// Always in `0..ring.len()`.
    position: usize,
}

impl<T> RingIterator<T> {
    /// Create an iterator positioned on the first item of `ring`.
    pub fn new(ring: RotationRing<T>) -> Self {
        Self { ring, position: 0 }
    }

    /// The ring this iterator walks.
    pub fn ring(&self) -> &RotationRing<T> {
        &self.ring
    }

    /// Current index into the ring.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Item under the cursor.
    pub fn current(&self) -> &T {
        self.ring.item(self.position)
    }

    /// Move forward one item, wrapping from the last to the first.
    pub fn advance(&mut self) -> &T {
        self.position = (self.position + 1) % self.ring.len();
        self.current()
    }

    /// Move back one item, wrapping from the first to the last.
    pub fn retreat(&mut self) -> &T {
        let len = self.ring.len();
        self.position = (self.position + len - 1) % len;
        self.current()
    }

    /// Move directly to `index`.
    ///
    /// Out-of-range indices are rejected and leave the cursor where it was.
    pub fn jump(&mut self, index: usize) -> Result<&T, IndexError> {
        let len = self.ring.len();
        if index >= len {
            return Err(IndexError { index, len });
        }
        self.position = index;
        Ok(self.current())
    }

    /// Return to the first item.
    pub fn reset(&mut self) -> &T {
        self.position = 0;
        self.current()
    }
}

impl<T> Clone for RingIterator<T> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring.clone(),
            position: self.position,
        }
    }
}

/// Two iterators are equal when they walk the same ring (by identity, not
/// contents) and sit at the same position.
impl<T> PartialEq for RingIterator<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ring.ptr_eq(&other.ring) && self.position == other.position
    }
}

impl<T> Eq for RingIterator<T> {}
