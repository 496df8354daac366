//! Frozen ring storage.

use super::RingIterator;
use crate::error::ConfigError;
use std::sync::Arc;

/// Append-only registration phase for a [`RotationRing`].
///
/// Items are added during setup in ring order; [`build`](Self::build)
/// freezes them.
#[derive(Debug)]
pub struct RotationBuilder<T> {
    items: Vec<T>,
}

impl<T> RotationBuilder<T> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append an item at the end of the ring.
    pub fn add(&mut self, item: T) -> &mut Self {
        self.items.push(item);
        self
    }

    /// Number of items registered so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no item has been registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Freeze the registered items into a ring.
    ///
    /// Fails if nothing was registered: an iterator cannot be positioned on
    /// an empty ring.
    pub fn build(self) -> Result<RotationRing<T>, ConfigError> {
        if self.items.is_empty() {
            return Err(ConfigError::EmptyRotation);
        }
        Ok(RotationRing {
            items: Arc::from(self.items),
        })
    }
}

impl<T> Default for RotationBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed, non-empty, circularly addressed sequence of item handles.
///
/// Cloning a ring is cheap and shares the backing sequence; clones compare
/// as the same ring under [`ptr_eq`](Self::ptr_eq).
#[derive(Debug)]
pub struct RotationRing<T> {
    // Never empty.
    items: Arc<[T]>,
}

impl<T> Clone for RotationRing<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

#[allow(clippy::len_without_is_empty)]
impl<T> RotationRing<T> {
    /// Build a ring directly from an ordered sequence.
    pub fn new(items: impl IntoIterator<Item = T>) -> Result<Self, ConfigError> {
        RotationBuilder {
            items: items.into_iter().collect(),
        }
        .build()
    }

    /// Create an iterator positioned on the first item.
    pub fn iterator(&self) -> RingIterator<T> {
        RingIterator::new(self.clone())
    }

    /// Number of items (always at least one).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Item at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Items in ring order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns true if both handles refer to the same ring.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    pub(super) fn item(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a RotationRing<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_registration_order() {
        let mut builder = RotationBuilder::new();
        builder.add(3).add(1).add(2);
        assert_eq!(builder.len(), 3);

        let ring = builder.build().unwrap();
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 1, 2]);
    }

    #[test]
    fn test_empty_builder_is_config_error() {
        let builder: RotationBuilder<&str> = RotationBuilder::new();
        assert!(builder.is_empty());
        assert_eq!(builder.build().unwrap_err(), ConfigError::EmptyRotation);
    }

    #[test]
    fn test_new_from_empty_sequence_fails() {
        let result = RotationRing::<u8>::new(Vec::new());
        assert!(matches!(result, Err(ConfigError::EmptyRotation)));
    }

    #[test]
    fn test_get_out_of_range() {
        let ring = RotationRing::new(["a", "b"]).unwrap();
        assert_eq!(ring.get(1), Some(&"b"));
        assert_eq!(ring.get(2), None);
    }

    #[test]
    fn test_clone_shares_backing_sequence() {
        let ring = RotationRing::new(vec![String::from("x")]).unwrap();
        let clone = ring.clone();
        assert!(ring.ptr_eq(&clone));

        let other = RotationRing::new(vec![String::from("x")]).unwrap();
        assert!(!ring.ptr_eq(&other));
    }

    #[test]
    fn test_items_are_not_copied() {
        let page = Arc::new("page");
        let ring = RotationRing::new([Arc::clone(&page), Arc::clone(&page)]).unwrap();
        assert_eq!(Arc::strong_count(&page), 3);
        assert!(Arc::ptr_eq(ring.get(0).unwrap(), &page));
        drop(ring);
        assert_eq!(Arc::strong_count(&page), 1);
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use reachability_rs_esp32_macros::tap_test;

    #[tap_test]
    fn ring_rejects_empty_registration() {
        let builder: RotationBuilder<u32> = RotationBuilder::default();
        assert!(builder.build().is_err());
    }

    #[tap_test]
    fn ring_of_one_item_is_valid() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ring = RotationRing::new([42u32])?;
        assert_eq!(ring.len(), 1);
        assert_eq!(*ring.iterator().current(), 42);
        Ok(())
    }
}
