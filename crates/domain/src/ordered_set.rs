//! Insertion-ordered set with value-equality deduplication.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A set that keeps elements in first-insertion order.
///
/// Two elements are the same element when they compare equal on every
/// field. There is no removal: the set only grows. It serializes as a JSON
/// array; deserializing an array drops repeated elements.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
}

impl<T> OrderedSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set holds no element.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the elements in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the elements as a slice, in insertion order.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq> OrderedSet<T> {
    /// Inserts an element.
    ///
    /// Returns true if the element was new, false if an equal element was
    /// already present (the set is then unchanged).
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Returns true if an equal element is present.
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Set equality: same elements, regardless of insertion order.
impl<T: PartialEq> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.items.iter().all(|item| other.contains(item))
    }
}

impl<T: Eq> Eq for OrderedSet<T> {}

impl<T: PartialEq> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: PartialEq> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T> IntoIterator for OrderedSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for OrderedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + PartialEq> Deserialize<'de> for OrderedSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Vec::<T>::deserialize(deserializer)?.into_iter().collect())
    }
}
