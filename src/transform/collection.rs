// src/transform/collection.rs
//
// Ordered, append-only transform queue. Application order is strictly
// the order of add() calls; transforms are never reordered or merged.

use crate::transform::Transform;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformCollection {
    transforms: Vec<Transform>,
}

impl TransformCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transform> {
        self.transforms.iter()
    }

    pub fn clear(&mut self) {
        self.transforms.clear();
    }

    /// Concatenation of every transform's specifier, in order. Swapping
    /// two transforms yields a different string, so cache keys are
    /// order-sensitive.
    pub fn specifier(&self) -> String {
        self.transforms
            .iter()
            .map(Transform::specifier)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl<'a> IntoIterator for &'a TransformCollection {
    type Item = &'a Transform;
    type IntoIter = std::slice::Iter<'a, Transform>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_collection() {
        let collection = TransformCollection::new();
        assert!(collection.is_empty());
        assert_eq!(collection.specifier(), "");
    }

    #[test]
    fn test_specifier_concatenation() {
        let mut collection = TransformCollection::new();
        collection.add(Transform::rotate(90.0).unwrap());
        collection.add(Transform::crop(0, 0, 50, 50).unwrap());
        assert_eq!(collection.specifier(), "rotate:90|crop:0,0,50,50");
    }

    #[test]
    fn test_specifier_is_order_sensitive() {
        let mut forward = TransformCollection::new();
        forward.add(Transform::rotate(90.0).unwrap());
        forward.add(Transform::crop(0, 0, 50, 50).unwrap());

        let mut reversed = TransformCollection::new();
        reversed.add(Transform::crop(0, 0, 50, 50).unwrap());
        reversed.add(Transform::rotate(90.0).unwrap());

        assert_ne!(forward.specifier(), reversed.specifier());
    }

    #[test]
    fn test_specifier_is_deterministic() {
        let build = || {
            let mut collection = TransformCollection::new();
            collection.add(Transform::rotate(90.0).unwrap());
            collection.add(Transform::crop(0, 0, 50, 50).unwrap());
            collection.specifier()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_clear_resets() {
        let mut collection = TransformCollection::new();
        collection.add(Transform::invert());
        assert!(!collection.is_empty());
        collection.clear();
        assert!(collection.is_empty());
    }
}
