use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::error::IdKitError;

/// A `Vec` that holds at least one element.
///
/// Deserialization goes through the same check, so an empty JSON array is rejected with
/// [IdKitError::EmptyConstraint].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(t: T) -> Self {
        Self(vec![t])
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }

    pub fn first(&self) -> &T {
        &self.0[0]
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = IdKitError;

    fn try_from(v: Vec<T>) -> Result<NonEmptyVec<T>, IdKitError> {
        if v.is_empty() {
            return Err(IdKitError::EmptyConstraint);
        }
        Ok(NonEmptyVec(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Vec<T> {
        v
    }
}

impl<T: Clone> AsRef<[T]> for NonEmptyVec<T> {
    fn as_ref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            NonEmptyVec::<u8>::try_from(vec![]),
            Err(IdKitError::EmptyConstraint)
        ));
        assert!(serde_json::from_str::<NonEmptyVec<u8>>("[]").is_err());
        let v: NonEmptyVec<u8> = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(*v.first(), 1);
        assert_eq!(v.len(), 2);
    }
}
