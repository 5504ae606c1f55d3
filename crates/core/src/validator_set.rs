use std::ops;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// The ordered set of validator identities
///
/// Unique, and ordered by insertion: the sequence is the add order
/// minus any removals, which external watchers rely on. Notably *not*
/// sorted.
#[derive(Debug, Clone, Encode, Decode, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ValidatorSet(Vec<Address>);

impl ops::Deref for ValidatorSet {
    type Target = [Address];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    /// Append a validator, returning `false` on a duplicate
    pub fn push(&mut self, address: Address) -> bool {
        if self.0.contains(&address) {
            return false;
        }
        self.0.push(address);
        true
    }

    /// Remove a validator, preserving the relative order of the rest
    pub fn remove(&mut self, address: Address) -> bool {
        let Some(index) = self.0.iter().position(|a| *a == address) else {
            return false;
        };
        self.0.remove(index);
        true
    }
}

impl FromIterator<Address> for ValidatorSet {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        Self(Vec::from_iter(iter))
    }
}

impl IntoIterator for ValidatorSet {
    type Item = Address;

    type IntoIter = <Vec<Address> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidatorSet {
    type Item = &'a Address;

    type IntoIter = <&'a [Address] as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.as_slice().iter()
    }
}

impl<const N: usize> From<[Address; N]> for ValidatorSet {
    fn from(value: [Address; N]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<Address>> for ValidatorSet {
    fn from(value: Vec<Address>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut set = ValidatorSet::new();
        assert!(set.push(addr(3)));
        assert!(set.push(addr(1)));
        assert!(set.push(addr(2)));
        assert!(!set.push(addr(1)));
        assert_eq!(set.as_slice(), &[addr(3), addr(1), addr(2)]);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut set: ValidatorSet = vec![addr(3), addr(1), addr(2)].into();
        assert!(set.remove(addr(1)));
        assert!(!set.remove(addr(1)));
        assert_eq!(set.as_slice(), &[addr(3), addr(2)]);
    }
}
