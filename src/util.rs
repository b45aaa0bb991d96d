mod offset_vec;

pub use offset_vec::*;

use std::hash::{Hash, Hasher};

/// Wrapper whose equality and hashing are keyed off the reference itself (the pointer), not the
/// pointed-to data. Used to index graph entities by identity when building the module image.
#[derive(Debug)]
pub struct RefId<'a, T>(pub &'a T);

impl<'a, T> Clone for RefId<'a, T> {
    fn clone(&self) -> Self {
        RefId(self.0)
    }
}

impl<'a, T> Copy for RefId<'a, T> {}

impl<'a, T> Hash for RefId<'a, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

impl<'a, 'b, T> PartialEq<RefId<'b, T>> for RefId<'a, T> {
    fn eq(&self, other: &RefId<'b, T>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a, T> Eq for RefId<'a, T> {}
