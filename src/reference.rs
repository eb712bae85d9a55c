use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A reference to a BDD node, possibly complemented.
///
/// Positive values point to the node itself, negative values to its
/// complement. Node index 1 is the terminal: `@1` is ONE and `~@1` is ZERO.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref(i32);

impl Ref {
    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn negative(index: u32) -> Self {
        Self(-(index as i32))
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    /// Return the internal representation of the reference.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Return the index of the referenced node.
    pub const fn index(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Map the signed reference onto a non-negative integer, for hashing.
    pub(crate) const fn unsigned(self) -> u32 {
        (self.0.unsigned_abs() << 1) + (self.0 < 0) as u32
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}
