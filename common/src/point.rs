//! Chain positions

use crate::hash::BlockHash;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Slot = u64;

/// An exact block on a specific branch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
pub struct ChainPoint {
    #[n(0)]
    pub hash: BlockHash,
    #[n(1)]
    pub slot: Slot,
}

impl ChainPoint {
    pub fn new(hash: BlockHash, slot: Slot) -> Self {
        Self { hash, slot }
    }

    /// True when a row written at `self` lives on a branch that a rollback
    /// to `target` discards.
    pub fn is_discarded_by(&self, target: &Point) -> bool {
        match target {
            Point::Origin => true,
            Point::Specific(p) => self.slot >= p.slot && self.hash != p.hash,
        }
    }
}

impl fmt::Display for ChainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash, self.slot)
    }
}

/// A position the follower can intersect at or roll back to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
pub enum Point {
    #[n(0)]
    Origin,
    #[n(1)]
    Specific(#[n(0)] ChainPoint),
}

impl Point {
    pub fn slot_or_default(&self) -> Slot {
        match self {
            Point::Origin => 0,
            Point::Specific(p) => p.slot,
        }
    }

    pub fn as_chain_point(&self) -> Option<&ChainPoint> {
        match self {
            Point::Origin => None,
            Point::Specific(p) => Some(p),
        }
    }
}

impl From<ChainPoint> for Point {
    fn from(point: ChainPoint) -> Self {
        Point::Specific(point)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Origin => f.write_str("origin"),
            Point::Specific(p) => p.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;

    fn point(byte: u8, slot: Slot) -> ChainPoint {
        ChainPoint::new(Hash::new([byte; 32]), slot)
    }

    #[test]
    fn should_discard_later_rows_on_other_branch() {
        let target = Point::Specific(point(1, 100));
        assert!(point(2, 100).is_discarded_by(&target));
        assert!(point(2, 150).is_discarded_by(&target));
        assert!(!point(1, 100).is_discarded_by(&target));
        assert!(!point(2, 99).is_discarded_by(&target));
    }

    #[test]
    fn should_discard_everything_on_origin() {
        assert!(point(9, 0).is_discarded_by(&Point::Origin));
    }
}
