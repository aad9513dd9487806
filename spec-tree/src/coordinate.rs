// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Positional identifiers for declared nodes.

use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt;

/// The position of a node in the declaration tree.
///
/// A coordinate is assigned solely from the order in which declaration calls happen: the `i`-th
/// container or leaf declared inside a container at coordinate `C` has coordinate `C.i`. The
/// synthetic root container has the empty coordinate.
///
/// Because declaration code is deterministic, coordinates are stable across repeated runs of the
/// same code, which is what allows a single node to be located again by replaying.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Coordinate {
    // Declaration trees are rarely more than a handful of levels deep.
    indexes: SmallVec<[usize; 8]>,
}

impl Coordinate {
    /// The coordinate of the synthetic root container.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a coordinate from a list of sibling indexes, outermost first.
    pub fn new(indexes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indexes: indexes.into_iter().collect(),
        }
    }

    /// Returns the coordinate of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> Self {
        let mut indexes = self.indexes.clone();
        indexes.push(index);
        Self { indexes }
    }

    /// Returns the coordinate of the parent container, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.indexes.split_last()?;
        Some(Self::new(rest.iter().copied()))
    }

    /// Returns the sibling index of this node within its parent, or `None` for the root.
    pub fn last(&self) -> Option<usize> {
        self.indexes.last().copied()
    }

    /// Returns true if `prefix` is this coordinate or one of its ancestors.
    pub fn starts_with(&self, prefix: &Coordinate) -> bool {
        self.indexes.starts_with(&prefix.indexes)
    }

    /// The number of levels below the root.
    pub fn depth(&self) -> usize {
        self.indexes.len()
    }

    /// Returns true if this is the root coordinate.
    pub fn is_root(&self) -> bool {
        self.indexes.is_empty()
    }

    /// The sibling indexes, outermost first.
    pub fn as_slice(&self) -> &[usize] {
        &self.indexes
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            write!(f, "{}", self.indexes.iter().join("."))
        }
    }
}
