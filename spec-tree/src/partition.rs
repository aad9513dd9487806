// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for partitioning a spec set across several parallel worker processes.
//!
//! Every worker builds the same ordered spec set from the same declaration code and seed, then
//! independently keeps only its own share. Each strategy here is a pure function of the ordered
//! set, the total and the node, so the shares are disjoint and together cover the whole set.

use crate::errors::{ParallelConfigError, PartitionStrategyParseError};
use serde::Deserialize;
use std::{fmt, ops::Range, str::FromStr};
use xxhash_rust::xxh64::xxh64;

/// Which parallel node this process is, out of how many.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ParallelConfig {
    /// The node this is, counting up from 1.
    pub node: u64,

    /// The total number of nodes.
    pub total: u64,
}

impl ParallelConfig {
    /// A single node running everything.
    pub const SERIAL: Self = Self { node: 1, total: 1 };

    /// Creates a new config without validating it; see [`validate`](Self::validate).
    pub fn new(node: u64, total: u64) -> Self {
        Self { node, total }
    }

    /// Checks that `total >= 1` and `1 <= node <= total`.
    pub fn validate(&self) -> Result<(), ParallelConfigError> {
        if self.total < 1 {
            return Err(ParallelConfigError::InvalidTotal { total: self.total });
        }
        if !(1..=self.total).contains(&self.node) {
            return Err(ParallelConfigError::NodeOutOfRange {
                node: self.node,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Returns true if this is node 1: the node that runs the primary phase of synchronized
    /// suite hooks.
    pub fn is_primary(&self) -> bool {
        self.node == 1
    }

    /// Returns true if more than one node is participating.
    pub fn is_parallel(&self) -> bool {
        self.total > 1
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self::SERIAL
    }
}

impl fmt::Display for ParallelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.total)
    }
}

/// How the ordered spec set is split between nodes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// Contiguous, balanced ranges: the first `len % total` nodes get one extra spec.
    #[default]
    Chunk,

    /// Round-robin by position in the ordered set.
    Count,

    /// By hashing each spec's coordinate. Stable even if the run order changes.
    Hash,
}

impl PartitionStrategy {
    /// Returns the string representations of all variants.
    pub fn variants() -> &'static [&'static str] {
        &["chunk", "count", "hash"]
    }

    /// Creates a new `Partitioner` for a spec set of length `len`.
    ///
    /// `parallel` must have been validated.
    pub fn build(self, parallel: ParallelConfig, len: usize) -> Box<dyn Partitioner> {
        match self {
            Self::Chunk => Box::new(ChunkPartitioner::new(parallelized_index_range(
                len,
                parallel.total,
                parallel.node,
            ))),
            Self::Count => Box::new(CountPartitioner::new(parallel.node, parallel.total)),
            Self::Hash => Box::new(HashPartitioner::new(parallel.node, parallel.total)),
        }
    }
}

impl FromStr for PartitionStrategy {
    type Err = PartitionStrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chunk" => Ok(Self::Chunk),
            "count" => Ok(Self::Count),
            "hash" => Ok(Self::Hash),
            other => Err(PartitionStrategyParseError::new(other)),
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk => f.write_str("chunk"),
            Self::Count => f.write_str("count"),
            Self::Hash => f.write_str("hash"),
        }
    }
}

/// Decides, spec by spec in run order, whether a spec belongs to this node.
pub trait Partitioner: fmt::Debug {
    /// Returns true if the next spec in order, identified by `key`, belongs to this node.
    fn spec_matches(&mut self, key: &str) -> bool;
}

/// Returns the range of indexes node `node` (1-based) out of `total` is responsible for.
///
/// The first `len % total` nodes get `ceil(len / total)` specs and the rest get
/// `floor(len / total)`. With more nodes than specs, the trailing nodes get nothing.
pub fn parallelized_index_range(len: usize, total: u64, node: u64) -> Range<usize> {
    // Validated configs have total >= 1 and node in 1..=total, so these conversions only
    // saturate for node counts far beyond any spec count.
    let total = usize::try_from(total).unwrap_or(usize::MAX);
    let node_minus_one = usize::try_from(node.saturating_sub(1)).unwrap_or(usize::MAX);

    let min_per_node = len / total;
    let max_load_nodes = len % total;

    let preceding_max = node_minus_one.min(max_load_nodes);
    let preceding_min = node_minus_one - preceding_max;
    let start = preceding_max * (min_per_node + 1) + preceding_min * min_per_node;
    let count = if node_minus_one < max_load_nodes {
        min_per_node + 1
    } else {
        min_per_node
    };

    let start = start.min(len);
    start..(start + count).min(len)
}

#[derive(Clone, Debug)]
struct ChunkPartitioner {
    range: Range<usize>,
    curr: usize,
}

impl ChunkPartitioner {
    fn new(range: Range<usize>) -> Self {
        Self { range, curr: 0 }
    }
}

impl Partitioner for ChunkPartitioner {
    fn spec_matches(&mut self, _key: &str) -> bool {
        let matches = self.range.contains(&self.curr);
        self.curr += 1;
        matches
    }
}

#[derive(Clone, Debug)]
struct CountPartitioner {
    node_minus_one: u64,
    total: u64,
    curr: u64,
}

impl CountPartitioner {
    fn new(node: u64, total: u64) -> Self {
        Self {
            node_minus_one: node.saturating_sub(1),
            total,
            curr: 0,
        }
    }
}

impl Partitioner for CountPartitioner {
    fn spec_matches(&mut self, _key: &str) -> bool {
        let matches = self.curr == self.node_minus_one;
        self.curr = (self.curr + 1) % self.total;
        matches
    }
}

#[derive(Clone, Debug)]
struct HashPartitioner {
    node_minus_one: u64,
    total: u64,
}

impl HashPartitioner {
    fn new(node: u64, total: u64) -> Self {
        Self {
            node_minus_one: node.saturating_sub(1),
            total,
        }
    }
}

impl Partitioner for HashPartitioner {
    fn spec_matches(&mut self, key: &str) -> bool {
        // NOTE: changing the hash function changes which node runs which spec, so it is fixed.
        xxh64(key.as_bytes(), 0) % self.total == self.node_minus_one
    }
}
