// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The flat, ordered set of specs produced by collating a declaration tree.
//!
//! Every operation here preserves the set of specs and only changes their order or their run
//! state, with the exception of [`Specs::trim_for_parallelization`] which drops the specs owned by
//! other nodes.

use crate::{
    filter::FocusFilter,
    partition::{ParallelConfig, PartitionStrategy},
    spec::Spec,
    tree::Collated,
};
use rand::{Rng, seq::SliceRandom};
use tracing::debug;

/// How focus was resolved for a run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FocusResolution {
    /// Every non-pending spec runs.
    Unfiltered,

    /// At least one spec was declared focused; only focused specs run and patterns are ignored.
    Programmatic,

    /// A focus or skip pattern selected the specs to run.
    Patterns,
}

/// An ordered list of specs.
#[derive(Clone, Debug, Default)]
pub struct Specs {
    specs: Vec<Spec>,
    has_programmatic_focus: bool,
}

impl Specs {
    /// Creates a spec set from collated leaves, in order.
    pub fn new(collated: impl IntoIterator<Item = Collated>) -> Self {
        Self {
            specs: collated.into_iter().map(Spec::new).collect(),
            has_programmatic_focus: false,
        }
    }

    /// Permutes the whole list.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.specs.shuffle(rng);
    }

    /// Decides which specs run, based on programmatic focus and then on `filter`.
    ///
    /// If any non-pending spec is programmatically focused, every unfocused spec is skipped and
    /// `filter` is not consulted. Otherwise each spec's `description`, a space and its full text
    /// is matched against `filter`. Pending specs stay pending either way.
    pub fn apply_focus(&mut self, description: &str, filter: &FocusFilter) -> FocusResolution {
        self.has_programmatic_focus = self
            .specs
            .iter()
            .any(|spec| !spec.is_pending() && spec.is_focused());

        if self.has_programmatic_focus {
            for spec in &mut self.specs {
                if !spec.is_focused() {
                    spec.skip();
                }
            }
            debug!(
                "programmatic focus: {} of {} specs remain runnable",
                self.runnable_count(),
                self.len()
            );
            return FocusResolution::Programmatic;
        }

        if !filter.is_active() {
            return FocusResolution::Unfiltered;
        }

        for spec in &mut self.specs {
            let composed = format!("{description} {}", spec.full_text());
            if !filter.check(&composed).is_match() {
                spec.skip();
            }
        }
        debug!(
            "focus patterns: {} of {} specs remain runnable",
            self.runnable_count(),
            self.len()
        );
        FocusResolution::Patterns
    }

    /// Skips every measurement spec.
    pub fn skip_measurements(&mut self) {
        for spec in &mut self.specs {
            if spec.is_measurement() {
                spec.skip();
            }
        }
    }

    /// Keeps only the specs that `parallel`'s node is responsible for.
    ///
    /// `parallel` must have been validated. Every node running the same declaration code with the
    /// same seed and strategy keeps a disjoint share, and together the shares cover every spec.
    pub fn trim_for_parallelization(
        &mut self,
        parallel: ParallelConfig,
        strategy: PartitionStrategy,
    ) {
        if !parallel.is_parallel() {
            return;
        }

        let before = self.specs.len();
        let mut partitioner = strategy.build(parallel, before);
        self.specs
            .retain(|spec| partitioner.spec_matches(&spec.coordinate().to_string()));
        debug!(
            "node {parallel} ({strategy}): kept {} of {before} specs",
            self.specs.len()
        );
    }

    /// Iterates over the specs in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Spec> {
        self.specs.iter()
    }

    /// The number of specs, including skipped and pending ones.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if there are no specs.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Whether any non-pending spec was programmatically focused. Set by
    /// [`apply_focus`](Self::apply_focus).
    pub fn has_programmatic_focus(&self) -> bool {
        self.has_programmatic_focus
    }

    /// The number of specs that will run.
    pub fn runnable_count(&self) -> usize {
        self.specs.iter().filter(|spec| spec.is_runnable()).count()
    }

    /// Consumes this set, returning the specs in order.
    pub fn into_vec(self) -> Vec<Spec> {
        self.specs
    }
}

impl<'a> IntoIterator for &'a Specs {
    type Item = &'a Spec;
    type IntoIter = std::slice::Iter<'a, Spec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Specs {
    type Item = Spec;
    type IntoIter = std::vec::IntoIter<Spec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.into_iter()
    }
}
