// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single collated spec and its run decision.

use crate::{
    coordinate::Coordinate,
    nodes::SubjectNode,
    tree::{Ancestor, Collated},
};
use itertools::Itertools;
use std::{iter, sync::Arc};

/// Whether a spec will be run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SpecState {
    /// The spec will be run.
    Runnable,

    /// The spec was filtered out: by focus, by a focus/skip pattern, or because it is a
    /// measurement and measurements are skipped.
    Skipped,

    /// The spec, or one of its containers, was declared pending. Pending specs are never run.
    Pending,
}

/// A leaf plus its ancestor chain, with the run decision computed for it.
#[derive(Clone, Debug)]
pub struct Spec {
    collated: Collated,
    state: SpecState,
    focused: bool,
}

impl Spec {
    /// Creates a spec from a collated leaf.
    ///
    /// The spec is focused if the leaf or any ancestor carries a focus flag, and pending if the
    /// leaf or any ancestor is pending.
    pub fn new(collated: Collated) -> Self {
        let flags = || {
            collated
                .ancestors()
                .iter()
                .map(|ancestor| ancestor.flag())
                .chain(iter::once(collated.subject().flag()))
        };
        let pending = flags().any(|flag| flag.is_pending());
        let focused = flags().any(|flag| flag.is_focused());

        Self {
            state: if pending {
                SpecState::Pending
            } else {
                SpecState::Runnable
            },
            focused,
            collated,
        }
    }

    /// The enclosing containers, outermost first.
    pub fn ancestors(&self) -> &[Arc<Ancestor>] {
        self.collated.ancestors()
    }

    /// The leaf.
    pub fn subject(&self) -> &SubjectNode {
        self.collated.subject()
    }

    /// The leaf's coordinate.
    pub fn coordinate(&self) -> &Coordinate {
        self.subject().coordinate()
    }

    /// The current run decision.
    pub fn state(&self) -> SpecState {
        self.state
    }

    /// Returns true if the leaf or any ancestor is programmatically focused.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Returns true if this spec is pending.
    pub fn is_pending(&self) -> bool {
        self.state == SpecState::Pending
    }

    /// Returns true if this spec was skipped.
    pub fn is_skipped(&self) -> bool {
        self.state == SpecState::Skipped
    }

    /// Returns true if this spec will be run.
    pub fn is_runnable(&self) -> bool {
        self.state == SpecState::Runnable
    }

    /// Returns true if this spec is a performance measurement.
    pub fn is_measurement(&self) -> bool {
        self.subject().kind().is_measurement()
    }

    /// Marks this spec as skipped. Pending specs stay pending.
    pub fn skip(&mut self) {
        if self.state == SpecState::Runnable {
            self.state = SpecState::Skipped;
        }
    }

    /// The texts of every ancestor and the leaf, joined by a single space.
    pub fn full_text(&self) -> String {
        self.ancestors()
            .iter()
            .map(|ancestor| ancestor.text())
            .chain(iter::once(self.subject().text()))
            .join(" ")
    }

    /// Returns the collated form of this spec.
    pub fn collated(&self) -> &Collated {
        &self.collated
    }
}
