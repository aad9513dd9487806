// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leaf, setup and suite-level nodes, and the callable shapes they carry.
//!
//! Bodies are resolved into a [`Body`] variant when they are registered. The execution engine
//! matches on the variant; nothing here inspects a callable at run time.

use crate::{coordinate::Coordinate, location::CodeLocation};
use debug_ignore::DebugIgnore;
use std::{fmt, sync::Arc, time::Duration};

/// The focus/pending flag attached to a container or leaf at declaration time.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Flag {
    /// No flag.
    #[default]
    None,

    /// Programmatically focused (`fdescribe`, `fit`).
    Focused,

    /// Pending: declared but never run (`pdescribe`, `pit`).
    Pending,
}

impl Flag {
    /// Returns true if this is [`Flag::Focused`].
    pub fn is_focused(self) -> bool {
        matches!(self, Self::Focused)
    }

    /// Returns true if this is [`Flag::Pending`].
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A handle passed to asynchronous bodies; the body calls [`Done::complete`] when finished.
pub struct Done {
    signal: Box<dyn FnOnce() + Send>,
}

impl Done {
    /// Creates a new handle which invokes `signal` on completion.
    ///
    /// Engines typically wrap the sending half of a channel here.
    pub fn new(signal: impl FnOnce() + Send + 'static) -> Self {
        Self {
            signal: Box::new(signal),
        }
    }

    /// Signals that the body has finished.
    pub fn complete(self) {
        (self.signal)()
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

/// The callable shape of a leaf or hook body.
#[derive(Clone)]
pub enum Body {
    /// Runs to completion synchronously.
    Sync(Arc<dyn Fn() + Send + Sync>),

    /// Receives a [`Done`] handle and signals completion through it. The engine enforces the
    /// node's timeout while waiting.
    Async(Arc<dyn Fn(Done) + Send + Sync>),
}

impl Body {
    /// Wraps a synchronous closure.
    pub fn sync(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(f))
    }

    /// Wraps a closure that signals completion through [`Done`].
    pub fn with_done(f: impl Fn(Done) + Send + Sync + 'static) -> Self {
        Self::Async(Arc::new(f))
    }

    /// Returns true if this body signals completion asynchronously.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Body::Sync(..)"),
            Self::Async(_) => f.write_str("Body::Async(..)"),
        }
    }
}

/// Collects samples while a measurement body runs.
///
/// Implemented by the execution engine.
pub trait Benchmarker {
    /// Times `f` and records the elapsed time under `name`.
    fn time(&mut self, name: &str, f: &mut dyn FnMut()) -> Duration;

    /// Records an arbitrary value under `name`.
    fn record_value(&mut self, name: &str, value: f64);
}

/// The body of a measurement leaf, invoked once per sample.
pub type MeasureBody = Arc<dyn Fn(&mut dyn Benchmarker) + Send + Sync>;

/// The kind of a leaf, together with its kind-specific body.
#[derive(Clone, Debug)]
pub enum LeafKind {
    /// A regular specification.
    It {
        /// The body to run.
        body: Body,
    },

    /// A performance measurement, run `samples` times.
    Measure {
        /// The number of samples to collect.
        samples: usize,

        /// The body to run for each sample.
        body: DebugIgnore<MeasureBody>,
    },
}

impl LeafKind {
    /// Returns true for measurement leaves.
    pub fn is_measurement(&self) -> bool {
        matches!(self, Self::Measure { .. })
    }
}

/// A single runnable specification: the terminus of every declaration path.
#[derive(Clone, Debug)]
pub struct SubjectNode {
    pub(crate) text: String,
    pub(crate) kind: LeafKind,
    pub(crate) flag: Flag,
    pub(crate) location: CodeLocation,
    pub(crate) coordinate: Coordinate,
    pub(crate) timeout: Option<Duration>,
}

impl SubjectNode {
    /// The display text of this leaf.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The kind of this leaf, and its body.
    pub fn kind(&self) -> &LeafKind {
        &self.kind
    }

    /// The flag declared on this leaf.
    pub fn flag(&self) -> Flag {
        self.flag
    }

    /// Where this leaf was declared.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    /// The coordinate of this leaf: its container's coordinate plus its sibling index.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// The timeout for asynchronous bodies, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// The kind of a per-spec setup hook.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SetupKind {
    /// Runs before each spec in the container, outermost first.
    BeforeEach,

    /// Runs after every `BeforeEach` and immediately before the spec body.
    JustBeforeEach,

    /// Runs after each spec in the container, innermost first.
    AfterEach,
}

impl fmt::Display for SetupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeEach => f.write_str("BeforeEach"),
            Self::JustBeforeEach => f.write_str("JustBeforeEach"),
            Self::AfterEach => f.write_str("AfterEach"),
        }
    }
}

/// A setup hook attached to a container.
#[derive(Clone, Debug)]
pub struct SetupNode {
    pub(crate) kind: SetupKind,
    pub(crate) body: Body,
    pub(crate) location: CodeLocation,
    pub(crate) timeout: Option<Duration>,
}

impl SetupNode {
    /// The kind of hook.
    pub fn kind(&self) -> SetupKind {
        self.kind
    }

    /// The hook body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Where the hook was declared.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    /// The timeout for an asynchronous body, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// The setup hooks registered on a single container, grouped by kind in declaration order.
#[derive(Clone, Debug, Default)]
pub struct SetupHooks {
    before_each: Vec<SetupNode>,
    just_before_each: Vec<SetupNode>,
    after_each: Vec<SetupNode>,
}

impl SetupHooks {
    pub(crate) fn push(&mut self, node: SetupNode) {
        match node.kind {
            SetupKind::BeforeEach => self.before_each.push(node),
            SetupKind::JustBeforeEach => self.just_before_each.push(node),
            SetupKind::AfterEach => self.after_each.push(node),
        }
    }

    /// Returns the hooks of the given kind, in declaration order.
    pub fn of_kind(&self, kind: SetupKind) -> &[SetupNode] {
        match kind {
            SetupKind::BeforeEach => &self.before_each,
            SetupKind::JustBeforeEach => &self.just_before_each,
            SetupKind::AfterEach => &self.after_each,
        }
    }

    /// The total number of hooks.
    pub fn len(&self) -> usize {
        self.before_each.len() + self.just_before_each.len() + self.after_each.len()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The primary phase of a synchronized before-suite: runs once, on node 1, and produces a
/// payload for every node.
pub type PrimaryBeforeBody = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// The all-nodes phase of a synchronized before-suite: consumes the primary's payload.
pub type AllNodesBeforeBody = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Which side of the suite a suite-level node runs on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SuiteNodeSide {
    /// Runs before any spec.
    Before,

    /// Runs after every spec.
    After,
}

impl fmt::Display for SuiteNodeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("BeforeSuite"),
            Self::After => f.write_str("AfterSuite"),
        }
    }
}

/// The callable shape of a suite-level node.
#[derive(Clone)]
pub enum SuiteBody {
    /// A plain before-suite or after-suite body, run on every node.
    Plain(Body),

    /// A synchronized before-suite.
    SynchronizedBefore {
        /// Runs on node 1 only; its result is published to every node.
        primary: PrimaryBeforeBody,

        /// Runs on every node, including node 1, with the published payload.
        all_nodes: AllNodesBeforeBody,
    },

    /// A synchronized after-suite.
    SynchronizedAfter {
        /// Runs on every node once its specs have finished.
        all_nodes: Body,

        /// Runs on node 1 only, after every node has finished `all_nodes`.
        primary: Body,
    },
}

impl fmt::Debug for SuiteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(body) => f.debug_tuple("Plain").field(body).finish(),
            Self::SynchronizedBefore { .. } => f.write_str("SynchronizedBefore(..)"),
            Self::SynchronizedAfter { all_nodes, primary } => f
                .debug_struct("SynchronizedAfter")
                .field("all_nodes", all_nodes)
                .field("primary", primary)
                .finish(),
        }
    }
}

/// A before-suite or after-suite node.
#[derive(Clone, Debug)]
pub struct SuiteNode {
    pub(crate) side: SuiteNodeSide,
    pub(crate) body: SuiteBody,
    pub(crate) location: CodeLocation,
    pub(crate) timeout: Option<Duration>,
}

impl SuiteNode {
    /// Which side of the suite this node runs on.
    pub fn side(&self) -> SuiteNodeSide {
        self.side
    }

    /// The body of this node.
    pub fn body(&self) -> &SuiteBody {
        &self.body
    }

    /// Where this node was declared.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    /// The timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns true if this node synchronizes across parallel nodes.
    pub fn is_synchronized(&self) -> bool {
        !matches!(self.body, SuiteBody::Plain(_))
    }
}
