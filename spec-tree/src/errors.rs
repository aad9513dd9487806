// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by spec-tree.
//!
//! Everything in this module is a *fatal* error: programmer misuse, invalid configuration or an
//! internal consistency violation. Failures inside spec bodies are reported by the execution
//! engine and never show up here.

use crate::{
    coordinate::Coordinate,
    filter::PatternKind,
    location::CodeLocation,
    nodes::SuiteNodeSide,
};
use config::ConfigError;
use std::{borrow::Cow, error, fmt};
use thiserror::Error;

/// An error that occurred while parsing a run configuration.
#[derive(Debug, Error)]
#[error("failed to parse run config at `{origin}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    origin: String,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(origin: impl Into<String>, kind: ConfigParseErrorKind) -> Self {
        Self {
            origin: origin.into(),
            kind,
        }
    }

    /// Returns the name of the source this error is for: a file path, or a name given to an
    /// inline source.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a run configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The config deserialized, but the values are invalid.
    #[error(transparent)]
    InvalidParallelConfig(#[from] ParallelConfigError),
}

/// The parallel-execution settings are out of bounds.
///
/// Raised before any spec is run.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParallelConfigError {
    /// The total number of parallel nodes is zero.
    #[error("parallel total must be >= 1, found {total}")]
    InvalidTotal {
        /// The configured total.
        total: u64,
    },

    /// The node index is outside of `1..=total`.
    #[error("parallel node is one-indexed and must be between 1 and {total}, found {node}")]
    NodeOutOfRange {
        /// The configured 1-based node.
        node: u64,

        /// The configured total.
        total: u64,
    },
}

/// An error that occurs while parsing a
/// [`PartitionStrategy`](crate::partition::PartitionStrategy) input.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for partition strategy: {input}\n(known values: {})",
    crate::partition::PartitionStrategy::variants().join(", "),
)]
pub struct PartitionStrategyParseError {
    input: String,
}

impl PartitionStrategyParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// A focus or skip pattern failed to compile as a regular expression.
#[derive(Clone, Debug, Error)]
#[error("invalid {kind} pattern `{pattern}`")]
pub struct FocusFilterError {
    kind: PatternKind,
    pattern: String,
    #[source]
    err: regex::Error,
}

impl FocusFilterError {
    pub(crate) fn new(kind: PatternKind, pattern: impl Into<String>, err: regex::Error) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
            err,
        }
    }

    /// Returns which pattern failed to compile.
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Returns the pattern that failed to compile.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A declaration was rejected because the suite is misconfigured.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum DeclarationError {
    /// A before-suite or after-suite node was registered twice.
    #[error("you may only call {side} once (first registered at {first}, again at {second})")]
    DuplicateSuiteNode {
        /// Which side of the suite was registered twice.
        side: SuiteNodeSide,

        /// Where the first registration happened.
        first: CodeLocation,

        /// Where the rejected registration happened.
        second: CodeLocation,
    },
}

/// Replaying the declaration code did not locate exactly one leaf.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ReplayError {
    /// No top-level declaration body has been registered with
    /// [`Suite::declare`](crate::suite::Suite::declare).
    #[error("cannot replay: no declaration body was registered")]
    NoDeclaration,

    /// The replay finished without reaching the target leaf.
    #[error("replay did not find leaf {leaf_index} in container {target}")]
    NotFound {
        /// The container coordinate that was sought.
        target: Coordinate,

        /// The sibling index of the leaf within that container.
        leaf_index: usize,
    },

    /// The replayed tree collated into something other than a single spec.
    ///
    /// This indicates that the declaration code is not deterministic, or an internal bug.
    #[error(
        "replay for leaf {leaf_index} in container {target} collated into {count} specs, expected exactly 1"
    )]
    Inconsistent {
        /// The container coordinate that was sought.
        target: Coordinate,

        /// The sibling index of the leaf within that container.
        leaf_index: usize,

        /// The number of specs the replayed tree collated into.
        count: usize,
    },
}

/// An error that aborts a run before any spec is executed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The parallel configuration is invalid.
    #[error("invalid parallel configuration")]
    Parallel(#[from] ParallelConfigError),

    /// A focus or skip pattern is invalid.
    #[error("invalid focus configuration")]
    Filter(#[from] FocusFilterError),

    /// The suite has already been run.
    #[error("the suite has already been run")]
    AlreadyRun,
}

/// An error reported by a [`SyncTransport`](crate::engine::SyncTransport).
#[derive(Debug, Error)]
pub struct TransportError {
    message: Cow<'static, str>,
    #[source]
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a new transport error with a message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error caused by `source`.
    pub fn with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "synchronized setup transport failed: {}", self.message)
    }
}
