// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern-based focus and skip filtering.
//!
//! The main structure in this module is [`FocusFilter`]. Patterns are regular expressions matched
//! (unanchored) against a spec's composed description. Programmatic focus takes precedence over
//! these patterns; see [`Specs::apply_focus`](crate::specs::Specs::apply_focus).

use crate::errors::FocusFilterError;
use regex::Regex;
use std::fmt;

/// Which of the two patterns is meant.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PatternKind {
    /// The focus pattern: only matching specs run.
    Focus,

    /// The skip pattern: matching specs are skipped.
    Skip,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Focus => f.write_str("focus"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// The reason a description did not match a [`FocusFilter`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MismatchReason {
    /// A focus pattern is set and the description does not match it.
    NotFocused,

    /// The description matches the skip pattern.
    Skipped,
}

/// The result of matching a description against a [`FocusFilter`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FilterMatch {
    /// The spec should run.
    Matches,

    /// The spec should be skipped.
    Mismatch {
        /// Why the spec is skipped.
        reason: MismatchReason,
    },
}

impl FilterMatch {
    /// Returns true if the spec should run.
    pub fn is_match(self) -> bool {
        matches!(self, Self::Matches)
    }
}

/// Compiled focus and skip patterns.
///
/// An empty pattern string means "not set".
#[derive(Clone, Debug, Default)]
pub struct FocusFilter {
    focus: Option<Regex>,
    skip: Option<Regex>,
}

impl FocusFilter {
    /// Compiles the given focus and skip patterns.
    pub fn new(focus: &str, skip: &str) -> Result<Self, FocusFilterError> {
        Ok(Self {
            focus: compile(PatternKind::Focus, focus)?,
            skip: compile(PatternKind::Skip, skip)?,
        })
    }

    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns true if either pattern is set.
    pub fn is_active(&self) -> bool {
        self.focus.is_some() || self.skip.is_some()
    }

    /// Returns the pattern of the given kind, if set.
    pub fn pattern(&self, kind: PatternKind) -> Option<&str> {
        let regex = match kind {
            PatternKind::Focus => self.focus.as_ref(),
            PatternKind::Skip => self.skip.as_ref(),
        };
        regex.map(Regex::as_str)
    }

    /// Matches a composed description.
    ///
    /// The skip pattern overrides the focus pattern.
    pub fn check(&self, description: &str) -> FilterMatch {
        if self
            .skip
            .as_ref()
            .is_some_and(|skip| skip.is_match(description))
        {
            FilterMatch::Mismatch {
                reason: MismatchReason::Skipped,
            }
        } else if self
            .focus
            .as_ref()
            .is_some_and(|focus| !focus.is_match(description))
        {
            FilterMatch::Mismatch {
                reason: MismatchReason::NotFocused,
            }
        } else {
            FilterMatch::Matches
        }
    }
}

fn compile(kind: PatternKind, pattern: &str) -> Result<Option<Regex>, FocusFilterError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|err| FocusFilterError::new(kind, pattern, err))
}
