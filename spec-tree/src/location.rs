// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source locations attached to declared nodes.

use std::{fmt, panic::Location};

/// The place in source code where a node was declared.
///
/// Locations are used for failure messages and to compare replayed specs against the ones
/// produced by a full collation.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct CodeLocation {
    file: String,
    line: u32,
    column: u32,
}

impl CodeLocation {
    /// Creates a new location.
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Returns the location of the caller.
    ///
    /// The declaration helpers on [`Suite`](crate::suite::Suite) are `#[track_caller]`, so this
    /// resolves to the line in the test author's code.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    /// The file this location points to.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The 1-based line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The 1-based column number.
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl From<&Location<'_>> for CodeLocation {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
