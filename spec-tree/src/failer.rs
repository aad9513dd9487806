// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting declaration-time misuse.
//!
//! Declaration helpers are called from inside author closures, which have no `Result` channel
//! back to the caller. Misuse detected there (declaring a leaf outside a container, registering a
//! hook after the run started) is reported to a [`Failer`] and the offending node is dropped.

use crate::location::CodeLocation;
use std::sync::Mutex;
use tracing::error;

/// A sink for declaration-time failures.
pub trait Failer {
    /// Records a failure at the given location.
    fn fail(&self, message: &str, location: &CodeLocation);
}

/// A [`Failer`] that logs failures at the error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingFailer;

impl Failer for TracingFailer {
    fn fail(&self, message: &str, location: &CodeLocation) {
        error!("{location}: {message}");
    }
}

/// A failure recorded by a [`RecordingFailer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedFailure {
    /// The failure message.
    pub message: String,

    /// Where the failure happened.
    pub location: CodeLocation,
}

/// A [`Failer`] that keeps every failure for later inspection.
#[derive(Debug, Default)]
pub struct RecordingFailer {
    failures: Mutex<Vec<RecordedFailure>>,
}

impl RecordingFailer {
    /// Creates a new, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the failures recorded so far.
    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.lock().clone()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedFailure>> {
        // A poisoned lock only means another thread panicked mid-push; the data is still usable.
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Failer for RecordingFailer {
    fn fail(&self, message: &str, location: &CodeLocation) {
        self.lock().push(RecordedFailure {
            message: message.to_owned(),
            location: location.clone(),
        });
    }
}
