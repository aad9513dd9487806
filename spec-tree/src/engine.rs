// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contracts with the collaborators that run specs.
//!
//! This crate decides *what* runs and in which order; an [`ExecutionEngine`] decides *how*:
//! running hooks and bodies, enforcing timeouts and capturing failures.

use crate::{
    errors::TransportError,
    nodes::{AllNodesBeforeBody, PrimaryBeforeBody, SetupHooks, SuiteNode},
    partition::ParallelConfig,
    specs::Specs,
};
use std::time::Duration;
use tracing::debug;

/// Everything an [`ExecutionEngine`] needs for one run.
#[derive(Debug)]
pub struct RunPlan<'a> {
    /// The description of the suite, as passed to [`Suite::run`](crate::suite::Suite::run).
    pub description: &'a str,

    /// Which parallel node this is.
    pub parallel: ParallelConfig,

    /// The timeout for asynchronous bodies whose node does not set one.
    pub default_timeout: Duration,

    /// The before-suite node, if registered.
    pub before_suite: Option<&'a SuiteNode>,

    /// The after-suite node, if registered.
    pub after_suite: Option<&'a SuiteNode>,

    /// Hooks declared at the top level, outside any container. They wrap every spec, outside
    /// the hooks of the spec's ancestors.
    pub top_level_hooks: &'a SetupHooks,

    /// The final ordered, filtered and partitioned specs for this node.
    pub specs: Specs,
}

/// Runs a [`RunPlan`].
pub trait ExecutionEngine {
    /// Runs every runnable spec in order. Returns false if any spec or suite-level node failed.
    fn run(&mut self, plan: RunPlan<'_>) -> bool;
}

/// Ships the payload of a synchronized before-suite from node 1 to every node.
///
/// Implementations must guarantee that every call to [`fetch`](Self::fetch), on any node, returns
/// exactly the bytes passed to the single call to [`publish`](Self::publish) on node 1, blocking
/// until they are available.
pub trait SyncTransport {
    /// Publishes the primary node's payload. Called exactly once, on node 1.
    fn publish(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Returns the published payload, waiting for it if necessary. Called on nodes other than 1.
    fn fetch(&self) -> Result<Vec<u8>, TransportError>;
}

/// Runs both phases of a synchronized before-suite on this node.
///
/// Node 1 runs `primary`, publishes the payload and runs `all_nodes` with it. Every other node
/// fetches the payload and runs `all_nodes` with it.
pub fn run_synchronized_before(
    parallel: ParallelConfig,
    primary: &PrimaryBeforeBody,
    all_nodes: &AllNodesBeforeBody,
    transport: &dyn SyncTransport,
) -> Result<(), TransportError> {
    let payload = if parallel.is_primary() {
        let payload = primary();
        debug!(
            "node {parallel}: publishing {} byte synchronized payload",
            payload.len()
        );
        transport.publish(&payload)?;
        payload
    } else {
        let payload = transport.fetch()?;
        debug!(
            "node {parallel}: received {} byte synchronized payload",
            payload.len()
        );
        payload
    };
    all_nodes(&payload);
    Ok(())
}
