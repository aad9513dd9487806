// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use spec_tree::{
    engine::{ExecutionEngine, RunPlan, SyncTransport, run_synchronized_before},
    errors::TransportError,
    nodes::{Body, Done, LeafKind, SetupHooks, SetupKind, SuiteBody},
    partition::ParallelConfig,
    spec::{Spec, SpecState},
    suite::Suite,
};
use std::{
    sync::{Arc, Mutex, Once, mpsc},
    time::Duration,
};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = color_eyre::install();
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A shared, append-only event log that bodies write to.
#[derive(Clone, Debug, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    /// Returns a sync body that logs `event`.
    pub(crate) fn logger(&self, event: &str) -> impl Fn() + Send + Sync + 'static {
        let log = self.clone();
        let event = event.to_owned();
        move || log.push(event.clone())
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// What an engine was handed, in a form that is easy to compare.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RecordedSpec {
    pub(crate) text: String,
    pub(crate) coordinate: String,
    pub(crate) state: SpecState,
}

impl RecordedSpec {
    pub(crate) fn new(spec: &Spec) -> Self {
        Self {
            text: spec.full_text(),
            coordinate: spec.coordinate().to_string(),
            state: spec.state(),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedRun {
    pub(crate) description: String,
    pub(crate) parallel: ParallelConfig,
    pub(crate) default_timeout: Duration,
    pub(crate) specs: Vec<RecordedSpec>,
    pub(crate) top_level_hooks: usize,
    pub(crate) has_before_suite: bool,
}

impl RecordedRun {
    pub(crate) fn runnable(&self) -> Vec<&str> {
        self.specs
            .iter()
            .filter(|spec| spec.state == SpecState::Runnable)
            .map(|spec| spec.text.as_str())
            .collect()
    }
}

/// An engine that only records the plan it was given.
#[derive(Debug)]
pub(crate) struct RecordingEngine {
    pub(crate) verdict: bool,
    pub(crate) runs: Vec<RecordedRun>,
}

impl RecordingEngine {
    pub(crate) fn new() -> Self {
        Self {
            verdict: true,
            runs: Vec::new(),
        }
    }

    pub(crate) fn single_run(&self) -> &RecordedRun {
        assert_eq!(self.runs.len(), 1, "expected exactly one run");
        &self.runs[0]
    }
}

impl ExecutionEngine for RecordingEngine {
    fn run(&mut self, plan: RunPlan<'_>) -> bool {
        self.runs.push(RecordedRun {
            description: plan.description.to_owned(),
            parallel: plan.parallel,
            default_timeout: plan.default_timeout,
            specs: plan.specs.iter().map(RecordedSpec::new).collect(),
            top_level_hooks: plan.top_level_hooks.len(),
            has_before_suite: plan.before_suite.is_some(),
        });
        self.verdict
    }
}

/// An in-memory transport shared by the suites of one test.
#[derive(Debug, Default)]
pub(crate) struct MemoryTransport {
    payload: Mutex<Option<Vec<u8>>>,
}

impl SyncTransport for MemoryTransport {
    fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
        *self.payload.lock().unwrap() = Some(payload.to_vec());
        Ok(())
    }

    fn fetch(&self) -> Result<Vec<u8>, TransportError> {
        self.payload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::new("primary has not published"))
    }
}

/// An engine that runs every runnable spec on the current thread.
///
/// Hooks run outermost first (top-level hooks, then each ancestor), after-each hooks innermost
/// first. Asynchronous bodies fail if they drop their [`Done`] handle or do not complete in time.
pub(crate) struct SerialEngine {
    pub(crate) transport: Arc<MemoryTransport>,
}

impl SerialEngine {
    pub(crate) fn new(transport: Arc<MemoryTransport>) -> Self {
        Self { transport }
    }

    fn run_body(body: &Body, timeout: Option<Duration>, default_timeout: Duration) -> bool {
        match body {
            Body::Sync(f) => {
                f();
                true
            }
            Body::Async(f) => {
                let (sender, receiver) = mpsc::channel();
                f(Done::new(move || {
                    let _ = sender.send(());
                }));
                receiver
                    .recv_timeout(timeout.unwrap_or(default_timeout))
                    .is_ok()
            }
        }
    }

    fn run_spec(spec: &Spec, top_level: &SetupHooks, default_timeout: Duration) -> bool {
        let hook_sets: Vec<&SetupHooks> = std::iter::once(top_level)
            .chain(spec.ancestors().iter().map(|ancestor| ancestor.hooks()))
            .collect();
        let mut success = true;

        for kind in [SetupKind::BeforeEach, SetupKind::JustBeforeEach] {
            for hooks in &hook_sets {
                for hook in hooks.of_kind(kind) {
                    success &= Self::run_body(hook.body(), hook.timeout(), default_timeout);
                }
            }
        }

        let subject = spec.subject();
        match subject.kind() {
            LeafKind::It { body } => {
                success &= Self::run_body(body, subject.timeout(), default_timeout);
            }
            LeafKind::Measure { .. } => {}
        }

        for hooks in hook_sets.iter().rev() {
            for hook in hooks.of_kind(SetupKind::AfterEach) {
                success &= Self::run_body(hook.body(), hook.timeout(), default_timeout);
            }
        }
        success
    }
}

impl ExecutionEngine for SerialEngine {
    fn run(&mut self, plan: RunPlan<'_>) -> bool {
        let mut success = true;

        if let Some(before) = plan.before_suite {
            match before.body() {
                SuiteBody::Plain(body) => {
                    success &= Self::run_body(body, before.timeout(), plan.default_timeout);
                }
                SuiteBody::SynchronizedBefore { primary, all_nodes } => {
                    success &= run_synchronized_before(
                        plan.parallel,
                        primary,
                        all_nodes,
                        &*self.transport,
                    )
                    .is_ok();
                }
                SuiteBody::SynchronizedAfter { .. } => unreachable!("after-suite body on before"),
            }
        }

        for spec in plan.specs.iter().filter(|spec| spec.is_runnable()) {
            success &= Self::run_spec(spec, plan.top_level_hooks, plan.default_timeout);
        }

        if let Some(after) = plan.after_suite {
            match after.body() {
                SuiteBody::Plain(body) => {
                    success &= Self::run_body(body, after.timeout(), plan.default_timeout);
                }
                SuiteBody::SynchronizedAfter { all_nodes, primary } => {
                    success &= Self::run_body(all_nodes, after.timeout(), plan.default_timeout);
                    if plan.parallel.is_primary() {
                        success &= Self::run_body(primary, after.timeout(), plan.default_timeout);
                    }
                }
                SuiteBody::SynchronizedBefore { .. } => unreachable!("before-suite body on after"),
            }
        }

        success
    }
}

/// Declares `A { x, B { y } }`.
pub(crate) fn declare_a_x_b_y(suite: &mut Suite, focus_y: bool) {
    suite.describe("A", |s| {
        s.it("x", || {});
        s.describe("B", |s| {
            if focus_y {
                s.fit("y", || {});
            } else {
                s.it("y", || {});
            }
        });
    });
}
