// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The declaration builder.
//!
//! A [`Suite`] owns the declaration tree and the cursor describing where the next declaration
//! lands. Declaration code calls into it top to bottom; every call allocates the next sibling
//! coordinate in the current container, so the coordinates depend only on the order of calls.
//!
//! # Replay
//!
//! [`Suite::replay`] rebuilds a single leaf by re-invoking the declaration bodies registered with
//! [`Suite::declare`] while *seeking* a target. During a seek:
//!
//! * a container whose coordinate is not a prefix of the target is registered, but its body is
//!   not invoked;
//! * only the leaf at the target position is attached;
//! * once that leaf is attached, later containers and leaves are no-ops. Setup hooks keep being
//!   registered, so hooks declared below the leaf still wrap it;
//! * suite-level registrations and misuse reports are suppressed, since the normal declaration
//!   pass already handled them.
//!
//! The tree is collated once the bodies return.

use crate::{
    config::RunConfig,
    coordinate::Coordinate,
    engine::{ExecutionEngine, RunPlan},
    errors::{DeclarationError, ReplayError, RunError},
    failer::{Failer, TracingFailer},
    location::CodeLocation,
    nodes::{
        AllNodesBeforeBody, Benchmarker, Body, Done, Flag, LeafKind, PrimaryBeforeBody,
        SetupHooks, SetupKind, SetupNode, SubjectNode, SuiteBody, SuiteNode, SuiteNodeSide,
    },
    spec::Spec,
    specs::{FocusResolution, Specs},
    tree::{Collated, ContainerNode},
};
use debug_ignore::DebugIgnore;
use rand::{SeedableRng, rngs::StdRng};
use std::{mem, rc::Rc, sync::Arc, time::Duration};
use tracing::{debug, info};

/// A top-level declaration body, kept so that it can be replayed.
pub type DeclarationBody = Rc<dyn Fn(&mut Suite)>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Declaring,
    Running,
}

#[derive(Debug)]
struct Seek {
    target: Coordinate,
    leaf_index: usize,
    attached: bool,
}

/// The result of [`Suite::run`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunOutcome {
    /// The engine's verdict: false if any spec or suite-level node failed.
    pub success: bool,

    /// Whether any non-pending spec was programmatically focused.
    pub has_programmatic_focus: bool,

    /// How focus was resolved.
    pub focus: FocusResolution,
}

/// Builds the declaration tree and runs it.
#[derive(Debug)]
pub struct Suite {
    root: ContainerNode,
    // Positions among children, from the root to the current container.
    path: Vec<usize>,
    current_coordinate: Coordinate,
    current_index: usize,
    seek: Option<Seek>,
    phase: Phase,
    before_suite: Option<SuiteNode>,
    after_suite: Option<SuiteNode>,
    failer: DebugIgnore<Arc<dyn Failer>>,
    declarations: DebugIgnore<Vec<DeclarationBody>>,
}

impl Default for Suite {
    fn default() -> Self {
        Self::new()
    }
}

impl Suite {
    /// Creates an empty suite that logs declaration misuse.
    pub fn new() -> Self {
        Self::with_failer(Arc::new(TracingFailer))
    }

    /// Creates an empty suite that reports declaration misuse to `failer`.
    pub fn with_failer(failer: Arc<dyn Failer>) -> Self {
        Self {
            root: ContainerNode::root(),
            path: Vec::new(),
            current_coordinate: Coordinate::root(),
            current_index: 0,
            seek: None,
            phase: Phase::Declaring,
            before_suite: None,
            after_suite: None,
            failer: DebugIgnore(failer),
            declarations: DebugIgnore(Vec::new()),
        }
    }

    /// The synthetic root container.
    pub fn root(&self) -> &ContainerNode {
        &self.root
    }

    /// The coordinate of the container declarations currently land in.
    pub fn current_coordinate(&self) -> &Coordinate {
        &self.current_coordinate
    }

    /// Hooks declared outside any container.
    pub fn top_level_hooks(&self) -> &SetupHooks {
        self.root.hooks()
    }

    /// The registered before-suite node, if any.
    pub fn before_suite_node(&self) -> Option<&SuiteNode> {
        self.before_suite.as_ref()
    }

    /// The registered after-suite node, if any.
    pub fn after_suite_node(&self) -> Option<&SuiteNode> {
        self.after_suite.as_ref()
    }

    // ---
    // Containers
    // ---

    /// Declares a container at the next sibling position and runs `body` inside it.
    pub fn push_container(
        &mut self,
        text: impl Into<String>,
        flag: Flag,
        location: CodeLocation,
        body: impl FnOnce(&mut Suite),
    ) {
        if self.leaf_attached() {
            return;
        }

        let coordinate = self.next_coordinate();
        let descend = self
            .seek
            .as_ref()
            .is_none_or(|seek| seek.target.starts_with(&coordinate));

        let position = self.current_container().push_container(ContainerNode::new(
            text,
            flag,
            location,
            coordinate.clone(),
        ));
        if !descend {
            return;
        }

        let prior_index = mem::replace(&mut self.current_index, 0);
        let prior_coordinate = mem::replace(&mut self.current_coordinate, coordinate);
        self.path.push(position);

        body(self);

        self.path.pop();
        self.current_coordinate = prior_coordinate;
        self.current_index = prior_index;
    }

    /// Declares a container.
    #[track_caller]
    pub fn describe(&mut self, text: impl Into<String>, body: impl FnOnce(&mut Suite)) {
        self.push_container(text, Flag::None, CodeLocation::caller(), body);
    }

    /// Declares a focused container.
    #[track_caller]
    pub fn fdescribe(&mut self, text: impl Into<String>, body: impl FnOnce(&mut Suite)) {
        self.push_container(text, Flag::Focused, CodeLocation::caller(), body);
    }

    /// Declares a pending container. Nothing inside it runs.
    #[track_caller]
    pub fn pdescribe(&mut self, text: impl Into<String>, body: impl FnOnce(&mut Suite)) {
        self.push_container(text, Flag::Pending, CodeLocation::caller(), body);
    }

    /// Declares a container. An alias for [`describe`](Self::describe).
    #[track_caller]
    pub fn context(&mut self, text: impl Into<String>, body: impl FnOnce(&mut Suite)) {
        self.push_container(text, Flag::None, CodeLocation::caller(), body);
    }

    // ---
    // Leaves
    // ---

    /// Declares a leaf at the next sibling position.
    ///
    /// Leaves may only be declared inside a container, and only while declaring.
    pub fn push_leaf(
        &mut self,
        text: impl Into<String>,
        kind: LeafKind,
        flag: Flag,
        location: CodeLocation,
        timeout: Option<Duration>,
    ) {
        if self.leaf_attached() {
            return;
        }

        let index = self.current_index;
        let coordinate = self.next_coordinate();

        let name = if kind.is_measurement() { "Measure" } else { "It" };
        if self.phase == Phase::Running || self.path.is_empty() {
            self.fail(
                &format!("You may only call {name} from within a Describe or Context"),
                &location,
            );
            return;
        }

        let is_target = match &self.seek {
            None => true,
            Some(seek) => seek.target == self.current_coordinate && seek.leaf_index == index,
        };
        if !is_target {
            return;
        }

        self.current_container().push_subject(SubjectNode {
            text: text.into(),
            kind,
            flag,
            location,
            coordinate,
            timeout,
        });

        if let Some(seek) = &mut self.seek {
            seek.attached = true;
        }
    }

    /// Declares a synchronous leaf.
    #[track_caller]
    pub fn it(&mut self, text: impl Into<String>, body: impl Fn() + Send + Sync + 'static) {
        let kind = LeafKind::It {
            body: Body::sync(body),
        };
        self.push_leaf(text, kind, Flag::None, CodeLocation::caller(), None);
    }

    /// Declares a focused synchronous leaf.
    #[track_caller]
    pub fn fit(&mut self, text: impl Into<String>, body: impl Fn() + Send + Sync + 'static) {
        let kind = LeafKind::It {
            body: Body::sync(body),
        };
        self.push_leaf(text, kind, Flag::Focused, CodeLocation::caller(), None);
    }

    /// Declares a pending leaf. It is never run.
    #[track_caller]
    pub fn pit(&mut self, text: impl Into<String>, body: impl Fn() + Send + Sync + 'static) {
        let kind = LeafKind::It {
            body: Body::sync(body),
        };
        self.push_leaf(text, kind, Flag::Pending, CodeLocation::caller(), None);
    }

    /// Declares a leaf that signals completion through [`Done`], within `timeout`.
    #[track_caller]
    pub fn it_async(
        &mut self,
        text: impl Into<String>,
        timeout: Duration,
        body: impl Fn(Done) + Send + Sync + 'static,
    ) {
        let kind = LeafKind::It {
            body: Body::with_done(body),
        };
        self.push_leaf(text, kind, Flag::None, CodeLocation::caller(), Some(timeout));
    }

    /// Declares a measurement leaf, whose body runs once per sample.
    #[track_caller]
    pub fn measure(
        &mut self,
        text: impl Into<String>,
        samples: usize,
        body: impl Fn(&mut dyn Benchmarker) + Send + Sync + 'static,
    ) {
        let kind = LeafKind::Measure {
            samples,
            body: DebugIgnore(Arc::new(body)),
        };
        self.push_leaf(text, kind, Flag::None, CodeLocation::caller(), None);
    }

    // ---
    // Setup hooks
    // ---

    /// Attaches a setup hook to the current container. Hooks declared outside any container are
    /// kept as top-level hooks.
    pub fn push_setup(
        &mut self,
        kind: SetupKind,
        location: CodeLocation,
        timeout: Option<Duration>,
        body: Body,
    ) {
        if self.phase == Phase::Running {
            self.fail(
                &format!("You may only call {kind} from within a Describe or Context"),
                &location,
            );
            return;
        }

        self.current_container().push_setup(SetupNode {
            kind,
            body,
            location,
            timeout,
        });
    }

    /// Runs `body` before each spec in the current container.
    #[track_caller]
    pub fn before_each(&mut self, body: impl Fn() + Send + Sync + 'static) {
        let location = CodeLocation::caller();
        self.push_setup(SetupKind::BeforeEach, location, None, Body::sync(body));
    }

    /// Runs `body` after every before-each hook, immediately before each spec body.
    #[track_caller]
    pub fn just_before_each(&mut self, body: impl Fn() + Send + Sync + 'static) {
        let location = CodeLocation::caller();
        self.push_setup(SetupKind::JustBeforeEach, location, None, Body::sync(body));
    }

    /// Runs `body` after each spec in the current container.
    #[track_caller]
    pub fn after_each(&mut self, body: impl Fn() + Send + Sync + 'static) {
        let location = CodeLocation::caller();
        self.push_setup(SetupKind::AfterEach, location, None, Body::sync(body));
    }

    // ---
    // Suite-level nodes
    // ---

    /// Registers the before-suite node.
    pub fn set_before_suite(
        &mut self,
        body: Body,
        location: CodeLocation,
        timeout: Option<Duration>,
    ) -> Result<(), DeclarationError> {
        self.set_suite_node(SuiteNode {
            side: SuiteNodeSide::Before,
            body: SuiteBody::Plain(body),
            location,
            timeout,
        })
    }

    /// Registers the after-suite node.
    pub fn set_after_suite(
        &mut self,
        body: Body,
        location: CodeLocation,
        timeout: Option<Duration>,
    ) -> Result<(), DeclarationError> {
        self.set_suite_node(SuiteNode {
            side: SuiteNodeSide::After,
            body: SuiteBody::Plain(body),
            location,
            timeout,
        })
    }

    /// Registers a synchronized before-suite: `primary` runs on node 1 only and its payload is
    /// handed to `all_nodes` on every node.
    pub fn set_synchronized_before_suite(
        &mut self,
        primary: PrimaryBeforeBody,
        all_nodes: AllNodesBeforeBody,
        location: CodeLocation,
        timeout: Option<Duration>,
    ) -> Result<(), DeclarationError> {
        self.set_suite_node(SuiteNode {
            side: SuiteNodeSide::Before,
            body: SuiteBody::SynchronizedBefore { primary, all_nodes },
            location,
            timeout,
        })
    }

    /// Registers a synchronized after-suite: `all_nodes` runs on every node, then `primary` runs
    /// on node 1 once every node has finished.
    pub fn set_synchronized_after_suite(
        &mut self,
        all_nodes: Body,
        primary: Body,
        location: CodeLocation,
        timeout: Option<Duration>,
    ) -> Result<(), DeclarationError> {
        self.set_suite_node(SuiteNode {
            side: SuiteNodeSide::After,
            body: SuiteBody::SynchronizedAfter { all_nodes, primary },
            location,
            timeout,
        })
    }

    /// Runs `body` once before any spec.
    #[track_caller]
    pub fn before_suite(
        &mut self,
        body: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), DeclarationError> {
        self.set_before_suite(Body::sync(body), CodeLocation::caller(), None)
    }

    /// Runs `body` once after every spec.
    #[track_caller]
    pub fn after_suite(
        &mut self,
        body: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), DeclarationError> {
        self.set_after_suite(Body::sync(body), CodeLocation::caller(), None)
    }

    /// Runs `primary` on node 1, then `all_nodes` on every node with its payload.
    #[track_caller]
    pub fn synchronized_before_suite(
        &mut self,
        primary: impl Fn() -> Vec<u8> + Send + Sync + 'static,
        all_nodes: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> Result<(), DeclarationError> {
        self.set_synchronized_before_suite(
            Arc::new(primary),
            Arc::new(all_nodes),
            CodeLocation::caller(),
            None,
        )
    }

    /// Runs `all_nodes` on every node, then `primary` on node 1 once all nodes are done.
    #[track_caller]
    pub fn synchronized_after_suite(
        &mut self,
        all_nodes: impl Fn() + Send + Sync + 'static,
        primary: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), DeclarationError> {
        self.set_synchronized_after_suite(
            Body::sync(all_nodes),
            Body::sync(primary),
            CodeLocation::caller(),
            None,
        )
    }

    fn set_suite_node(&mut self, node: SuiteNode) -> Result<(), DeclarationError> {
        // Replays re-run the declaration body, which registers these again.
        if self.seek.is_some() {
            return Ok(());
        }

        let slot = match node.side {
            SuiteNodeSide::Before => &mut self.before_suite,
            SuiteNodeSide::After => &mut self.after_suite,
        };
        if let Some(existing) = slot {
            return Err(DeclarationError::DuplicateSuiteNode {
                side: node.side,
                first: existing.location.clone(),
                second: node.location,
            });
        }
        *slot = Some(node);
        Ok(())
    }

    // ---
    // Declaration and replay
    // ---

    /// Stores `body` as a top-level declaration and runs it.
    ///
    /// `declare` may be called several times; [`replay`](Self::replay) re-invokes every stored
    /// body in order. Replay coordinates only line up with the suite's tree if all top-level
    /// declarations go through `declare`.
    pub fn declare(&mut self, body: impl Fn(&mut Suite) + 'static) {
        let body: DeclarationBody = Rc::new(body);
        self.declarations.push(Rc::clone(&body));
        body(self);
    }

    /// Rebuilds the leaf at sibling position `leaf_index` of the container at `target` by
    /// replaying the declaration bodies.
    ///
    /// The suite's own tree is left untouched.
    pub fn replay(
        &mut self,
        target: &Coordinate,
        leaf_index: usize,
    ) -> Result<Collated, ReplayError> {
        let tree = self.replay_tree(target, leaf_index)?;
        let mut collated = tree.collate();
        let count = collated.len();
        match collated.pop() {
            Some(found) if count == 1 => {
                debug!("replay found {}", found.subject().coordinate());
                Ok(found)
            }
            _ => Err(ReplayError::Inconsistent {
                target: target.clone(),
                leaf_index,
                count,
            }),
        }
    }

    /// Replays the declaration bodies while seeking a leaf, and returns the tree that was built.
    ///
    /// The returned tree holds the containers on the path to the leaf, their hooks, and the leaf
    /// itself. Containers off the path are present but empty.
    pub fn replay_tree(
        &mut self,
        target: &Coordinate,
        leaf_index: usize,
    ) -> Result<ContainerNode, ReplayError> {
        if self.declarations.is_empty() {
            return Err(ReplayError::NoDeclaration);
        }
        let bodies = self.declarations.clone();
        debug!("replaying declarations, seeking leaf {leaf_index} in container {target}");

        let root = mem::replace(&mut self.root, ContainerNode::root());
        let path = mem::take(&mut self.path);
        let coordinate = mem::take(&mut self.current_coordinate);
        let index = mem::replace(&mut self.current_index, 0);
        let phase = mem::replace(&mut self.phase, Phase::Declaring);
        self.seek = Some(Seek {
            target: target.clone(),
            leaf_index,
            attached: false,
        });

        for body in bodies.iter() {
            body(self);
        }

        let attached = self.seek.take().is_some_and(|seek| seek.attached);
        let replayed = mem::replace(&mut self.root, root);
        self.path = path;
        self.current_coordinate = coordinate;
        self.current_index = index;
        self.phase = phase;

        if attached {
            Ok(replayed)
        } else {
            Err(ReplayError::NotFound {
                target: target.clone(),
                leaf_index,
            })
        }
    }

    /// Rebuilds `spec` by replaying the declaration bodies.
    pub fn replay_spec(&mut self, spec: &Spec) -> Result<Collated, ReplayError> {
        let coordinate = spec.coordinate();
        match (coordinate.parent(), coordinate.last()) {
            (Some(container), Some(leaf_index)) => self.replay(&container, leaf_index),
            _ => Err(ReplayError::NotFound {
                target: coordinate.clone(),
                leaf_index: 0,
            }),
        }
    }

    // ---
    // Running
    // ---

    /// Builds the final spec set for this node, without running anything.
    ///
    /// The suite's tree is not modified, so this returns the same result every time it is called
    /// with the same configuration.
    pub fn generate_specs(
        &self,
        config: &RunConfig,
        description: &str,
    ) -> Result<Specs, RunError> {
        self.build_specs(config, description).map(|(specs, _)| specs)
    }

    /// Builds the spec set and hands it to `engine`. A suite can only be run once.
    pub fn run(
        &mut self,
        config: &RunConfig,
        description: &str,
        engine: &mut dyn ExecutionEngine,
    ) -> Result<RunOutcome, RunError> {
        if self.phase == Phase::Running {
            return Err(RunError::AlreadyRun);
        }

        let (specs, focus) = self.build_specs(config, description)?;
        self.phase = Phase::Running;

        let has_programmatic_focus = specs.has_programmatic_focus();
        info!(
            "running {} of {} specs on node {} (seed {})",
            specs.runnable_count(),
            specs.len(),
            config.parallel,
            config.random_seed,
        );

        let plan = RunPlan {
            description,
            parallel: config.parallel,
            default_timeout: config.default_timeout,
            before_suite: self.before_suite.as_ref(),
            after_suite: self.after_suite.as_ref(),
            top_level_hooks: self.root.hooks(),
            specs,
        };
        let success = engine.run(plan);

        Ok(RunOutcome {
            success,
            has_programmatic_focus,
            focus,
        })
    }

    fn build_specs(
        &self,
        config: &RunConfig,
        description: &str,
    ) -> Result<(Specs, FocusResolution), RunError> {
        config.parallel.validate()?;
        let filter = config.focus_filter()?;

        let mut root = self.root.clone();
        root.shuffle(&mut StdRng::seed_from_u64(config.random_seed));
        root.back_propagate_programmatic_focus();

        let mut specs = Specs::new(root.collate());
        debug!("collated {} specs", specs.len());

        if config.randomize_all_specs {
            specs.shuffle(&mut StdRng::seed_from_u64(config.random_seed));
        }
        let focus = specs.apply_focus(description, &filter);
        if config.skip_measurements {
            specs.skip_measurements();
        }
        specs.trim_for_parallelization(config.parallel, config.partition);

        Ok((specs, focus))
    }

    // ---
    // Helpers
    // ---

    fn leaf_attached(&self) -> bool {
        self.seek.as_ref().is_some_and(|seek| seek.attached)
    }

    /// Reports misuse, except during a replay: the normal pass has reported it already.
    fn fail(&self, message: &str, location: &CodeLocation) {
        if self.seek.is_none() {
            self.failer.fail(message, location);
        }
    }

    /// Allocates the next sibling coordinate in the current container.
    fn next_coordinate(&mut self) -> Coordinate {
        let coordinate = self.current_coordinate.child(self.current_index);
        self.current_index += 1;
        coordinate
    }

    fn current_container(&mut self) -> &mut ContainerNode {
        self.root.descendant_mut(&self.path)
    }
}
