// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The declaration tree and its collation into ordered ancestor chains.

use crate::{
    coordinate::Coordinate,
    location::CodeLocation,
    nodes::{Flag, SetupHooks, SetupNode, SubjectNode},
};
use rand::{Rng, seq::SliceRandom};
use std::sync::Arc;

/// A container in the declaration tree (`describe`/`context`).
///
/// Children are containers and leaves interleaved in declaration order. Setup hooks are kept
/// apart: their order is fixed and never shuffled.
#[derive(Clone, Debug)]
pub struct ContainerNode {
    text: String,
    flag: Flag,
    location: CodeLocation,
    coordinate: Coordinate,
    hooks: SetupHooks,
    children: Vec<ChildNode>,
    has_programmatic_focus: bool,
}

#[derive(Clone, Debug)]
enum ChildNode {
    Container(ContainerNode),
    Subject(SubjectNode),
}

impl ContainerNode {
    pub(crate) const ROOT_TEXT: &'static str = "[Top Level]";

    /// Creates the synthetic root container.
    pub(crate) fn root() -> Self {
        Self::new(
            Self::ROOT_TEXT,
            Flag::None,
            CodeLocation::default(),
            Coordinate::root(),
        )
    }

    pub(crate) fn new(
        text: impl Into<String>,
        flag: Flag,
        location: CodeLocation,
        coordinate: Coordinate,
    ) -> Self {
        Self {
            text: text.into(),
            flag,
            location,
            coordinate,
            hooks: SetupHooks::default(),
            children: Vec::new(),
            has_programmatic_focus: false,
        }
    }

    /// The display text of this container.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The flag of this container. After
    /// [`back_propagate_programmatic_focus`](Self::back_propagate_programmatic_focus) a focused
    /// container whose descendants are also focused loses its own flag.
    pub fn flag(&self) -> Flag {
        self.flag
    }

    /// Where this container was declared.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    /// The coordinate of this container.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// The setup hooks registered directly on this container.
    pub fn hooks(&self) -> &SetupHooks {
        &self.hooks
    }

    /// Whether this container or any descendant is focused. Only meaningful after
    /// [`back_propagate_programmatic_focus`](Self::back_propagate_programmatic_focus).
    pub fn has_programmatic_focus(&self) -> bool {
        self.has_programmatic_focus
    }

    /// The number of direct children (containers and leaves).
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Iterates over the direct child containers.
    pub fn child_containers(&self) -> impl Iterator<Item = &ContainerNode> {
        self.children.iter().filter_map(|child| match child {
            ChildNode::Container(container) => Some(container),
            ChildNode::Subject(_) => None,
        })
    }

    /// Iterates over the direct child leaves.
    pub fn subjects(&self) -> impl Iterator<Item = &SubjectNode> {
        self.children.iter().filter_map(|child| match child {
            ChildNode::Subject(subject) => Some(subject),
            ChildNode::Container(_) => None,
        })
    }

    /// Appends a child container, returning its position among this container's children.
    pub(crate) fn push_container(&mut self, container: ContainerNode) -> usize {
        self.children.push(ChildNode::Container(container));
        self.children.len() - 1
    }

    pub(crate) fn push_subject(&mut self, subject: SubjectNode) {
        self.children.push(ChildNode::Subject(subject));
    }

    pub(crate) fn push_setup(&mut self, setup: SetupNode) {
        self.hooks.push(setup);
    }

    /// Returns the descendant container reached by following `path`, a list of positions among
    /// each level's children.
    pub(crate) fn descendant_mut(&mut self, path: &[usize]) -> &mut ContainerNode {
        let mut node = self;
        for &position in path {
            let ChildNode::Container(child) = &mut node.children[position] else {
                unreachable!("container paths only ever point at containers");
            };
            node = child;
        }
        node
    }

    /// Recursively and independently permutes the children of every container.
    ///
    /// Siblings are sorted by text before being permuted, so the result depends only on the seed
    /// and the set of siblings. Identical seeds produce identical orderings on every worker.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.children.sort_by(|a, b| a.text().cmp(b.text()));
        self.children.shuffle(rng);
        for child in &mut self.children {
            if let ChildNode::Container(container) = child {
                container.shuffle(rng);
            }
        }
    }

    /// Bottom-up focus pass. Returns true if this container or any descendant is focused.
    ///
    /// Pending subtrees never count as focused. A focused container that also has focused
    /// descendants is unfocused, so that only the narrower focus runs.
    pub fn back_propagate_programmatic_focus(&mut self) -> bool {
        if self.flag.is_pending() {
            self.has_programmatic_focus = false;
            return false;
        }

        let mut descendant_focused = false;
        for child in &mut self.children {
            let focused = match child {
                ChildNode::Subject(subject) => subject.flag.is_focused(),
                ChildNode::Container(container) => container.back_propagate_programmatic_focus(),
            };
            descendant_focused |= focused;
        }

        if descendant_focused {
            if self.flag.is_focused() {
                self.flag = Flag::None;
            }
            self.has_programmatic_focus = true;
        } else {
            self.has_programmatic_focus = self.flag.is_focused();
        }
        self.has_programmatic_focus
    }

    /// Flattens the tree depth-first into one entry per reachable leaf.
    ///
    /// Each entry carries the chain of enclosing containers, outermost first. The container this
    /// is called on acts as the root and is not part of the chains.
    pub fn collate(&self) -> Vec<Collated> {
        let mut ancestors = Vec::new();
        let mut collated = Vec::new();
        self.collate_into(&mut ancestors, &mut collated);
        collated
    }

    fn collate_into(&self, ancestors: &mut Vec<Arc<Ancestor>>, out: &mut Vec<Collated>) {
        for child in &self.children {
            match child {
                ChildNode::Subject(subject) => out.push(Collated {
                    ancestors: ancestors.clone(),
                    subject: subject.clone(),
                }),
                ChildNode::Container(container) => {
                    ancestors.push(Arc::new(container.to_ancestor()));
                    container.collate_into(ancestors, out);
                    ancestors.pop();
                }
            }
        }
    }

    fn to_ancestor(&self) -> Ancestor {
        Ancestor {
            text: self.text.clone(),
            flag: self.flag,
            location: self.location.clone(),
            coordinate: self.coordinate.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl ChildNode {
    fn text(&self) -> &str {
        match self {
            Self::Container(container) => &container.text,
            Self::Subject(subject) => &subject.text,
        }
    }
}

/// A snapshot of a container taken during collation, shared by every spec below it.
#[derive(Clone, Debug)]
pub struct Ancestor {
    text: String,
    flag: Flag,
    location: CodeLocation,
    coordinate: Coordinate,
    hooks: SetupHooks,
}

impl Ancestor {
    /// The display text of the container.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The container's flag, after focus back-propagation if that ran before collation.
    pub fn flag(&self) -> Flag {
        self.flag
    }

    /// Where the container was declared.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    /// The container's coordinate.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// The setup hooks registered on the container.
    pub fn hooks(&self) -> &SetupHooks {
        &self.hooks
    }
}

/// A leaf together with its enclosing containers: the unit collation produces.
#[derive(Clone, Debug)]
pub struct Collated {
    ancestors: Vec<Arc<Ancestor>>,
    subject: SubjectNode,
}

impl Collated {
    /// The enclosing containers, outermost first. Hooks compose in this order: outer
    /// `BeforeEach` hooks run before inner ones.
    pub fn ancestors(&self) -> &[Arc<Ancestor>] {
        &self.ancestors
    }

    /// The leaf.
    pub fn subject(&self) -> &SubjectNode {
        &self.subject
    }

    /// Splits this into its ancestors and leaf.
    pub fn into_parts(self) -> (Vec<Arc<Ancestor>>, SubjectNode) {
        (self.ancestors, self.subject)
    }
}
