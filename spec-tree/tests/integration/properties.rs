// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use proptest::prelude::*;
use spec_tree::{
    config::RunConfig,
    location::CodeLocation,
    nodes::{Body, SetupKind},
    partition::PartitionStrategy,
    suite::Suite,
    tree::Ancestor,
};
use std::{collections::BTreeMap, sync::Arc};
use test_strategy::proptest;

/// The shape of a declaration: what gets declared, in which order.
#[derive(Clone, Debug)]
enum Shape {
    Leaf(String),
    Hook(SetupKind),
    Container(String, Vec<Shape>),
}

fn shapes() -> impl Strategy<Value = Vec<Shape>> {
    let leaf = prop_oneof![
        3 => "[a-z]{1,3}".prop_map(Shape::Leaf),
        1 => prop_oneof![
            Just(SetupKind::BeforeEach),
            Just(SetupKind::JustBeforeEach),
            Just(SetupKind::AfterEach),
        ]
        .prop_map(Shape::Hook),
    ];
    let node = leaf.prop_recursive(4, 32, 4, |inner| {
        ("[A-Z]{1,3}", prop::collection::vec(inner, 0..4))
            .prop_map(|(text, children)| Shape::Container(text, children))
    });
    prop::collection::vec(node, 0..5)
}

fn declare(suite: &mut Suite, shapes: &[Shape]) {
    for shape in shapes {
        match shape {
            Shape::Leaf(text) => suite.it(text.clone(), || {}),
            Shape::Hook(kind) => {
                suite.push_setup(*kind, CodeLocation::default(), None, Body::sync(|| {}));
            }
            Shape::Container(text, children) => {
                suite.describe(text.clone(), |s| declare(s, children));
            }
        }
    }
}

/// Everything is declared inside one container so that no leaf is top-level.
fn build(shapes: &[Shape]) -> Suite {
    let mut suite = Suite::new();
    suite.describe("root", |s| declare(s, shapes));
    suite
}

fn hook_counts(ancestors: &[Arc<Ancestor>]) -> Vec<[usize; 3]> {
    ancestors
        .iter()
        .map(|a| {
            [
                SetupKind::BeforeEach,
                SetupKind::JustBeforeEach,
                SetupKind::AfterEach,
            ]
            .map(|kind| a.hooks().of_kind(kind).len())
        })
        .collect()
}

fn summary(suite: &Suite) -> Vec<(String, String)> {
    suite
        .root()
        .collate()
        .iter()
        .map(|c| {
            let text = c
                .ancestors()
                .iter()
                .map(|a| a.text())
                .chain(std::iter::once(c.subject().text()))
                .collect::<Vec<_>>()
                .join(" ");
            (c.subject().coordinate().to_string(), text)
        })
        .collect()
}

#[proptest(cases = 64)]
fn declaring_twice_yields_identical_coordinates(#[strategy(shapes())] shapes: Vec<Shape>) {
    prop_assert_eq!(summary(&build(&shapes)), summary(&build(&shapes)));
}

#[proptest(cases = 32)]
fn replay_reconstructs_every_spec(
    #[strategy(shapes())] shapes: Vec<Shape>,
    seed: u64,
) {
    let mut suite = Suite::new();
    suite.declare(move |s| s.describe("root", |s| declare(s, &shapes)));

    let config = RunConfig::default().with_random_seed(seed);
    let specs = suite.generate_specs(&config, "suite").unwrap();
    for spec in &specs {
        let replayed = suite.replay_spec(spec).unwrap();

        let expected: Vec<_> = spec
            .ancestors()
            .iter()
            .map(|a| (a.text().to_owned(), a.location().clone()))
            .collect();
        let actual: Vec<_> = replayed
            .ancestors()
            .iter()
            .map(|a| (a.text().to_owned(), a.location().clone()))
            .collect();
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(hook_counts(replayed.ancestors()), hook_counts(spec.ancestors()));
        prop_assert_eq!(replayed.subject().text(), spec.subject().text());
        prop_assert_eq!(replayed.subject().location(), spec.subject().location());
        prop_assert_eq!(replayed.subject().coordinate(), spec.coordinate());
    }
}

#[proptest(cases = 32)]
fn same_seed_same_order(
    #[strategy(shapes())] shapes: Vec<Shape>,
    seed: u64,
    randomize_all_specs: bool,
) {
    let config = RunConfig::default()
        .with_random_seed(seed)
        .with_randomize_all_specs(randomize_all_specs);
    let order = |suite: &Suite| -> Vec<String> {
        suite
            .generate_specs(&config, "suite")
            .unwrap()
            .iter()
            .map(|spec| spec.coordinate().to_string())
            .collect()
    };
    prop_assert_eq!(order(&build(&shapes)), order(&build(&shapes)));
}

#[proptest(cases = 32)]
fn nodes_cover_the_spec_set_exactly_once(
    #[strategy(shapes())] shapes: Vec<Shape>,
    #[strategy(1u64..6)] total: u64,
    seed: u64,
    #[strategy(prop_oneof![
        Just(PartitionStrategy::Chunk),
        Just(PartitionStrategy::Count),
        Just(PartitionStrategy::Hash),
    ])]
    strategy: PartitionStrategy,
) {
    let mut counts = BTreeMap::new();
    for node in 1..=total {
        let config = RunConfig::default()
            .with_parallel(node, total)
            .with_partition(strategy)
            .with_random_seed(seed);
        for spec in &build(&shapes).generate_specs(&config, "suite").unwrap() {
            *counts.entry(spec.coordinate().to_string()).or_insert(0) += 1;
        }
    }

    let all: Vec<String> = build(&shapes)
        .generate_specs(&RunConfig::default(), "suite")
        .unwrap()
        .iter()
        .map(|spec| spec.coordinate().to_string())
        .collect();
    prop_assert_eq!(counts.len(), all.len());
    prop_assert!(counts.values().all(|&count| count == 1), "{:?}", counts);
}
