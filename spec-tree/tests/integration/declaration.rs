// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use spec_tree::{
    config::RunConfig,
    errors::DeclarationError,
    failer::RecordingFailer,
    location::CodeLocation,
    nodes::{Body, SuiteNodeSide},
    partition::PartitionStrategy,
    spec::SpecState,
    specs::FocusResolution,
    suite::Suite,
};
use std::{collections::BTreeSet, sync::Arc};
use test_case::test_case;

#[test]
fn nested_containers_collate_in_declaration_order() -> Result<()> {
    test_init();

    let mut suite = Suite::new();
    declare_a_x_b_y(&mut suite, false);

    let collated = suite.root().collate();
    let chains: Vec<(Vec<&str>, &str)> = collated
        .iter()
        .map(|c| {
            (
                c.ancestors().iter().map(|a| a.text()).collect(),
                c.subject().text(),
            )
        })
        .collect();
    assert_eq!(chains, vec![(vec!["A"], "x"), (vec!["A", "B"], "y")]);

    let coordinates: Vec<String> = collated
        .iter()
        .map(|c| c.subject().coordinate().to_string())
        .collect();
    assert_eq!(coordinates, vec!["0.0", "0.1.0"]);
    Ok(())
}

#[test]
fn focused_leaf_overrides_everything_else() -> Result<()> {
    test_init();

    let mut suite = Suite::new();
    declare_a_x_b_y(&mut suite, true);

    let mut engine = RecordingEngine::new();
    let config = RunConfig::default().with_skip("y");
    let outcome = suite.run(&config, "suite", &mut engine)?;

    ensure!(outcome.has_programmatic_focus, "y is focused");
    assert_eq!(outcome.focus, FocusResolution::Programmatic);
    let run = engine.single_run();
    // The skip pattern is ignored under programmatic focus.
    assert_eq!(run.runnable(), vec!["A B y"]);
    let x = run.specs.iter().find(|spec| spec.text == "A x").unwrap();
    assert_eq!(x.state, SpecState::Skipped);
    Ok(())
}

#[test]
fn focused_container_with_focused_leaf_narrows() -> Result<()> {
    test_init();

    let mut suite = Suite::new();
    suite.fdescribe("A", |s| {
        s.it("x", || {});
        s.fit("y", || {});
    });
    suite.describe("B", |s| s.it("z", || {}));

    let specs = suite.generate_specs(&RunConfig::default(), "suite")?;
    let runnable: Vec<String> = specs
        .iter()
        .filter(|spec| spec.is_runnable())
        .map(|spec| spec.full_text())
        .collect();
    assert_eq!(runnable, vec!["A y"]);
    Ok(())
}

#[test]
fn pending_nodes_never_run() -> Result<()> {
    test_init();

    let mut suite = Suite::new();
    suite.pdescribe("A", |s| {
        s.fit("x", || {});
        s.it("y", || {});
    });
    suite.describe("B", |s| {
        s.pit("z", || {});
        s.it("w", || {});
    });

    let mut engine = RecordingEngine::new();
    let outcome = suite.run(&RunConfig::default(), "suite", &mut engine)?;
    ensure!(
        !outcome.has_programmatic_focus,
        "focus inside a pending container does not count"
    );
    assert_eq!(outcome.focus, FocusResolution::Unfiltered);

    let run = engine.single_run();
    assert_eq!(run.runnable(), vec!["B w"]);
    let pending: BTreeSet<&str> = run
        .specs
        .iter()
        .filter(|spec| spec.state == SpecState::Pending)
        .map(|spec| spec.text.as_str())
        .collect();
    assert_eq!(pending, BTreeSet::from(["A x", "A y", "B z"]));
    Ok(())
}

#[test_case(PartitionStrategy::Chunk ; "chunk")]
#[test_case(PartitionStrategy::Count ; "count")]
#[test_case(PartitionStrategy::Hash ; "hash")]
fn two_nodes_split_the_spec_set(strategy: PartitionStrategy) -> Result<()> {
    test_init();

    let declare = |suite: &mut Suite| {
        suite.describe("A", |s| {
            for text in ["w", "x", "y", "z"] {
                s.it(text, || {});
            }
        });
    };

    let mut shares = Vec::new();
    // Query the second node first; the result must not depend on the order.
    for node in [2, 1] {
        let mut suite = Suite::new();
        declare(&mut suite);
        let config = RunConfig::default()
            .with_parallel(node, 2)
            .with_partition(strategy)
            .with_random_seed(99);
        let specs = suite.generate_specs(&config, "suite")?;
        shares.push(
            specs
                .iter()
                .map(|spec| spec.full_text())
                .collect::<BTreeSet<_>>(),
        );
    }

    ensure!(shares[0].is_disjoint(&shares[1]), "shares overlap: {shares:?}");
    let union: BTreeSet<_> = shares[0].union(&shares[1]).cloned().collect();
    assert_eq!(union.len(), 4);
    if strategy != PartitionStrategy::Hash {
        assert_eq!((shares[0].len(), shares[1].len()), (2, 2));
    }
    Ok(())
}

#[test]
fn before_suite_registered_twice_is_fatal() -> Result<()> {
    test_init();

    let mut suite = Suite::new();
    let first = CodeLocation::new("suite_test.rs", 3, 5);
    let second = CodeLocation::new("suite_test.rs", 4, 5);
    suite.set_before_suite(Body::sync(|| {}), first.clone(), None)?;
    let err = suite
        .set_before_suite(Body::sync(|| {}), second.clone(), None)
        .unwrap_err();
    assert_eq!(
        err,
        DeclarationError::DuplicateSuiteNode {
            side: SuiteNodeSide::Before,
            first,
            second,
        }
    );
    assert_eq!(
        err.to_string(),
        "you may only call BeforeSuite once (first registered at suite_test.rs:3, again at \
         suite_test.rs:4)"
    );
    Ok(())
}

#[test]
fn misuse_is_reported_through_the_failer() {
    test_init();

    let failer = Arc::new(RecordingFailer::new());
    let mut suite = Suite::with_failer(failer.clone());
    suite.it("outside", || {});
    suite.before_each(|| {});
    suite.describe("A", |s| s.it("inside", || {}));

    let failures = failer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].message,
        "You may only call It from within a Describe or Context"
    );
    // Top-level hooks are allowed.
    assert_eq!(suite.top_level_hooks().len(), 1);
}
