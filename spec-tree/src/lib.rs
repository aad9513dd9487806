// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! The declaration and scheduling core of a behavior-driven test framework.
//!
//! Test authors declare nested containers (`describe`/`context`), leaves (`it`/`measure`) and
//! setup hooks against a [`Suite`](suite::Suite). Every declared node receives a
//! [`Coordinate`](coordinate::Coordinate) derived purely from declaration order, so running the
//! same declaration code twice yields the same tree. That property is what makes the rest of the
//! crate work:
//!
//! * the tree is shuffled with a seeded RNG, reproducibly across worker processes;
//! * the tree is collated into a flat, ordered [`Specs`](specs::Specs) list which is then
//!   filtered (programmatic focus, focus/skip patterns, measurements) and partitioned across
//!   parallel workers;
//! * any single leaf can be rebuilt in isolation by [replaying](suite::Suite::replay) the
//!   declaration code while seeking its coordinate.
//!
//! Running spec bodies is delegated to an [`ExecutionEngine`](engine::ExecutionEngine).

pub mod config;
pub mod coordinate;
pub mod engine;
pub mod errors;
pub mod failer;
pub mod filter;
pub mod location;
pub mod nodes;
pub mod partition;
pub mod spec;
pub mod specs;
pub mod suite;
pub mod tree;
