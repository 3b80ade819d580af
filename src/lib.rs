//! kforge - subsystem selection, dependency resolution and partial builds
//! for modular kernel trees.
//!
//! This crate provides the core library functionality for kforge:
//! selection parsing, the component catalog, name migration, dependency
//! resolution, build planning, makefile generation and plan execution.

pub mod bridge;
pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities and mocks for kforge unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides an in-memory source tree, a scripted
/// compiler and kernel tree fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{Catalog, Component, ComponentId, Selection, SelectionFile};
pub use resolver::{resolve_selection, MigrationPolicy, Resolution};
pub use util::context::Context;
