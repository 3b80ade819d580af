//! High-level operations.
//!
//! This module contains the implementation of kforge commands.

pub mod generate;
pub mod kforge_build;
pub mod make;
pub mod pipeline;

pub use generate::{generate, GenerateOptions, GenerateResult};
pub use kforge_build::{build, compile_file, load_backend, BuildOptions, BuildResult, CompileOptions};
pub use make::{clean, make_all};
pub use pipeline::{
    prepare, report_diagnostics, PipelineError, PrepareOptions, Prepared, RunState, RunTracker,
};
