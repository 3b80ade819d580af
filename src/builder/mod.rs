//! Build planning and execution.

pub mod events;
pub mod executor;
pub mod makefile;
pub mod plan;

pub use executor::{
    BuildExecutor, BuildObserver, CompileFailure, CompileOutput, Compiler, ExecutionReport,
    Outcome, UnibuildCompiler, UnitOutcome,
};
pub use plan::{BuildPlan, CompileUnit, PlanStats};
