//! Build executor.
//!
//! Components are processed one at a time in plan order. Units inside a
//! component are dispatched to a bounded rayon pool; each unit is an
//! independent invocation of the compile collaborator.
//!
//! Under [`FailurePolicy::FailFast`] the first failure stops new work: units
//! already running drain normally, units not yet started are skipped, and no
//! later component is scheduled.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::builder::plan::{BuildPlan, CompileUnit};
use crate::util::config::FailurePolicy;
use crate::util::fs::SourceTree;
use crate::util::process::{ProcessBuilder, TimedOutput};

/// Why a compile unit did not produce its object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileFailure {
    #[error("failed to compile {}{}", file.display(), exit_suffix(*code))]
    Failed {
        file: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("compiling {} timed out after {}s", file.display(), after.as_secs())]
    TimedOut {
        file: PathBuf,
        after: Duration,
        stderr: String,
    },

    #[error("source {} disappeared before it could be compiled", file.display())]
    MissingFileAtExecution { file: PathBuf },

    #[error("could not run the compiler for {}: {message}", file.display())]
    Launch { file: PathBuf, message: String },
}

fn exit_suffix(code: Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit status {})", code),
        None => " (terminated by signal)".to_string(),
    }
}

impl CompileFailure {
    /// Captured compiler output, if any.
    pub fn stderr(&self) -> &str {
        match self {
            CompileFailure::Failed { stderr, .. } | CompileFailure::TimedOut { stderr, .. } => {
                stderr
            }
            CompileFailure::MissingFileAtExecution { .. } | CompileFailure::Launch { .. } => "",
        }
    }

    pub fn file(&self) -> &Path {
        match self {
            CompileFailure::Failed { file, .. }
            | CompileFailure::TimedOut { file, .. }
            | CompileFailure::MissingFileAtExecution { file }
            | CompileFailure::Launch { file, .. } => file,
        }
    }
}

/// Output of a successful compile; warnings end up here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompileOutput {
    pub stdout: String,
    pub stderr: String,
}

/// The compile collaborator.
pub trait Compiler: Sync {
    /// Compile one unit with `root` as the working directory.
    fn compile(&self, unit: &CompileUnit, root: &Path) -> Result<CompileOutput, CompileFailure>;

    /// Compile several units at once. Must return one result per unit, in order.
    fn compile_batch(
        &self,
        units: &[&CompileUnit],
        root: &Path,
    ) -> Vec<Result<CompileOutput, CompileFailure>> {
        units.iter().map(|unit| self.compile(unit, root)).collect()
    }

    /// Whether the executor should hand a component's units over in one batch.
    fn prefers_batch(&self) -> bool {
        false
    }
}

/// Compiles through the kernel's `unibuild.sh` script: `bash <script> <source>`.
#[derive(Debug, Clone)]
pub struct UnibuildCompiler {
    script: PathBuf,
    timeout: Option<Duration>,
}

impl UnibuildCompiler {
    /// `script` is resolved against the working root at invocation time when relative.
    pub fn new(script: impl Into<PathBuf>) -> Self {
        UnibuildCompiler {
            script: script.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Compile a single path relative to `root`.
    pub fn compile_path(&self, source: &Path, root: &Path) -> Result<CompileOutput, CompileFailure> {
        let cmd = ProcessBuilder::new("bash")
            .arg(&self.script)
            .arg(source)
            .cwd(root);
        tracing::debug!("running `{}`", cmd.display_command());

        let output = cmd
            .exec_with_timeout(self.timeout)
            .map_err(|e| CompileFailure::Launch {
                file: source.to_path_buf(),
                message: format!("{:#}", e),
            })?;

        match output {
            TimedOutput::Completed(out) if out.status.success() => Ok(CompileOutput {
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            }),
            TimedOutput::Completed(out) => {
                let mut stderr = String::from_utf8_lossy(&out.stderr).into_owned();
                if stderr.trim().is_empty() {
                    stderr = String::from_utf8_lossy(&out.stdout).into_owned();
                }
                Err(CompileFailure::Failed {
                    file: source.to_path_buf(),
                    code: out.status.code(),
                    stderr,
                })
            }
            TimedOutput::TimedOut { stderr } => Err(CompileFailure::TimedOut {
                file: source.to_path_buf(),
                after: self.timeout.unwrap_or_default(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }),
        }
    }
}

impl Compiler for UnibuildCompiler {
    fn compile(&self, unit: &CompileUnit, root: &Path) -> Result<CompileOutput, CompileFailure> {
        self.compile_path(&unit.source, root)
    }
}

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(CompileOutput),
    Failed(CompileFailure),
    /// Not dispatched because the run was halted.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub unit: CompileUnit,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&CompileFailure> {
        match &self.outcome {
            Outcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}

/// Result of executing a plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// One entry per unit, in plan order
    pub outcomes: Vec<UnitOutcome>,
    /// Index into `outcomes` of the first failure in plan order
    pub first_failure: Option<usize>,
    pub attempted: usize,
    pub succeeded: usize,
    /// Whether fail-fast cut the run short
    pub aborted: bool,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn first_failure(&self) -> Option<&UnitOutcome> {
        self.first_failure.map(|i| &self.outcomes[i])
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Skipped)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// True when no unit failed.
    pub fn is_success(&self) -> bool {
        self.first_failure.is_none()
    }
}

/// Hooks for progress reporting. Called from worker threads.
pub trait BuildObserver: Sync {
    fn unit_started(&self, _unit: &CompileUnit) {}
    fn unit_finished(&self, _outcome: &UnitOutcome) {}
}

/// Observer that reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}

/// Executes a [`BuildPlan`] against a [`Compiler`].
pub struct BuildExecutor<'a> {
    root: &'a Path,
    tree: &'a dyn SourceTree,
    policy: FailurePolicy,
    jobs: usize,
    observer: &'a dyn BuildObserver,
}

impl<'a> BuildExecutor<'a> {
    /// Create an executor for sources under `root`, checked through `tree`.
    pub fn new(root: &'a Path, tree: &'a dyn SourceTree) -> Self {
        BuildExecutor {
            root,
            tree,
            policy: FailurePolicy::default(),
            jobs: default_jobs(),
            observer: &NoopObserver,
        }
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Worker pool size; zero means one.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn observer(mut self, observer: &'a dyn BuildObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Execute the plan.
    pub fn execute(&self, plan: &BuildPlan, compiler: &dyn Compiler) -> Result<ExecutionReport> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .context("failed to start compile worker pool")?;
        let halted = AtomicBool::new(false);

        tracing::info!(
            "compiling {} unit(s) with {} job(s), policy {:?}",
            plan.unit_count(),
            self.jobs,
            self.policy
        );

        let mut outcomes: Vec<UnitOutcome> = Vec::with_capacity(plan.unit_count());
        for group in &plan.groups {
            if group.units.is_empty() {
                continue;
            }
            if halted.load(Ordering::SeqCst) {
                tracing::debug!("skipping component {}", group.id);
                outcomes.extend(group.units.iter().map(|unit| self.skipped(unit)));
                continue;
            }

            let group_outcomes = if compiler.prefers_batch() {
                self.run_batch(&group.units, compiler, &halted)
            } else {
                pool.install(|| {
                    group
                        .units
                        .par_iter()
                        .map(|unit| self.run_unit(unit, compiler, &halted))
                        .collect::<Vec<_>>()
                })
            };
            outcomes.extend(group_outcomes);
        }

        let first_failure = outcomes.iter().position(UnitOutcome::is_failure);
        let report = ExecutionReport {
            attempted: outcomes
                .iter()
                .filter(|o| o.outcome != Outcome::Skipped)
                .count(),
            succeeded: outcomes.iter().filter(|o| o.is_success()).count(),
            aborted: self.policy == FailurePolicy::FailFast && first_failure.is_some(),
            first_failure,
            outcomes,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            "{} attempted, {} succeeded, {} failed, {} skipped",
            report.attempted,
            report.succeeded,
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    fn run_unit(
        &self,
        unit: &CompileUnit,
        compiler: &dyn Compiler,
        halted: &AtomicBool,
    ) -> UnitOutcome {
        if self.policy == FailurePolicy::FailFast && halted.load(Ordering::SeqCst) {
            return self.skipped(unit);
        }

        let start = Instant::now();
        self.observer.unit_started(unit);
        let outcome = if self.tree.exists(&unit.source) {
            match compiler.compile(unit, self.root) {
                Ok(out) => Outcome::Succeeded(out),
                Err(failure) => Outcome::Failed(failure),
            }
        } else {
            Outcome::Failed(CompileFailure::MissingFileAtExecution {
                file: unit.source.clone(),
            })
        };
        self.finish(unit, outcome, start.elapsed(), halted)
    }

    fn run_batch(
        &self,
        units: &[CompileUnit],
        compiler: &dyn Compiler,
        halted: &AtomicBool,
    ) -> Vec<UnitOutcome> {
        let start = Instant::now();
        let mut slots: Vec<Option<Outcome>> = Vec::with_capacity(units.len());
        let mut present: Vec<&CompileUnit> = Vec::new();

        for unit in units {
            self.observer.unit_started(unit);
            if self.tree.exists(&unit.source) {
                slots.push(None);
                present.push(unit);
            } else {
                slots.push(Some(Outcome::Failed(CompileFailure::MissingFileAtExecution {
                    file: unit.source.clone(),
                })));
            }
        }

        let mut results = compiler.compile_batch(&present, self.root).into_iter();
        let elapsed = start.elapsed();

        units
            .iter()
            .zip(slots)
            .map(|(unit, slot)| {
                let outcome = slot.unwrap_or_else(|| match results.next() {
                    Some(Ok(out)) => Outcome::Succeeded(out),
                    Some(Err(failure)) => Outcome::Failed(failure),
                    None => Outcome::Failed(CompileFailure::Launch {
                        file: unit.source.clone(),
                        message: "batch compiler returned no result for this unit".into(),
                    }),
                });
                self.finish(unit, outcome, elapsed, halted)
            })
            .collect()
    }

    fn finish(
        &self,
        unit: &CompileUnit,
        outcome: Outcome,
        duration: Duration,
        halted: &AtomicBool,
    ) -> UnitOutcome {
        if let Outcome::Failed(failure) = &outcome {
            tracing::debug!("{}: {}", unit.owner, failure);
            if self.policy == FailurePolicy::FailFast {
                halted.store(true, Ordering::SeqCst);
            }
        }
        let result = UnitOutcome {
            unit: unit.clone(),
            outcome,
            duration,
        };
        self.observer.unit_finished(&result);
        result
    }

    fn skipped(&self, unit: &CompileUnit) -> UnitOutcome {
        let result = UnitOutcome {
            unit: unit.clone(),
            outcome: Outcome::Skipped,
            duration: Duration::ZERO,
        };
        self.observer.unit_finished(&result);
        result
    }
}

/// Available parallelism, or one.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
