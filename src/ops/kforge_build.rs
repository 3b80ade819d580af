//! Implementation of `kforge build` and `kforge compile`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};

use crate::bridge::{probe_backend, BackendPreference, BuildBackend};
use crate::builder::events::BuildEvent;
use crate::builder::executor::{
    default_jobs, BuildExecutor, BuildObserver, CompileOutput, ExecutionReport, Outcome,
    UnitOutcome,
};
use crate::builder::plan::CompileUnit;
use crate::ops::pipeline::{
    prepare, report_diagnostics, PrepareOptions, Prepared, RunState, RunTracker,
};
use crate::util::config::FailurePolicy;
use crate::util::context::Context;
use crate::util::fs::{relative_path, DiskTree};
use crate::util::shell::{format_duration, Progress, Shell, Status};

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Selection, manifest and architecture overrides
    pub prepare: PrepareOptions,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Failure policy; falls back to the configured one
    pub policy: Option<FailurePolicy>,

    /// Backend preference; falls back to the configured one
    pub backend: Option<BackendPreference>,
}

/// Outcome of a build run.
#[derive(Debug)]
pub struct BuildResult {
    pub prepared: Prepared,
    pub report: ExecutionReport,
    pub backend: &'static str,
    pub state: RunState,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}

/// Reports executor progress through the shell.
struct ShellObserver<'a> {
    shell: &'a Shell,
    progress: &'a Progress,
}

impl BuildObserver for ShellObserver<'_> {
    fn unit_started(&self, unit: &CompileUnit) {
        self.shell
            .verbose_status(Status::Compiling, unit.source.display());
    }

    fn unit_finished(&self, outcome: &UnitOutcome) {
        self.progress.inc(1);
        if self.shell.is_json() {
            self.shell.json_event(&BuildEvent::unit(outcome));
            return;
        }
        match &outcome.outcome {
            Outcome::Failed(failure) => {
                let mut msg = format!("error: {}", failure);
                let stderr = failure.stderr().trim_end();
                if !stderr.is_empty() {
                    msg.push('\n');
                    msg.push_str(stderr);
                }
                self.progress.println(msg);
            }
            Outcome::Succeeded(out) if self.shell.is_verbose() && !out.stderr.trim().is_empty() => {
                self.progress.println(out.stderr.trim_end());
            }
            _ => {}
        }
    }
}

fn backend_preference(ctx: &Context, explicit: Option<BackendPreference>) -> Result<BackendPreference> {
    if let Some(pref) = explicit {
        return Ok(pref);
    }
    match ctx.config().build.backend.as_deref() {
        Some(s) => s
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("invalid `build.backend` in configuration"),
        None => Ok(BackendPreference::Auto),
    }
}

/// Load the backend the user asked for.
pub fn load_backend(
    ctx: &Context,
    explicit: Option<BackendPreference>,
) -> Result<Box<dyn BuildBackend>> {
    let preference = backend_preference(ctx, explicit)?;
    let backend = probe_backend(ctx, preference)?;
    tracing::debug!("backend: {}", backend.name());
    Ok(backend)
}

/// Run the whole pipeline and compile the plan.
///
/// A compile failure is not an `Err`: it is reported in the returned
/// [`BuildResult`]. Errors are reserved for conditions that stop the run
/// before execution starts.
pub fn build(ctx: &Context, opts: &BuildOptions, shell: &Shell) -> Result<BuildResult> {
    let mut tracker = RunTracker::new();
    let tree = DiskTree::new(ctx.root());

    shell.status(Status::Resolving, "subsystem selection");
    let prepared = prepare(ctx, &opts.prepare, &tree, &mut tracker)?;
    report_diagnostics(shell, &prepared.diagnostics);

    let backend = match load_backend(ctx, opts.backend) {
        Ok(backend) => backend,
        Err(e) => {
            tracker.abort();
            return Err(e);
        }
    };

    let policy = match opts.policy {
        Some(policy) => policy,
        None => match ctx.config().policy() {
            Ok(policy) => policy.unwrap_or_default(),
            Err(e) => {
                tracker.abort();
                return Err(e);
            }
        },
    };
    let jobs = opts
        .jobs
        .or(ctx.config().build.jobs)
        .unwrap_or_else(default_jobs);

    let plan = &prepared.plan;
    shell.status(
        Status::Building,
        format!(
            "{} unit(s) from {} subsystem(s) for {} ({} backend)",
            plan.unit_count(),
            plan.groups.len(),
            prepared.arch,
            backend.name()
        ),
    );
    shell.json_event(
        &BuildEvent::started(
            &prepared.arch,
            backend.name(),
            plan.groups.len(),
            plan.unit_count(),
        )
        .with_fingerprint(plan.fingerprint()),
    );

    tracker.advance(RunState::Executing)?;
    let progress = shell.progress(plan.unit_count() as u64, "Compiling");
    let observer = ShellObserver {
        shell,
        progress: &progress,
    };
    let executed = BuildExecutor::new(ctx.root(), &tree)
        .policy(policy)
        .jobs(jobs)
        .observer(&observer)
        .execute(plan, backend.as_compiler());
    progress.finish();

    let report = match executed {
        Ok(report) => report,
        Err(e) => {
            tracker.abort();
            return Err(e);
        }
    };

    if report.aborted {
        tracker.abort();
    } else {
        tracker.advance(RunState::Completed)?;
    }

    shell.json_event(&BuildEvent::finished(&report));
    if report.is_success() {
        shell.status(
            Status::Finished,
            format!(
                "{} unit(s) in {}",
                report.succeeded,
                format_duration(report.elapsed)
            ),
        );
    } else {
        tracing::debug!(
            "{} failed, {} skipped",
            report.failed(),
            report.skipped()
        );
    }

    Ok(BuildResult {
        prepared,
        report,
        backend: backend.name(),
        state: tracker.state(),
    })
}

/// Options for compiling a single file.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Source path, absolute or relative to the current directory or kernel root
    pub file: PathBuf,
    pub backend: Option<BackendPreference>,
}

/// Source path relative to the kernel root, checked for existence.
fn locate_source(ctx: &Context, file: &Path) -> Result<PathBuf> {
    let candidates = if file.is_absolute() {
        vec![file.to_path_buf()]
    } else {
        let mut c = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            c.push(cwd.join(file));
        }
        c.push(ctx.root().join(file));
        c
    };

    match candidates.iter().find(|p| p.is_file()) {
        Some(found) => Ok(relative_path(ctx.root(), found)),
        None => bail!(
            "source file `{}` not found\n\
             hint: paths are resolved against the current directory and the kernel root",
            file.display()
        ),
    }
}

/// Compile one source file outside of any plan.
pub fn compile_file(ctx: &Context, opts: &CompileOptions, shell: &Shell) -> Result<CompileOutput> {
    let source = locate_source(ctx, &opts.file)?;
    let backend = load_backend(ctx, opts.backend)?;

    shell.status(Status::Compiling, source.display());
    let output = backend.compile_file(&source, ctx.root())?;
    shell.status(Status::Compiled, source.display());
    Ok(output)
}
