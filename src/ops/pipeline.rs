//! The shared front half of every command: load, migrate, validate, resolve, plan.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use crate::builder::events::BuildEvent;
use crate::builder::plan::{plan, BuildPlan};
use crate::core::catalog::Catalog;
use crate::core::selection::SelectionFile;
use crate::resolver::{resolve_selection, MigrationPolicy, Resolution};
use crate::util::context::Context;
use crate::util::diagnostic::Diagnostics;
use crate::util::fs::SourceTree;
use crate::util::shell::Shell;

/// Stages of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Idle,
    ConfigLoaded,
    CatalogLoaded,
    Resolved,
    Planned,
    Executing,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no subsystems selected in {}", path.display())]
    NothingSelected { path: PathBuf },

    #[error(
        "no valid subsystems found in {}\navailable subsystems: {}",
        path.display(),
        available.join(", ")
    )]
    NoValidSelection {
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("invalid run state transition {from:?} -> {to:?}")]
    InvalidTransition { from: RunState, to: RunState },
}

/// Enforces forward-only progress through [`RunState`].
#[derive(Debug, Clone)]
pub struct RunTracker {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        RunTracker {
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to a later state. `Aborted` is reachable from any non-terminal state.
    pub fn advance(&mut self, to: RunState) -> Result<(), PipelineError> {
        let allowed = if to == RunState::Aborted {
            !self.state.is_terminal()
        } else {
            !self.state.is_terminal() && to > self.state
        };
        if !allowed {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!("run state {:?} -> {:?}", self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Mark the run aborted unless it already ended.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = RunState::Aborted;
            self.history.push(RunState::Aborted);
        }
    }
}

/// Inputs overriding the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub selection: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub arch: Option<String>,
}

/// Everything produced before execution.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub selection_path: PathBuf,
    pub selection: SelectionFile,
    pub catalog: Catalog,
    pub resolution: Resolution,
    pub plan: BuildPlan,
    pub arch: String,
    /// Findings from every stage, in stage order
    pub diagnostics: Diagnostics,
}

/// Run the pipeline up to `Planned`.
///
/// Fatal conditions leave `tracker` in `Aborted`.
pub fn prepare(
    ctx: &Context,
    opts: &PrepareOptions,
    tree: &dyn SourceTree,
    tracker: &mut RunTracker,
) -> Result<Prepared> {
    let result = prepare_inner(ctx, opts, tree, tracker);
    if result.is_err() {
        tracker.abort();
    }
    result
}

fn prepare_inner(
    ctx: &Context,
    opts: &PrepareOptions,
    tree: &dyn SourceTree,
    tracker: &mut RunTracker,
) -> Result<Prepared> {
    let selection_path = opts
        .selection
        .as_deref()
        .map(|p| ctx.resolve_path(p))
        .unwrap_or_else(|| ctx.selection_path());
    let manifest_path = opts
        .manifest
        .as_deref()
        .map(|p| ctx.resolve_path(p))
        .unwrap_or_else(|| ctx.manifest_path());
    let arch = opts
        .arch
        .clone()
        .unwrap_or_else(|| ctx.config().arch().to_string());

    let selection = SelectionFile::load(&selection_path)?;
    tracker.advance(RunState::ConfigLoaded)?;
    if selection.selection.is_empty() {
        return Err(PipelineError::NothingSelected {
            path: selection_path,
        }
        .into());
    }

    let catalog = Catalog::load(&manifest_path)?;
    tracker.advance(RunState::CatalogLoaded)?;

    let resolution = resolve_selection(
        &catalog,
        selection.selection.enabled(),
        &MigrationPolicy::builtin(),
    );
    if resolution.valid.is_empty() {
        return Err(PipelineError::NoValidSelection {
            path: selection_path,
            available: catalog.all_ids().into_iter().collect(),
        }
        .into());
    }
    tracker.advance(RunState::Resolved)?;

    let plan = plan(&catalog, &resolution.resolved, &arch, tree);
    tracker.advance(RunState::Planned)?;

    let mut diagnostics = selection.diagnostics.clone();
    diagnostics.extend(resolution.diagnostics.clone());
    diagnostics.extend(plan.diagnostics());

    tracing::info!(
        "{} selected, {} resolved, {} unit(s) for {}",
        resolution.valid.len(),
        resolution.resolved.len(),
        plan.unit_count(),
        arch
    );

    Ok(Prepared {
        selection_path,
        selection,
        catalog,
        resolution,
        plan,
        arch,
        diagnostics,
    })
}

/// Print collected diagnostics: rendered for humans, one event per line in JSON mode.
pub fn report_diagnostics(shell: &Shell, diagnostics: &Diagnostics) {
    for diag in diagnostics.iter() {
        if shell.is_json() {
            shell.json_event(&BuildEvent::diagnostic(diag));
        } else {
            shell.diagnostic(diag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{kernel_tree, MockFileSystem, SAMPLE_SOURCES};
    use crate::util::diagnostic::DiagnosticCode;
    use crate::util::fs::DiskTree;

    #[test]
    fn test_tracker_forward_only() {
        let mut tracker = RunTracker::new();
        tracker.advance(RunState::ConfigLoaded).unwrap();
        tracker.advance(RunState::CatalogLoaded).unwrap();
        assert!(tracker.advance(RunState::ConfigLoaded).is_err());
        assert!(tracker.advance(RunState::CatalogLoaded).is_err());
        tracker.advance(RunState::Planned).unwrap();
        tracker.advance(RunState::Executing).unwrap();
        tracker.advance(RunState::Completed).unwrap();
        assert!(tracker.advance(RunState::Aborted).is_err());
        assert_eq!(tracker.history().first(), Some(&RunState::Idle));
    }

    #[test]
    fn test_tracker_abort_from_any_live_state() {
        let mut tracker = RunTracker::new();
        tracker.advance(RunState::Aborted).unwrap();
        assert!(tracker.state().is_terminal());
        tracker.abort();
        assert_eq!(tracker.history(), &[RunState::Idle, RunState::Aborted]);
    }

    #[test]
    fn test_prepare_full_pipeline() {
        let tree = kernel_tree("SUBSYSTEM_KEYBOARD=y\nSUBSYSTEM_NET=y\nBUILD_PLATFORM=linux\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let mut tracker = RunTracker::new();

        let prepared = prepare(
            &ctx,
            &PrepareOptions::default(),
            &DiskTree::new(tree.path()),
            &mut tracker,
        )
        .unwrap();

        assert_eq!(tracker.state(), RunState::Planned);
        assert_eq!(prepared.arch, "x86-64");
        let resolved = prepared.resolution.resolved.ids();
        for id in ["INTERRUPT", "KERNEL", "MEMORY", "NET", "PCI", "PS2_KEYBOARD"] {
            assert!(resolved.contains(id), "{id} missing");
        }
        assert!(!resolved.contains("KEYBOARD"));
        assert_eq!(prepared.plan.missing_files.len(), 1);

        let codes: Vec<_> = prepared.diagnostics.iter().map(|d| d.code).collect();
        assert!(codes.contains(&DiagnosticCode::MigratedComponent));
        assert!(codes.contains(&DiagnosticCode::DanglingDependency));
        assert!(codes.contains(&DiagnosticCode::MissingSourceFile));
    }

    #[test]
    fn test_prepare_nothing_selected_aborts() {
        let tree = kernel_tree("SUBSYSTEM_NET=n\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let mut tracker = RunTracker::new();

        let err = prepare(
            &ctx,
            &PrepareOptions::default(),
            &MockFileSystem::with_files(SAMPLE_SOURCES.iter().copied()),
            &mut tracker,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NothingSelected { .. })
        ));
        assert_eq!(tracker.state(), RunState::Aborted);
    }

    #[test]
    fn test_prepare_no_valid_selection() {
        let tree = kernel_tree("SUBSYSTEM_DRIVERS=y\nSUBSYSTEM_BOGUS=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let mut tracker = RunTracker::new();

        let err = prepare(
            &ctx,
            &PrepareOptions::default(),
            &MockFileSystem::new(),
            &mut tracker,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoValidSelection { .. })
        ));
        assert!(format!("{:#}", err).contains("available subsystems"));
        assert_eq!(tracker.state(), RunState::Aborted);
    }

    #[test]
    fn test_prepare_missing_manifest() {
        let tree = kernel_tree("SUBSYSTEM_NET=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let opts = PrepareOptions {
            manifest: Some(PathBuf::from("nope.json")),
            ..Default::default()
        };
        let err = prepare(&ctx, &opts, &MockFileSystem::new(), &mut RunTracker::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::core::catalog::CatalogError>(),
            Some(crate::core::catalog::CatalogError::ManifestNotFound { .. })
        ));
    }

    #[test]
    fn test_prepare_other_arch() {
        let tree = kernel_tree("SUBSYSTEM_NET=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let opts = PrepareOptions {
            arch: Some("arm64".into()),
            ..Default::default()
        };
        let prepared = prepare(
            &ctx,
            &opts,
            &DiskTree::new(tree.path()),
            &mut RunTracker::new(),
        )
        .unwrap();
        assert_eq!(prepared.plan.unit_count(), 1);
        assert!(prepared.plan.missing_files.is_empty());
    }
}
