//! Build event types for JSON output.
//!
//! These events are emitted one per line when using `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: the plan is ready and compilation begins
//! - `compile-unit`: one unit finished, failed or was skipped
//! - `diagnostic`: a non-fatal finding from loading, resolving or planning
//! - `build-finished`: the run is over (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::executor::{CompileFailure, ExecutionReport, Outcome, UnitOutcome};
use crate::util::diagnostic::Diagnostic;

/// A build event emitted during the build process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    #[serde(rename = "build-started")]
    BuildStarted {
        arch: String,
        /// Backend that runs the build ("native" or "reference")
        backend: String,
        components: usize,
        units: usize,
        /// Digest of the plan's unit list
        #[serde(skip_serializing_if = "Option::is_none")]
        plan_fingerprint: Option<String>,
    },

    #[serde(rename = "compile-unit")]
    CompileUnit {
        component: String,
        source: PathBuf,
        object: PathBuf,
        /// "succeeded", "failed", "missing" or "skipped"
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
        duration_ms: u64,
    },

    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note", "help")
        level: String,
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
    },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        attempted: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },
}

impl BuildEvent {
    pub fn started(
        arch: impl Into<String>,
        backend: impl Into<String>,
        components: usize,
        units: usize,
    ) -> Self {
        BuildEvent::BuildStarted {
            arch: arch.into(),
            backend: backend.into(),
            components,
            units,
            plan_fingerprint: None,
        }
    }

    /// Attach the plan digest to a `build-started` event.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        if let BuildEvent::BuildStarted {
            plan_fingerprint, ..
        } = &mut self
        {
            *plan_fingerprint = Some(fingerprint.into());
        }
        self
    }

    /// Create a compile-unit event from an executor outcome.
    pub fn unit(outcome: &UnitOutcome) -> Self {
        let (status, message, stderr) = match &outcome.outcome {
            Outcome::Succeeded(out) => (
                "succeeded",
                None,
                (!out.stderr.trim().is_empty()).then(|| out.stderr.clone()),
            ),
            Outcome::Failed(failure) => {
                let status = match failure {
                    CompileFailure::MissingFileAtExecution { .. } => "missing",
                    _ => "failed",
                };
                let stderr = failure.stderr();
                (
                    status,
                    Some(failure.to_string()),
                    (!stderr.is_empty()).then(|| stderr.to_string()),
                )
            }
            Outcome::Skipped => ("skipped", None, None),
        };

        BuildEvent::CompileUnit {
            component: outcome.unit.owner.clone(),
            source: outcome.unit.source.clone(),
            object: outcome.unit.object.clone(),
            status,
            message,
            stderr,
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }

    pub fn diagnostic(diag: &Diagnostic) -> Self {
        let level = serde_json::to_value(diag.severity)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        BuildEvent::Diagnostic {
            level,
            code: diag.code.as_str().to_string(),
            message: diag.message.clone(),
            file: diag.location.clone(),
            line: diag.line,
        }
    }

    /// Create a build-finished event from the report.
    pub fn finished(report: &ExecutionReport) -> Self {
        BuildEvent::BuildFinished {
            success: report.is_success(),
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed: report.failed(),
            skipped: report.skipped(),
            duration_ms: report.elapsed.as_millis() as u64,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
