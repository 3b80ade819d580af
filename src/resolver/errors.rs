//! Diagnostics produced while migrating, validating and resolving a selection.
//!
//! None of these abort a run; they travel alongside the result.

use std::collections::BTreeSet;

use crate::core::catalog::ComponentId;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticCode};

pub fn migrated_component(old: &str, new: &str) -> Diagnostic {
    Diagnostic::note(
        DiagnosticCode::MigratedComponent,
        format!("subsystem `{}` has been renamed to `{}`", old, new),
    )
    .with_suggestion(format!(
        "replace SUBSYSTEM_{}=y with SUBSYSTEM_{}=y in your selection",
        old, new
    ))
}

pub fn removed_component(id: &str, hint: Option<&str>) -> Diagnostic {
    let mut diag = Diagnostic::warning(
        DiagnosticCode::RemovedComponent,
        format!("subsystem `{}` has been removed", id),
    )
    .with_suggestion(suggestions::REMOVED_COMPONENT);
    if let Some(hint) = hint {
        diag = diag.with_context(hint);
    }
    diag
}

/// An id the catalog does not know, with the valid ids listed.
pub fn unknown_component(id: &str, available: &BTreeSet<ComponentId>) -> Diagnostic {
    let listed: Vec<&str> = available.iter().map(String::as_str).collect();
    let mut diag = Diagnostic::warning(
        DiagnosticCode::UnknownComponent,
        format!("unknown subsystem `{}` ignored", id),
    )
    .with_context(format!("available subsystems: {}", listed.join(", ")));

    if let Some(close) = closest_match(id, available) {
        diag = diag.with_suggestion(format!("did you mean `{}`?", close));
    }
    diag
}

pub fn dangling_dependency(owner: &str, dep: &str) -> Diagnostic {
    Diagnostic::note(
        DiagnosticCode::DanglingDependency,
        format!(
            "subsystem `{}` depends on `{}`, which is not in the manifest",
            owner, dep
        ),
    )
    .with_context("the dependency is kept as a leaf and contributes no files")
}

/// Case-insensitive exact match or shared prefix, for "did you mean" hints.
fn closest_match<'a>(id: &str, available: &'a BTreeSet<ComponentId>) -> Option<&'a str> {
    let upper = id.to_ascii_uppercase();
    if let Some(found) = available.iter().find(|a| a.eq_ignore_ascii_case(id)) {
        return Some(found.as_str());
    }
    available
        .iter()
        .filter(|a| a.starts_with(&upper) || upper.starts_with(a.as_str()))
        .max_by_key(|a| a.len())
        .map(String::as_str)
}
