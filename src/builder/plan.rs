//! Build plan generation.
//!
//! A BuildPlan lists every compile unit for one architecture, grouped by the
//! component that owns it. Groups follow sorted component id order and units
//! follow manifest file order, so the same catalog, resolved set and source
//! tree always produce the same plan.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::core::catalog::{Catalog, ComponentId};
use crate::resolver::ResolvedSet;
use crate::util::diagnostic::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::util::fs::SourceTree;
use crate::util::hash::Fingerprint;

/// Source languages that produce an object file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    C,
    Cpp,
    Asm,
}

impl SourceKind {
    /// Classify a source path by extension. Headers and anything else yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "c" => Some(SourceKind::C),
            "cpp" => Some(SourceKind::Cpp),
            "asm" => Some(SourceKind::Asm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::C => "c",
            SourceKind::Cpp => "cpp",
            SourceKind::Asm => "asm",
        }
    }
}

/// Object target for a source file: same path with a `.o` extension.
pub fn object_path_for(source: &Path) -> Option<PathBuf> {
    SourceKind::from_path(source)?;
    Some(source.with_extension("o"))
}

/// One source file mapped to one object target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileUnit {
    /// Source path relative to the kernel root
    pub source: PathBuf,
    /// Object path relative to the kernel root
    pub object: PathBuf,
    pub kind: SourceKind,
    /// Component that listed this source
    pub owner: ComponentId,
}

impl CompileUnit {
    /// Derive a unit from a source path; `None` for non-compilable extensions.
    pub fn new(source: impl Into<PathBuf>, owner: impl Into<ComponentId>) -> Option<Self> {
        let source = source.into();
        let kind = SourceKind::from_path(&source)?;
        let object = object_path_for(&source)?;
        Some(CompileUnit {
            source,
            object,
            kind,
            owner: owner.into(),
        })
    }
}

/// Units contributed by one component, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentUnits {
    pub id: ComponentId,
    /// Number of files the manifest lists for this arch, present or not
    pub listed: usize,
    pub units: Vec<CompileUnit>,
}

/// A listed source that was not found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFile {
    pub owner: ComponentId,
    pub path: PathBuf,
}

/// Plan counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    /// Size of the resolved set the plan was built from
    pub total_components: usize,
    pub total_units: usize,
    pub missing_files: usize,
}

/// A complete build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub arch: String,
    /// Components with at least one listed file, sorted by id
    pub groups: Vec<ComponentUnits>,
    pub missing_files: Vec<MissingFile>,
    pub stats: PlanStats,
}

impl BuildPlan {
    /// Every unit in plan order.
    pub fn units(&self) -> impl Iterator<Item = &CompileUnit> {
        self.groups.iter().flat_map(|g| g.units.iter())
    }

    pub fn unit_count(&self) -> usize {
        self.stats.total_units
    }

    pub fn is_empty(&self) -> bool {
        self.stats.total_units == 0
    }

    /// One `MissingSourceFile` warning per absent source.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for missing in &self.missing_files {
            diags.push(
                Diagnostic::warning(
                    DiagnosticCode::MissingSourceFile,
                    format!(
                        "file `{}` from subsystem `{}` does not exist, skipping",
                        missing.path.display(),
                        missing.owner
                    ),
                )
                .with_location(&missing.path),
            );
        }
        diags
    }

    /// Stable digest of the unit list, used in logs and JSON output.
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.arch);
        for unit in self.units() {
            fp.update_str(&unit.owner);
            fp.update_str(&unit.source.to_string_lossy());
        }
        fp.finish()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the plan for `resolved` on `arch`.
///
/// Sources are checked against `tree` first: absent ones go to
/// `missing_files`. Present sources with an unrecognised extension are
/// dropped without comment.
pub fn plan(
    catalog: &Catalog,
    resolved: &ResolvedSet,
    arch: &str,
    tree: &dyn SourceTree,
) -> BuildPlan {
    let mut groups = Vec::new();
    let mut missing_files = Vec::new();

    for id in resolved.iter() {
        let files = catalog.files_for(id, arch);
        if files.is_empty() {
            continue;
        }

        let mut units = Vec::with_capacity(files.len());
        for file in files {
            if !tree.exists(file) {
                tracing::warn!("{}: missing source {}", id, file.display());
                missing_files.push(MissingFile {
                    owner: id.clone(),
                    path: file.clone(),
                });
                continue;
            }
            match CompileUnit::new(file.clone(), id.clone()) {
                Some(unit) => units.push(unit),
                None => tracing::debug!("{}: not a compile unit: {}", id, file.display()),
            }
        }

        groups.push(ComponentUnits {
            id: id.clone(),
            listed: files.len(),
            units,
        });
    }

    let total_units = groups.iter().map(|g| g.units.len()).sum();
    let stats = PlanStats {
        total_components: resolved.len(),
        total_units,
        missing_files: missing_files.len(),
    };

    tracing::debug!(
        "planned {} unit(s) from {} component(s) for {}",
        stats.total_units,
        stats.total_components,
        arch
    );

    BuildPlan {
        arch: arch.to_string(),
        groups,
        missing_files,
        stats,
    }
}
