//! The `.config` selection file.
//!
//! A line-oriented `KEY=VALUE` file. Keys in the `SUBSYSTEM_<ID>` namespace
//! turn components on (`y`) or off (anything else); every other key is kept
//! verbatim so that saving the file never loses settings owned by other tools.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::core::catalog::ComponentId;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticCode, Diagnostics};
use crate::util::fs::write_atomic;

/// Namespace prefix of subsystem keys.
pub const SUBSYSTEM_PREFIX: &str = "SUBSYSTEM_";

/// Value marking a subsystem as enabled.
pub const ENABLED: &str = "y";

/// Value written for explicitly disabled subsystems.
pub const DISABLED: &str = "n";

const HEADER: &str = "# Subsystem selection. Managed by kforge; SUBSYSTEM_<ID>=y|n\n";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+$").unwrap_or_else(|e| panic!("invalid identifier regex: {e}"))
});

/// Whether `id` is a valid component identifier.
pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER.is_match(id)
}

/// Errors loading the selection file.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(
        "configuration file not found: {}\nhint: {}",
        path.display(),
        suggestions::NO_SELECTION
    )]
    ConfigNotFound { path: PathBuf },

    #[error("failed to read configuration file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The user's explicit subsystem choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    enabled: BTreeSet<ComponentId>,
    disabled: BTreeSet<ComponentId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection with the given ids enabled.
    pub fn from_enabled<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ComponentId>,
    {
        Selection {
            enabled: ids.into_iter().map(Into::into).collect(),
            disabled: BTreeSet::new(),
        }
    }

    /// Turn a subsystem on.
    pub fn enable(&mut self, id: impl Into<ComponentId>) {
        let id = id.into();
        self.disabled.remove(&id);
        self.enabled.insert(id);
    }

    /// Turn a subsystem off, keeping the explicit `=n` entry.
    pub fn disable(&mut self, id: impl Into<ComponentId>) {
        let id = id.into();
        self.enabled.remove(&id);
        self.disabled.insert(id);
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.contains(id)
    }

    /// Enabled ids, sorted.
    pub fn enabled(&self) -> &BTreeSet<ComponentId> {
        &self.enabled
    }

    /// Explicitly disabled ids, sorted.
    pub fn disabled(&self) -> &BTreeSet<ComponentId> {
        &self.disabled
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

/// Non-subsystem keys, preserved verbatim for round-trips.
pub type OpaqueKeys = BTreeMap<String, String>;

/// A parsed selection file.
#[derive(Debug, Clone, Default)]
pub struct SelectionFile {
    pub selection: Selection,
    pub opaque: OpaqueKeys,
    pub diagnostics: Diagnostics,
    pub path: PathBuf,
}

impl SelectionFile {
    /// Load and parse a selection file.
    pub fn load(path: &Path) -> Result<Self, SelectionError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SelectionError::ConfigNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(SelectionError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self::parse(&contents, path))
    }

    /// Parse selection text. Malformed lines become diagnostics, never errors.
    pub fn parse(contents: &str, path: &Path) -> Self {
        let mut file = SelectionFile {
            path: path.to_path_buf(),
            ..Default::default()
        };
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                file.diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::ConfigParseWarning,
                        format!("invalid line in configuration: `{}`", line),
                    )
                    .with_location(path)
                    .at_line(line_num)
                    .with_context("expected `KEY=VALUE`"),
                );
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let Some(id) = key.strip_prefix(SUBSYSTEM_PREFIX) else {
                if seen.contains(key) {
                    file.diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticCode::ConfigParseWarning,
                            format!("duplicate key `{}` ignored", key),
                        )
                        .with_location(path)
                        .at_line(line_num),
                    );
                } else {
                    seen.insert(key.to_string());
                    file.opaque.insert(key.to_string(), value.to_string());
                }
                continue;
            };

            if !is_valid_identifier(id) {
                file.diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::InvalidIdentifier,
                        format!("invalid subsystem id `{}`", id),
                    )
                    .with_location(path)
                    .at_line(line_num)
                    .with_context("ids may only contain letters, digits and `_`"),
                );
                continue;
            }

            if seen.contains(key) {
                file.diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::DuplicateIdentifier,
                        format!("duplicate subsystem `{}`; first occurrence wins", id),
                    )
                    .with_location(path)
                    .at_line(line_num),
                );
                continue;
            }
            seen.insert(key.to_string());

            if value == ENABLED {
                file.selection.enable(id);
            } else {
                file.selection.disable(id);
            }
        }

        tracing::debug!(
            "{}: {} enabled, {} disabled, {} other key(s)",
            path.display(),
            file.selection.enabled().len(),
            file.selection.disabled().len(),
            file.opaque.len()
        );
        file
    }

    /// Persist this file's current selection and opaque keys.
    pub fn save(&self) -> Result<()> {
        save(&self.path, &self.selection, &self.opaque)
    }
}

/// Render a selection deterministically: fixed header, then all keys sorted.
pub fn render(selection: &Selection, opaque: &OpaqueKeys) -> String {
    let mut entries: BTreeMap<String, &str> = opaque
        .iter()
        .map(|(k, v)| (k.clone(), v.as_str()))
        .collect();
    for id in selection.disabled() {
        entries.insert(format!("{SUBSYSTEM_PREFIX}{id}"), DISABLED);
    }
    for id in selection.enabled() {
        entries.insert(format!("{SUBSYSTEM_PREFIX}{id}"), ENABLED);
    }

    let mut out = String::from(HEADER);
    for (key, value) in entries {
        out.push_str(&key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Fully rewrite the selection file at `path`.
pub fn save(path: &Path, selection: &Selection, opaque: &OpaqueKeys) -> Result<()> {
    write_atomic(path, &render(selection, opaque))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> SelectionFile {
        SelectionFile::parse(text, Path::new(".config"))
    }

    #[test]
    fn test_only_y_enables() {
        let file = parse("SUBSYSTEM_KERNEL=y\nSUBSYSTEM_NET=n\nSUBSYSTEM_FS=Y\nSUBSYSTEM_MM= y \n");
        let enabled: Vec<_> = file.selection.enabled().iter().cloned().collect();
        assert_eq!(enabled, vec!["KERNEL".to_string(), "MM".to_string()]);
        assert!(file.selection.disabled().contains("NET"));
        assert!(file.selection.disabled().contains("FS"));
        assert!(file.diagnostics.is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let file = parse("# header\n\n   # indented comment\nSUBSYSTEM_KERNEL=y\n");
        assert!(file.selection.is_enabled("KERNEL"));
        assert!(file.diagnostics.is_empty());
    }

    #[test]
    fn test_line_without_equals_is_reported() {
        let file = parse("SUBSYSTEM_KERNEL=y\ngarbage line\nSUBSYSTEM_NET=y\n");
        assert!(file.selection.is_enabled("KERNEL"));
        assert!(file.selection.is_enabled("NET"));

        let warning: Vec<_> = file
            .diagnostics
            .with_code(DiagnosticCode::ConfigParseWarning)
            .collect();
        assert_eq!(warning.len(), 1);
        assert_eq!(warning[0].line, Some(2));
    }

    #[test]
    fn test_invalid_identifier_dropped() {
        let file = parse("SUBSYSTEM_BAD-ID=y\nSUBSYSTEM_=y\nSUBSYSTEM_OK_1=y\n");
        assert_eq!(file.selection.enabled().len(), 1);
        assert!(file.selection.is_enabled("OK_1"));
        assert_eq!(
            file.diagnostics
                .with_code(DiagnosticCode::InvalidIdentifier)
                .count(),
            2
        );
    }

    #[test]
    fn test_duplicate_first_wins() {
        let file = parse("SUBSYSTEM_NET=n\nSUBSYSTEM_NET=y\n");
        assert!(!file.selection.is_enabled("NET"));
        assert_eq!(
            file.diagnostics
                .with_code(DiagnosticCode::DuplicateIdentifier)
                .count(),
            1
        );
    }

    #[test]
    fn test_opaque_keys_preserved() {
        let file = parse("BUILD_PLATFORM=linux\nCONFIG_DEBUG=1=2\nSUBSYSTEM_KERNEL=y\n");
        assert_eq!(file.opaque.get("BUILD_PLATFORM").map(String::as_str), Some("linux"));
        assert_eq!(file.opaque.get("CONFIG_DEBUG").map(String::as_str), Some("1=2"));
        assert!(!file.opaque.contains_key("SUBSYSTEM_KERNEL"));
    }

    #[test]
    fn test_render_sorted_and_stable() {
        let file = parse("ZETA=1\nSUBSYSTEM_NET=y\nALPHA=x\nSUBSYSTEM_FS=n\n");
        let rendered = render(&file.selection, &file.opaque);
        assert_eq!(
            rendered,
            format!("{HEADER}ALPHA=x\nSUBSYSTEM_FS=n\nSUBSYSTEM_NET=y\nZETA=1\n")
        );

        // Re-parsing the rendered text yields the same rendering.
        let again = parse(&rendered);
        assert_eq!(render(&again.selection, &again.opaque), rendered);
    }

    #[test]
    fn test_save_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".config");
        std::fs::write(&path, "SUBSYSTEM_KERNEL=y\nBUILD_PLATFORM=linux\n").unwrap();

        let file = SelectionFile::load(&path).unwrap();
        file.save().unwrap();
        let first = std::fs::read(&path).unwrap();

        let file = SelectionFile::load(&path).unwrap();
        file.save().unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SelectionFile::load(Path::new("/nonexistent/.config")).unwrap_err();
        assert!(matches!(err, SelectionError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("PS2_KEYBOARD"));
        assert!(is_valid_identifier("x86"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("A B"));
        assert!(!is_valid_identifier("ÄUDIO"));
    }
}
