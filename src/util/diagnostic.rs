//! User-friendly diagnostic messages.
//!
//! Non-fatal findings (dropped identifiers, migrations, missing sources) are
//! collected as [`Diagnostic`] values and returned next to the successful
//! result instead of aborting the run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when the kernel root cannot be found.
    pub const NO_KERNEL_ROOT: &str =
        "Run from inside the kernel tree or pass `--root <dir>`";

    /// Suggestion when the selection file is missing.
    pub const NO_SELECTION: &str =
        "Create a .config with `SUBSYSTEM_<ID>=y` lines or run the configuration menu";

    /// Suggestion when a removed subsystem was selected.
    pub const REMOVED_COMPONENT: &str =
        "Select a specific replacement subsystem explicitly";

    /// Suggestion when the build fails.
    pub const BUILD_FAILED: &str = "Run `kforge build --verbose` for more details";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

/// What kind of condition a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    ConfigParseWarning,
    InvalidIdentifier,
    DuplicateIdentifier,
    RemovedComponent,
    MigratedComponent,
    UnknownComponent,
    DanglingDependency,
    MissingSourceFile,
    CompileFailure,
    MissingFileAtExecution,
}

impl DiagnosticCode {
    /// Stable name used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::ConfigParseWarning => "config-parse-warning",
            DiagnosticCode::InvalidIdentifier => "invalid-identifier",
            DiagnosticCode::DuplicateIdentifier => "duplicate-identifier",
            DiagnosticCode::RemovedComponent => "removed-component",
            DiagnosticCode::MigratedComponent => "migrated-component",
            DiagnosticCode::UnknownComponent => "unknown-component",
            DiagnosticCode::DanglingDependency => "dangling-dependency",
            DiagnosticCode::MissingSourceFile => "missing-source-file",
            DiagnosticCode::CompileFailure => "compile-failure",
            DiagnosticCode::MissingFileAtExecution => "missing-file-at-execution",
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Condition being reported
    pub code: DiagnosticCode,
    /// Additional context lines
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// Suggested fixes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Related location (file path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    /// 1-based line within `location`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: DiagnosticCode, message: String) -> Self {
        Diagnostic {
            message,
            severity,
            code,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
            line: None,
        }
    }

    /// Create a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message.into())
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message.into())
    }

    /// Create a new informational diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, code, message.into())
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Add a line number within the location.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
                Severity::Help => "\x1b[1;32mhelp\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
                Severity::Help => "help",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            match self.line {
                Some(line) => output.push_str(&format!("  --> {}:{}\n", path.display(), line)),
                None => output.push_str(&format!("  --> {}\n", path.display())),
            }
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Ordered collection of non-fatal findings gathered during a run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Diagnostics carrying the given code.
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.code == code)
    }

    /// Whether any warning-or-worse diagnostic was recorded.
    pub fn has_warnings(&self) -> bool {
        self.0
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::Warning))
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
