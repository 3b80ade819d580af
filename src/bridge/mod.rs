//! Build backends.
//!
//! Every backend compiles units and drives the generated makefile. Resolution,
//! planning and makefile rendering always run in-process, so diagnostics and
//! JSON events look the same whichever backend compiles.
//!
//! [`probe_backend`] picks the backend once at startup: the accelerated
//! shared library when it loads, the reference implementation otherwise.

pub mod native;
pub mod reference;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::builder::executor::{CompileFailure, CompileOutput, Compiler};
use crate::util::context::Context;

pub use native::NativeBackend;
pub use reference::ReferenceBackend;

/// Errors from loading or calling a backend.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native build library not found (searched: {})", display_paths(searched))]
    LibraryNotFound { searched: Vec<PathBuf> },

    #[error("failed to load native build library {}: {message}", path.display())]
    LoadFailed { path: PathBuf, message: String },

    #[error("native build library {} is missing symbol `{symbol}`", path.display())]
    SymbolNotFound { path: PathBuf, symbol: String },

    #[error("{what} contains an interior NUL byte or is not valid UTF-8")]
    InvalidArgument { what: &'static str },

    #[error("{operation} failed with status {code}")]
    CallFailed { operation: &'static str, code: i32 },

    #[error("failed to run {operation}: {message}")]
    Launch {
        operation: &'static str,
        message: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Which backend the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Native when it loads, reference otherwise.
    #[default]
    Auto,
    Native,
    Reference,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "native" => Ok(BackendPreference::Native),
            "reference" => Ok(BackendPreference::Reference),
            _ => Err(format!(
                "invalid backend '{}'; expected 'auto', 'native', or 'reference'",
                s
            )),
        }
    }
}

/// The operations a backend provides.
pub trait BuildBackend: Compiler {
    /// Short name for logs and JSON events.
    fn name(&self) -> &'static str;

    /// Compile one source path relative to `root`.
    fn compile_file(&self, file: &Path, root: &Path) -> Result<CompileOutput, CompileFailure>;

    /// Build every object listed in the generated makefile.
    fn build_dynamic(&self, root: &Path) -> Result<(), BridgeError>;

    /// Remove the objects listed in the generated makefile.
    fn clean_dynamic(&self, root: &Path) -> Result<(), BridgeError>;

    fn as_compiler(&self) -> &dyn Compiler;
}

/// Choose a backend according to `preference`.
///
/// With `Auto`, a native library that is missing or fails to load is logged
/// and the reference backend is returned instead.
pub fn probe_backend(
    ctx: &Context,
    preference: BackendPreference,
) -> Result<Box<dyn BuildBackend>, BridgeError> {
    match preference {
        BackendPreference::Reference => Ok(Box::new(ReferenceBackend::from_context(ctx))),
        BackendPreference::Native => {
            Ok(Box::new(NativeBackend::probe(&ctx.native_library_candidates())?))
        }
        BackendPreference::Auto => match NativeBackend::probe(&ctx.native_library_candidates()) {
            Ok(native) => {
                tracing::info!("using native backend {}", native.path().display());
                Ok(Box::new(native))
            }
            Err(e) => {
                tracing::debug!("native backend unavailable, using reference: {}", e);
                Ok(Box::new(ReferenceBackend::from_context(ctx)))
            }
        },
    }
}
