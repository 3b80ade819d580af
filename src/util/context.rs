//! Global context for kforge operations.
//!
//! The kernel root is resolved exactly once, at process start, and then
//! passed explicitly to every operation through [`Context`].

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use thiserror::Error;

use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::diagnostic::suggestions;

/// Files whose joint presence marks a kernel tree root.
const ROOT_MARKERS: [&str; 2] = ["Makefile", "scripts/unibuild.sh"];

/// Failure to locate the kernel tree.
#[derive(Debug, Error)]
pub enum RootError {
    #[error(
        "could not find a kernel tree in {} or any parent directory\nhint: {}",
        start.display(),
        suggestions::NO_KERNEL_ROOT
    )]
    NotFound { start: PathBuf },

    #[error("kernel root {} does not exist", path.display())]
    Missing { path: PathBuf },
}

/// Walk up from `start` until a directory contains every root marker.
pub fn find_kernel_root(start: &Path) -> Result<PathBuf, RootError> {
    let mut current = start.to_path_buf();
    loop {
        if is_kernel_root(&current) {
            return Ok(current);
        }
        if !current.pop() {
            return Err(RootError::NotFound {
                start: start.to_path_buf(),
            });
        }
    }
}

fn is_kernel_root(dir: &Path) -> bool {
    ROOT_MARKERS.iter().all(|m| dir.join(m).is_file())
}

/// Resolved process-wide settings.
#[derive(Debug, Clone)]
pub struct Context {
    /// Root of the kernel tree every relative path is resolved against
    root: PathBuf,

    /// Merged tool configuration
    config: Config,
}

impl Context {
    /// Discover the kernel root from the current directory.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let root = find_kernel_root(&cwd)?;
        Ok(Self::with_root(root))
    }

    /// Use an explicit root, or discover one when `None`.
    pub fn from_root_arg(root: Option<PathBuf>) -> Result<Self> {
        match root {
            Some(path) => {
                if !path.is_dir() {
                    return Err(RootError::Missing { path }.into());
                }
                let path = path.canonicalize().unwrap_or(path);
                Ok(Self::with_root(path))
            }
            None => Self::discover(),
        }
    }

    /// Create a context for a known root, loading its configuration.
    pub fn with_root(root: PathBuf) -> Self {
        let global = global_config_path();
        let config = load_config(global.as_deref(), &project_config_path(&root));
        tracing::debug!("kernel root: {}", root.display());
        Context { root, config }
    }

    /// Replace the loaded configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Get the kernel root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a path relative to the kernel root; absolute paths pass through.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Default selection file.
    pub fn selection_path(&self) -> PathBuf {
        self.resolve_path(&self.config.selection_path())
    }

    /// Default subsystem manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.resolve_path(&self.config.manifest_path())
    }

    /// Per-file compile script.
    pub fn compile_script(&self) -> PathBuf {
        self.resolve_path(&self.config.compile_script())
    }

    /// Directory holding generated build descriptions.
    pub fn generated_dir(&self) -> PathBuf {
        self.root.join("setup").join(".build")
    }

    /// Location of the generated makefile.
    pub fn dynamic_makefile_path(&self) -> PathBuf {
        self.generated_dir().join("Makefile.dynamic")
    }

    /// Candidate locations for the accelerated backend library, in probe order.
    pub fn native_library_candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = self
            .config
            .native
            .library_paths
            .iter()
            .map(|p| self.resolve_path(p))
            .collect();
        candidates.push(
            self.root
                .join("scripts")
                .join("kconfig")
                .join("libkconfig_build.so"),
        );
        candidates.push(self.root.join("setup").join("libkconfig_build.so"));
        candidates
    }
}
