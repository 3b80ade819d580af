//! Configuration file support for kforge.
//!
//! Two configuration file locations are consulted:
//! - Global: `~/.kforge/config.toml` - User-wide defaults
//! - Project: `<kernel root>/.kforge/config.toml` - Tree-specific overrides
//!
//! Project config takes precedence over global config. Command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs::read_to_string;

/// Architecture used when neither the CLI nor the config names one.
pub const DEFAULT_ARCH: &str = "x86-64";

/// Selection file location relative to the kernel root.
pub const DEFAULT_SELECTION: &str = ".config";

/// Manifest location relative to the kernel root.
pub const DEFAULT_MANIFEST: &str = "scripts/kconfig/subsystems.json";

/// Per-file compile script relative to the kernel root.
pub const DEFAULT_COMPILE_SCRIPT: &str = "scripts/unibuild.sh";

/// kforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Native backend settings
    pub native: NativeConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default target architecture
    pub arch: Option<String>,

    /// Worker pool size (None = available parallelism)
    pub jobs: Option<usize>,

    /// Failure policy ("fail-fast" or "continue")
    pub policy: Option<String>,

    /// Backend preference ("auto", "native", "reference")
    pub backend: Option<String>,

    /// Selection file, relative to the kernel root
    pub selection: Option<PathBuf>,

    /// Subsystem manifest, relative to the kernel root
    pub manifest: Option<PathBuf>,

    /// Compile script, relative to the kernel root
    pub compile_script: Option<PathBuf>,

    /// Per-unit compile timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Native backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    /// Extra candidate paths for the accelerated shared library
    pub library_paths: Vec<PathBuf>,
}

/// What to do after a compile unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop scheduling after the first broken component.
    #[default]
    FailFast,
    /// Compile every unit and report all failures.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "continue" | "keep-going" => Ok(FailurePolicy::Continue),
            _ => Err(format!(
                "invalid failure policy '{}'; expected 'fail-fast' or 'continue'",
                s
            )),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let b = other.build;
        if b.arch.is_some() {
            self.build.arch = b.arch;
        }
        if b.jobs.is_some() {
            self.build.jobs = b.jobs;
        }
        if b.policy.is_some() {
            self.build.policy = b.policy;
        }
        if b.backend.is_some() {
            self.build.backend = b.backend;
        }
        if b.selection.is_some() {
            self.build.selection = b.selection;
        }
        if b.manifest.is_some() {
            self.build.manifest = b.manifest;
        }
        if b.compile_script.is_some() {
            self.build.compile_script = b.compile_script;
        }
        if b.timeout_secs.is_some() {
            self.build.timeout_secs = b.timeout_secs;
        }

        // Library candidates accumulate; project entries are tried first.
        if !other.native.library_paths.is_empty() {
            let mut paths = other.native.library_paths;
            paths.append(&mut self.native.library_paths);
            self.native.library_paths = paths;
        }
    }

    /// Target architecture from config, or the default.
    pub fn arch(&self) -> &str {
        self.build.arch.as_deref().unwrap_or(DEFAULT_ARCH)
    }

    /// Parse the failure policy from config. An unrecognized value is an error.
    pub fn policy(&self) -> Result<Option<FailurePolicy>> {
        self.build
            .policy
            .as_deref()
            .map(|s| s.parse::<FailurePolicy>().map_err(|e| anyhow::anyhow!(e)))
            .transpose()
            .context("invalid `build.policy` in configuration")
    }

    /// Selection file path relative to the kernel root.
    pub fn selection_path(&self) -> PathBuf {
        self.build
            .selection
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SELECTION))
    }

    /// Manifest path relative to the kernel root.
    pub fn manifest_path(&self) -> PathBuf {
        self.build
            .manifest
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST))
    }

    /// Compile script path relative to the kernel root.
    pub fn compile_script(&self) -> PathBuf {
        self.build
            .compile_script
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILE_SCRIPT))
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (<root>/.kforge/config.toml)
/// 2. Global config (~/.kforge/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global) = global_path {
        if global.exists() {
            config.merge(Config::load_or_default(global));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global kforge config directory (~/.kforge).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".kforge"))
}

/// Get the global config path (~/.kforge/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (<root>/.kforge/config.toml).
pub fn project_config_path(kernel_root: &Path) -> PathBuf {
    kernel_root.join(".kforge").join("config.toml")
}
