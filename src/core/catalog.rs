//! Subsystem manifest parsing and the component catalog.
//!
//! The manifest is a JSON document whose `subsystems` object maps a
//! component id to its metadata:
//!
//! ```json
//! {
//!   "subsystems": {
//!     "MEMORY": {
//!       "name": "Memory Management",
//!       "required": true,
//!       "dependencies": ["KERNEL"],
//!       "architectures": ["x86-64"],
//!       "files": { "x86-64": ["mm/pmm.c", "mm/paging.c"] }
//!     }
//!   },
//!   "profiles": { "minimal": { "name": "Minimal", "subsystems": ["MEMORY"] } }
//! }
//! ```
//!
//! Auxiliary sections (`architecture`, `profiles`, anything else) belong to the
//! configuration front-ends and are tolerated here.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a component in the catalog.
pub type ComponentId = String;

/// Errors raised while loading the manifest. Both are fatal.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum CatalogError {
    #[error("subsystem manifest not found: {}", path.display())]
    #[diagnostic(
        code(kforge::manifest::not_found),
        help("pass `--manifest <path>` or set `build.manifest` in .kforge/config.toml")
    )]
    ManifestNotFound { path: PathBuf },

    #[error("failed to parse subsystem manifest {}: {message}", path.display())]
    #[diagnostic(code(kforge::manifest::parse))]
    ManifestParseError {
        path: PathBuf,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("failed to read subsystem manifest {}", path.display())]
    #[diagnostic(code(kforge::manifest::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A catalog entry, immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Unique id; filled in from the manifest key
    #[serde(skip_deserializing)]
    pub id: ComponentId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Cannot be deselected; always part of the resolved set
    #[serde(default)]
    pub required: bool,

    /// Ids this component needs, in manifest order
    #[serde(default)]
    pub dependencies: Vec<ComponentId>,

    /// Architecture name -> source files relative to the kernel root
    #[serde(default)]
    pub files: BTreeMap<String, Vec<PathBuf>>,

    /// Architectures this component supports
    #[serde(default)]
    pub architectures: BTreeSet<String>,

    #[serde(default)]
    pub description: String,
}

impl Component {
    /// Create an optional component with no dependencies or files.
    pub fn new(id: impl Into<ComponentId>) -> Self {
        let id = id.into();
        Component {
            name: id.clone(),
            id,
            required: false,
            dependencies: Vec::new(),
            files: BTreeMap::new(),
            architectures: BTreeSet::new(),
            description: String::new(),
        }
    }

    /// Mark the component as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Add a dependency edge.
    pub fn depends_on(mut self, dep: impl Into<ComponentId>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Declare the source files for an architecture.
    pub fn with_files<I, P>(mut self, arch: &str, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.architectures.insert(arch.to_string());
        self.files
            .insert(arch.to_string(), files.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the component lists files for `arch`.
    pub fn has_files_for(&self, arch: &str) -> bool {
        self.files.get(arch).is_some_and(|f| !f.is_empty())
    }
}

/// A named preset of subsystems, consumed by configuration front-ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub architecture: Option<String>,

    #[serde(default)]
    pub subsystems: Vec<ComponentId>,
}

fn default_true() -> bool {
    true
}

/// On-disk manifest layout.
#[derive(Debug, Deserialize)]
struct RawManifest {
    subsystems: BTreeMap<ComponentId, Component>,

    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

/// The component catalog loaded from the manifest.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    components: BTreeMap<ComponentId, Component>,
    profiles: BTreeMap<String, Profile>,
    path: Option<PathBuf>,
}

impl Catalog {
    /// Load the catalog from a manifest file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::ManifestNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut catalog = Self::parse(&contents, path)?;
        catalog.path = Some(path.to_path_buf());
        tracing::debug!(
            "loaded {} subsystem(s) from {}",
            catalog.components.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse manifest text; `path` is used for error reporting only.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, CatalogError> {
        let raw: RawManifest = serde_json::from_str(contents).map_err(|e| {
            let span = offset_of(contents, e.line(), e.column()).map(|o| SourceSpan::from((o, 1)));
            CatalogError::ManifestParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
                src: NamedSource::new(path.display().to_string(), contents.to_string()),
                span,
            }
        })?;

        let mut components = BTreeMap::new();
        for (id, mut component) in raw.subsystems {
            if id.is_empty() {
                return Err(CatalogError::ManifestParseError {
                    path: path.to_path_buf(),
                    message: "subsystem id must not be empty".to_string(),
                    src: NamedSource::new(path.display().to_string(), contents.to_string()),
                    span: None,
                });
            }
            if component.name.is_empty() {
                component.name = id.clone();
            }
            component.id = id.clone();
            components.insert(id, component);
        }

        Ok(Catalog {
            components,
            profiles: raw.profiles,
            path: None,
        })
    }

    /// Build a catalog directly from components.
    pub fn from_components(components: impl IntoIterator<Item = Component>) -> Self {
        Catalog {
            components: components
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            profiles: BTreeMap::new(),
            path: None,
        }
    }

    /// Look up a component.
    pub fn get(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    /// Whether `id` names a component.
    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    /// Source files of `id` for `arch`, in manifest order.
    ///
    /// Unknown ids and unsupported architectures yield an empty slice.
    pub fn files_for(&self, id: &str, arch: &str) -> &[PathBuf] {
        self.components
            .get(id)
            .and_then(|c| c.files.get(arch))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All component ids, sorted.
    pub fn all_ids(&self) -> BTreeSet<ComponentId> {
        self.components.keys().cloned().collect()
    }

    /// Components in id order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Components flagged `required`.
    pub fn required(&self) -> impl Iterator<Item = &Component> {
        self.components.values().filter(|c| c.required)
    }

    /// Named profiles declared in the manifest.
    pub fn profiles(&self) -> &BTreeMap<String, Profile> {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Path the catalog was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Byte offset of a 1-based line/column position.
fn offset_of(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for (i, l) in text.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let col = column.saturating_sub(1).min(l.len());
            return Some(offset + col);
        }
        offset += l.len();
    }
    None
}
