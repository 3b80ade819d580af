//! Test utilities and mocks for kforge unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use kforge::test_support::{MockCompiler, MockFileSystem};
//!
//! let tree = MockFileSystem::with_files(["kernel/main.c"]);
//! let compiler = MockCompiler::new().fail_on("kernel/main.c", "main.c:3: error");
//! ```

pub mod fixtures;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::builder::executor::{CompileFailure, CompileOutput, Compiler};
use crate::builder::plan::CompileUnit;
use crate::util::fs::SourceTree;

pub use fixtures::*;

/// In-memory source tree.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: BTreeSet<PathBuf>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree containing exactly `files`.
    pub fn with_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        MockFileSystem {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        self.files.insert(path.into());
    }

    pub fn remove_file(&mut self, path: &Path) -> bool {
        self.files.remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

impl SourceTree for MockFileSystem {
    fn exists(&self, rel: &Path) -> bool {
        self.files.contains(rel)
    }
}

/// Scripted compile collaborator. Records every source it is asked to compile.
#[derive(Debug, Default)]
pub struct MockCompiler {
    failures: HashMap<PathBuf, String>,
    batched: bool,
    calls: Mutex<Vec<PathBuf>>,
    batches: AtomicUsize,
}

impl MockCompiler {
    /// A compiler for which every unit succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `source` fail with the given stderr.
    pub fn fail_on(mut self, source: impl Into<PathBuf>, stderr: impl Into<String>) -> Self {
        self.failures.insert(source.into(), stderr.into());
        self
    }

    /// Ask the executor for whole-component batches.
    pub fn batched(mut self) -> Self {
        self.batched = true;
        self
    }

    /// Sources compiled so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of `compile_batch` invocations.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl Compiler for MockCompiler {
    fn compile(&self, unit: &CompileUnit, _root: &Path) -> Result<CompileOutput, CompileFailure> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(unit.source.clone());
        }
        match self.failures.get(&unit.source) {
            Some(stderr) => Err(CompileFailure::Failed {
                file: unit.source.clone(),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(CompileOutput::default()),
        }
    }

    fn compile_batch(
        &self,
        units: &[&CompileUnit],
        root: &Path,
    ) -> Vec<Result<CompileOutput, CompileFailure>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        units.iter().map(|unit| self.compile(unit, root)).collect()
    }

    fn prefers_batch(&self) -> bool {
        self.batched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_filesystem() {
        let mut tree = MockFileSystem::with_files(["a.c"]);
        assert!(tree.exists(Path::new("a.c")));
        assert!(!tree.exists(Path::new("b.c")));

        tree.add_file("b.c");
        assert!(tree.exists(Path::new("b.c")));
        assert!(tree.remove_file(Path::new("a.c")));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_mock_compiler_records_calls() {
        let compiler = MockCompiler::new().fail_on("bad.c", "oops");
        let good = CompileUnit::new("good.c", "X").unwrap();
        let bad = CompileUnit::new("bad.c", "X").unwrap();

        assert!(compiler.compile(&good, Path::new("/")).is_ok());
        let err = compiler.compile(&bad, Path::new("/")).unwrap_err();
        assert_eq!(err.stderr(), "oops");
        assert_eq!(
            compiler.calls(),
            vec![PathBuf::from("good.c"), PathBuf::from("bad.c")]
        );
    }
}
