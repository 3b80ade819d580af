//! Accelerated backend loaded from `libkconfig_build.so`.
//!
//! The library exports plain C entry points taking NUL-terminated paths and
//! returning `0` on success.

use std::ffi::{c_char, c_int, CString};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use libloading::{Library, Symbol};

use crate::bridge::{BridgeError, BuildBackend};
use crate::builder::executor::{CompileFailure, CompileOutput, Compiler};
use crate::builder::plan::CompileUnit;

type BuildFileFn = unsafe extern "C" fn(file: *const c_char, kernel_root: *const c_char) -> c_int;
type RootFn = unsafe extern "C" fn(kernel_root: *const c_char) -> c_int;

const SYM_BUILD_FILE: &[u8] = b"kconfig_build_file\0";
const SYM_BUILD_DYNAMIC: &[u8] = b"kconfig_build_dynamic_makefile\0";
const SYM_CLEAN_DYNAMIC: &[u8] = b"kconfig_clean_dynamic_makefile\0";

/// Backend calling into the native build library.
pub struct NativeBackend {
    _library: Library,
    path: PathBuf,
    build_file: BuildFileFn,
    build_dynamic: RootFn,
    clean_dynamic: RootFn,
    /// The library is not known to be reentrant.
    call_lock: Mutex<()>,
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl NativeBackend {
    /// Load the first existing candidate. A candidate that exists but fails
    /// to load is an error; later candidates are not tried.
    pub fn probe(candidates: &[PathBuf]) -> Result<Self, BridgeError> {
        let path = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| BridgeError::LibraryNotFound {
                searched: candidates.to_vec(),
            })?;
        Self::load(path)
    }

    /// Load the library at `path` and resolve every entry point.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        tracing::debug!("loading native build library {}", path.display());

        // SAFETY: loading runs the library's initialisers. The library is part
        // of the kernel tree the user is building and is trusted like its
        // build scripts.
        let library = unsafe { Library::new(path) }.map_err(|e| BridgeError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // SAFETY: the symbol types match the C prototypes exported by
        // libkconfig_build. Plain fn pointers are copied out; `library` is
        // stored next to them and outlives every call.
        let (build_file, build_dynamic, clean_dynamic) = unsafe {
            let build_file: Symbol<BuildFileFn> = symbol(&library, path, SYM_BUILD_FILE)?;
            let build_dynamic: Symbol<RootFn> = symbol(&library, path, SYM_BUILD_DYNAMIC)?;
            let clean_dynamic: Symbol<RootFn> = symbol(&library, path, SYM_CLEAN_DYNAMIC)?;
            (*build_file, *build_dynamic, *clean_dynamic)
        };

        Ok(NativeBackend {
            _library: library,
            path: path.to_path_buf(),
            build_file,
            build_dynamic,
            clean_dynamic,
            call_lock: Mutex::new(()),
        })
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call_root(
        &self,
        f: RootFn,
        operation: &'static str,
        root: &Path,
    ) -> Result<(), BridgeError> {
        let root = c_path(root, "kernel root")?;
        let _guard = self.call_lock.lock();
        // SAFETY: `root` is a valid NUL-terminated string that lives across the call.
        let code = unsafe { f(root.as_ptr()) };
        match code {
            0 => Ok(()),
            code => Err(BridgeError::CallFailed { operation, code }),
        }
    }
}

unsafe fn symbol<'lib, T>(
    library: &'lib Library,
    path: &Path,
    name: &[u8],
) -> Result<Symbol<'lib, T>, BridgeError> {
    library.get(name).map_err(|_| BridgeError::SymbolNotFound {
        path: path.to_path_buf(),
        symbol: String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]).into_owned(),
    })
}

fn c_path(path: &Path, what: &'static str) -> Result<CString, BridgeError> {
    let s = path.to_str().ok_or(BridgeError::InvalidArgument { what })?;
    CString::new(s).map_err(|_| BridgeError::InvalidArgument { what })
}

impl Compiler for NativeBackend {
    fn compile(&self, unit: &CompileUnit, root: &Path) -> Result<CompileOutput, CompileFailure> {
        self.compile_file(&unit.source, root)
    }
}

impl BuildBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn compile_file(&self, file: &Path, root: &Path) -> Result<CompileOutput, CompileFailure> {
        let launch = |e: BridgeError| CompileFailure::Launch {
            file: file.to_path_buf(),
            message: e.to_string(),
        };
        let c_file = c_path(file, "source path").map_err(launch)?;
        let c_root = c_path(root, "kernel root").map_err(launch)?;

        let _guard = self.call_lock.lock();
        // SAFETY: both pointers are valid NUL-terminated strings for the duration
        // of the call; the library does not retain them.
        let code = unsafe { (self.build_file)(c_file.as_ptr(), c_root.as_ptr()) };
        match code {
            0 => Ok(CompileOutput::default()),
            code => Err(CompileFailure::Failed {
                file: file.to_path_buf(),
                code: Some(code),
                stderr: String::new(),
            }),
        }
    }

    fn build_dynamic(&self, root: &Path) -> Result<(), BridgeError> {
        self.call_root(self.build_dynamic, "kconfig_build_dynamic_makefile", root)
    }

    fn clean_dynamic(&self, root: &Path) -> Result<(), BridgeError> {
        self.call_root(self.clean_dynamic, "kconfig_clean_dynamic_makefile", root)
    }

    fn as_compiler(&self) -> &dyn Compiler {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_probe_reports_searched_paths() {
        let candidates = vec![PathBuf::from("/nonexistent/a.so"), PathBuf::from("/nonexistent/b.so")];
        match NativeBackend::probe(&candidates) {
            Err(BridgeError::LibraryNotFound { searched }) => assert_eq!(searched, candidates),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_load_garbage_fails() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("libkconfig_build.so");
        std::fs::write(&lib, b"\x7fELF garbage").unwrap();
        assert!(matches!(
            NativeBackend::load(&lib),
            Err(BridgeError::LoadFailed { .. })
        ));
    }

    #[test]
    fn test_c_path_rejects_nul() {
        assert!(c_path(Path::new("ok/path.c"), "source path").is_ok());
        assert!(matches!(
            c_path(Path::new("bad\0path.c"), "source path"),
            Err(BridgeError::InvalidArgument { what: "source path" })
        ));
    }
}
