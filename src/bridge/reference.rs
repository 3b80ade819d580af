//! Reference backend: compiles through `unibuild.sh` and drives `make`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{BridgeError, BuildBackend};
use crate::builder::executor::{CompileFailure, CompileOutput, Compiler, UnibuildCompiler};
use crate::builder::plan::CompileUnit;
use crate::util::context::Context;
use crate::util::process::ProcessBuilder;

#[derive(Debug, Clone)]
pub struct ReferenceBackend {
    compiler: UnibuildCompiler,
    makefile: PathBuf,
}

impl ReferenceBackend {
    pub fn new(compiler: UnibuildCompiler, makefile: impl Into<PathBuf>) -> Self {
        ReferenceBackend {
            compiler,
            makefile: makefile.into(),
        }
    }

    /// Script, timeout and makefile location from the context's configuration.
    pub fn from_context(ctx: &Context) -> Self {
        let timeout = ctx.config().build.timeout_secs.map(Duration::from_secs);
        Self::new(
            UnibuildCompiler::new(ctx.compile_script()).with_timeout(timeout),
            ctx.dynamic_makefile_path(),
        )
    }

    pub fn makefile(&self) -> &Path {
        &self.makefile
    }

    /// `make -f <makefile> -C <root> <target>`, output inherited.
    fn run_make(&self, root: &Path, target: &str, operation: &'static str) -> Result<(), BridgeError> {
        let cmd = ProcessBuilder::new("make")
            .arg("-f")
            .arg(&self.makefile)
            .arg("-C")
            .arg(root)
            .arg(target);
        tracing::debug!("running `{}`", cmd.display_command());

        let status = cmd.status().map_err(|e| BridgeError::Launch {
            operation,
            message: format!("{:#}", e),
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(BridgeError::CallFailed {
                operation,
                code: status.code().unwrap_or(-1),
            })
        }
    }
}

impl Compiler for ReferenceBackend {
    fn compile(&self, unit: &CompileUnit, root: &Path) -> Result<CompileOutput, CompileFailure> {
        self.compiler.compile(unit, root)
    }
}

impl BuildBackend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn compile_file(&self, file: &Path, root: &Path) -> Result<CompileOutput, CompileFailure> {
        self.compiler.compile_path(file, root)
    }

    fn build_dynamic(&self, root: &Path) -> Result<(), BridgeError> {
        self.run_make(root, "all", "make all")
    }

    fn clean_dynamic(&self, root: &Path) -> Result<(), BridgeError> {
        self.run_make(root, "clean", "make clean")
    }

    fn as_compiler(&self) -> &dyn Compiler {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::kernel_tree;
    use crate::util::process::find_executable;

    #[test]
    fn test_from_context_paths() {
        let tree = kernel_tree("");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let backend = ReferenceBackend::from_context(&ctx);
        assert_eq!(
            backend.makefile(),
            tree.path().join("setup/.build/Makefile.dynamic")
        );
        assert_eq!(
            backend.compiler.script(),
            tree.path().join("scripts/unibuild.sh")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_compile_file_through_script() {
        let tree = kernel_tree("");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let backend = ReferenceBackend::from_context(&ctx);

        assert!(backend
            .compile_file(Path::new("kernel/main.c"), tree.path())
            .is_ok());
        let err = backend
            .compile_file(Path::new("kernel/fail.c"), tree.path())
            .unwrap_err();
        assert!(err.stderr().contains("error: boom"));
    }

    #[test]
    fn test_make_runs_generated_makefile() {
        if find_executable("make").is_none() {
            return;
        }
        let tree = kernel_tree("");
        let makefile = tree.path().join("setup/.build/Makefile.dynamic");
        std::fs::create_dir_all(makefile.parent().unwrap()).unwrap();
        std::fs::write(&makefile, "all:\n\t@true\nclean:\n\t@false\n").unwrap();

        let backend = ReferenceBackend::new(UnibuildCompiler::new("scripts/unibuild.sh"), &makefile);
        backend.build_dynamic(tree.path()).unwrap();
        assert!(matches!(
            backend.clean_dynamic(tree.path()),
            Err(BridgeError::CallFailed { .. })
        ));
    }
}
