//! Implementation of `kforge make` and `kforge clean`: drive the generated makefile.

use anyhow::{bail, Result};

use crate::bridge::BuildBackend;
use crate::util::context::Context;

/// Build every object listed in the generated makefile.
///
/// Only `setup/.build/Makefile.dynamic` under the kernel root is used; a
/// makefile generated with `--output` elsewhere is not picked up.
pub fn make_all(ctx: &Context, backend: &dyn BuildBackend) -> Result<()> {
    let makefile = ctx.dynamic_makefile_path();
    if !makefile.is_file() {
        bail!(
            "no generated makefile at {}\n\
             hint: run `kforge generate` first",
            makefile.display()
        );
    }
    backend.build_dynamic(ctx.root())?;
    Ok(())
}

/// Remove the objects listed in the generated makefile.
///
/// Returns `false` without calling the backend when no makefile was ever
/// generated; there is nothing to clean then.
pub fn clean(ctx: &Context, backend: &dyn BuildBackend) -> Result<bool> {
    let makefile = ctx.dynamic_makefile_path();
    if !makefile.is_file() {
        tracing::debug!("{} does not exist, nothing to clean", makefile.display());
        return Ok(false);
    }
    backend.clean_dynamic(ctx.root())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ReferenceBackend;
    use crate::test_support::kernel_tree;
    use crate::util::process::find_executable;

    #[test]
    fn test_make_requires_generated_makefile() {
        let tree = kernel_tree("SUBSYSTEM_NET=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let backend = ReferenceBackend::from_context(&ctx);
        let err = make_all(&ctx, &backend).unwrap_err();
        assert!(err.to_string().contains("kforge generate"));
    }

    #[test]
    fn test_clean_without_makefile_is_noop() {
        let tree = kernel_tree("SUBSYSTEM_NET=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let backend = ReferenceBackend::from_context(&ctx);
        assert!(!clean(&ctx, &backend).unwrap());
    }

    #[test]
    fn test_makefile_at_custom_output_is_not_used() {
        let tree = kernel_tree("SUBSYSTEM_PS2_KEYBOARD=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let opts = crate::ops::GenerateOptions {
            output: Some("out/Makefile.test".into()),
            ..Default::default()
        };
        crate::ops::generate(&ctx, &opts).unwrap();

        let backend = ReferenceBackend::from_context(&ctx);
        assert!(!clean(&ctx, &backend).unwrap());
        assert!(make_all(&ctx, &backend).is_err());
    }

    #[test]
    fn test_clean_runs_makefile() {
        if find_executable("make").is_none() {
            return;
        }
        let tree = kernel_tree("SUBSYSTEM_NET=y\n");
        let ctx = Context::with_root(tree.path().to_path_buf());
        let makefile = ctx.dynamic_makefile_path();
        std::fs::create_dir_all(makefile.parent().unwrap()).unwrap();
        std::fs::write(&makefile, "all:\n\t@true\nclean:\n\t@true\n").unwrap();

        let backend = ReferenceBackend::from_context(&ctx);
        assert!(clean(&ctx, &backend).unwrap());
        make_all(&ctx, &backend).unwrap();
    }
}
