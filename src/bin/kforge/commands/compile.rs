//! `kforge compile` command

use anyhow::Result;

use super::{parse_backend, GlobalArgs};
use crate::cli::CompileArgs;
use kforge::ops::{compile_file, CompileOptions};

pub fn execute(global: &GlobalArgs, args: CompileArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    let opts = CompileOptions {
        file: args.file,
        backend: parse_backend(args.backend.as_deref())?,
    };
    let output = compile_file(&ctx, &opts, &shell)?;
    if !output.stderr.trim().is_empty() && !shell.is_quiet() {
        eprint!("{}", output.stderr);
    }
    Ok(0)
}
