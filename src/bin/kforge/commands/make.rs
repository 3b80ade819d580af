//! `kforge make` command

use anyhow::Result;

use super::{parse_backend, GlobalArgs};
use crate::cli::BackendArgs;
use kforge::ops::{load_backend, make_all};
use kforge::util::shell::Status;

pub fn execute(global: &GlobalArgs, args: BackendArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    let backend = load_backend(&ctx, parse_backend(args.backend.as_deref())?)?;
    shell.status(
        Status::Building,
        format!("Makefile.dynamic ({} backend)", backend.name()),
    );
    make_all(&ctx, backend.as_ref())?;
    shell.status(Status::Finished, "dynamic build");
    Ok(0)
}
