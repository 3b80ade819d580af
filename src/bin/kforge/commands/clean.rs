//! `kforge clean` command

use anyhow::Result;

use super::{parse_backend, GlobalArgs};
use crate::cli::BackendArgs;
use kforge::ops::{clean, load_backend};
use kforge::util::shell::Status;

pub fn execute(global: &GlobalArgs, args: BackendArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    let backend = load_backend(&ctx, parse_backend(args.backend.as_deref())?)?;
    if clean(&ctx, backend.as_ref())? {
        shell.status(Status::Finished, "removed dynamic build objects");
    } else {
        shell.status(Status::Info, "nothing to clean");
    }
    Ok(0)
}
