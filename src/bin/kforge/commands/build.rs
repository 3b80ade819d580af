//! `kforge build` command

use anyhow::Result;

use super::{parse_backend, GlobalArgs};
use crate::cli::BuildArgs;
use kforge::ops::{build, BuildOptions};
use kforge::util::config::FailurePolicy;
use kforge::util::diagnostic::suggestions;

pub fn execute(global: &GlobalArgs, args: BuildArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    // --keep-going overrides config; otherwise config, then fail-fast.
    let policy = args.keep_going.then_some(FailurePolicy::Continue);

    let opts = BuildOptions {
        prepare: args.selection.into(),
        jobs: args.jobs,
        policy,
        backend: parse_backend(args.backend.as_deref())?,
    };

    let result = build(&ctx, &opts, &shell)?;
    if result.is_success() {
        return Ok(0);
    }

    let report = &result.report;
    if let Some(first) = report.first_failure() {
        shell.error(format!(
            "build failed: {} unit(s) failed, {} skipped; first failure in {} ({})",
            report.failed(),
            report.skipped(),
            first.unit.source.display(),
            first.unit.owner
        ));
    }
    if !shell.is_json() && !shell.is_verbose() {
        eprintln!("help: {}", suggestions::BUILD_FAILED);
    }
    Ok(1)
}
