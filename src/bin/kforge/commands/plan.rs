//! `kforge plan` command

use anyhow::Result;

use super::GlobalArgs;
use crate::cli::PlanArgs;
use kforge::ops::{prepare, report_diagnostics, PrepareOptions, RunTracker};
use kforge::util::shell::Status;
use kforge::util::DiskTree;

pub fn execute(global: &GlobalArgs, args: PlanArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    let opts = PrepareOptions::from(args.selection);
    let prepared = prepare(
        &ctx,
        &opts,
        &DiskTree::new(ctx.root()),
        &mut RunTracker::new(),
    )?;
    report_diagnostics(&shell, &prepared.diagnostics);

    let plan = &prepared.plan;
    if args.json {
        println!("{}", plan.to_json()?);
        return Ok(0);
    }

    shell.status(
        Status::Planning,
        format!(
            "{} unit(s) from {} subsystem(s) for {}",
            plan.unit_count(),
            plan.groups.len(),
            plan.arch
        ),
    );
    for group in &plan.groups {
        println!("{} ({} of {} file(s))", group.id, group.units.len(), group.listed);
        for unit in &group.units {
            println!("    {} -> {}", unit.source.display(), unit.object.display());
        }
    }
    if !plan.missing_files.is_empty() {
        shell.status(
            Status::Skipped,
            format!("{} missing source file(s)", plan.missing_files.len()),
        );
    }
    Ok(0)
}
