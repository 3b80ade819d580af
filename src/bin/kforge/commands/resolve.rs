//! `kforge resolve` command

use anyhow::Result;

use super::GlobalArgs;
use crate::cli::ResolveArgs;
use kforge::ops::{prepare, report_diagnostics, PrepareOptions, RunTracker};
use kforge::util::shell::Status;
use kforge::util::DiskTree;

pub fn execute(global: &GlobalArgs, args: ResolveArgs) -> Result<i32> {
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

    let resolution = &prepared.resolution;
    if shell.is_json() {
        let implied: Vec<_> = resolution.resolved.implied().collect();
        let renamed: Vec<_> = resolution
            .migrated
            .renamed
            .iter()
            .map(|(old, new)| serde_json::json!({ "from": old, "to": new }))
            .collect();
        shell.json_event(&serde_json::json!({
            "reason": "resolved",
            "arch": prepared.arch,
            "selected": resolution.valid,
            "migrated": renamed,
            "removed": resolution.migrated.removed,
            "implied": implied,
            "resolved": resolution.resolved.ids(),
        }));
        return Ok(0);
    }

    for (old, new) in &resolution.migrated.renamed {
        shell.status(Status::Migrated, format!("{} -> {}", old, new));
    }
    for id in &resolution.valid {
        shell.status(Status::Selected, id);
    }
    for id in resolution.resolved.implied() {
        let reason = match prepared.catalog.get(id) {
            Some(c) if c.required => "required",
            Some(_) => "dependency",
            None => "unknown dependency",
        };
        shell.status(Status::Including, format!("{} ({})", id, reason));
    }

    // The resolved set goes to stdout, one id per line, for scripting.
    for id in resolution.resolved.ids() {
        println!("{}", id);
    }
    Ok(0)
}
