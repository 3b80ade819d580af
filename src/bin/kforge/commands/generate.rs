//! `kforge generate` command

use anyhow::Result;

use super::GlobalArgs;
use crate::cli::GenerateArgs;
use kforge::ops::{generate, report_diagnostics, GenerateOptions};
use kforge::util::fs::relative_path;
use kforge::util::shell::Status;

pub fn execute(global: &GlobalArgs, args: GenerateArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    let opts = GenerateOptions {
        prepare: args.selection.into(),
        output: args.output,
    };
    let result = generate(&ctx, &opts)?;
    report_diagnostics(&shell, &result.prepared.diagnostics);

    let display = relative_path(ctx.root(), &result.path);
    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "generated",
            "path": result.path,
            "written": result.written,
            "sha256": result.digest,
            "units": result.prepared.plan.unit_count(),
        }));
    } else if result.written {
        shell.status(
            Status::Generated,
            format!(
                "{} ({} unit(s))",
                display.display(),
                result.prepared.plan.unit_count()
            ),
        );
    } else {
        shell.status(Status::Info, format!("{} is up to date", display.display()));
    }

    if !shell.is_json() {
        println!("{}  {}", result.digest, display.display());
    }
    Ok(0)
}
