//! `kforge list` command

use anyhow::Result;

use super::GlobalArgs;
use crate::cli::ListArgs;
use kforge::core::Catalog;

pub fn execute(global: &GlobalArgs, args: ListArgs) -> Result<i32> {
    let ctx = global.context()?;
    let shell = global.shell();

    let manifest = args
        .manifest
        .as_deref()
        .map(|p| ctx.resolve_path(p))
        .unwrap_or_else(|| ctx.manifest_path());
    let catalog = Catalog::load(&manifest)?;

    let components: Vec<_> = catalog
        .components()
        .filter(|c| args.arch.as_deref().map_or(true, |a| c.has_files_for(a)))
        .collect();

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "catalog",
            "subsystems": components,
            "profiles": catalog.profiles(),
        }));
        return Ok(0);
    }

    let width = components.iter().map(|c| c.id.len()).max().unwrap_or(0);
    for c in &components {
        let marker = if c.required { "*" } else { " " };
        let arches: Vec<&str> = c.files.keys().map(String::as_str).collect();
        println!(
            "{} {:<width$}  {:<28} [{}]",
            marker,
            c.id,
            c.name,
            arches.join(", "),
            width = width
        );
    }

    let profiles = catalog.profiles();
    if !profiles.is_empty() {
        println!();
        println!("profiles:");
        for (key, profile) in profiles {
            let name = if profile.name.is_empty() { key } else { &profile.name };
            println!("  {:<12} {} ({})", key, name, profile.subsystems.join(", "));
        }
    }
    if !shell.is_quiet() {
        eprintln!("* required");
    }
    Ok(0)
}
