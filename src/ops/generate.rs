//! Implementation of `kforge generate`.

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::builder::makefile;
use crate::ops::pipeline::{prepare, PrepareOptions, Prepared, RunTracker};
use crate::util::context::Context;
use crate::util::fs::{write_if_changed, DiskTree};
use crate::util::hash::sha256_str;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub prepare: PrepareOptions,

    /// Output path; defaults to `setup/.build/Makefile.dynamic`.
    ///
    /// `make` and `clean` only read the default location, so a makefile
    /// written elsewhere has to be driven by hand.
    pub output: Option<PathBuf>,
}

#[derive(Debug)]
pub struct GenerateResult {
    pub prepared: Prepared,
    pub path: PathBuf,
    /// False when the file already had identical contents
    pub written: bool,
    /// SHA-256 of the rendered makefile
    pub digest: String,
}

/// Render the dynamic makefile and write it if its contents changed.
pub fn generate(ctx: &Context, opts: &GenerateOptions) -> Result<GenerateResult> {
    let mut tracker = RunTracker::new();
    let prepared = prepare(
        ctx,
        &opts.prepare,
        &DiskTree::new(ctx.root()),
        &mut tracker,
    )?;

    let path = opts
        .output
        .as_deref()
        .map(|p| ctx.resolve_path(p))
        .unwrap_or_else(|| ctx.dynamic_makefile_path());

    let contents = makefile::render(ctx.root(), &prepared.plan, prepared.resolution.valid.len())
        .context("failed to render the dynamic makefile")?;
    let written = write_if_changed(&path, &contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(
        "{} {}",
        if written { "wrote" } else { "unchanged" },
        path.display()
    );

    Ok(GenerateResult {
        prepared,
        path,
        written,
        digest: sha256_str(&contents),
    })
}
