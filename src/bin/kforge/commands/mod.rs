//! Command implementations

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::{Cli, MessageFormat, SelectionArgs};
use kforge::bridge::BackendPreference;
use kforge::ops::PrepareOptions;
use kforge::util::shell::{ColorChoice, Shell};
use kforge::util::Context;

pub mod build;
pub mod clean;
pub mod compile;
pub mod completions;
pub mod generate;
pub mod list;
pub mod make;
pub mod plan;
pub mod resolve;

/// Flags shared by every subcommand.
pub struct GlobalArgs {
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
    pub json: bool,
    pub root: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn from_cli(cli: &Cli) -> Self {
        GlobalArgs {
            verbose: cli.verbose,
            quiet: cli.quiet,
            no_color: cli.no_color,
            json: cli.message_format == MessageFormat::Json,
            root: cli.root.clone(),
        }
    }

    pub fn shell(&self) -> Shell {
        let color = if self.no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Shell::from_flags(self.quiet, self.verbose, color, self.json)
    }

    /// Locate the kernel root and load its configuration.
    pub fn context(&self) -> Result<Context> {
        Context::from_root_arg(self.root.clone())
    }
}

impl From<SelectionArgs> for PrepareOptions {
    fn from(args: SelectionArgs) -> Self {
        PrepareOptions {
            selection: args.selection,
            manifest: args.manifest,
            arch: args.arch,
        }
    }
}

/// Parse a `--backend` value.
pub fn parse_backend(value: Option<&str>) -> Result<Option<BackendPreference>> {
    value
        .map(|s| s.parse::<BackendPreference>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("{}", e))
}
