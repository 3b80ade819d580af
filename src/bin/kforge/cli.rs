//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

/// kforge - subsystem selection, dependency resolution and partial kernel builds
#[derive(Parser)]
#[command(name = "kforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub message_format: MessageFormat,

    /// Kernel root (default: search upwards from the current directory)
    #[arg(long, global = true, env = "KFORGE_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the selected, migrated and implied subsystems
    Resolve(ResolveArgs),

    /// Show the build plan
    Plan(PlanArgs),

    /// Write setup/.build/Makefile.dynamic
    Generate(GenerateArgs),

    /// Compile every unit of the selected subsystems
    Build(BuildArgs),

    /// Compile a single source file
    Compile(CompileArgs),

    /// Run the generated makefile
    Make(BackendArgs),

    /// Remove objects listed in the generated makefile
    Clean(BackendArgs),

    /// List the subsystems in the manifest
    List(ListArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Inputs shared by every command that runs the pipeline.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Selection file (default: .config)
    #[arg(long, value_name = "FILE")]
    pub selection: Option<PathBuf>,

    /// Subsystem manifest (default: scripts/kconfig/subsystems.json)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Target architecture (default: x86-64)
    #[arg(long)]
    pub arch: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Write the makefile here instead (`make` and `clean` only read the default location)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Keep compiling after a failure
    #[arg(short, long)]
    pub keep_going: bool,

    /// Backend: auto, native or reference
    #[arg(long)]
    pub backend: Option<String>,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Source file to compile
    pub file: PathBuf,

    /// Backend: auto, native or reference
    #[arg(long)]
    pub backend: Option<String>,
}

#[derive(Args)]
pub struct BackendArgs {
    /// Backend: auto, native or reference
    #[arg(long)]
    pub backend: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only list subsystems with sources for this architecture
    #[arg(long)]
    pub arch: Option<String>,

    /// Subsystem manifest (default: scripts/kconfig/subsystems.json)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
