//! kforge CLI - subsystem selection and partial kernel builds

use anyhow::Result;
use clap::Parser;
use miette::GraphicalReportHandler;
use tracing_subscriber::EnvFilter;

use kforge::core::catalog::CatalogError;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            report_error(&e);
            std::process::exit(1);
        }
    }
}

/// Manifest parse errors carry a source span and are rendered graphically.
fn report_error(e: &anyhow::Error) {
    if let Some(err @ CatalogError::ManifestParseError { .. }) = e.downcast_ref::<CatalogError>() {
        let mut out = String::new();
        if GraphicalReportHandler::new()
            .render_report(&mut out, err)
            .is_ok()
        {
            eprint!("{}", out);
            return;
        }
    }
    eprintln!("error: {:#}", e);
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("kforge=debug")
    } else if cli.quiet {
        EnvFilter::new("kforge=warn")
    } else {
        EnvFilter::new("kforge=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = commands::GlobalArgs::from_cli(&cli);

    // Execute command
    match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(&global, args),
        Commands::Plan(args) => commands::plan::execute(&global, args),
        Commands::Generate(args) => commands::generate::execute(&global, args),
        Commands::Build(args) => commands::build::execute(&global, args),
        Commands::Compile(args) => commands::compile::execute(&global, args),
        Commands::Make(args) => commands::make::execute(&global, args),
        Commands::Clean(args) => commands::clean::execute(&global, args),
        Commands::List(args) => commands::list::execute(&global, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
