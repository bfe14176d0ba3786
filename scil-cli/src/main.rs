mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })?;

    let cli = Cli::parse();

    // scil info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("scil", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Facts {
            path,
            method,
            analysis,
        } => commands::facts::run(path, method.as_deref(), analysis, &cli.global),
        Command::Cfg { path, method } => commands::cfg::run(path, method, &cli.global),
        Command::Stack {
            path,
            method,
            analysis,
        } => commands::stack::run(path, method, analysis, &cli.global),
        Command::Count { path, sequential } => commands::count::run(path, *sequential, &cli.global),
    }
}
