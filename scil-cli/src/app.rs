use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scil::AnalysisConfig;

/// scil - CIL control flow, symbolic stack naming and taint fact generation
#[derive(Debug, Parser)]
#[command(name = "scil", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Switches for the individual analysis passes.
#[derive(Debug, Args)]
pub struct AnalysisOptions {
    /// Keep short-form opcodes instead of rewriting them to their long forms.
    #[arg(long)]
    pub no_normalize: bool,

    /// Keep nop and break instructions.
    #[arg(long)]
    pub keep_nops: bool,

    /// Do not insert phi nodes at join points.
    #[arg(long)]
    pub no_phis: bool,

    /// Analyse methods one after another instead of in parallel.
    #[arg(long)]
    pub sequential: bool,
}

impl AnalysisOptions {
    /// Maps the flags onto an analysis configuration.
    pub fn config(&self) -> AnalysisConfig {
        AnalysisConfig::default()
            .with_normalize_short_forms(!self.no_normalize)
            .with_eliminate_nops(!self.keep_nops)
            .with_insert_phis(!self.no_phis)
            .with_parallel(!self.sequential)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate taint facts for every method of a module (or a single method).
    Facts {
        /// Path to the module JSON file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Only analyse methods whose name contains this text.
        #[arg(short, long)]
        method: Option<String>,

        #[command(flatten)]
        analysis: AnalysisOptions,
    },

    /// Show the basic blocks of a method with their edges and stack depths.
    Cfg {
        /// Path to the module JSON file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Method name or unique name fragment.
        #[arg(short, long)]
        method: String,
    },

    /// Show every node of a method with its pop and push names.
    Stack {
        /// Path to the module JSON file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Method name or unique name fragment.
        #[arg(short, long)]
        method: String,

        #[command(flatten)]
        analysis: AnalysisOptions,
    },

    /// Count analysed instructions per module.
    Count {
        /// Path to the module JSON file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Analyse methods one after another instead of in parallel.
        #[arg(long)]
        sequential: bool,
    },
}
