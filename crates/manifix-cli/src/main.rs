// Crate-level lint configuration for pedantic clippy
#![allow(clippy::missing_errors_doc)] // CLI errors are obvious
#![allow(clippy::uninlined_format_args)] // Named args in format strings are clearer
#![allow(clippy::struct_excessive_bools)] // CLI flags may be bools
#![allow(clippy::too_many_lines)] // CLI handlers may be long

//! Manifix CLI: CEGIS-based Kubernetes manifest repair

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manifix")]
#[command(about = "CEGIS-based repair for Kubernetes deployment manifests")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "\
EXAMPLES:
    Repair a deployment manifest:
      manifix repair deployment.yaml --out fixed/

    With tighter budgets:
      manifix repair deployment.yaml --out fixed/ --max-candidates 200 --timeout-secs 30

    Without the LLM proposer (default template only):
      manifix repair deployment.yaml --out fixed/ --no-proposer

    Run the bundled demo:
      manifix demo --out fixed/

    Inspect the repair bank:
      manifix bank

NOTE:
    The LLM proposer activates when ANTHROPIC_API_KEY or OPENAI_API_KEY is
    set; otherwise repairs fall back to the built-in default template.")]
struct Cli {
    /// Show verbose output (engine tracing)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair a Kubernetes Deployment manifest
    Repair {
        /// Path to the input deployment.yaml
        input: PathBuf,
        /// Output directory for the repaired manifest
        #[arg(long)]
        out: PathBuf,
        /// Output filename (default: preserves the input filename)
        #[arg(long)]
        output_filename: Option<String>,
        /// Maximum candidates to try
        #[arg(long, default_value = "1000")]
        max_candidates: u32,
        /// Maximum constraint-free iterations before giving up
        #[arg(long, default_value = "10")]
        max_iters: u32,
        /// Synthesis timeout in seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
        /// Path to the repair bank file
        #[arg(long, default_value = ".manifix-bank.json")]
        bank: PathBuf,
        /// Disable the repair bank
        #[arg(long)]
        no_bank: bool,
        /// Disable the LLM proposer (always use the default template)
        #[arg(long)]
        no_proposer: bool,
        /// LLM model to use (e.g. claude-3-5-sonnet-20241022, gpt-4o)
        #[arg(long)]
        model: Option<String>,
    },
    /// Repair the bundled broken example manifest
    Demo {
        /// Output directory for the repaired manifest
        #[arg(long)]
        out: Option<PathBuf>,
        /// Path to the repair bank file (enables cross-run learning)
        #[arg(long)]
        bank: Option<PathBuf>,
    },
    /// List repair bank entries
    Bank {
        /// Path to the repair bank file
        #[arg(long, default_value = ".manifix-bank.json")]
        bank: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Repair {
            input,
            out,
            output_filename,
            max_candidates,
            max_iters,
            timeout_secs,
            bank,
            no_bank,
            no_proposer,
            model,
        } => {
            commands::repair::run(commands::repair::RepairOptions {
                input,
                out,
                output_filename,
                max_candidates,
                max_iters,
                timeout_secs,
                bank: (!no_bank).then_some(bank),
                use_proposer: !no_proposer,
                model,
            })
            .await
        }
        Commands::Demo { out, bank } => commands::demo::run(out, bank).await,
        Commands::Bank { bank } => commands::bank::run(&bank),
    };

    match result {
        Ok(success) if success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
