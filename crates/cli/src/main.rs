use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{
    analyze::AnalyzeArgs, batch::BatchArgs, compare::CompareArgs, init::InitConfigArgs,
    scan::ScanArgs,
};

#[derive(Parser)]
#[command(name = "quorum")]
#[command(about = "Multi-provider smart contract analysis with consensus reconciliation")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full multi-provider analysis on one contract
    Analyze(AnalyzeArgs),

    /// Analyze several contracts sequentially
    Batch(BatchArgs),

    /// Run only the pattern scanner, without contacting providers
    Scan(ScanArgs),

    /// Compare two saved analysis results
    Compare(CompareArgs),

    /// Print an example configuration
    InitConfig(InitConfigArgs),
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::analyze::execute(args))
        }
        Commands::Batch(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::batch::execute(args))
        }
        Commands::Scan(args) => commands::scan::execute(args),
        Commands::Compare(args) => commands::compare::execute(args),
        Commands::InitConfig(args) => commands::init::execute(args),
    }
}
