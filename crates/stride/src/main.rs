//! Stride - pedestrian dead-reckoning simulator

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Pedestrian dead-reckoning simulator with sensor fusion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CLI batch/single simulation mode
    Cli {
        /// Pass remaining arguments to stride-cli
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the default tracker configuration as JSON
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cli { args }) => {
            let cli_args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            run_cli(&cli_args)
        }
        Some(Commands::Config) => print_config(),
        None => {
            // Default to a single simulated walk
            run_cli(&["--single"])
        }
    }
}

fn run_cli(args: &[&str]) -> anyhow::Result<()> {
    let mut full_args = vec!["stride-cli"];
    full_args.extend(args);

    match stride_cli::run_cli_main(&full_args) {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("CLI error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn print_config() -> anyhow::Result<()> {
    let cfg = stride_sim::TrackerConfig::default();
    println!("{}", serde_json::to_string_pretty(&cfg.to_json())?);
    Ok(())
}
