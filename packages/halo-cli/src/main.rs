mod replay;

use anyhow::Result;
use clap::{Parser, Subcommand};
use halo_runtime::RuntimeConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "halo")]
#[command(about = "Halo touchscreen runtime tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded touch script on the simulated panel
    Replay {
        /// JSON script with timed press/drag/release steps
        script: PathBuf,
        /// Runtime config (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 240)]
        height: u32,
        /// Write the final frame as PNG
        #[arg(long)]
        screenshot: Option<PathBuf>,
        /// Write every rendered frame into this directory
        #[arg(long)]
        movie: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            config,
            width,
            height,
            screenshot,
            movie,
        } => {
            let config = match config {
                Some(path) => RuntimeConfig::load(&path)?,
                None => RuntimeConfig::default(),
            };
            let script = replay::Script::load(&script)?;
            let delivered = replay::replay(
                &script,
                replay::ReplayOptions {
                    width,
                    height,
                    config,
                    screenshot,
                    movie,
                },
            )?;
            for line in &delivered {
                println!("{}", serde_json::to_string(line)?);
            }
        }
    }

    Ok(())
}
