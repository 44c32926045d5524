//! # loudds CLI
//!
//! Command-line front end for the loudds SDK.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  loudds [--config PATH] [--token T] [-v] <command>                      │
//! │                                                                         │
//! │  whoami                                 user + organisation            │
//! │  tunnel --dataset-id N [--port P]       hold tunnel until Ctrl-C       │
//! │  upload-logs --dataset-id N [--dir D]   tunnel + rsync push            │
//! │  download-logs --dataset-id N --dir D   tunnel + rsync pull            │
//! │  upload-runs --host H --port P [--dir]  rsync push, no tunnel          │
//! │  download-archive URL TARGET            fetch + unpack .tgz            │
//! │  send-predictions --dataset-id N FILE   POST prediction summary        │
//! │  config [--save]                        show / persist config          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loudds_client::{ClientConfig, LoudData};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loudds", version, about = "Client for the loudds machine-learning platform")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access token (overrides LOUDDS_ACCESS_TOKEN and the config file)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the user the access token belongs to
    Whoami,
    /// Open the TensorBoard rsync tunnel and hold it until Ctrl-C
    Tunnel {
        #[arg(long)]
        dataset_id: u64,
        /// Local port (defaults to the configured bind port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Push a local TensorBoard log directory through the tunnel
    UploadLogs {
        #[arg(long)]
        dataset_id: u64,
        /// Log directory (defaults to the configured runs_dir)
        #[arg(long)]
        dir: Option<String>,
    },
    /// Pull TensorBoard logs through the tunnel
    DownloadLogs {
        #[arg(long)]
        dataset_id: u64,
        #[arg(long)]
        dir: String,
    },
    /// Push runs straight to a reachable rsync daemon
    UploadRuns {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        dir: Option<String>,
    },
    /// Download a dataset archive and unpack it
    DownloadArchive {
        url: String,
        target: PathBuf,
    },
    /// Post a prediction summary (JSON file) for a dataset
    SendPredictions {
        #[arg(long)]
        dataset_id: u64,
        file: PathBuf,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClientConfig::load(cli.config.clone()).context("loading configuration")?;
    debug!(api = %config.api_url(), "Configuration loaded");

    if let Command::Config { save } = cli.command {
        return commands::config(config, cli.config, save);
    }

    let token = cli
        .token
        .clone()
        .or_else(|| config.access_token().map(str::to_string))
        .context("no access token: pass --token or set LOUDDS_ACCESS_TOKEN")?;

    let loud = LoudData::with_config(config, token)?;

    match cli.command {
        Command::Whoami => commands::whoami(&loud).await,
        Command::Tunnel { dataset_id, port } => commands::tunnel(&loud, dataset_id, port).await,
        Command::UploadLogs { dataset_id, dir } => {
            let dir = dir.unwrap_or_else(|| loud.config().rsync.runs_dir.clone());
            commands::upload_logs(&loud, dataset_id, &dir).await
        }
        Command::DownloadLogs { dataset_id, dir } => {
            commands::download_logs(&loud, dataset_id, &dir).await
        }
        Command::UploadRuns { host, port, dir } => {
            let dir = dir.unwrap_or_else(|| loud.config().rsync.runs_dir.clone());
            commands::upload_runs(&loud, &host, port, &dir).await
        }
        Command::DownloadArchive { url, target } => {
            commands::download_archive(&loud, &url, &target).await
        }
        Command::SendPredictions { dataset_id, file } => {
            commands::send_predictions(&loud, dataset_id, &file).await
        }
        Command::Config { .. } => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "loudds=debug,loudds_client=debug,loudds_core=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["loudds", "upload-logs", "--dataset-id", "3", "-v", "--token", "a.b.c"]);
        assert!(cli.verbose);
        assert_eq!(cli.token.as_deref(), Some("a.b.c"));
        assert!(matches!(
            cli.command,
            Command::UploadLogs { dataset_id: 3, dir: None }
        ));
    }

    #[test]
    fn test_parse_download_archive() {
        let cli = Cli::parse_from([
            "loudds",
            "download-archive",
            "https://staging-b.louddata.space/assets/f5Isrpkw.tgz",
            "../data",
        ]);
        match cli.command {
            Command::DownloadArchive { url, target } => {
                assert!(url.ends_with("f5Isrpkw.tgz"));
                assert_eq!(target, PathBuf::from("../data"));
            }
            _ => panic!("wrong command"),
        }
    }
}
