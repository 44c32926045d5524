//! Command handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use loudds_client::{
    ClientConfig, LoudData, PredictionSummary, RsyncOutput, SshTunnel, SummaryItem,
};
use tracing::{info, warn};

pub async fn whoami(loud: &LoudData) -> Result<()> {
    let user = loud.user_info().await?;
    println!("user:         {}", user.id);
    println!("organisation: {}", user.organisation_id);

    if let Ok(claims) = loud.api().token().claims() {
        if let Some(origin) = claims.origin {
            println!("origin:       {}", origin);
        }
    }
    Ok(())
}

pub async fn tunnel(loud: &LoudData, dataset_id: u64, port: Option<u16>) -> Result<()> {
    let mut tunnel = match port {
        Some(port) => loud.setup_tensorboard_tunnel_on(dataset_id, port).await?,
        None => loud.setup_tensorboard_tunnel(dataset_id).await?,
    };
    tunnel.start().await?;

    println!("{}", tunnel);
    println!("rsync daemon: {}", loud.rsyncd_remote_url(tunnel.local_port()));
    println!("Press Ctrl-C to close the tunnel.");

    let ssh_exited = tokio::select! {
        _ = shutdown_signal() => false,
        _ = wait_for_exit(&mut tunnel) => true,
    };

    tunnel.stop().await?;
    if ssh_exited {
        bail!("ssh exited, tunnel closed");
    }
    Ok(())
}

async fn wait_for_exit(tunnel: &mut SshTunnel) {
    while tunnel.is_active() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

pub async fn upload_logs(loud: &LoudData, dataset_id: u64, dir: &str) -> Result<()> {
    let output = loud
        .sync_tensorboard_logs(dataset_id, dir)
        .await
        .with_context(|| format!("uploading {} for dataset {}", dir, dataset_id))?;
    report(&output);
    Ok(())
}

pub async fn download_logs(loud: &LoudData, dataset_id: u64, dir: &str) -> Result<()> {
    let mut tunnel = loud.setup_tensorboard_tunnel(dataset_id).await?;
    tunnel.start().await?;

    let url = loud.rsyncd_remote_url(tunnel.local_port());
    let result = loud.download_tensorboard_logs(&url, dir).await;

    if let Err(e) = tunnel.stop().await {
        warn!(error = %e, "Failed to stop tunnel after download");
    }

    let output = result.with_context(|| format!("downloading logs into {}", dir))?;
    report(&output);
    Ok(())
}

pub async fn upload_runs(loud: &LoudData, host: &str, port: u16, dir: &str) -> Result<()> {
    let output = loud.upload_runs(host, port, dir).await?;
    report(&output);
    Ok(())
}

pub async fn download_archive(loud: &LoudData, url: &str, target: &Path) -> Result<()> {
    let summary = loud
        .download_archive(url, target)
        .await
        .with_context(|| format!("downloading {}", url))?;
    println!(
        "{} entries ({} bytes) unpacked into {}",
        summary.entries_unpacked,
        summary.bytes_downloaded,
        target.display()
    );
    Ok(())
}

pub async fn send_predictions(loud: &LoudData, dataset_id: u64, file: &Path) -> Result<()> {
    let summary = read_summary(file)?;
    loud.send_predictions(dataset_id, &summary).await?;
    println!("{} predictions sent for dataset {}", summary.len(), dataset_id);
    Ok(())
}

/// Prints (and optionally saves) the config. The access token is never
/// written to disk or stdout; it may have come from the environment.
pub fn config(mut config: ClientConfig, path: Option<PathBuf>, save: bool) -> Result<()> {
    config.api.access_token = None;

    if save {
        config.save(path)?;
    }

    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Accepts `{"items": [...]}` or a bare array of items.
fn read_summary(file: &Path) -> Result<PredictionSummary> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let parsed = if contents.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<SummaryItem>>(&contents).map(PredictionSummary::new)
    } else {
        serde_json::from_str::<PredictionSummary>(&contents)
    };

    parsed.with_context(|| format!("parsing prediction summary {}", file.display()))
}

fn report(output: &RsyncOutput) {
    let files = output.transferred_files();
    for file in &files {
        println!("{}", file);
    }
    info!(files = files.len(), "Transfer complete");
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing tunnel");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = r#"{"predictions":{"cat":0.9,"dog":0.1},"target":"cat","loss":0.1,"filename":"a.jpg","type":"validation"}"#;

    #[test]
    fn test_read_summary_object_or_array() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        let object = dir.join("object.json");
        std::fs::write(&object, format!(r#"{{"items":[{}]}}"#, ITEM)).unwrap();
        assert_eq!(read_summary(&object).unwrap().len(), 1);

        let array = dir.join("array.json");
        std::fs::write(&array, format!("[{},{}]", ITEM, ITEM)).unwrap();
        assert_eq!(read_summary(&array).unwrap().len(), 2);

        let broken = dir.join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(read_summary(&broken).is_err());
    }

    #[test]
    fn test_read_summary_reports_item_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("bad-item.json");
        std::fs::write(&file, r#"{"items":[{"predictions":{"cat":0.9},"target":"cat"}]}"#).unwrap();

        let err = format!("{:#}", read_summary(&file).unwrap_err());
        assert!(err.contains("missing field `loss`"), "{}", err);
        assert!(!err.contains("expected a sequence"), "{}", err);
    }

    #[test]
    fn test_config_save_never_writes_token() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("loudds.toml");

        let mut config = ClientConfig::default();
        config.api.access_token = Some("aaa.bbb.SECRET".to_string());
        config.api.url = "https://staging-b.louddata.space".to_string();

        super::config(config, Some(path.clone()), true).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("SECRET"));
        assert!(!saved.contains("access_token"));
        assert!(saved.contains("https://staging-b.louddata.space"));
    }
}
