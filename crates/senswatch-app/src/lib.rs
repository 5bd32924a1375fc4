//! SensWatch application wiring.
//!
//! Runs one batch pass over the configured file list, then (in live mode)
//! keeps the index reconciled with the change log until Ctrl-C.

use anyhow::Context;
use senswatch_core::AppConfig;
use senswatch_db::Database;
use senswatch_detect::FileScanner;
use senswatch_sync::{
    collect_targets, run_batch, write_json_export, ChangeLogTailer, EventParser, LiveRunner,
    Reconciler,
};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,senswatch=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Scan every batch target and rewrite the JSON export and the index.
/// Returns the number of files with findings.
///
/// When nothing is found the previous outputs are left untouched.
pub async fn batch_pass(
    config: &AppConfig,
    scanner: &FileScanner,
    db: &Database,
) -> anyhow::Result<usize> {
    let targets = collect_targets(&config.paths, config.scan.max_depth)
        .await
        .context("failed to collect batch targets")?;
    let records = run_batch(scanner, &targets).await;

    if records.is_empty() {
        info!("No sensitive files found, outputs left unchanged");
        return Ok(0);
    }

    write_json_export(&config.paths.output_json, &records)
        .await
        .context("failed to write JSON export")?;
    db.replace_all(&records)
        .await
        .context("failed to rewrite index")?;
    Ok(records.len())
}

/// Batch pass followed, if enabled, by live mode until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    config.validate().context("invalid configuration")?;

    let db = Database::open(&config.paths.index_db)
        .await
        .with_context(|| format!("failed to open index {}", config.paths.index_db.display()))?;
    let scanner = FileScanner::from_config(&config);

    let flagged = batch_pass(&config, &scanner, &db).await?;
    info!("Batch pass complete: {} files with findings", flagged);

    if config.watch.live {
        let tailer = ChangeLogTailer::new(
            config.paths.change_log.clone(),
            EventParser::new(&config.watch),
        );
        let mut runner = LiveRunner::new(
            tailer,
            Reconciler::new(db.clone(), scanner),
            Duration::from_secs(config.watch.poll_interval_secs),
        );
        runner.run_until(shutdown).await;
    }

    db.close().await;
    Ok(())
}

/// Run until Ctrl-C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
