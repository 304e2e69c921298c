//! # Analytics Pipeline
//!
//! Runs the page-view demo and the chunk reassembly consumer against one
//! in-memory event bus. Configuration comes from `AP_*` environment
//! variables (see `container::config`).
//!
//! With `AP_SEND_FILE` set, the named file is split into chunks and
//! published once at startup; the reassembled copy appears in
//! `AP_OUTPUT_DIR` as `<file stem>.gz`.

use std::path::Path;

use anyhow::{Context, Result};
use pipeline_runtime::{PipelineConfig, PipelineRuntime};
use pipeline_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

/// Bus key for a file published at startup.
fn file_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "file".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let config = PipelineConfig::from_env().context("Failed to load configuration")?;
    let send_file = config.send_file.clone();

    let runtime = PipelineRuntime::new(config);
    runtime.start().await?;

    if let Some(path) = send_file {
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        runtime
            .publish_file(&file_key(&path), &data)
            .await
            .context("Failed to split file")?;
    }

    info!("Pipeline is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
