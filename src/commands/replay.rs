//! Replays a raw sample capture through the viewer.
//!
//! The file holds little-endian `f32` samples back to back. It is cut into
//! chunks and delivered as blob frames at a fixed rate, so the whole session
//! pipeline runs without a live source. Acknowledgments stay local.

use std::path::PathBuf;
use std::sync::Arc;

use crate::commands::watch::{load_config, run_viewer};
use crate::stream::{OfflineCollaborator, ReplaySource};
use crate::ui::error;

/// Replays `file`, overriding the configured chunk length and rate if given.
///
/// # Errors
/// - If the configuration is invalid
/// - If the capture cannot be opened
/// - If the terminal fails
pub async fn handle_replay(
    file: PathBuf,
    chunk_len: Option<usize>,
    rate: Option<f64>,
) -> anyhow::Result<()> {
    tracing::info!("=== wavetap Replay Command ===");

    let mut config = load_config()?;
    if let Some(chunk_len) = chunk_len {
        config.replay.chunk_len = chunk_len;
    }
    if let Some(rate) = rate {
        config.replay.chunks_per_second = rate;
    }
    if let Err(e) = config.validate() {
        return Err(error::report("Replay Error", e, "Check --chunk-len and --rate."));
    }

    let source = match ReplaySource::open(
        &file,
        config.replay.chunk_len,
        config.replay.chunks_per_second,
    )
    .await
    {
        Ok(source) => source,
        Err(e) => return Err(error::report("Replay Error", e, "")),
    };

    let summary = run_viewer(source, Arc::new(OfflineCollaborator), &config).await?;
    tracing::info!(
        "Replay finished: {} chunks, lifecycle={:?}, reported={}",
        summary.counters.fired,
        summary.lifecycle,
        summary.reported
    );
    println!(
        "Replayed {} chunks of {} samples from {}",
        summary.counters.fired,
        config.replay.chunk_len,
        file.display()
    );
    Ok(())
}
