//! Ranged fetch workers for anvil-dl
//!
//! Each worker streams exactly one part of the resource into its own file,
//! polling the cancellation token between chunk reads so an interrupt lands
//! within roughly one chunk's transfer time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::TryStreamExt;
use log::debug;
use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::Sender;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::core::error::{Error, Result};
use crate::core::options::ProgressCallback;
use crate::core::plan::PartSpec;

/// Result notification sent by a worker; cancelled workers send nothing
#[derive(Debug)]
pub(crate) enum PartMessage {
    Done { index: u64, path: PathBuf },
    Failed { index: u64, error: Error },
}

/// Aggregate download progress shared by all workers
pub(crate) struct ProgressState {
    pub downloaded: AtomicU64,
    pub total: u64,
    pub callback: Option<ProgressCallback>,
}

/// Everything a worker needs; shared pieces arrive as cheap clones
pub(crate) struct WorkerContext {
    pub client: Client,
    pub url: String,
    pub total_length: u64,
    pub buffer_size: usize,
    pub cancel: CancellationToken,
    pub progress: Arc<ProgressState>,
}

/// Worker entry point: fetch one part, then report exactly once.
///
/// A cancelled worker reports nothing; its partial file is left in place for
/// the coordinator's cleanup pass.
pub(crate) async fn run(ctx: WorkerContext, spec: PartSpec, results: Sender<PartMessage>) {
    let index = spec.index;
    match fetch_part(&ctx, &spec).await {
        Ok(true) => {
            let _ = results
                .send(PartMessage::Done {
                    index,
                    path: spec.path,
                })
                .await;
        }
        Ok(false) => debug!("part {index} stopped by cancellation"),
        Err(error) => {
            let _ = results.send(PartMessage::Failed { index, error }).await;
        }
    }
}

/// Fetch one part into its file.
///
/// Returns `Ok(false)` when the cancellation token stopped the copy before
/// the stream was fully drained.
async fn fetch_part(ctx: &WorkerContext, spec: &PartSpec) -> Result<bool> {
    let ranges = spec.range_header(ctx.total_length);
    debug!("part {}: requesting {}", spec.index, ranges);

    let response = ctx
        .client
        .get(&ctx.url)
        .header(reqwest::header::RANGE, ranges)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(Error::HttpError(format!(
            "range request for part {} failed: {status}",
            spec.index
        )));
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&spec.path)
        .await?;

    let stream = response
        .bytes_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let mut reader = StreamReader::new(stream);
    let mut buffer = vec![0u8; ctx.buffer_size];

    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(false);
        }
        let read = reader.read(&mut buffer).await.map_err(|e| {
            Error::NetworkError(format!("stream read error on part {}: {e}", spec.index))
        })?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read]).await?;

        let downloaded =
            ctx.progress.downloaded.fetch_add(read as u64, Ordering::Relaxed) + read as u64;
        if let Some(callback) = &ctx.progress.callback {
            callback(downloaded, ctx.progress.total);
        }
    }

    file.flush().await?;
    Ok(true)
}
