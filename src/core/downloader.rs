//! Download orchestration for anvil-dl
//!
//! Owns the probe → plan → parallel fetch → reassemble pipeline and the
//! cancellation coordinator that supervises it.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, ClientBuilder};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::error::{Error, Result};
use crate::core::options::{DownloadOptions, DownloadRequest};
use crate::core::plan::{self, DownloadPlan};
use crate::core::probe;
use crate::core::worker::{self, PartMessage, ProgressState, WorkerContext};

/// Terminal outcome of an attempt that did not fail outright
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The artifact was fully assembled, or a completed earlier artifact was
    /// reused, at the contained path
    Completed(PathBuf),

    /// An external interrupt stopped the attempt; partial state was removed
    Interrupted,
}

/// How the fetch phase ended, before reassembly
enum FetchResult {
    Completed(Vec<(u64, PathBuf)>),
    Interrupted,
    Failed(Error),
}

/// Drives a single download attempt.
///
/// The HTTP client is constructed once, up front, and handed to the prober
/// and every worker; there is no process-global client state.
pub struct Downloader {
    client: Client,
    request: DownloadRequest,
    options: DownloadOptions,
}

impl Downloader {
    /// Create a downloader with default options
    pub fn new(request: DownloadRequest) -> Result<Self> {
        Self::with_options(request, DownloadOptions::default())
    }

    /// Create a downloader with custom options
    pub fn with_options(request: DownloadRequest, options: DownloadOptions) -> Result<Self> {
        // No request timeout: a stalled fetch ends only through the
        // cancellation token.
        let mut builder = ClientBuilder::new()
            .tcp_keepalive(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(20)
            .user_agent(concat!("anvil-dl/", env!("CARGO_PKG_VERSION")));
        if request.skip_tls_verify {
            warn!("TLS certificate verification disabled for this download");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| Error::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            request,
            options,
        })
    }

    /// Run one download attempt.
    ///
    /// Cancelling `shutdown` interrupts the attempt: every worker is stopped
    /// at its next chunk boundary, joined, and the partial state removed.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<Outcome> {
        let info = probe::probe(&self.client, &self.request.url).await?;
        let part_count = probe::effective_part_count(self.request.parts, &info);
        if info.length_known {
            info!(
                "downloading {} ({} bytes) with {} connection(s)",
                self.request.url, info.content_length, part_count
            );
        } else {
            info!(
                "downloading {} (unknown size) with a single connection",
                self.request.url
            );
        }

        tokio::fs::create_dir_all(&self.options.staging_dir).await?;
        let plan = plan::build_plan(
            &self.request.url,
            &self.options.staging_dir,
            info.content_length,
            part_count,
        )?;

        if let Some(existing) = self.preflight(&plan).await? {
            info!("reusing completed artifact {}", existing.display());
            return Ok(Outcome::Completed(existing));
        }

        let result = match self.fetch_parts(&plan, &shutdown).await {
            FetchResult::Completed(parts) => {
                self.reassemble(&plan, parts).await.map(Outcome::Completed)
            }
            FetchResult::Interrupted => Ok(Outcome::Interrupted),
            FetchResult::Failed(error) => Err(error),
        };

        self.cleanup(&plan).await;
        result
    }

    /// Pre-flight check of the staging directory, run before any worker is
    /// launched. Returns the artifact path when a completed previous attempt
    /// can be reused.
    async fn preflight(&self, plan: &DownloadPlan) -> Result<Option<PathBuf>> {
        if self.request.force_clean {
            self.clear_previous(plan).await?;
            return Ok(None);
        }
        if tokio::fs::try_exists(&plan.dest_path).await? {
            return Ok(Some(plan.dest_path.clone()));
        }
        let strays = self.stray_part_files(plan).await?;
        if !strays.is_empty() {
            return Err(Error::InvalidInput(format!(
                "staging directory {} holds {} part file(s) from a previous attempt; \
                 enable force_clean to clear them",
                self.options.staging_dir.display(),
                strays.len()
            )));
        }
        Ok(None)
    }

    /// Part files matching `<file_name>.part*`, including leftovers from an
    /// attempt that used a different part count
    async fn stray_part_files(&self, plan: &DownloadPlan) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}.part", plan.file_name);
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.options.staging_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                found.push(entry.path());
            }
        }
        Ok(found)
    }

    /// Remove the previous artifact and any of its part files
    async fn clear_previous(&self, plan: &DownloadPlan) -> Result<()> {
        for path in self.stray_part_files(plan).await? {
            tokio::fs::remove_file(&path).await?;
            debug!("removed stale part file {}", path.display());
        }
        match tokio::fs::remove_file(&plan.dest_path).await {
            Ok(()) => info!("removed previous artifact {}", plan.dest_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Spawn one worker per part and supervise them together with the
    /// external interrupt.
    ///
    /// The result channel has one slot per worker, so a finishing worker can
    /// never block on delivery. It closes once every worker has dropped its
    /// sender, which is the join-all: the loop only exits after all workers
    /// have left, interrupt or not.
    async fn fetch_parts(&self, plan: &DownloadPlan, shutdown: &CancellationToken) -> FetchResult {
        let cancel = CancellationToken::new();
        let progress = Arc::new(ProgressState {
            downloaded: AtomicU64::new(0),
            total: plan.total_length,
            callback: self.options.progress.clone(),
        });

        let (tx, mut rx) = mpsc::channel(plan.parts.len());
        let mut handles = Vec::with_capacity(plan.parts.len());
        for spec in &plan.parts {
            let ctx = WorkerContext {
                client: self.client.clone(),
                url: self.request.url.clone(),
                total_length: plan.total_length,
                buffer_size: self.options.buffer_size,
                cancel: cancel.clone(),
                progress: Arc::clone(&progress),
            };
            handles.push(tokio::spawn(worker::run(ctx, spec.clone(), tx.clone())));
        }
        drop(tx);

        let mut interrupted = false;
        let mut first_error: Option<Error> = None;
        let mut completed: Vec<(u64, PathBuf)> = Vec::with_capacity(plan.parts.len());

        loop {
            tokio::select! {
                _ = shutdown.cancelled(), if !interrupted => {
                    info!("interrupt received, stopping {} worker(s)", plan.parts.len());
                    interrupted = true;
                    cancel.cancel();
                }
                message = rx.recv() => match message {
                    Some(PartMessage::Done { index, path }) => {
                        debug!("part {index} completed");
                        completed.push((index, path));
                    }
                    Some(PartMessage::Failed { index, error }) => {
                        warn!("part {index} failed: {error}");
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                    None => break,
                }
            }
        }

        // All workers have reported; reap the handles so no task outlives
        // the attempt.
        for handle in handles {
            let _ = handle.await;
        }

        if interrupted {
            if let Some(error) = first_error {
                debug!("worker error observed during interrupt: {error}");
            }
            FetchResult::Interrupted
        } else if let Some(error) = first_error {
            FetchResult::Failed(error)
        } else {
            FetchResult::Completed(completed)
        }
    }

    /// Concatenate completed parts into the final artifact.
    ///
    /// Parts are ordered by numeric index, never by file name: "part10"
    /// sorts before "part2" lexicographically and would corrupt the output.
    async fn reassemble(
        &self,
        plan: &DownloadPlan,
        mut parts: Vec<(u64, PathBuf)>,
    ) -> Result<PathBuf> {
        parts.sort_unstable_by_key(|(index, _)| *index);

        info!(
            "joining {} part(s) into {}",
            parts.len(),
            plan.dest_path.display()
        );
        match self.join_parts(&plan.dest_path, &parts).await {
            Ok(()) => Ok(plan.dest_path.clone()),
            Err(e) => {
                // A failed join must not leave a half-written artifact
                let _ = tokio::fs::remove_file(&plan.dest_path).await;
                Err(e)
            }
        }
    }

    async fn join_parts(&self, dest: &Path, parts: &[(u64, PathBuf)]) -> Result<()> {
        let mut out = tokio::fs::File::create(dest).await?;
        for (_, path) in parts {
            let mut part = tokio::fs::File::open(path).await?;
            tokio::io::copy(&mut part, &mut out).await?;
        }
        out.flush().await?;
        Ok(())
    }

    /// Remove every part file; part files never survive past one attempt.
    /// Best-effort: a failure is reported but never displaces the primary
    /// outcome of the attempt.
    async fn cleanup(&self, plan: &DownloadPlan) {
        for spec in &plan.parts {
            match tokio::fs::remove_file(&spec.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove part file {}: {e}", spec.path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(url: &str) -> DownloadRequest {
        DownloadRequest {
            url: url.to_string(),
            parts: 3,
            skip_tls_verify: false,
            force_clean: false,
        }
    }

    fn downloader_in(dir: &Path, request: DownloadRequest) -> Downloader {
        let options = DownloadOptions {
            staging_dir: dir.to_path_buf(),
            ..Default::default()
        };
        Downloader::with_options(request, options).unwrap()
    }

    #[tokio::test]
    async fn test_preflight_reuses_completed_artifact() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go1.22.4.tar.gz"), b"cached").unwrap();

        let dl = downloader_in(dir.path(), request("https://example.org/go1.22.4.tar.gz"));
        let plan =
            plan::build_plan("https://example.org/go1.22.4.tar.gz", dir.path(), 6, 3)
                .unwrap();

        let reused = dl.preflight(&plan).await.unwrap();
        assert_eq!(reused, Some(dir.path().join("go1.22.4.tar.gz")));
    }

    #[tokio::test]
    async fn test_preflight_rejects_stale_parts() {
        let dir = tempdir().unwrap();
        // A leftover from an earlier attempt with a different part count
        std::fs::write(dir.path().join("go1.22.4.tar.gz.part7"), b"stale").unwrap();

        let dl = downloader_in(dir.path(), request("https://example.org/go1.22.4.tar.gz"));
        let plan =
            plan::build_plan("https://example.org/go1.22.4.tar.gz", dir.path(), 6, 3)
                .unwrap();

        let err = dl.preflight(&plan).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "unexpected: {err:?}");
    }

    #[tokio::test]
    async fn test_force_clean_clears_previous_attempt() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go1.22.4.tar.gz"), b"old").unwrap();
        std::fs::write(dir.path().join("go1.22.4.tar.gz.part0"), b"old0").unwrap();
        std::fs::write(dir.path().join("go1.22.4.tar.gz.part10"), b"old10").unwrap();

        let mut req = request("https://example.org/go1.22.4.tar.gz");
        req.force_clean = true;
        let dl = downloader_in(dir.path(), req);
        let plan =
            plan::build_plan("https://example.org/go1.22.4.tar.gz", dir.path(), 6, 3)
                .unwrap();

        assert_eq!(dl.preflight(&plan).await.unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_part_files() {
        let dir = tempdir().unwrap();
        let dl = downloader_in(dir.path(), request("https://example.org/go1.22.4.tar.gz"));
        let plan =
            plan::build_plan("https://example.org/go1.22.4.tar.gz", dir.path(), 6, 3)
                .unwrap();

        for spec in &plan.parts {
            std::fs::write(&spec.path, b"xx").unwrap();
        }
        dl.cleanup(&plan).await;
        for spec in &plan.parts {
            assert!(!spec.path.exists());
        }
    }

    #[tokio::test]
    async fn test_reassemble_orders_numerically() {
        let dir = tempdir().unwrap();
        let dl = downloader_in(dir.path(), request("https://example.org/out.bin"));
        let plan = plan::build_plan("https://example.org/out.bin", dir.path(), 12, 12)
            .unwrap();

        // Hand workers' results back in a scrambled completion order
        let mut parts = Vec::new();
        for spec in plan.parts.iter().rev() {
            std::fs::write(&spec.path, [spec.index as u8]).unwrap();
            parts.push((spec.index, spec.path.clone()));
        }

        let dest = dl.reassemble(&plan, parts).await.unwrap();
        let joined = std::fs::read(dest).unwrap();
        assert_eq!(joined, (0u8..12).collect::<Vec<u8>>());
    }
}
