//! # Anvil-dl Library
//!
//! Multi-part HTTP downloader for toolchain release archives. Fetches a
//! possibly-large file with parallel ranged requests, supports graceful
//! interruption, and reassembles the parts into the final artifact.
//!
//! ## Features
//!
//! - **Parallel ranged fetches**: one connection per part when the server
//!   advertises byte-range support, with automatic single-connection fallback
//! - **Graceful interruption**: cancelling a token stops every worker at its
//!   next chunk boundary and cleans up all partial state
//! - **Session-scoped state**: an interrupted attempt is cleaned up, never
//!   resumed across process restarts
//! - **Progress tracking**: optional progress callbacks for custom UIs
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     match anvil_dl::fetch("https://example.org/go1.22.4.tar.gz").await? {
//!         anvil_dl::Outcome::Completed(path) => println!("saved to {}", path.display()),
//!         anvil_dl::Outcome::Interrupted => println!("interrupted, state cleaned up"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Graceful Interruption
//!
//! ```rust,no_run
//! use anvil_dl::{CancellationToken, DownloadRequest, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = CancellationToken::new();
//!     let signal_token = shutdown.clone();
//!     tokio::spawn(async move {
//!         if tokio::signal::ctrl_c().await.is_ok() {
//!             signal_token.cancel();
//!         }
//!     });
//!
//!     let downloader = Downloader::new(DownloadRequest::new(
//!         "https://example.org/go1.22.4.tar.gz",
//!     ))?;
//!     downloader.run(shutdown).await?;
//!     Ok(())
//! }
//! ```

// Re-export core types that users might need
pub use crate::core::error::{Error, Result};
pub use crate::core::options::{default_part_count, DownloadOptions, DownloadRequest, ProgressCallback};
pub use crate::core::plan::{DownloadPlan, PartSpec};
pub use crate::core::{Downloader, Outcome};

/// Cancellation token handed to [`Downloader::run`] as the external
/// interrupt signal, re-exported for callers' convenience.
pub use tokio_util::sync::CancellationToken;

// Internal modules
mod core;

/// Download a URL with default settings
///
/// The artifact lands in the current directory under the URL's base name.
/// The returned [`Outcome`] distinguishes completion from interruption;
/// with no external token wired up this call can only complete or fail.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// anvil_dl::fetch("https://example.org/go1.22.4.tar.gz").await?;
/// # Ok(())
/// # }
/// ```
pub async fn fetch(url: &str) -> Result<Outcome> {
    let downloader = Downloader::new(DownloadRequest::new(url))?;
    downloader.run(CancellationToken::new()).await
}

/// Download with a fully specified request and options
///
/// # Examples
/// ```rust,no_run
/// use anvil_dl::{DownloadOptions, DownloadRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = DownloadRequest {
///     parts: 4,
///     force_clean: true,
///     ..DownloadRequest::new("https://example.org/go1.22.4.tar.gz")
/// };
/// let options = DownloadOptions {
///     staging_dir: "/tmp/anvil/downloads".into(),
///     ..Default::default()
/// };
/// anvil_dl::fetch_with_options(request, options).await?;
/// # Ok(())
/// # }
/// ```
pub async fn fetch_with_options(
    request: DownloadRequest,
    options: DownloadOptions,
) -> Result<Outcome> {
    let downloader = Downloader::with_options(request, options)?;
    downloader.run(CancellationToken::new()).await
}

/// Download with progress tracking
///
/// The callback receives `(downloaded_bytes, total_bytes)` after every
/// written chunk, aggregated across all parts.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// anvil_dl::fetch_with_progress(
///     "https://example.org/go1.22.4.tar.gz",
///     |downloaded, total| {
///         let percent = (downloaded as f64 / total as f64) * 100.0;
///         println!("Progress: {:.1}%", percent);
///     },
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn fetch_with_progress<F>(url: &str, progress: F) -> Result<Outcome>
where
    F: Fn(u64, u64) + Send + Sync + 'static,
{
    let options = DownloadOptions {
        progress: Some(std::sync::Arc::new(progress)),
        ..Default::default()
    };
    fetch_with_options(DownloadRequest::new(url), options).await
}
