//! Request and option types for anvil-dl downloads.

use std::path::PathBuf;
use std::sync::Arc;

/// Progress callback function type, called with (downloaded, total) bytes
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Immutable description of a single download attempt
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// URL of the archive to fetch
    pub url: String,

    /// Requested number of parallel parts; the probe forces this to 1 when
    /// the server lacks range support or a usable content length
    pub parts: u64,

    /// Disable TLS certificate verification (self-signed mirrors)
    pub skip_tls_verify: bool,

    /// Clear a previous attempt's artifact and part files before starting
    pub force_clean: bool,
}

impl DownloadRequest {
    /// Create a request with default part count and safe TLS settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parts: default_part_count(),
            skip_tls_verify: false,
            force_clean: false,
        }
    }
}

/// Options for download operations
pub struct DownloadOptions {
    /// Directory holding part files and the final artifact
    pub staging_dir: PathBuf,

    /// Buffer size for chunked body copies; cancellation is polled between
    /// chunks, so this also bounds interruption latency
    pub buffer_size: usize,

    /// Optional progress callback
    pub progress: Option<ProgressCallback>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64KB
            progress: None,
        }
    }
}

/// Default part count: one connection per CPU, capped at 8
pub fn default_part_count() -> u64 {
    num_cpus::get().clamp(1, 8) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_part_count_bounds() {
        let count = default_part_count();
        assert!((1..=8).contains(&count));
    }

    #[test]
    fn test_request_defaults() {
        let request = DownloadRequest::new("https://example.org/go1.22.4.tar.gz");
        assert!(!request.skip_tls_verify);
        assert!(!request.force_clean);
        assert!(request.parts >= 1);
    }
}
