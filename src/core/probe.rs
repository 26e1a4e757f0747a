//! Range capability probing for anvil-dl
//!
//! Issues the initial HEAD exchange that decides whether a download can be
//! split into parallel ranged requests.

use log::info;
use reqwest::Client;

use crate::core::error::{Error, Result};

/// Sentinel length used when the server reports no usable Content-Length;
/// keeps downstream size display code non-degenerate.
pub const UNKNOWN_LENGTH: u64 = 1;

/// What the probe learned about the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Content length reported by the server, or [`UNKNOWN_LENGTH`]
    pub content_length: u64,

    /// Whether `content_length` came from a parsable Content-Length header
    pub length_known: bool,

    /// Whether the server advertises `Accept-Ranges: bytes`
    pub accepts_ranges: bool,
}

/// Probe the resource with a HEAD request.
///
/// Transport failures and non-success statuses are fatal for the attempt;
/// missing range support or length metadata merely degrades the download to
/// a single connection.
pub async fn probe(client: &Client, url: &str) -> Result<ResourceInfo> {
    let response = client.head(url).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(Error::HttpError(format!("probe of {url} failed: {status}")));
    }

    let accepts_ranges = response
        .headers()
        .get("accept-ranges")
        .is_some_and(|v| v.to_str().unwrap_or("") == "bytes");
    if !accepts_ranges {
        info!("server does not advertise range support, falling back to a single connection");
    }

    let (content_length, length_known) = match response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        Some(length) => (length, true),
        None => {
            info!("no usable Content-Length header, falling back to a single connection");
            (UNKNOWN_LENGTH, false)
        }
    };

    Ok(ResourceInfo {
        content_length,
        length_known,
        accepts_ranges,
    })
}

/// Number of parts the fetch will actually use.
///
/// Forced to 1 without range support or a known length; otherwise the
/// requested count, clamped so every part spans at least one byte.
pub fn effective_part_count(requested: u64, info: &ResourceInfo) -> u64 {
    if !info.accepts_ranges || !info.length_known {
        return 1;
    }
    requested.max(1).min(info.content_length.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn info(content_length: u64, length_known: bool, accepts_ranges: bool) -> ResourceInfo {
        ResourceInfo {
            content_length,
            length_known,
            accepts_ranges,
        }
    }

    #[test]
    fn test_effective_part_count_passthrough() {
        assert_eq!(effective_part_count(4, &info(1000, true, true)), 4);
        assert_eq!(effective_part_count(1, &info(1000, true, true)), 1);
    }

    #[test]
    fn test_effective_part_count_forced_single() {
        // No range support wins over any requested count
        assert_eq!(effective_part_count(8, &info(1000, true, false)), 1);
        // Unknown length likewise
        assert_eq!(effective_part_count(8, &info(UNKNOWN_LENGTH, false, true)), 1);
    }

    #[test]
    fn test_effective_part_count_clamped_to_length() {
        assert_eq!(effective_part_count(8, &info(3, true, true)), 3);
        assert_eq!(effective_part_count(0, &info(1000, true, true)), 1);
        assert_eq!(effective_part_count(2, &info(0, true, true)), 1);
    }

    #[tokio::test]
    async fn test_probe_reads_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/go1.22.4.tar.gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-length", "12345")
                    .insert_header("accept-ranges", "bytes"),
            )
            .mount(&server)
            .await;

        let client = Client::new();
        let url = format!("{}/go1.22.4.tar.gz", server.uri());
        let probed = probe(&client, &url).await.unwrap();
        assert_eq!(probed, info(12345, true, true));
    }

    #[tokio::test]
    async fn test_probe_without_range_support() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "500"))
            .mount(&server)
            .await;

        let client = Client::new();
        let probed = probe(&client, &server.uri()).await.unwrap();
        assert!(!probed.accepts_ranges);
        assert_eq!(effective_part_count(4, &probed), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = probe(&client, &server.uri()).await.unwrap_err();
        assert!(matches!(err, Error::HttpError(_)), "unexpected error: {err:?}");
    }
}
