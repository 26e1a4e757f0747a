//! Download partitioning for anvil-dl
//!
//! Splits a probed resource into contiguous byte ranges and assigns each
//! range its on-disk part file.

use std::path::{Path, PathBuf};

use url::Url;

use crate::core::error::{Error, Result};

/// One contiguous byte range of the resource, owned by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSpec {
    /// Zero-based part index; reassembly order is numeric on this field
    pub index: u64,

    /// First byte offset of the range
    pub range_from: u64,

    /// Inclusive upper bound, except for the last part where it equals the
    /// total length and marks an open-ended range request
    pub range_to: u64,

    /// Private file this part streams into
    pub path: PathBuf,
}

impl PartSpec {
    /// Range header value for this part.
    ///
    /// The last part asks for `bytes=<from>-` so any remainder from the
    /// planner's integer division is still fetched to end-of-stream.
    pub fn range_header(&self, total_length: u64) -> String {
        if self.range_to == total_length {
            format!("bytes={}-", self.range_from)
        } else {
            format!("bytes={}-{}", self.range_from, self.range_to)
        }
    }
}

/// Partitioning of one download attempt, built once and never mutated
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    /// Probed content length (or the unknown-length sentinel)
    pub total_length: u64,

    /// Artifact file name, derived from the URL
    pub file_name: String,

    /// Final artifact path inside the staging directory
    pub dest_path: PathBuf,

    /// Ordered part specs partitioning `[0, total_length)`
    pub parts: Vec<PartSpec>,
}

/// Extract the artifact file name from the download URL
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed =
        Url::parse(url).map_err(|e| Error::InvalidInput(format!("invalid url {url}: {e}")))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    if name.is_empty() {
        return Err(Error::InvalidInput(format!(
            "cannot derive a file name from {url}"
        )));
    }
    Ok(name.to_string())
}

/// Partition the resource into `part_count` contiguous ranges.
///
/// For every part but the last, `to = (len / parts) * (index + 1) - 1`; the
/// last part's upper bound is the raw length, which downstream code reads as
/// "fetch to end-of-stream". `part_count` must already be clamped by the
/// probe so each part spans at least one byte.
pub fn build_plan(
    url: &str,
    staging_dir: &Path,
    content_length: u64,
    part_count: u64,
) -> Result<DownloadPlan> {
    let file_name = file_name_from_url(url)?;
    let dest_path = staging_dir.join(&file_name);

    let chunk = content_length / part_count;
    let mut parts = Vec::with_capacity(part_count as usize);
    for index in 0..part_count {
        let range_from = chunk * index;
        let range_to = if index < part_count - 1 {
            chunk * (index + 1) - 1
        } else {
            content_length
        };
        let path = staging_dir.join(format!("{file_name}.part{index}"));
        parts.push(PartSpec {
            index,
            range_from,
            range_to,
            path,
        });
    }

    Ok(DownloadPlan {
        total_length: content_length,
        file_name,
        dest_path,
        parts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.org/dl/go1.22.4.tar.gz";

    fn plan(length: u64, parts: u64) -> DownloadPlan {
        build_plan(URL, Path::new("/tmp/staging"), length, parts).unwrap()
    }

    #[test]
    fn test_ranges_partition_the_resource() {
        for length in [1u64, 2, 17, 999, 1000, 1 << 20] {
            for requested in [1u64, 2, 3, 7, 8] {
                let count = requested.min(length);
                let built = plan(length, count);
                assert_eq!(built.parts.len(), count as usize);
                assert_eq!(built.parts[0].range_from, 0);
                for window in built.parts.windows(2) {
                    // Contiguous: each part starts right after its predecessor
                    assert_eq!(window[1].range_from, window[0].range_to + 1);
                }
                let last = built.parts.last().unwrap();
                assert_eq!(last.range_to, length);
                assert!(last.range_from < length);
            }
        }
    }

    #[test]
    fn test_documented_three_part_example() {
        // 1000 / 3 = 333; the last part's bound is the raw length
        let built = plan(1000, 3);
        let ranges: Vec<(u64, u64)> = built
            .parts
            .iter()
            .map(|p| (p.range_from, p.range_to))
            .collect();
        assert_eq!(ranges, vec![(0, 332), (333, 665), (666, 1000)]);
    }

    #[test]
    fn test_range_headers() {
        let built = plan(1000, 3);
        assert_eq!(built.parts[0].range_header(1000), "bytes=0-332");
        assert_eq!(built.parts[1].range_header(1000), "bytes=333-665");
        assert_eq!(built.parts[2].range_header(1000), "bytes=666-");
    }

    #[test]
    fn test_single_part_is_open_ended() {
        let built = plan(1000, 1);
        assert_eq!(built.parts.len(), 1);
        assert_eq!(built.parts[0].range_header(1000), "bytes=0-");
    }

    #[test]
    fn test_part_file_naming() {
        let built = plan(1000, 3);
        assert_eq!(built.file_name, "go1.22.4.tar.gz");
        assert_eq!(built.dest_path, Path::new("/tmp/staging/go1.22.4.tar.gz"));
        assert_eq!(
            built.parts[2].path,
            Path::new("/tmp/staging/go1.22.4.tar.gz.part2")
        );
    }

    #[test]
    fn test_file_name_ignores_query() {
        assert_eq!(
            file_name_from_url("https://example.org/dl/go1.22.4.tar.gz?token=abc").unwrap(),
            "go1.22.4.tar.gz"
        );
    }

    #[test]
    fn test_file_name_requires_path_segment() {
        assert!(file_name_from_url("https://example.org/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }
}
