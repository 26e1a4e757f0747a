//! Core library modules for anvil-dl
//!
//! This module contains the internal implementation details of the anvil-dl
//! library: probing, partitioning, parallel fetching and reassembly.

pub mod downloader;
pub mod error;
pub mod options;
pub mod plan;
pub mod probe;
pub(crate) mod worker;

// Re-export main types for internal use
pub use downloader::{Downloader, Outcome};
