//! # Anvil-dl CLI
//!
//! Command-line interface for the anvil-dl library.
//! Fetches a toolchain release archive with parallel ranged requests and a
//! progress bar, and turns Ctrl-C into a graceful, cleaned-up interruption.

use std::path::PathBuf;

use anvil_dl::{
    default_part_count, CancellationToken, DownloadOptions, DownloadRequest, Downloader, Outcome,
    Result,
};
use clap::Parser;
use indicatif::HumanBytes;
use log::error;

mod cli;

/// Command-line interface for anvil-dl
#[derive(Parser)]
#[command(name = "anvil-dl")]
#[command(about = "Parallel multi-part HTTP downloader for toolchain archives")]
#[command(long_about = "Downloads a toolchain release archive efficiently:
  anvil-dl https://example.org/go1.22.4.tar.gz             # fetch with one connection per CPU
  anvil-dl https://example.org/go1.22.4.tar.gz -p 4        # fetch with 4 ranged connections
  anvil-dl https://example.org/go1.22.4.tar.gz -s ~/.anvil/downloads

Interruption:
  Ctrl-C stops all connections gracefully and removes partial state;
  the next attempt starts from scratch.

Staging Directory Conflicts:
  A completed artifact in the staging directory is reused as-is
  --force                          # clear previous artifact and part files first")]
#[command(version)]
struct Cli {
    /// URL of the archive to download
    url: String,

    /// Number of parallel connections (forced to 1 if the server lacks range support)
    #[arg(short, long, default_value_t = default_part_count())]
    parts: u64,

    /// Staging directory for part files and the final artifact
    #[arg(short, long, default_value = ".")]
    staging_dir: PathBuf,

    /// Skip TLS certificate verification (self-signed mirrors)
    #[arg(long)]
    insecure: bool,

    /// Clear a previous attempt's artifact and part files before downloading
    #[arg(short, long)]
    force: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stderr);
    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let request = DownloadRequest {
        url: cli.url.clone(),
        parts: cli.parts,
        skip_tls_verify: cli.insecure,
        force_clean: cli.force,
    };

    // Feed the library's aggregate progress into the bar; the real total
    // replaces the placeholder length once probing is done
    let progress_manager = cli::ProgressManager::new(0, &format!("🌐 Downloading {}", cli.url));
    let options = DownloadOptions {
        staging_dir: cli.staging_dir.clone(),
        progress: Some(std::sync::Arc::new({
            let pb = progress_manager.pb.clone();
            move |downloaded, total| {
                if pb.length().unwrap_or(0) != total {
                    pb.set_length(total);
                }
                pb.set_position(downloaded);
            }
        })),
        ..Default::default()
    };

    // Ctrl-C is the external interrupt: cancel the token and let the
    // downloader stop, join and clean up its workers
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let downloader = Downloader::with_options(request, options)?;
    match downloader.run(shutdown).await? {
        Outcome::Completed(path) => {
            progress_manager.pb.finish_with_message("✅ Download completed!");
            let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            eprintln!("💾 Saved to: {} ({})", path.display(), HumanBytes(size));
        }
        Outcome::Interrupted => {
            progress_manager.pb.abandon();
            eprintln!("🛑 Download interrupted, partial state cleaned up");
        }
    }

    Ok(())
}
