//! IMG.LY Denoise CLI Tool
//!
//! Command-line interface for denoising images and applying color filters
//! with the imgly-denoise library.

#[cfg(feature = "cli")]
use imgly_denoise::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
