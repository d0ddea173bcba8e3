//! bgcenter CLI tool
//!
//! Command-line interface for removing backgrounds from a directory of
//! product images and centering each subject on a transparent canvas.

#[cfg(feature = "cli")]
use bgcenter::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
