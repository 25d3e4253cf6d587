use anyhow::Result;
use corvid_uci::UciEngine;
use tracing::info;

fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    info!(version = env!("CARGO_PKG_VERSION"), "corvid starting");
    UciEngine::new().run()?;
    Ok(())
}
