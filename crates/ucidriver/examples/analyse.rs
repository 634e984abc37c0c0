//! Analyse the starting position with a UCI engine
//!
//! Usage:
//! ```bash
//! RUST_LOG=ucidriver=debug cargo run -p ucidriver --example analyse -- /usr/local/bin/stockfish [multipv]
//! ```

use anyhow::{Context, bail};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use ucidriver::Engine;

const LINE_TIMEOUT: Duration = Duration::from_secs(30);

async fn wait_for(engine: &mut Engine, prefix: &str) -> anyhow::Result<()> {
    loop {
        let line = tokio::time::timeout(LINE_TIMEOUT, engine.recv_line())
            .await
            .with_context(|| format!("timed out waiting for '{prefix}'"))?;
        match line {
            Some(line) => {
                println!("{line}");
                if line.starts_with(prefix) {
                    return Ok(());
                }
            }
            None => bail!("engine output ended before '{prefix}'"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().context("usage: analyse <engine-path> [multipv]")?;
    let multipv: i64 = match args.next() {
        Some(n) => n.parse().context("multipv must be an integer")?,
        None => 1,
    };

    let mut engine = Engine::new(path)?;
    engine.run().await?;
    wait_for(&mut engine, "uciok").await?;

    engine.set_option("multipv", multipv).await?;
    engine.set_option("depth", 12).await?;

    engine.send_command("isready").await;
    wait_for(&mut engine, "readyok").await?;

    engine.send_command("position startpos").await;
    engine
        .send_command(format!("go depth {}", engine.options().depth))
        .await;
    wait_for(&mut engine, "bestmove").await?;

    engine.close().await?;
    Ok(())
}
