//! spinview: serve RTT fixtures and the latency visualizer page

mod cli;
mod logging;

use anyhow::Context;
use clap::Parser;
use spinview_core::Server;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    logging::init(&args.log)?;

    let config = args.server_config();
    let fixtures = args.fixtures();
    tracing::info!(variant = ?args.variant, root = %config.root.display(), "loaded fixtures");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        let server = Server::bind(&config, &fixtures)
            .await
            .with_context(|| format!("failed to start on {}:{}", config.hostname, config.port))?;
        server.run().await?;
        Ok::<(), anyhow::Error>(())
    })
}
