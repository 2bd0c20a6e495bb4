//! Headless bridge demo binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌──────────────────────── tokio runtime ───────────────────────┐
//!     ─────────────────────────┼─▶ net listener ─▶ http server ─▶ Bridge::submit ──┐          │
//!                              │                                  (ticket, wait)  │          │
//!     Client Response          │                                                   │ notify   │
//!     ◀────────────────────────┼── response envelope ◀── outcome ◀────────────┐    │          │
//!                              └────────────────────────────────────────────────┼────┼──────────┘
//!                                                                               │    ▼
//!                              ┌────────────────────── main (affine) thread ───────────────────┐
//!                              │   AffineExecutor::run: routes, scripts, reload, DemoDesign    │
//!                              └───────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use headless_bridge::config::{load_config, BridgeConfig};
use headless_bridge::host::demo::{DemoDesign, DesignModule};
use headless_bridge::observability::{logging, metrics};
use headless_bridge::{net, Bridge, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "headless-bridge")]
#[command(about = "Serve a single-threaded host application over local HTTP", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "headless-bridge starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bridge-http")
        .build()?;

    let listener = runtime.block_on(net::bind(&config.listener))?;

    if config.observability.metrics_enabled {
        let _guard = runtime.enter();
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (bridge, builder) = Bridge::new(&config.affinity);
    let shutdown = Shutdown::new();

    let server = HttpServer::new(bridge.clone(), &config);
    let control = server.control();
    let server_task = runtime.spawn(server.run(listener, shutdown.subscribe()));

    {
        let shutdown = shutdown.clone();
        let bridge = bridge.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
                bridge.stop_host();
            }
        });
    }

    // The main thread owns the host model from here on.
    let mut executor = builder.listener(control).build(DemoDesign::default());
    executor.load_module(Box::new(DesignModule))?;
    executor.run();
    // Fails tickets still queued before the listener drains.
    drop(executor);

    shutdown.trigger();
    match runtime.block_on(server_task) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
