//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;

use headless_bridge::config::BridgeConfig;
use headless_bridge::host::demo::{DemoDesign, DesignModule};
use headless_bridge::net::{self, ListenerError};
use headless_bridge::{AffineExecutor, Bridge, HttpServer, ListenerControl, Shutdown};
use serde_json::Value;

/// A bridge serving on an ephemeral loopback port with its own affine thread.
pub struct TestBridge {
    pub addr: SocketAddr,
    pub bridge: Bridge,
    pub control: ListenerControl,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
    host: Option<JoinHandle<()>>,
    server: tokio::task::JoinHandle<Result<(), ListenerError>>,
}

impl TestBridge {
    /// Demo host with the design module loaded.
    pub async fn start() -> Self {
        Self::start_with(BridgeConfig::default(), |executor| {
            executor
                .load_module(Box::new(DesignModule))
                .expect("design module loads");
        })
        .await
    }

    /// Demo host; `setup` runs on the affine thread before the loop starts.
    pub async fn start_with<F>(mut config: BridgeConfig, setup: F) -> Self
    where
        F: FnOnce(&mut AffineExecutor) + Send + 'static,
    {
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.listener.rebind_base_delay_ms = 10;
        config.listener.rebind_max_delay_ms = 200;
        config.listener.rebind_attempts = 10;

        let listener = net::bind(&config.listener).await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");

        let (bridge, builder) = Bridge::new(&config.affinity);
        let shutdown = Shutdown::new();
        let server = HttpServer::new(bridge.clone(), &config);
        let control = server.control();
        let server = tokio::spawn(server.run(listener, shutdown.subscribe()));

        let host = builder
            .listener(control.clone())
            .spawn(move |builder| {
                let mut executor = builder.build(DemoDesign::default());
                setup(&mut executor);
                executor
            })
            .expect("spawn affine thread");

        // Non-pooled client so a listener restart never meets a stale connection.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("client");

        Self {
            addr,
            bridge,
            control,
            shutdown,
            client,
            host: Some(host),
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let res = self.client.get(self.url(path)).send().await.expect("request");
        let status = res.status().as_u16();
        (status, res.json().await.expect("json body"))
    }

    pub async fn post(&self, path: &str, body: &Value) -> (u16, Value) {
        let res = self.client.post(self.url(path)).json(body).send().await.expect("request");
        let status = res.status().as_u16();
        (status, res.json().await.expect("json body"))
    }

    /// Stop the listener and the affine thread, waiting for both.
    pub async fn stop(mut self) {
        self.shutdown.trigger();
        self.bridge.stop_host();
        if let Some(host) = self.host.take() {
            tokio::task::spawn_blocking(move || host.join())
                .await
                .expect("join task")
                .expect("affine thread exits cleanly");
        }
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.bridge.stop_host();
        self.server.abort();
    }
}
