//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use mailgate::config::MailgateConfig;
use mailgate::dispatch::{DispatchEngine, EmailPayload, IdempotencyKey};
use mailgate::http::HttpServer;
use mailgate::lifecycle::Shutdown;
use mailgate::providers::{ProviderError, ProviderPort, SendReceipt};

pub fn email() -> EmailPayload {
    EmailPayload {
        to: "user@example.com".into(),
        subject: "Welcome".into(),
        body: "Hello there".into(),
    }
}

pub fn key(raw: &str) -> IdempotencyKey {
    IdempotencyKey::new(raw).unwrap()
}

/// How a scripted provider answers.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    AlwaysOk,
    AlwaysFail,
    /// Fail the first `n` calls, succeed afterwards.
    FailFirst(u32),
}

/// Provider with a fixed script and an invocation counter.
pub struct ScriptedProvider {
    name: String,
    script: Script,
    latency: Duration,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(name: &str, script: Script) -> Arc<Self> {
        Self::with_latency(name, script, Duration::ZERO)
    }

    pub fn with_latency(name: &str, script: Script, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            latency,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderPort for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, _email: &EmailPayload) -> Result<SendReceipt, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let ok = match self.script {
            Script::AlwaysOk => true,
            Script::AlwaysFail => false,
            Script::FailFirst(n) => call >= n,
        };
        if ok {
            Ok(SendReceipt {
                provider: self.name.clone(),
                message_id: format!("{}-{}", self.name, call),
            })
        } else {
            Err(ProviderError::new(&self.name, "scripted failure"))
        }
    }
}

/// Provider that fails its first `fail_first` calls, then parks every later
/// call until the test opens the gate.
pub struct GatedProvider {
    name: String,
    fail_first: u32,
    succeed: bool,
    calls: AtomicU32,
    pub entered: Notify,
    pub gate: Notify,
}

impl GatedProvider {
    pub fn new(name: &str, fail_first: u32, succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_first,
            succeed,
            calls: AtomicU32::new(0),
            entered: Notify::new(),
            gate: Notify::new(),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderPort for GatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, _email: &EmailPayload) -> Result<SendReceipt, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(ProviderError::new(&self.name, "scripted failure"));
        }

        self.entered.notify_one();
        self.gate.notified().await;

        if self.succeed {
            Ok(SendReceipt {
                provider: self.name.clone(),
                message_id: format!("{}-{}", self.name, call),
            })
        } else {
            Err(ProviderError::new(&self.name, "probe failure"))
        }
    }
}

pub fn engine(providers: Vec<Arc<dyn ProviderPort>>, config: &MailgateConfig) -> DispatchEngine {
    DispatchEngine::new(providers, config)
}

/// Start the HTTP API on an ephemeral port.
pub async fn start_server(config: MailgateConfig, engine: DispatchEngine) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, engine);
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
