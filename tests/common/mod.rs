//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use lehrbot_core::{
    config::ConfigManager,
    error::{Error, Result},
    runtime::{ChatEngine, ChatMessage, FinishReason, Generation, GenerationParams, ModelManager},
    server::{self, state::ServerState},
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Scripted engine that answers every conversation with a fixed reply
pub struct MockEngine {
    reply: String,
    tokens: Option<usize>,
    fail: bool,
    delay: Option<Duration>,
    loaded: AtomicBool,
    pub calls: Mutex<Vec<(Vec<ChatMessage>, GenerationParams)>>,
}

impl MockEngine {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            tokens: None,
            fail: false,
            delay: None,
            loaded: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tokens(mut self, tokens: usize) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Every generation sleeps for `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every generation fails with a model error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChatEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self) -> Result<()> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn tokenizer_loaded(&self) -> bool {
        self.is_loaded()
    }

    fn device(&self) -> String {
        "cpu".to_string()
    }

    fn memory_bytes(&self) -> u64 {
        0
    }

    async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<Generation> {
        self.calls.lock().push((messages.to_vec(), params.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::Model("forward pass failed".to_string()));
        }
        Ok(Generation {
            text: self.reply.clone(),
            tokens_generated: self.tokens,
            finish_reason: FinishReason::EndOfSequence,
        })
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub manager: Arc<ModelManager>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Serve the API on an ephemeral port; `load` controls whether the engine
/// is loaded before the first request
pub async fn start_test_server(engine: Arc<dyn ChatEngine>, config: ConfigManager, load: bool) -> TestServer {
    let manager = Arc::new(ModelManager::new(
        engine,
        config.model_config().clone(),
        config.system_prompt(),
    ));
    if load {
        manager.load_model().await.expect("mock engine loads");
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let state = ServerState::new(Arc::clone(&manager), Arc::new(config));

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = rx.await;
        };
        if let Err(e) = server::serve(listener, state, shutdown).await {
            eprintln!("Test server failed: {}", e);
        }
    });

    TestServer {
        addr,
        manager,
        shutdown: Some(tx),
        handle,
    }
}
