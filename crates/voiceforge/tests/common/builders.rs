//! Builders for test configurations, submissions and services.

#![allow(dead_code)]

use std::sync::Arc;

use voiceforge::config::{CancelMode, PipelineConfig};
use voiceforge::history::HistoryStore;
use voiceforge::job::{ExecutionPolicy, VoiceRef};
use voiceforge::service::{BatchSubmission, GenerationService, SubmittedItem};

use super::gateway::FakeGateway;
use super::sink::CountingSink;

/// Builder for creating `PipelineConfig` instances.
pub struct ConfigBuilder {
    config: PipelineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    pub fn item_timeout_secs(mut self, secs: u64) -> Self {
        self.config.item_timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn cancel_mode(mut self, mode: CancelMode) -> Self {
        self.config.cancel_mode = mode;
        self
    }

    pub fn script_max_bytes(mut self, bytes: u64) -> Self {
        self.config.limits.script_max_bytes = bytes;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// `item1.txt`, `item2.txt`, ... with distinct text.
pub fn scripts(n: usize) -> Vec<SubmittedItem> {
    (1..=n)
        .map(|i| SubmittedItem::script(format!("item{}.txt", i), format!("This is script number {}.", i)))
        .collect()
}

pub fn batch(n: usize, policy: ExecutionPolicy) -> BatchSubmission {
    BatchSubmission::batch(scripts(n), VoiceRef::new("narrator"), policy)
}

/// A service wired to `gateway`, an in-memory history and a counting sink.
pub struct TestService {
    pub service: GenerationService,
    pub gateway: Arc<FakeGateway>,
    pub sink: Arc<CountingSink>,
}

impl TestService {
    pub fn new(gateway: FakeGateway, config: PipelineConfig) -> Self {
        let history = Arc::new(HistoryStore::in_memory().expect("in-memory history"));
        Self::with_history(gateway, config, history)
    }

    pub fn with_history(
        gateway: FakeGateway,
        config: PipelineConfig,
        history: Arc<HistoryStore>,
    ) -> Self {
        let gateway = gateway.into_arc();
        let sink = Arc::new(CountingSink::new());
        let service = GenerationService::new(config, gateway.clone(), history, sink.clone())
            .expect("valid config");
        Self {
            service,
            gateway,
            sink,
        }
    }
}
