//! Scripted synthesis gateway.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use voiceforge::gateway::{
    AudioArtifact, ItemProgress, SynthesisError, SynthesisGateway, SynthesisRequest,
};

/// Decrements the in-flight counter even when the call is dropped midway.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fake gateway keyed by item name.
///
/// Every call sleeps for the configured delay (use a paused tokio clock to
/// keep tests fast), reports the configured progress steps, then succeeds
/// unless the item is scripted to fail, hang or panic.
#[derive(Default)]
pub struct FakeGateway {
    delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, u32>,
    hangs: HashSet<String>,
    panics: HashSet<String>,
    progress_steps: Vec<u8>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    attempts: Mutex<HashMap<String, u32>>,
    completed: Mutex<Vec<String>>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay_for(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Every attempt for `name` fails.
    pub fn fail(self, name: &str) -> Self {
        self.fail_times(name, u32::MAX)
    }

    /// The first `times` attempts for `name` fail.
    pub fn fail_times(mut self, name: &str, times: u32) -> Self {
        self.failures.insert(name.to_string(), times);
        self
    }

    /// Calls for `name` never return.
    pub fn hang(mut self, name: &str) -> Self {
        self.hangs.insert(name.to_string());
        self
    }

    /// Calls for `name` panic, as a crashing client library would.
    pub fn panic_on(mut self, name: &str) -> Self {
        self.panics.insert(name.to_string());
        self
    }

    pub fn with_progress(mut self, steps: &[u8]) -> Self {
        self.progress_steps = steps.to_vec();
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn attempts_for(&self, name: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Names of successfully synthesized items, in completion order.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisGateway for FakeGateway {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: &dyn ItemProgress,
    ) -> Result<AudioArtifact, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(request.name.clone()).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        for step in &self.progress_steps {
            progress.report(*step);
            tokio::task::yield_now().await;
        }

        if self.panics.contains(&request.name) {
            panic!("synthesis client crashed on '{}'", request.name);
        }

        if self.hangs.contains(&request.name) {
            std::future::pending::<()>().await;
        }

        let delay = self
            .delays
            .get(&request.name)
            .copied()
            .unwrap_or(self.delay);
        tokio::time::sleep(delay).await;

        if let Some(&failing) = self.failures.get(&request.name) {
            if attempt <= failing {
                return Err(SynthesisError::Gateway(format!(
                    "voice service rejected '{}'",
                    request.name
                )));
            }
        }

        self.completed.lock().unwrap().push(request.name.clone());
        Ok(AudioArtifact {
            download_ref: format!("audio/{}.{}", request.name, request.format.extension()),
            format: request.format,
            size_bytes: Some(request.text.len() as u64 * 100),
            duration_secs: Some(1.0),
        })
    }
}
