//! Shared fakes for the integration tests: a scripted host environment and
//! an in-memory proving toolkit.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use zkloader::{
    AcquisitionCoordinator, HostEnvironment, LoaderConfig, ProvingScheme, ProvingToolkit,
    RegistrySlot, SharedSlot, Source,
};

/// Install a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ─────────────────────── toolkit ───────────────────────

pub struct FakeScheme;

#[async_trait]
impl ProvingScheme for FakeScheme {
    async fn full_prove(&self, input: &Value, _wasm: &str, _zkey: &str) -> anyhow::Result<Value> {
        Ok(json!({ "proof": "π", "publicSignals": input }))
    }

    async fn prove(&self, _zkey: &str, witness: &Value) -> anyhow::Result<Value> {
        Ok(json!({ "proof": "π", "witness": witness }))
    }

    async fn verify(&self, _vkey: &Value, _signals: &Value, proof: &Value) -> anyhow::Result<bool> {
        Ok(proof["proof"] == "π")
    }
}

pub struct FakeToolkit {
    pub version: Option<String>,
    pub schemes: Vec<&'static str>,
    pub panic_on_lookup: bool,
}

impl FakeToolkit {
    pub fn groth16(version: &str) -> Arc<dyn ProvingToolkit> {
        Arc::new(Self {
            version: Some(version.to_string()),
            schemes: vec!["groth16"],
            panic_on_lookup: false,
        })
    }

    pub fn without_schemes() -> Arc<dyn ProvingToolkit> {
        Arc::new(Self {
            version: None,
            schemes: Vec::new(),
            panic_on_lookup: false,
        })
    }

    pub fn panicking() -> Arc<dyn ProvingToolkit> {
        Arc::new(Self {
            version: None,
            schemes: vec!["groth16"],
            panic_on_lookup: true,
        })
    }
}

impl ProvingToolkit for FakeToolkit {
    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn scheme(&self, name: &str) -> Option<Arc<dyn ProvingScheme>> {
        if self.panic_on_lookup {
            panic!("toolkit blew up");
        }
        if self.schemes.iter().any(|s| *s == name) {
            Some(Arc::new(FakeScheme))
        } else {
            None
        }
    }
}

// ─────────────────────── environment ───────────────────────

/// What one injection from a given source does.
#[derive(Clone)]
pub enum Step {
    /// Register the toolkit and signal completion.
    Register(Arc<dyn ProvingToolkit>),
    /// Signal an error.
    Fail(&'static str),
    /// Signal completion without registering anything.
    CompleteEmpty,
    /// Never signal anything.
    Hang,
}

/// Host environment driven by a per-source script.
///
/// Each source has a queue of steps; the last step repeats forever.
pub struct ScriptedEnvironment {
    slot: Arc<SharedSlot>,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    latency: Duration,
    calls: Mutex<Vec<(String, Instant)>>,
    removals: AtomicUsize,
}

impl ScriptedEnvironment {
    pub fn new(slot: Arc<SharedSlot>) -> Self {
        Self {
            slot,
            scripts: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            removals: AtomicUsize::new(0),
        }
    }

    /// Delay before any step signals.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn on(self, url: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn injection_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Step::Fail("empty script")),
            None => Step::Fail("no script for source"),
        }
    }
}

#[async_trait]
impl HostEnvironment for ScriptedEnvironment {
    async fn inject(&self, source: &Source) -> anyhow::Result<()> {
        let url = source.to_string();
        self.calls.lock().unwrap().push((url.clone(), Instant::now()));
        let step = self.next_step(&url);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match step {
            Step::Register(toolkit) => {
                self.slot.set(toolkit);
                Ok(())
            }
            Step::Fail(msg) => Err(anyhow::anyhow!(msg)),
            Step::CompleteEmpty => Ok(()),
            Step::Hang => futures::future::pending().await,
        }
    }

    async fn remove_artifacts(&self) {
        self.removals.fetch_add(1, Ordering::SeqCst);
    }
}

// ─────────────────────── wiring ───────────────────────

pub const SRC_A: &str = "https://a.example/prover.js";
pub const SRC_B: &str = "https://b.example/prover.js";
pub const SRC_C: &str = "https://c.example/prover.js";

/// Config over `sources` with the stock timings (10s timeout, 100ms settle, 1s backoff).
pub fn config(sources: &[&str]) -> LoaderConfig {
    LoaderConfig::with_sources(sources.iter().copied()).unwrap()
}

pub struct Harness {
    pub coordinator: AcquisitionCoordinator,
    pub env: Arc<ScriptedEnvironment>,
    pub slot: Arc<SharedSlot>,
}

/// Build a coordinator over a scripted environment.
pub fn harness<F>(sources: &[&str], script: F) -> Harness
where
    F: FnOnce(ScriptedEnvironment) -> ScriptedEnvironment,
{
    init_tracing();
    let slot = Arc::new(SharedSlot::new());
    let env = Arc::new(script(ScriptedEnvironment::new(Arc::clone(&slot))));
    let coordinator = AcquisitionCoordinator::new(
        config(sources),
        Arc::clone(&env) as Arc<dyn HostEnvironment>,
        Arc::clone(&slot) as Arc<dyn RegistrySlot>,
    );
    Harness {
        coordinator,
        env,
        slot,
    }
}
