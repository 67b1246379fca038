//! HTTP-backed host environment.
//!
//! Fetches the toolkit bundle from a source with reqwest, hands the payload
//! to a [`ToolkitFactory`] that turns it into a live handle, and registers
//! that handle in the slot. A non-success status, an empty body, a transport
//! error or a factory failure is reported as the injection's error signal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::capability::ProvingToolkit;
use crate::environment::HostEnvironment;
use crate::registry::RegistrySlot;
use crate::types::Source;

const USER_AGENT: &str = concat!("zkloader/", env!("CARGO_PKG_VERSION"));

/// Turns a fetched bundle into a toolkit handle.
pub trait ToolkitFactory: Send + Sync {
    fn instantiate(&self, source: &Source, payload: &[u8]) -> Result<Arc<dyn ProvingToolkit>>;
}

/// Record of one bundle fetched and registered by the environment.
#[derive(Debug, Clone)]
pub struct InjectedArtifact {
    pub url: String,
    pub final_url: String,
    pub bytes: usize,
    pub injected_at: DateTime<Utc>,
}

/// Host environment that fetches bundles over HTTP.
pub struct HttpEnvironment {
    client: reqwest::Client,
    factory: Arc<dyn ToolkitFactory>,
    slot: Arc<dyn RegistrySlot>,
    artifacts: Mutex<Vec<InjectedArtifact>>,
}

impl HttpEnvironment {
    /// Create an environment whose individual requests give up after `request_timeout`.
    ///
    /// The coordinator's per-source timeout still applies on top of this.
    pub fn new(
        factory: Arc<dyn ToolkitFactory>,
        slot: Arc<dyn RegistrySlot>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self::with_client(client, factory, slot))
    }

    pub fn with_client(
        client: reqwest::Client,
        factory: Arc<dyn ToolkitFactory>,
        slot: Arc<dyn RegistrySlot>,
    ) -> Self {
        Self {
            client,
            factory,
            slot,
            artifacts: Mutex::new(Vec::new()),
        }
    }

    /// Artifacts injected since the last `remove_artifacts`.
    pub fn artifacts(&self) -> Vec<InjectedArtifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl HostEnvironment for HttpEnvironment {
    async fn inject(&self, source: &Source) -> Result<()> {
        let resp = self
            .client
            .get(source.url().clone())
            .send()
            .await
            .with_context(|| format!("request to {source} failed"))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            bail!("{source} returned HTTP {}", status.as_u16());
        }

        let payload = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read body from {source}"))?;
        if payload.is_empty() {
            bail!("{source} returned an empty body");
        }

        tracing::debug!("Fetched {} bytes from {final_url}", payload.len());

        let toolkit = self
            .factory
            .instantiate(source, &payload)
            .with_context(|| format!("failed to instantiate toolkit from {source}"))?;

        self.artifacts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(InjectedArtifact {
                url: source.to_string(),
                final_url,
                bytes: payload.len(),
                injected_at: Utc::now(),
            });
        self.slot.set(toolkit);
        Ok(())
    }

    async fn remove_artifacts(&self) {
        let removed = {
            let mut artifacts = self.artifacts.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *artifacts)
        };
        if !removed.is_empty() {
            tracing::debug!("Removed {} injected toolkit artifact(s)", removed.len());
        }
    }
}
