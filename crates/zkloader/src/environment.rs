//! Hosting environment abstraction.
//!
//! The environment owns the injection primitive: given a source it tries to
//! make the toolkit available in the registry slot, and reports completion
//! (`Ok`) or error (`Err`) asynchronously. It also remembers what it injected
//! so a reload can remove those artifacts.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Source;

/// An environment capable of injecting the toolkit from a source.
#[async_trait]
pub trait HostEnvironment: Send + Sync {
    /// Whether the environment has the primitives needed to load anything.
    ///
    /// `Err` carries a human-readable reason.
    fn check_available(&self) -> Result<(), String> {
        Ok(())
    }

    /// Inject the toolkit from `source`.
    ///
    /// Resolves `Ok(())` on the completion signal and `Err` on the error
    /// signal. Completion does not imply the slot was populated; the caller
    /// checks that after a settle delay. The future may be dropped at any
    /// await point when the per-source timeout fires.
    async fn inject(&self, source: &Source) -> Result<()>;

    /// Remove every artifact left behind by earlier injections.
    async fn remove_artifacts(&self);
}

/// An environment with no injection primitive.
///
/// Used when the loader runs somewhere the toolkit cannot be delivered
/// (headless tooling, tests of the unavailable path). Every load fails with
/// `EnvironmentUnavailable`.
pub struct NoopEnvironment;

#[async_trait]
impl HostEnvironment for NoopEnvironment {
    fn check_available(&self) -> Result<(), String> {
        Err("no injection primitive in this environment".to_string())
    }

    async fn inject(&self, _source: &Source) -> Result<()> {
        Err(anyhow::anyhow!("Injection not available in this environment"))
    }

    async fn remove_artifacts(&self) {}
}
