//! The shape of the proving toolkit once it has been acquired.
//!
//! The toolkit itself is provided by a third party; these traits are the
//! contract the loader relies on. Payload types are plain JSON because the
//! circuit inputs, proofs and keys are opaque to the loader.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Name of the proving scheme checked by default after a load.
pub const DEFAULT_SCHEME: &str = "groth16";

/// A loaded proving toolkit handle.
pub trait ProvingToolkit: Send + Sync {
    /// Version string reported by the toolkit, if it exposes one.
    fn version(&self) -> Option<String> {
        None
    }

    /// Look up a proving scheme by name (e.g. `"groth16"`).
    fn scheme(&self, name: &str) -> Option<Arc<dyn ProvingScheme>>;
}

/// A single proving scheme exposed by the toolkit.
#[async_trait]
pub trait ProvingScheme: Send + Sync {
    /// Compute the witness and a proof in one step.
    async fn full_prove(&self, input: &Value, wasm_path: &str, zkey_path: &str) -> Result<Value>;

    /// Produce a proof from a precomputed witness.
    async fn prove(&self, zkey_path: &str, witness: &Value) -> Result<Value>;

    /// Verify a proof against a verification key and public signals.
    async fn verify(&self, verification_key: &Value, public_signals: &Value, proof: &Value)
        -> Result<bool>;
}

impl std::fmt::Debug for dyn ProvingToolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvingToolkit")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
