//! The registry slot where an acquired toolkit becomes visible.

use std::sync::{Arc, RwLock};

use crate::capability::ProvingToolkit;

/// A well-known shared location holding the toolkit handle once loaded.
///
/// The hosting environment populates it as a side effect of a successful
/// injection; the coordinator reads it to detect presence and clears it on
/// reset.
pub trait RegistrySlot: Send + Sync {
    fn get(&self) -> Option<Arc<dyn ProvingToolkit>>;

    fn set(&self, toolkit: Arc<dyn ProvingToolkit>);

    /// Empty the slot. Returns whether anything was removed.
    fn clear(&self) -> bool;

    fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

/// In-process registry slot guarded by a `RwLock`.
#[derive(Default)]
pub struct SharedSlot {
    inner: RwLock<Option<Arc<dyn ProvingToolkit>>>,
}

impl SharedSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrySlot for SharedSlot {
    fn get(&self) -> Option<Arc<dyn ProvingToolkit>> {
        // A poisoned lock still holds a valid Option; keep serving it.
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, toolkit: Arc<dyn ProvingToolkit>) {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(toolkit);
    }

    fn clear(&self) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        guard.take().is_some()
    }

    fn is_present(&self) -> bool {
        match self.inner.read() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}
