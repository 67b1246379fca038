//! zkloader: coalesced, fallback-ordered acquisition of a remotely delivered
//! zero-knowledge proving toolkit.

pub mod capability;
pub mod config;
pub mod coordinator;
pub mod environment;
pub mod events;
pub mod fallback;
pub mod http;
pub mod registry;
pub mod retry;
pub mod types;

pub use capability::{ProvingScheme, ProvingToolkit, DEFAULT_SCHEME};
pub use config::{ConfigError, LoaderConfig};
pub use coordinator::AcquisitionCoordinator;
pub use environment::{HostEnvironment, NoopEnvironment};
pub use events::{EventBus, LoaderEvent};
pub use http::{HttpEnvironment, InjectedArtifact, ToolkitFactory};
pub use registry::{RegistrySlot, SharedSlot};
pub use types::*;
