//! Callout agent: the runtime around the escalation core.
//!
//! Provider and directory HTTP clients, the row store, and the per-tick
//! scheduler that drives [`coordination::EscalationEngine`] over it.

pub mod config;
pub mod directory;
pub mod ingest;
pub mod inspector;
pub mod lock;
pub mod provider;
pub mod resolver;
pub mod scheduler;
pub mod setup;
pub mod store;

pub use config::{AgentConfig, ConfigError};
pub use directory::{AssignmentsDirectory, Directory, DirectoryEndpoint, DirectoryError};
pub use ingest::{IngestOutcome, Ingestor, WebhookEvent};
pub use inspector::CallInspector;
pub use lock::TickLock;
pub use provider::{CallDetails, CallRequest, ProviderError, RetellClient, VoiceProvider};
pub use resolver::ContactResolver;
pub use scheduler::{CallSettings, Scheduler, TickReport};
pub use store::{JsonSheet, MemorySheet, RowCodec, RowStore, StoreError};
