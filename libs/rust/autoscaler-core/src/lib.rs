//! Shared core for the cluster autoscaler: data model, gateway clients,
//! the sliding-window sample store, sampler, aggregator and scaling policy.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod resource_manager;
pub mod sample_store;
pub mod sampler;
pub mod telemetry;
pub mod types;

pub use aggregator::aggregate_app;
pub use config::{load_config, AppConfig};
pub use error::GatewayError;
pub use orchestrator::{MarathonGateway, OrchestratorGateway};
pub use policy::{evaluate_app, reset_sample_counts, ScalingAction};
pub use resource_manager::{MesosGateway, ResourceManagerGateway};
pub use sample_store::SampleRing;
pub use sampler::sample_tick;
pub use telemetry::{init_tracing, start_health_server};
pub use types::{AppDefinition, AppId, AppSnapshot, TaskHost, TaskId, TaskRecord};

/// Number of ticks retained in the sliding window, and the cap on each
/// task's running-average sample count. Spec.md §9: these two must stay
/// equal or warm-up semantics break.
pub const WINDOW_SIZE: usize = 4;

/// Control-loop tick period.
pub const POLL_INTERVAL_SECS: u64 = 5;
