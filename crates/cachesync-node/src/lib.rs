pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod observability;

pub use bootstrap::{CacheSyncNode, NodeMode, start};
pub use config::NodeConfig;
pub use metrics::{PrometheusMetrics, init_metrics, render_metrics};
pub use observability::init_tracing;
