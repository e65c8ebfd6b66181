//! Nature Remo Exporter Library
//!
//! This library polls the Nature Remo cloud API through a short-lived per-resource
//! cache and exposes device sensor readings and smart meter energy readings as
//! Prometheus metrics.

pub mod auth_http;
pub mod cache_entry;
pub mod config;
pub mod exporter;
pub mod meta;
pub mod metrics;
pub mod remo_client;
pub mod server;
pub mod smart_meter;
pub mod types;

// Re-export commonly used types for easier access
pub use auth_http::{AuthHttpClient, AuthHttpDoer, RawResponse};
pub use config::Config;
pub use exporter::Exporter;
pub use remo_client::{FetchError, RemoClient, ResourceKind};
pub use smart_meter::{EnergyReading, SmartMeterError};
pub use types::{Appliance, Device, FetchResult, RateLimitMeta};
