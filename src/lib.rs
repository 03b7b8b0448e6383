pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::DashboardConfig;

pub use crate::core::{
    api::{ApiClient, HttpTransport},
    proxy::{OutboundRequest, ProxyEnvelope, ProxyReply, RequestForwarder},
    sections::SectionStore,
    slice::{ResourceState, ResourceStore},
};
pub use utils::error::{DashboardError, Result};
