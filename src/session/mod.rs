use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::env::DeviceInfo;
use crate::geo::GeoLocation;

mod client;
mod http;
pub mod stats;

pub use client::SessionClient;
pub use http::HttpBackend;
pub use stats::{DayStats, StatsQuery, StatsReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of heartbeat and end calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

/// The remote metrics service. Every call is a single attempt.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn start(&self, req: &StartRequest) -> Result<StartResponse>;
    async fn heartbeat(&self, session: &SessionRef) -> Result<()>;
    /// Must tolerate the caller going away mid-flight.
    async fn end(&self, session: &SessionRef) -> Result<()>;
    async fn stats(&self, query: &StatsQuery) -> Result<StatsReport>;
}
