use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{MetricsBackend, SessionRef, StartRequest, StartResponse, StatsQuery, StatsReport};
use crate::config::Config;
use crate::logging::{obj, v_str, warn, Domain, ProfileScope};

const API_KEY_HEADER: &str = "x-api-key";

pub struct HttpBackend {
    client: Client,
    base: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        if cfg.api_key.is_none() {
            warn(
                Domain::Session,
                "missing_api_key",
                obj(&[("msg", v_str("METRICS_API_KEY not set; requests go out unauthenticated"))]),
            );
        }
        let client = Client::builder().timeout(cfg.request_timeout()).build()?;
        Ok(Self {
            client,
            base: cfg.metrics_base(),
            api_key: cfg.api_key.clone(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = self.authed(req).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        self.authed(req).send().await?.error_for_status()?;
        Ok(())
    }

    pub fn stats_url(&self, query: &StatsQuery) -> Result<url::Url> {
        let params = query.params();
        if params.is_empty() {
            // parse_with_params would leave a dangling '?'
            return Ok(url::Url::parse(&self.url("stats"))?);
        }
        Ok(url::Url::parse_with_params(&self.url("stats"), params)?)
    }
}

#[async_trait]
impl MetricsBackend for HttpBackend {
    async fn start(&self, req: &StartRequest) -> Result<StartResponse> {
        let _scope = ProfileScope::new("session.start");
        self.send_json(self.client.post(self.url("start")).json(req)).await
    }

    async fn heartbeat(&self, session: &SessionRef) -> Result<()> {
        let _scope = ProfileScope::new("session.heartbeat");
        self.send_empty(self.client.post(self.url("heartbeat")).json(session))
            .await
    }

    async fn end(&self, session: &SessionRef) -> Result<()> {
        let _scope = ProfileScope::new("session.end");
        self.send_empty(self.client.post(self.url("end")).json(session))
            .await
    }

    async fn stats(&self, query: &StatsQuery) -> Result<StatsReport> {
        let _scope = ProfileScope::with_context("stats.get", &[("query", v_str(query.label()))]);
        let url = self.stats_url(query)?;
        self.send_json(self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn backend() -> HttpBackend {
        let cfg = Config {
            api_base: "https://metrics.example/v1".to_string(),
            app: "profile".to_string(),
            api_key: Some("k".to_string()),
            ..Config::default()
        };
        HttpBackend::new(&cfg).unwrap()
    }

    #[test]
    fn test_stats_urls() {
        let b = backend();
        assert_eq!(b.base(), "https://metrics.example/v1/profile");
        assert_eq!(
            b.stats_url(&StatsQuery::Today).unwrap().as_str(),
            "https://metrics.example/v1/profile/stats"
        );
        let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(
            b.stats_url(&StatsQuery::Day(day)).unwrap().as_str(),
            "https://metrics.example/v1/profile/stats?day=2025-03-09"
        );
        let to = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let range = StatsQuery::range(day, to).unwrap();
        assert_eq!(
            b.stats_url(&range).unwrap().as_str(),
            "https://metrics.example/v1/profile/stats?from=2025-03-09&to=2025-03-31"
        );
    }

    #[test]
    fn test_start_body_shape() {
        let req = StartRequest {
            location: None,
            device: crate::env::DeviceInfo {
                user_agent: "ua".to_string(),
                platform: "linux".to_string(),
                language: "en-US".to_string(),
                screen: crate::env::ScreenSize { width: 1, height: 2 },
                timezone: "UTC".to_string(),
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("location").is_none());
        assert_eq!(v["device"]["timezone"], "UTC");
        let hb = serde_json::to_value(SessionRef { session_id: "s".to_string() }).unwrap();
        assert_eq!(hb, serde_json::json!({"sessionId": "s"}));
    }
}
