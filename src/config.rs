use std::time::Duration;

/// Section ratio a winner must exceed before the active marker moves.
pub const ACTIVE_RATIO_MIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPosition {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub app: String,
    pub api_key: Option<String>,
    pub heartbeat_ms: u64,
    pub request_timeout_ms: u64,
    pub geo_timeout_ms: u64,
    pub fixed_position: Option<FixedPosition>,
    pub ipapi_co_url: String,
    pub ip_api_url: String,
    pub nominatim_url: String,
    pub page_host: String,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Delay between consecutive detail reveals on a card
    pub stagger_ms: u64,
    /// Idle time before a pinned skill description auto-hides
    pub tape_idle_ms: u64,
    pub initial_reveal_ms: u64,
    pub visit_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://metrics-server-yjqf.onrender.com/v1".to_string(),
            app: "profile".to_string(),
            api_key: None,
            heartbeat_ms: 15_000,
            request_timeout_ms: 10_000,
            geo_timeout_ms: 6_000,
            fixed_position: None,
            ipapi_co_url: "https://ipapi.co/json/".to_string(),
            ip_api_url: "https://ip-api.com/json".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            page_host: "localhost".to_string(),
            screen_width: 0,
            screen_height: 0,
            stagger_ms: 800,
            tape_idle_ms: 5_000,
            initial_reveal_ms: 100,
            visit_secs: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let fixed_position = match (env_parse::<f64>("GEO_LAT"), env_parse::<f64>("GEO_LON")) {
            (Some(lat), Some(lon)) => Some(FixedPosition {
                lat,
                lon,
                accuracy: env_parse("GEO_ACCURACY"),
            }),
            _ => None,
        };
        Self {
            api_base: std::env::var("METRICS_API_BASE").unwrap_or(d.api_base),
            app: std::env::var("METRICS_APP").unwrap_or(d.app),
            api_key: std::env::var("METRICS_API_KEY").ok().filter(|k| !k.is_empty()),
            heartbeat_ms: env_parse("HEARTBEAT_MS").unwrap_or(d.heartbeat_ms),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS").unwrap_or(d.request_timeout_ms),
            geo_timeout_ms: env_parse("GEO_TIMEOUT_MS").unwrap_or(d.geo_timeout_ms),
            fixed_position,
            ipapi_co_url: std::env::var("IPAPI_CO_URL").unwrap_or(d.ipapi_co_url),
            ip_api_url: std::env::var("IP_API_URL").unwrap_or(d.ip_api_url),
            nominatim_url: std::env::var("NOMINATIM_URL").unwrap_or(d.nominatim_url),
            page_host: std::env::var("PAGE_HOST").unwrap_or(d.page_host),
            screen_width: env_parse("SCREEN_WIDTH").unwrap_or(d.screen_width),
            screen_height: env_parse("SCREEN_HEIGHT").unwrap_or(d.screen_height),
            stagger_ms: env_parse("STAGGER_MS").unwrap_or(d.stagger_ms),
            tape_idle_ms: env_parse("TAPE_IDLE_MS").unwrap_or(d.tape_idle_ms),
            initial_reveal_ms: env_parse("INITIAL_REVEAL_MS").unwrap_or(d.initial_reveal_ms),
            visit_secs: env_parse("VISIT_SECS"),
        }
    }

    /// `{api_base}/{app}`, the root every metrics call hangs off.
    pub fn metrics_base(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            self.app.trim_matches('/')
        )
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_base_joins_app() {
        let cfg = Config {
            api_base: "https://metrics.example/v1/".to_string(),
            app: "profile".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.metrics_base(), "https://metrics.example/v1/profile");
    }

    #[test]
    fn test_defaults_match_page_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(cfg.geo_timeout(), Duration::from_secs(6));
        assert_eq!(cfg.stagger_ms, 800);
        assert_eq!(cfg.tape_idle_ms, 5_000);
        assert!(cfg.api_key.is_none());
    }
}
