//! Best-effort location lookup: position fix (bounded wait) with reverse
//! geocoding, then IP geolocation providers in order, then the local
//! development fallback.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, FixedPosition};
use crate::logging::{debug, obj, v_num, v_str, warn, Domain};

mod http;

pub use http::{parse_ip_api_com, parse_ipapi_co, parse_nominatim, HttpGeoService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Gps,
    Ip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub source: LocationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl GeoLocation {
    /// Reported when every lookup fails while serving from a local host.
    pub fn local_fallback() -> Self {
        Self {
            lat: 32.0853,
            lon: 34.7818,
            accuracy: None,
            source: LocationSource::Ip,
            city: Some("Tel Aviv".to_string()),
            country: Some("Israel".to_string()),
            country_code: Some("IL".to_string()),
        }
    }

    fn with_place(mut self, place: Place) -> Self {
        self.city = place.city;
        self.country = place.country;
        self.country_code = place.country_code;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: Option<f64>,
}

/// City/country names for a coordinate pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProvider {
    IpApiCo,
    IpApiCom,
}

impl IpProvider {
    pub const CHAIN: [IpProvider; 2] = [IpProvider::IpApiCo, IpProvider::IpApiCom];

    pub fn as_str(&self) -> &'static str {
        match self {
            IpProvider::IpApiCo => "ipapi.co",
            IpProvider::IpApiCom => "ip-api.com",
        }
    }
}

/// Device position fix, the GPS analogue.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Coords>;
}

#[async_trait]
pub trait GeoService: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Place>;
    async fn ip_lookup(&self, provider: IpProvider) -> Result<GeoLocation>;
}

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Coords> {
        Ok(Coords {
            lat: self.lat,
            lon: self.lon,
            accuracy: self.accuracy,
        })
    }
}

pub struct LocationResolver {
    position: Option<Arc<dyn PositionSource>>,
    services: Arc<dyn GeoService>,
    hostname: String,
    gps_timeout: Duration,
}

impl LocationResolver {
    pub fn new(
        position: Option<Arc<dyn PositionSource>>,
        services: Arc<dyn GeoService>,
        hostname: &str,
        gps_timeout: Duration,
    ) -> Self {
        Self {
            position,
            services,
            hostname: hostname.to_string(),
            gps_timeout,
        }
    }

    pub fn from_config(cfg: &Config, hostname: &str) -> Result<Self> {
        let position = cfg
            .fixed_position
            .map(|p| Arc::new(p) as Arc<dyn PositionSource>);
        Ok(Self::new(
            position,
            Arc::new(HttpGeoService::new(cfg)?),
            hostname,
            cfg.geo_timeout(),
        ))
    }

    pub async fn resolve(&self) -> Option<GeoLocation> {
        match self.gps_location().await {
            Ok(loc) => return Some(loc),
            Err(err) => debug(
                Domain::Geo,
                "gps_unavailable",
                obj(&[("error", v_str(&format!("{:#}", err)))]),
            ),
        }

        if let Some(loc) = self.ip_location().await {
            return Some(loc);
        }

        if is_local_host(&self.hostname) {
            warn(
                Domain::Geo,
                "local_fallback",
                obj(&[("host", v_str(&self.hostname))]),
            );
            return Some(GeoLocation::local_fallback());
        }
        warn(Domain::Geo, "no_location", obj(&[("host", v_str(&self.hostname))]));
        None
    }

    async fn gps_location(&self) -> Result<GeoLocation> {
        let source = self
            .position
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no position source"))?;
        let coords = tokio::time::timeout(self.gps_timeout, source.current_position())
            .await
            .map_err(|_| anyhow::anyhow!("position fix timed out after {:?}", self.gps_timeout))??;

        let base = GeoLocation {
            lat: coords.lat,
            lon: coords.lon,
            accuracy: coords.accuracy,
            source: LocationSource::Gps,
            city: None,
            country: None,
            country_code: None,
        };
        match self.services.reverse_geocode(coords.lat, coords.lon).await {
            Ok(place) => Ok(base.with_place(place)),
            Err(err) => {
                debug(
                    Domain::Geo,
                    "reverse_geocode_failed",
                    obj(&[("error", v_str(&format!("{:#}", err)))]),
                );
                Ok(base)
            }
        }
    }

    async fn ip_location(&self) -> Option<GeoLocation> {
        for provider in IpProvider::CHAIN {
            match self.services.ip_lookup(provider).await {
                Ok(loc) => {
                    debug(
                        Domain::Geo,
                        "ip_located",
                        obj(&[
                            ("provider", v_str(provider.as_str())),
                            ("lat", v_num(loc.lat)),
                            ("lon", v_num(loc.lon)),
                        ]),
                    );
                    return Some(loc);
                }
                Err(err) => debug(
                    Domain::Geo,
                    "ip_lookup_failed",
                    obj(&[
                        ("provider", v_str(provider.as_str())),
                        ("error", v_str(&format!("{:#}", err))),
                    ]),
                ),
            }
        }
        None
    }
}

pub fn is_local_host(hostname: &str) -> bool {
    matches!(hostname, "localhost" | "127.0.0.1")
}
