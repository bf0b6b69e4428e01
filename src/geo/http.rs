use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{GeoLocation, GeoService, IpProvider, LocationSource, Place};
use crate::config::Config;
use crate::logging::{v_str, ProfileScope};

pub struct HttpGeoService {
    client: Client,
    ipapi_co_url: String,
    ip_api_url: String,
    nominatim_url: String,
}

impl HttpGeoService {
    pub fn new(cfg: &Config) -> Result<Self> {
        // Nominatim rejects anonymous clients
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.request_timeout())
            .build()?;
        Ok(Self {
            client,
            ipapi_co_url: cfg.ipapi_co_url.clone(),
            ip_api_url: cfg.ip_api_url.clone(),
            nominatim_url: cfg.nominatim_url.clone(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let _scope = ProfileScope::with_context("geo.get", &[("url", v_str(url))]);
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl GeoService for HttpGeoService {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Place> {
        let url = url::Url::parse_with_params(
            &self.nominatim_url,
            &[
                ("format", "json".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("addressdetails", "1".to_string()),
            ],
        )?;
        let data = self.get_json(url.as_str()).await?;
        parse_nominatim(&data).ok_or_else(|| anyhow!("reverse geocode response has no address"))
    }

    async fn ip_lookup(&self, provider: IpProvider) -> Result<GeoLocation> {
        let parsed = match provider {
            IpProvider::IpApiCo => parse_ipapi_co(&self.get_json(&self.ipapi_co_url).await?),
            IpProvider::IpApiCom => parse_ip_api_com(&self.get_json(&self.ip_api_url).await?),
        };
        parsed.ok_or_else(|| anyhow!("{} returned no coordinates", provider.as_str()))
    }
}

fn opt_str(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

/// ipapi.co: `latitude`, `longitude`, `city`, `country_name`, `country_code`
pub fn parse_ipapi_co(data: &Value) -> Option<GeoLocation> {
    Some(GeoLocation {
        lat: data.get("latitude")?.as_f64()?,
        lon: data.get("longitude")?.as_f64()?,
        accuracy: None,
        source: LocationSource::Ip,
        city: opt_str(&data["city"]),
        country: opt_str(&data["country_name"]),
        country_code: opt_str(&data["country_code"]),
    })
}

/// ip-api.com: `lat`, `lon`, `city`, `country`, `countryCode`
pub fn parse_ip_api_com(data: &Value) -> Option<GeoLocation> {
    Some(GeoLocation {
        lat: data.get("lat")?.as_f64()?,
        lon: data.get("lon")?.as_f64()?,
        accuracy: None,
        source: LocationSource::Ip,
        city: opt_str(&data["city"]),
        country: opt_str(&data["country"]),
        country_code: opt_str(&data["countryCode"]),
    })
}

pub fn parse_nominatim(data: &Value) -> Option<Place> {
    let address = data.get("address")?.as_object()?;
    let city = ["city", "town", "village"]
        .iter()
        .find_map(|k| address.get(*k).and_then(Value::as_str).filter(|v| !v.is_empty()))
        .map(str::to_string);
    Some(Place {
        city,
        country: address.get("country").and_then(Value::as_str).map(str::to_string),
        country_code: address
            .get("country_code")
            .and_then(Value::as_str)
            .map(str::to_uppercase),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ipapi_co_requires_numeric_coordinates() {
        let ok = json!({"latitude": 48.85, "longitude": 2.35, "city": "Paris", "country_name": "France", "country_code": "FR"});
        let loc = parse_ipapi_co(&ok).unwrap();
        assert_eq!(loc.country.as_deref(), Some("France"));
        assert_eq!(loc.source, LocationSource::Ip);

        let rate_limited = json!({"error": true, "reason": "RateLimited"});
        assert!(parse_ipapi_co(&rate_limited).is_none());
        let stringly = json!({"latitude": "48.85", "longitude": "2.35"});
        assert!(parse_ipapi_co(&stringly).is_none());
    }

    #[test]
    fn test_ip_api_com_fields() {
        let data = json!({"status": "success", "lat": 52.52, "lon": 13.40, "city": "Berlin", "country": "Germany", "countryCode": "DE"});
        let loc = parse_ip_api_com(&data).unwrap();
        assert_eq!(loc.city.as_deref(), Some("Berlin"));
        assert_eq!(loc.country_code.as_deref(), Some("DE"));
    }

    #[test]
    fn test_nominatim_prefers_city_then_town_then_village() {
        let town = json!({"address": {"town": "Zichron Yaakov", "country": "Israel", "country_code": "il"}});
        let place = parse_nominatim(&town).unwrap();
        assert_eq!(place.city.as_deref(), Some("Zichron Yaakov"));
        assert_eq!(place.country_code.as_deref(), Some("IL"));

        let both = json!({"address": {"village": "V", "city": "C"}});
        assert_eq!(parse_nominatim(&both).unwrap().city.as_deref(), Some("C"));

        let blank_city = json!({"address": {"city": "", "town": "", "village": "Ein Hod"}});
        assert_eq!(parse_nominatim(&blank_city).unwrap().city.as_deref(), Some("Ein Hod"));

        assert!(parse_nominatim(&json!({"error": "Unable to geocode"})).is_none());
    }
}
