//! IP geolocation lookup.
//!
//! Wraps the ipinfo.io HTTP API behind the [`IpLocator`] trait. Lookups are
//! strictly best-effort: every failure mode (connect error, timeout, non-2xx
//! status, malformed body) collapses to an empty [`GeoRecord`] so a broken or
//! slow geolocation service can never fail visitor resolution.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default ipinfo.io API endpoint.
const DEFAULT_API_URL: &str = "https://ipinfo.io";

/// Default timeout for a single lookup.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort location record for an IP address.
///
/// Every field is optional; an unresolvable IP yields the all-empty record,
/// which serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// "lat,lon" coordinate pair as reported by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl GeoRecord {
    /// True when no field was resolved.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Source of location data for visitor IPs.
#[async_trait]
pub trait IpLocator: Send + Sync {
    /// Look up the location of `ip`. Infallible by contract: implementations
    /// return the empty record instead of an error.
    async fn lookup(&self, ip: &str) -> GeoRecord;
}

/// Locator that never resolves anything. Used in tests and when no API token
/// is configured.
#[derive(Debug, Default)]
pub struct NullLocator;

#[async_trait]
impl IpLocator for NullLocator {
    async fn lookup(&self, _ip: &str) -> GeoRecord {
        GeoRecord::default()
    }
}

/// Configuration for the ipinfo.io client.
#[derive(Debug, Clone)]
pub struct IpinfoConfig {
    /// API base URL.
    pub base_url: String,
    /// API token appended as the `token` query parameter.
    pub token: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl IpinfoConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// ipinfo.io geolocation client.
pub struct IpinfoLocator {
    client: Client,
    config: IpinfoConfig,
}

impl IpinfoLocator {
    /// Create a client with the default endpoint and timeout.
    pub fn new(token: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_config(IpinfoConfig::new(token))
    }

    /// Create a client with custom configuration.
    pub fn with_config(config: IpinfoConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IpLocator for IpinfoLocator {
    #[instrument(level = "debug", skip(self))]
    async fn lookup(&self, ip: &str) -> GeoRecord {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), ip);

        let response = match self
            .client
            .get(&url)
            .query(&[("token", self.config.token.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(ip, error = %e, "Geolocation request failed");
                return GeoRecord::default();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(ip, status = %status, "Geolocation API returned error status");
            return GeoRecord::default();
        }

        match response.json::<GeoRecord>().await {
            Ok(record) => {
                debug!(ip, city = record.city.as_deref(), "Geolocation resolved");
                record
            }
            Err(e) => {
                warn!(ip, error = %e, "Failed to parse geolocation response");
                GeoRecord::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_serializes_to_empty_object() {
        let json = serde_json::to_string(&GeoRecord::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_record_deserializes_ipinfo_body() {
        let body = r#"{
            "ip": "1.2.3.4",
            "city": "Springfield",
            "region": "Oregon",
            "country": "US",
            "loc": "44.0462,-123.0220",
            "bogus_extra_field": 42
        }"#;
        let record: GeoRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.city.as_deref(), Some("Springfield"));
        assert_eq!(record.loc.as_deref(), Some("44.0462,-123.0220"));
        assert!(record.postal.is_none());
        assert!(!record.is_empty());
    }

    #[test]
    fn test_create_client() {
        assert!(IpinfoLocator::new("test-token").is_ok());
    }

    #[tokio::test]
    async fn test_null_locator_is_empty() {
        let record = NullLocator.lookup("1.2.3.4").await;
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades_to_empty() {
        let locator = IpinfoLocator::with_config(IpinfoConfig {
            // Port 1 is unassigned; connection is refused immediately
            base_url: "http://127.0.0.1:1".to_string(),
            token: "unused".to_string(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();

        let record = locator.lookup("8.8.8.8").await;
        assert!(record.is_empty());
    }
}
