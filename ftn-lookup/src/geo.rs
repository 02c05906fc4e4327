// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Geolocation over an ip-api compatible JSON endpoint.

use crate::{cache::PersistentCache, Error, Result};
use async_trait::async_trait;
use ftn_model::Geolocation;
use reqwest::Client;
use serde::Deserialize;
use std::{net::IpAddr, time::Duration};

/// Public endpoint used when no override is configured.
pub const DEFAULT_GEO_BASE_URL: &str = "http://ip-api.com/json";

/// Fields requested from the endpoint; keeps responses small.
const GEO_FIELDS: &str = "status,message,country,countryCode,city,regionName,lat,lon,isp,org,as";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// IP to geolocation block. Failures are expected to be non-fatal for
/// callers; the probe pipeline falls back to an empty block.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<Geolocation>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    country: String,
    #[serde(default, rename = "countryCode")]
    country_code: String,
    #[serde(default)]
    city: String,
    #[serde(default, rename = "regionName")]
    region_name: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    isp: String,
    #[serde(default)]
    org: String,
    #[serde(default, rename = "as")]
    asn: String,
}

impl From<IpApiResponse> for Geolocation {
    fn from(response: IpApiResponse) -> Self {
        Geolocation {
            country: response.country,
            country_code: response.country_code,
            city: response.city,
            region: response.region_name,
            latitude: response.lat,
            longitude: response.lon,
            isp: response.isp,
            org: response.org,
            asn: response.asn,
        }
    }
}

/// ip-api style provider with a 7 day cache.
pub struct IpApiGeoProvider {
    client: Client,
    base_url: String,
    cache: PersistentCache<Geolocation>,
}

impl IpApiGeoProvider {
    pub fn new(cache: PersistentCache<Geolocation>) -> Result<Self> {
        Self::with_base_url(DEFAULT_GEO_BASE_URL, cache)
    }

    /// The base URL is configurable so tests can point at a local mock.
    pub fn with_base_url(
        base_url: impl Into<String>,
        cache: PersistentCache<Geolocation>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            cache,
        })
    }
}

#[async_trait]
impl GeoLookup for IpApiGeoProvider {
    async fn lookup(&self, ip: IpAddr) -> Result<Geolocation> {
        let key = ip.to_string();
        if let Ok(cached) = self.cache.get(&key).await {
            trace!("Geolocation cache hit for {key}");
            return Ok(cached);
        }

        let url = format!("{}/{key}?fields={GEO_FIELDS}", self.base_url);
        let response: IpApiResponse = self.client.get(&url).send().await?.json().await?;

        if response.status != "success" {
            return Err(Error::Geo(format!(
                "{key}: {}",
                if response.message.is_empty() {
                    "lookup failed".to_string()
                } else {
                    response.message
                }
            )));
        }

        let geolocation = Geolocation::from(response);
        debug!(
            "Geolocated {key}: {} / {}",
            geolocation.country, geolocation.isp
        );
        self.cache.insert(key, geolocation.clone()).await;
        Ok(geolocation)
    }
}
