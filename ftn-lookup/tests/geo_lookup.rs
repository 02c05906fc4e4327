// Copyright 2025 the ftn-prober contributors.
//
// This software is licensed to you under The General Public License (GPL), version 3. Unless
// required by applicable law or agreed to in writing, software distributed under the GPL Licence
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either
// express or implied. Please review the Licence for the specific language governing permissions
// and limitations.

//! Geolocation provider tests against a mocked ip-api endpoint.

use ftn_lookup::{CacheConfig, GeoLookup, IpApiGeoProvider, PersistentCache, GEO_CACHE_TTL};
use serde_json::json;
use std::net::IpAddr;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn cache(dir: &std::path::Path) -> PersistentCache<ftn_model::Geolocation> {
    PersistentCache::new(CacheConfig::new(dir, "geolocation.json", GEO_CACHE_TTL))
        .expect("cache should build")
}

#[tokio::test]
async fn successful_lookup_maps_fields_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/192.0.2.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "country": "Ukraine",
            "countryCode": "UA",
            "city": "Kyiv",
            "regionName": "Kyiv City",
            "lat": 50.45,
            "lon": 30.52,
            "isp": "Example ISP",
            "org": "Example Org",
            "as": "AS64500 Example"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let provider =
        IpApiGeoProvider::with_base_url(server.uri(), cache(dir.path())).expect("provider");

    let ip: IpAddr = "192.0.2.1".parse().expect("ip");
    let first = provider.lookup(ip).await.expect("lookup");
    assert_eq!(first.country, "Ukraine");
    assert_eq!(first.country_code, "UA");
    assert_eq!(first.isp, "Example ISP");

    // Second call must come from the cache; the mock expects exactly one hit.
    let second = provider.lookup(ip).await.expect("cached lookup");
    assert_eq!(second, first);
}

#[tokio::test]
async fn failed_status_is_an_error_not_a_panic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/198.51.100.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "fail",
            "message": "private range"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let provider =
        IpApiGeoProvider::with_base_url(server.uri(), cache(dir.path())).expect("provider");

    let ip: IpAddr = "198.51.100.7".parse().expect("ip");
    let err = provider.lookup(ip).await.expect_err("should fail");
    assert!(err.to_string().contains("private range"));
}
