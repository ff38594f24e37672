//! HTTP provider for a REST-countries style directory service.
//!
//! `GET {base}/alpha/{code}` returns either a single country object or an
//! array of them. Only the fields the overlay shows are decoded; everything
//! else in the payload is ignored.

use std::collections::BTreeMap;
use std::time::Duration;

use foundation::ids::EntityKey;
use futures_util::FutureExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::descriptor::Descriptor;
use crate::error::FetchError;
use crate::provider::{BoxFuture, DataProvider};

pub const DEFAULT_DIRECTORY_URL: &str = "https://restcountries.com/v3.1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn entity_url(&self, key: &EntityKey) -> String {
        format!("{}/alpha/{}", self.base_url, key.as_str())
    }
}

impl DataProvider for DirectoryClient {
    fn fetch(&self, key: EntityKey) -> BoxFuture<'static, Result<Descriptor, FetchError>> {
        let http = self.http.clone();
        let url = self.entity_url(&key);
        async move {
            debug!(%key, %url, "directory request");
            let resp = http.get(&url).send().await?;
            match resp.status() {
                StatusCode::NOT_FOUND => return Err(FetchError::NotFound { key }),
                status if !status.is_success() => {
                    return Err(FetchError::Status {
                        key,
                        code: status.as_u16(),
                    });
                }
                _ => {}
            }
            let body = resp.text().await?;
            decode_payload(&key, &body)
        }
        .boxed()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Many(Vec<WireCountry>),
    One(Box<WireCountry>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCountry {
    name: WireName,
    cca2: Option<String>,
    cca3: Option<String>,
    capital: Vec<String>,
    region: Option<String>,
    subregion: Option<String>,
    population: Option<u64>,
    area: Option<f64>,
    languages: BTreeMap<String, String>,
    currencies: BTreeMap<String, WireCurrency>,
    flags: WireFlags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireName {
    common: String,
    official: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCurrency {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireFlags {
    svg: Option<String>,
    png: Option<String>,
}

/// Decodes a directory response body for `key`.
///
/// With several matches, the one whose `cca2`/`cca3` equals the key is
/// preferred, falling back to the first.
pub fn decode_payload(key: &EntityKey, body: &str) -> Result<Descriptor, FetchError> {
    let countries = match serde_json::from_str::<WirePayload>(body)? {
        WirePayload::Many(v) => v,
        WirePayload::One(c) => vec![*c],
    };

    let matches_key = |c: &WireCountry| {
        [&c.cca2, &c.cca3]
            .into_iter()
            .flatten()
            .any(|code| code.eq_ignore_ascii_case(key.as_str()))
    };
    let idx = countries.iter().position(matches_key).unwrap_or(0);
    let Some(country) = countries.into_iter().nth(idx) else {
        return Err(FetchError::NotFound { key: key.clone() });
    };

    if country.name.common.trim().is_empty() {
        return Err(FetchError::Decode(format!("entry for {key} has no name")));
    }

    Ok(Descriptor {
        key: key.clone(),
        name: country.name.common,
        official_name: country.name.official,
        capital: country.capital.into_iter().next(),
        region: country.region.filter(|r| !r.is_empty()),
        subregion: country.subregion.filter(|r| !r.is_empty()),
        population: country.population,
        area_km2: country.area,
        languages: country.languages.into_values().collect(),
        currencies: country
            .currencies
            .into_iter()
            .map(|(code, c)| c.name.unwrap_or(code))
            .collect(),
        flag_url: country.flags.svg.or(country.flags.png),
    })
}
