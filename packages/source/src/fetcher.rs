//! Single-page retrieval from an `ArcGIS` feature-service query endpoint.
//!
//! Queries with `f=geojson`, so each feature arrives as
//! `{ "properties": {...}, "geometry": { "type": "Point", "coordinates": [lon, lat] } }`.
//! Failures come back as a [`FetchError`] value tagged with the offset; no
//! retry happens here. Whether a failure ends the run is decided by the
//! pagination driver.

use std::time::Duration;

use async_trait::async_trait;
use crash_map_crash_models::{Coordinates, Page, RawFeature};

use crate::feed::FeedDefinition;
use crate::{FetchError, SourceError};

/// Fetches one page of a feed at a time.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// The API's maximum number of features per page.
    fn page_size(&self) -> u64;

    /// Requests the features in `[offset, offset + page_size)`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] tagged `transport` or `parse`.
    async fn fetch_page(&self, offset: u64) -> Result<Page, FetchError>;
}

/// [`PageFetcher`] backed by a `reqwest` client.
pub struct ArcGisPageFetcher {
    client: reqwest::Client,
    query_url: String,
    params: Vec<(&'static str, String)>,
    page_size: u64,
}

impl ArcGisPageFetcher {
    /// Creates a fetcher for `feed`, applying its per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the feed is invalid or the HTTP client
    /// cannot be built.
    pub fn new(feed: &FeedDefinition) -> Result<Self, SourceError> {
        feed.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("crash-map/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(feed.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            query_url: feed.query_url.clone(),
            params: feed.query_params(),
            page_size: feed.page_size,
        })
    }

    /// Full request URL for `offset`, for logging and the `feed` command.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the query URL does not parse.
    pub fn page_url(&self, offset: u64) -> Result<String, SourceError> {
        let offset = offset.to_string();
        let params = self
            .params
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(std::iter::once(("resultOffset", offset.as_str())));
        reqwest::Url::parse_with_params(&self.query_url, params)
            .map(String::from)
            .map_err(|e| SourceError::Config {
                message: format!("invalid query_url '{}': {e}", self.query_url),
            })
    }
}

#[async_trait]
impl PageFetcher for ArcGisPageFetcher {
    fn page_size(&self) -> u64 {
        self.page_size
    }

    async fn fetch_page(&self, offset: u64) -> Result<Page, FetchError> {
        log::debug!("Requesting offset={offset} from {}", self.query_url);

        let response = self
            .client
            .get(&self.query_url)
            .query(&self.params)
            .query(&[("resultOffset", offset)])
            .send()
            .await
            .map_err(|e| FetchError::transport(offset, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transport(
                offset,
                format!("feature service returned HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(offset, e))?;

        parse_page(offset, &body)
    }
}

/// Decodes a `GeoJSON` response body into a [`Page`].
///
/// # Errors
///
/// Returns a `parse` [`FetchError`] if the body is not JSON, carries an
/// `ArcGIS` `error` object, lacks a `features` array, or contains a feature
/// that is not an object.
pub fn parse_page(offset: u64, body: &str) -> Result<Page, FetchError> {
    let mut json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::parse(offset, e))?;

    // ArcGIS reports query errors with a 200 status and an `error` body.
    if let Some(error) = json.get("error") {
        let code = error
            .get("code")
            .and_then(serde_json::Value::as_i64)
            .map_or_else(String::new, |c| format!(" {c}"));
        let message = error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error");
        return Err(FetchError::parse(
            offset,
            format!("ArcGIS API error{code}: {message}"),
        ));
    }

    let exceeded_transfer_limit = exceeded_transfer_limit(&json);

    let Some(serde_json::Value::Array(features)) =
        json.get_mut("features").map(serde_json::Value::take)
    else {
        return Err(FetchError::parse(offset, "response has no features array"));
    };

    let features = features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            raw_feature(feature).map_err(|message| {
                FetchError::parse(offset, format!("feature {i}: {message}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        offset,
        features,
        exceeded_transfer_limit,
    })
}

/// `exceededTransferLimit` sits under `properties` in `GeoJSON` responses
/// and at the top level in plain JSON ones.
fn exceeded_transfer_limit(json: &serde_json::Value) -> bool {
    json.get("properties")
        .and_then(|p| p.get("exceededTransferLimit"))
        .or_else(|| json.get("exceededTransferLimit"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Splits one `GeoJSON` feature into its attribute bag and point geometry.
fn raw_feature(feature: serde_json::Value) -> Result<RawFeature, String> {
    let serde_json::Value::Object(mut feature) = feature else {
        return Err("not a JSON object".to_string());
    };

    let attributes = match feature.remove("properties") {
        Some(serde_json::Value::Object(properties)) => properties,
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(other) => return Err(format!("properties is not an object: {other}")),
    };

    let geometry = feature.get("geometry").and_then(point_coordinates);

    Ok(RawFeature {
        attributes,
        geometry,
    })
}

/// Reads `[longitude, latitude]` from a point geometry. Anything else
/// (null, other geometry types, short or non-numeric coordinates) is
/// treated as no geometry.
fn point_coordinates(geometry: &serde_json::Value) -> Option<Coordinates> {
    if let Some(kind) = geometry.get("type").and_then(serde_json::Value::as_str)
        && kind != "Point"
    {
        return None;
    }
    let coordinates = geometry.get("coordinates")?.as_array()?;
    Some(Coordinates {
        longitude: coordinates.first()?.as_f64()?,
        latitude: coordinates.get(1)?.as_f64()?,
    })
}
