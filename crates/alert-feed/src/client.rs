//! HTTP client for the alert provider.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use reqwest_eventsource::RequestBuilderExt;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::{FeedConfig, API_KEY_HEADER};
use crate::error::FeedError;
use crate::stream::{AlertStream, EventStream, StreamScope};
use crate::types::{AllStatesResponse, OneStateResponse, RegionId, RegionState, Snapshot};
use crate::AlertFeed;

/// Client for the alert provider's pull and push endpoints.
///
/// Every request carries the API key header; it is installed once on the
/// underlying HTTP clients and never exposed to callers.
#[derive(Clone)]
pub struct AlertApiClient {
    http: Client,
    stream_http: Client,
    config: FeedConfig,
}

impl AlertApiClient {
    /// Build a client from configuration.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| FeedError::Config("API key is not a valid header value".to_string()))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = Client::builder()
            .default_headers(headers.clone())
            .timeout(config.request_timeout)
            .build()?;

        // Live streams are long-lived and must not time out
        let stream_http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            stream_http,
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        debug!(url = %url, "Fetching alert state");

        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AlertFeed for AlertApiClient {
    async fn fetch_all(&self) -> Result<Snapshot, FeedError> {
        let resp: AllStatesResponse = self.get_json(&self.config.states_url()).await?;
        debug!(
            regions = resp.states.len(),
            last_update = ?resp.last_update,
            "Fetched all regions"
        );
        Ok(Snapshot::from_states(resp.states))
    }

    async fn fetch_one(&self, region_id: RegionId) -> Result<RegionState, FeedError> {
        let resp: OneStateResponse = self
            .get_json(&self.config.state_url(region_id))
            .await
            .map_err(|e| match e {
                FeedError::Status { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
                    FeedError::NotFound(region_id)
                }
                other => other,
            })?;
        Ok(resp.state)
    }

    fn open_stream(&self, scope: StreamScope) -> Result<AlertStream, FeedError> {
        let url = match scope {
            StreamScope::AllRegions => self.config.live_url(),
            StreamScope::Region(id) => self.config.region_live_url(id),
        };
        info!(url = %url, "Opening live alert stream");

        let event_source = self
            .stream_http
            .get(&url)
            .eventsource()
            .map_err(|e| FeedError::Stream(e.to_string()))?;

        Ok(EventStream::new(event_source, scope).boxed())
    }
}

impl std::fmt::Debug for AlertApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertApiClient")
            .field("config", &self.config)
            .finish()
    }
}
