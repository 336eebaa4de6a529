//! Upstream snapshot fetching.
//!
//! The poll scheduler asks for one raw snapshot per tracked key per cycle,
//! and periodically for the upstream fixture list so newly announced
//! matches enter tracking at all. The pipeline is generic over
//! [`SnapshotFetcher`] so tests feed it snapshots directly; production
//! uses the HTTP implementation against a URL template with a `{key}`
//! placeholder plus a fixtures-list endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::validate::RawSnapshot;

/// Source of raw snapshots for tracked keys.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the current raw snapshot for one external key.
    async fn fetch(&self, external_key: &str) -> Result<RawSnapshot, FetchError>;

    /// Fetch the upstream fixture list: raw snapshots for every upcoming
    /// match the source currently announces, tracked or not.
    async fn fetch_upcoming(&self) -> Result<Vec<RawSnapshot>, FetchError>;
}

/// HTTP fetcher against a configurable feed endpoint.
pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
    url_template: String,
    fixtures_url: String,
}

impl HttpSnapshotFetcher {
    /// Build a fetcher for a URL template containing `{key}` and a
    /// fixtures-list endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the HTTP client cannot be constructed.
    pub fn new(
        url_template: impl Into<String>,
        fixtures_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url_template: url_template.into(),
            fixtures_url: fixtures_url.into(),
        })
    }

    fn url_for(&self, external_key: &str) -> String {
        self.url_template.replace("{key}", external_key)
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, external_key: &str) -> Result<RawSnapshot, FetchError> {
        let response = self.client.get(self.url_for(external_key)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json::<RawSnapshot>().await?)
    }

    async fn fetch_upcoming(&self) -> Result<Vec<RawSnapshot>, FetchError> {
        let response = self.client.get(&self.fixtures_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json::<Vec<RawSnapshot>>().await?)
    }
}
