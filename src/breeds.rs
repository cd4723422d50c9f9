//! Breed catalog lookups.
//!
//! A cat's breed is checked against a catalog once, when the cat is registered.
//! The remote catalog speaks TheCatAPI's format (`GET {base}/breeds` returning
//! `[{"name": "Siamese", ...}, ...]`). A fixed in-process catalog is available
//! for offline runs and tests.
//!
//! Matching is case-insensitive. When the catalog cannot answer, the lookup
//! fails; it never counts as a pass.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::BreedCatalogConfig;
use crate::error::{Error, Result};

/// Breed catalog failures.
#[derive(Debug, Error)]
pub enum BreedLookupError {
    #[error("breed catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("breed catalog responded with {0}")]
    Status(StatusCode),
}

/// A breed name confirmed by the catalog, in the catalog's spelling.
///
/// Only [`BreedValidator::recognize`] hands these out, so holding one proves
/// the check ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedBreed(String);

impl RecognizedBreed {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Deserialize)]
struct BreedRecord {
    name: String,
}

/// HTTP client for a TheCatAPI-compatible breed catalog.
#[derive(Debug, Clone)]
pub struct CatApiClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl CatApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, BreedLookupError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Fetch every breed name in the catalog.
    pub async fn breeds(&self) -> std::result::Result<Vec<String>, BreedLookupError> {
        let mut request = self.client.get(format!("{}/breeds", self.base_url));
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BreedLookupError::Status(status));
        }

        let records: Vec<BreedRecord> = response.json().await?;
        Ok(records.into_iter().map(|r| r.name).collect())
    }
}

/// Answers whether a breed name is a recognized cat breed.
#[derive(Debug, Clone)]
pub enum BreedValidator {
    /// Look the breed up in a remote catalog on every call.
    Remote(CatApiClient),
    /// A fixed list of breed names.
    Fixed(Arc<Vec<String>>),
}

impl BreedValidator {
    pub fn remote(config: &BreedCatalogConfig) -> std::result::Result<Self, BreedLookupError> {
        CatApiClient::new(config.url.clone(), config.api_key.clone(), config.timeout)
            .map(Self::Remote)
    }

    pub fn fixed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fixed(Arc::new(names.into_iter().map(Into::into).collect()))
    }

    /// Whether `breed` is in the catalog.
    pub async fn validate(&self, breed: &str) -> std::result::Result<bool, BreedLookupError> {
        Ok(self.lookup(breed).await?.is_some())
    }

    /// Confirms `breed` against the catalog.
    ///
    /// Fails with `InvalidBreed` if the catalog does not know the breed, and with
    /// `ValidationUnavailable` if the catalog cannot be asked.
    pub async fn recognize(&self, breed: &str) -> Result<RecognizedBreed> {
        match self.lookup(breed).await {
            Ok(Some(canonical)) => Ok(RecognizedBreed(canonical)),
            Ok(None) => Err(Error::InvalidBreed(breed.to_string())),
            Err(e) => {
                tracing::warn!("Breed lookup for {:?} failed: {}", breed, e);
                Err(Error::ValidationUnavailable(e.to_string()))
            }
        }
    }

    async fn lookup(&self, breed: &str) -> std::result::Result<Option<String>, BreedLookupError> {
        let wanted = breed.trim().to_lowercase();
        let found = match self {
            Self::Remote(client) => client
                .breeds()
                .await?
                .into_iter()
                .find(|name| name.to_lowercase() == wanted),
            Self::Fixed(names) => names.iter().find(|name| name.to_lowercase() == wanted).cloned(),
        };
        Ok(found)
    }
}
