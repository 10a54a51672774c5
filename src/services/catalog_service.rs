//! Catalog fetching and the session catalog.
//!
//! A [`CatalogSource`] knows how to obtain the raw fruit list (HTTP or a
//! local JSON file). [`CatalogService`] owns the current [`Catalog`] and
//! swaps a freshly fetched one in as a whole.

use crate::{
    events::{AppEvent, EventBus},
    models::fruit::{Catalog, FruitRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url, header};
use std::{io, path::PathBuf, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{fs, sync::RwLock};
use tracing::{info, warn};

pub const DEFAULT_CATALOG_URL: &str = "https://www.fruityvice.com/api/fruit/all";
const USER_AGENT: &str = concat!("fruit-catalog/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog endpoint `{0}` is not a valid URL")]
    InvalidEndpoint(String),
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog endpoint returned {0}")]
    Status(StatusCode),
    #[error("catalog payload is not a fruit list: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Somewhere a fruit list can be fetched from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> CatalogResult<Vec<FruitRecord>>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Decode a catalog payload: a JSON array of fruit objects.
pub fn parse_catalog(body: &[u8]) -> CatalogResult<Vec<FruitRecord>> {
    Ok(serde_json::from_slice(body)?)
}

/// One unauthenticated GET against a fixed endpoint. No retries.
pub struct HttpCatalogSource {
    client: Client,
    endpoint: Url,
}

impl HttpCatalogSource {
    pub fn new(endpoint: &str, timeout: Duration) -> CatalogResult<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| CatalogError::InvalidEndpoint(endpoint.into()))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> CatalogResult<Vec<FruitRecord>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }

        let body = response.bytes().await?;
        parse_catalog(&body)
    }

    fn describe(&self) -> String {
        self.endpoint.to_string()
    }
}

/// Reads the same JSON payload from disk.
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn fetch(&self) -> CatalogResult<Vec<FruitRecord>> {
        let body = fs::read(&self.path).await?;
        parse_catalog(&body)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Default)]
struct CatalogState {
    catalog: Arc<Catalog>,
    loaded_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CatalogService {
    source: Arc<dyn CatalogSource>,
    state: Arc<RwLock<CatalogState>>,
    events: EventBus,
}

impl CatalogService {
    pub fn new(source: Arc<dyn CatalogSource>, events: EventBus) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(CatalogState::default())),
            events,
        }
    }

    /// Fetch the catalog and swap it in.
    ///
    /// On failure the error is logged and the current catalog is kept, so a
    /// failed first fetch leaves the session with an empty catalog.
    /// Returns the number of fruits now in the catalog.
    pub async fn refresh(&self) -> usize {
        let records = match self.source.fetch().await {
            Ok(records) => records,
            Err(err) => {
                warn!("failed to load catalog from {}: {}", self.source.describe(), err);
                return self.state.read().await.catalog.len();
            }
        };

        let catalog = Catalog::from_records(records);
        let count = catalog.len();
        {
            let mut state = self.state.write().await;
            state.catalog = Arc::new(catalog);
            state.loaded_at = Some(Utc::now());
        }

        info!("loaded {} fruits from {}", count, self.source.describe());
        self.events.publish(AppEvent::CatalogLoaded { count });
        count
    }

    pub async fn current(&self) -> Arc<Catalog> {
        self.state.read().await.catalog.clone()
    }

    /// When the last successful fetch completed, if any.
    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.loaded_at
    }
}
