//! HTTP client for the watcher index and watcher searches.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};
use watchkeeper_core::config::ElasticsearchConfig;
use watchkeeper_core::{Config, WatcherHit};
use watchkeeper_engine::{SearchClient, SearchError, SearchOperation, StoreError, WatcherStore};

use crate::request::{parse_count, parse_watcher_hits, search_target};

/// Errors building an [`ElasticClient`].
#[derive(Debug, thiserror::Error)]
pub enum ElasticError {
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

/// Elasticsearch client for one watcher index.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    client: reqwest::Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
    operations: HashSet<SearchOperation>,
}

impl ElasticClient {
    /// Build a client for `index` on the cluster described by `config`.
    ///
    /// The plain search operation is always offered; the others only when
    /// listed in `search_operations`.
    pub fn new(config: &ElasticsearchConfig, index: impl Into<String>) -> Result<Self, ElasticError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let mut operations = HashSet::from([SearchOperation::Search]);
        for name in &config.search_operations {
            match name.parse::<SearchOperation>() {
                Ok(op) => {
                    operations.insert(op);
                }
                Err(e) => warn!(error = %e, "ignoring unknown search operation"),
            }
        }

        Ok(Self {
            client,
            base_url: config.base_url(),
            index: index.into(),
            username: config.username.clone(),
            password: config.password.clone(),
            operations,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ElasticError> {
        Self::new(&config.elasticsearch, config.watcher.index.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    /// Send a request to the watcher index, mapping 404 to "no index".
    async fn index_request(&self, builder: RequestBuilder) -> Result<Value, StoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(self.index.clone()));
        }
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: body_text(response).await,
            });
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

async fn body_text(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

#[async_trait::async_trait]
impl WatcherStore for ElasticClient {
    async fn count(&self) -> Result<u64, StoreError> {
        let path = format!("/{}/_count", self.index);
        let response = self.index_request(self.request(Method::GET, &path)).await?;
        parse_count(&response).ok_or_else(|| StoreError::Decode("missing count".to_string()))
    }

    async fn watchers(&self, size: u64) -> Result<Vec<WatcherHit>, StoreError> {
        let path = format!("/{}/_search", self.index);
        let builder = self
            .request(Method::POST, &path)
            .json(&json!({ "size": size }));
        let response = self.index_request(builder).await?;
        Ok(parse_watcher_hits(&response))
    }
}

#[async_trait::async_trait]
impl SearchClient for ElasticClient {
    fn supports(&self, op: SearchOperation) -> bool {
        self.operations.contains(&op)
    }

    async fn search(&self, op: SearchOperation, request: &Value) -> Result<Option<Value>, SearchError> {
        if !self.supports(op) {
            return Err(SearchError::Unsupported(op.to_string()));
        }

        let (path, body) = search_target(op, request);
        debug!(operation = %op, path = %path, "running watcher search");

        let response = self
            .request(Method::POST, &path)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: body_text(response).await,
            });
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| SearchError::Decode(e.to_string()))
    }
}
