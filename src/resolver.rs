//! URL resolution collaborator.
//!
//! Page scraping lives elsewhere; the orchestrator only needs a playable
//! media URL and, when available, its metadata.

use std::sync::Arc;

use async_trait::async_trait;
use castit_av::{MediaProber, StreamMetadata};
use castit_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub url: String,
    pub title: Option<String>,
    pub preview_image: Option<String>,
    pub metadata: Option<StreamMetadata>,
}

#[async_trait]
pub trait UrlResolver: Send + Sync {
    async fn resolve(&self, url: &str, cancel: &CancellationToken) -> Result<ResolvedMedia>;
}

/// Treats the URL as the media itself and probes it.
pub struct DirectUrlResolver {
    prober: Arc<dyn MediaProber>,
}

impl DirectUrlResolver {
    pub fn new(prober: Arc<dyn MediaProber>) -> Self {
        Self { prober }
    }
}

#[async_trait]
impl UrlResolver for DirectUrlResolver {
    async fn resolve(&self, url: &str, cancel: &CancellationToken) -> Result<ResolvedMedia> {
        let metadata = self.prober.probe(url, cancel).await?;
        if metadata.is_none() {
            return Err(Error::NotReady(format!("could not read stream information from {url}")));
        }
        Ok(ResolvedMedia {
            url: url.to_string(),
            title: None,
            preview_image: None,
            metadata,
        })
    }
}
