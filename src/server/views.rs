//! View counter endpoints
//!
//! `GET`/`POST /api/view/site` read and bump the site-wide counter.
//! `GET`/`PUT /api/view/{page_id}` do the same for a single page; a request
//! without a page id is rejected before the store is touched.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiError;
use crate::kv::{KvStore, SITE_KEY, VIEWS_FIELD};

/// Body of every view counter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsResponse {
    pub views: u64,
}

/// A counted resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counter {
    Site,
    Page(String),
}

impl Counter {
    /// Validate a page id path segment
    pub fn page(page_id: String) -> Result<Self, ApiError> {
        if page_id.trim().is_empty() {
            return Err(ApiError::MissingPageId);
        }
        Ok(Counter::Page(page_id))
    }

    /// Store key holding this counter
    pub fn key(&self) -> &str {
        match self {
            Counter::Site => SITE_KEY,
            Counter::Page(id) => id,
        }
    }

    /// Current count; a resource without a record counts as zero
    pub async fn views(&self, store: &dyn KvStore) -> Result<u64, ApiError> {
        Ok(store.get(self.key(), VIEWS_FIELD).await?.unwrap_or(0))
    }

    /// Count one more view and return the new total
    pub async fn record_view(&self, store: &dyn KvStore) -> Result<u64, ApiError> {
        let views = store.increment(self.key(), VIEWS_FIELD, 1).await?;
        debug!(key = self.key(), views, "recorded view");
        Ok(views)
    }
}

pub async fn get_site_views(
    State(store): State<Arc<dyn KvStore>>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let views = Counter::Site.views(store.as_ref()).await?;
    Ok(Json(ViewsResponse { views }))
}

pub async fn increment_site_views(
    State(store): State<Arc<dyn KvStore>>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let views = Counter::Site.record_view(store.as_ref()).await?;
    Ok(Json(ViewsResponse { views }))
}

pub async fn get_page_views(
    State(store): State<Arc<dyn KvStore>>,
    Path(page_id): Path<String>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let counter = Counter::page(page_id)?;
    let views = counter.views(store.as_ref()).await?;
    Ok(Json(ViewsResponse { views }))
}

pub async fn increment_page_views(
    State(store): State<Arc<dyn KvStore>>,
    Path(page_id): Path<String>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let counter = Counter::page(page_id)?;
    let views = counter.record_view(store.as_ref()).await?;
    Ok(Json(ViewsResponse { views }))
}

/// Page routes hit without a page id segment
pub async fn missing_page_id() -> Result<Json<ViewsResponse>, ApiError> {
    Err(ApiError::MissingPageId)
}
