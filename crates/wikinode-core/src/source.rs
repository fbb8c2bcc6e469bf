//! The article data capability consumed by the engine

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::SourceError;
use crate::types::{PageId, RelatedArticle};

/// Supplies article metadata, independent of transport.
///
/// Every method may fail. The engine treats a failure as "no signal" (zero,
/// empty or `None`) and carries on with whatever else it has.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Page id for a title, `None` when the article does not exist.
    async fn resolve_page_id(&self, title: &str) -> Result<Option<PageId>, SourceError>;

    /// Up to `limit` articles related to `title`.
    async fn fetch_related_articles(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<RelatedArticle>, SourceError>;

    /// Number of links the article has.
    async fn fetch_link_count(&self, title: &str) -> Result<u64, SourceError>;

    /// Titles of every outbound link of a page, across all continuation pages.
    async fn fetch_all_outbound_links(&self, page_id: PageId) -> Result<Vec<String>, SourceError>;

    /// Recent pageviews for the article.
    async fn fetch_popularity(&self, title: &str) -> Result<u64, SourceError>;

    /// Titles currently trending.
    async fn fetch_trending_titles(&self) -> Result<Vec<String>, SourceError>;
}

/// Shared sources, so callers can keep a handle for inspection.
#[async_trait]
impl<S: ArticleSource + ?Sized> ArticleSource for Arc<S> {
    async fn resolve_page_id(&self, title: &str) -> Result<Option<PageId>, SourceError> {
        (**self).resolve_page_id(title).await
    }

    async fn fetch_related_articles(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<RelatedArticle>, SourceError> {
        (**self).fetch_related_articles(title, limit).await
    }

    async fn fetch_link_count(&self, title: &str) -> Result<u64, SourceError> {
        (**self).fetch_link_count(title).await
    }

    async fn fetch_all_outbound_links(&self, page_id: PageId) -> Result<Vec<String>, SourceError> {
        (**self).fetch_all_outbound_links(page_id).await
    }

    async fn fetch_popularity(&self, title: &str) -> Result<u64, SourceError> {
        (**self).fetch_popularity(title).await
    }

    async fn fetch_trending_titles(&self) -> Result<Vec<String>, SourceError> {
        (**self).fetch_trending_titles().await
    }
}

/// Collapse a source failure into the zero value for that signal
pub(crate) fn or_zero<T: Default>(result: Result<T, SourceError>, signal: &str, subject: &str) -> T {
    result.unwrap_or_else(|err| {
        warn!(signal, subject, error = %err, "article source failed, using empty signal");
        T::default()
    })
}
