//! Per-source synchronization cycle.
//!
//! A cycle fetches a source, reconciles drafts against stored articles by
//! `(source_id, url)`, applies retention, and pre-downloads full content and
//! images for the newest uncached articles. Every step degrades gracefully:
//! a failed fetch leaves stored data untouched and one source's failure never
//! affects another's cycle.

use crate::content::{ImageCache, PageFetcher};
use crate::extract::{extract_image, ExtractionEngine};
use crate::feed::FeedFetcher;
use crate::recipes::RecipeStore;
use crate::storage::{Article, Database, Source, SourceKind};
use crate::util::resolve_url;
use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

const SECONDS_PER_DAY: i64 = 86_400;

/// Tunables for a sync cycle, usually derived from [`crate::config::Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// 0 = unlimited
    pub max_articles_per_source: u64,
    /// 0 = unlimited
    pub max_article_age_days: u64,
    pub feed_timeout: Duration,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
    pub max_concurrent_syncs: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        crate::config::Config::default().sync_settings()
    }
}

/// Notable steps of a cycle, sent to an optional observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    FeedFetched { source_id: i64, articles: usize },
    FeedFailed { source_id: i64 },
    ArticleInserted { source_id: i64, article_id: i64 },
    ArticleUpdated { source_id: i64, article_id: i64 },
    ArticlesPruned { source_id: i64, removed: u64 },
    ArticleCached { source_id: i64, article_id: i64 },
    ImageStored { url: String, path: PathBuf },
    SinglePageRefreshed { source_id: i64, cached: bool },
    SyncFailed { source_id: i64, error: String },
}

/// Outcome of one source's cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub source_id: i64,
    /// Whether the source itself was retrieved this cycle
    pub fetched: bool,
    pub inserted: usize,
    pub updated: usize,
    pub pruned: u64,
    pub cached: usize,
    pub images: usize,
    /// Storage failure that cut the cycle short
    pub error: Option<String>,
}

impl SyncReport {
    fn new(source_id: i64) -> Self {
        Self {
            source_id,
            ..Self::default()
        }
    }
}

/// Orchestrates fetch, reconcile, retention, and pre-download per source.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    db: Database,
    feeds: FeedFetcher,
    pages: PageFetcher,
    images: ImageCache,
    recipes: RecipeStore,
    settings: SyncSettings,
    event_tx: Option<mpsc::Sender<SyncEvent>>,
}

impl Synchronizer {
    pub fn new(
        db: Database,
        client: reqwest::Client,
        recipes: RecipeStore,
        images_dir: impl Into<PathBuf>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            db,
            feeds: FeedFetcher::new(client.clone(), settings.feed_timeout),
            pages: PageFetcher::new(client.clone(), settings.page_timeout),
            images: ImageCache::new(images_dir, client, settings.image_timeout),
            recipes,
            settings,
            event_tx: None,
        }
    }

    /// Report progress as [`SyncEvent`]s on `tx`; a dropped receiver is ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<SyncEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn image_cache(&self) -> &ImageCache {
        &self.images
    }

    /// Ensure default recipes exist and compile a snapshot of all recipes.
    pub async fn load_engine(&self) -> ExtractionEngine {
        if let Err(e) = self.recipes.ensure_defaults().await {
            tracing::warn!(dir = %self.recipes.dir().display(), error = %e, "Failed to write default recipes");
        }
        match self.recipes.load_all().await {
            Ok(recipes) => ExtractionEngine::new(recipes),
            Err(e) => {
                tracing::warn!(dir = %self.recipes.dir().display(), error = %e, "Failed to load recipes");
                ExtractionEngine::default()
            }
        }
    }

    /// Run one full cycle for `source` with a freshly loaded recipe snapshot.
    pub async fn sync_source(&self, source: &Source) -> SyncReport {
        let engine = self.load_engine().await;
        self.sync_source_with(source, &engine).await
    }

    /// Synchronize many sources with bounded concurrency, sharing one recipe
    /// snapshot. Reports arrive in completion order.
    pub async fn sync_all(&self, sources: &[Source]) -> Vec<SyncReport> {
        if sources.is_empty() {
            return Vec::new();
        }
        let engine = self.load_engine().await;
        let engine = &engine;

        stream::iter(sources)
            .map(|source| self.sync_source_with(source, engine))
            .buffer_unordered(self.settings.max_concurrent_syncs.max(1))
            .collect()
            .await
    }

    async fn sync_source_with(&self, source: &Source, engine: &ExtractionEngine) -> SyncReport {
        let mut report = SyncReport::new(source.id);

        let result = match source.kind {
            SourceKind::Syndication | SourceKind::MicroBlog => {
                self.sync_feed(source, engine, &mut report).await
            }
            SourceKind::SinglePage => self.sync_single_page(source, engine, &mut report).await,
        };

        if let Err(e) = result {
            tracing::warn!(source_id = source.id, url = %source.url, error = %e, "Sync cycle aborted");
            report.error = Some(e.to_string());
            self.emit(SyncEvent::SyncFailed {
                source_id: source.id,
                error: e.to_string(),
            })
            .await;
        } else {
            tracing::info!(
                source_id = source.id,
                fetched = report.fetched,
                inserted = report.inserted,
                updated = report.updated,
                pruned = report.pruned,
                cached = report.cached,
                "Sync cycle complete"
            );
        }

        report
    }

    // ========================================================================
    // Feed sources
    // ========================================================================

    async fn sync_feed(
        &self,
        source: &Source,
        engine: &ExtractionEngine,
        report: &mut SyncReport,
    ) -> Result<()> {
        let Some(feed) = self.feeds.fetch(&source.url).await else {
            self.emit(SyncEvent::FeedFailed {
                source_id: source.id,
            })
            .await;
            return Ok(());
        };
        report.fetched = true;
        self.emit(SyncEvent::FeedFetched {
            source_id: source.id,
            articles: feed.articles.len(),
        })
        .await;

        let now = Utc::now().timestamp();
        for draft in feed.articles {
            match self.db.get_article_by_key(source.id, &draft.url).await? {
                Some(existing) => {
                    let merged = existing.merged_with(draft);
                    if merged == existing {
                        continue;
                    }
                    let article_id = self.db.upsert_article(&merged).await?;
                    report.updated += 1;
                    self.emit(SyncEvent::ArticleUpdated {
                        source_id: source.id,
                        article_id,
                    })
                    .await;
                }
                None => {
                    let mut article = Article::from_draft(source.id, draft, now);
                    if let Some(url) = article.image_url.clone() {
                        article.local_image_path = self.store_image(&url, report).await;
                    }
                    let article_id = self.db.upsert_article(&article).await?;
                    report.inserted += 1;
                    self.emit(SyncEvent::ArticleInserted {
                        source_id: source.id,
                        article_id,
                    })
                    .await;
                }
            }
        }

        self.apply_retention(source.id, now, report).await?;

        if source.download_limit > 0 {
            let candidates = self
                .db
                .get_uncached_articles(source.id, source.download_limit)
                .await?;
            for article in candidates {
                self.cache_article(&article, engine, report).await?;
            }
        }

        self.db
            .record_source_synced(source.id, feed.title.as_deref(), now)
            .await
    }

    async fn apply_retention(&self, source_id: i64, now: i64, report: &mut SyncReport) -> Result<()> {
        let mut removed = 0;

        if self.settings.max_articles_per_source > 0 {
            let keep = i64::try_from(self.settings.max_articles_per_source).unwrap_or(i64::MAX);
            removed += self.db.delete_excess_articles(source_id, keep, true).await?;
        }

        if self.settings.max_article_age_days > 0 {
            let days = i64::try_from(self.settings.max_article_age_days).unwrap_or(i64::MAX);
            let cutoff = now.saturating_sub(days.saturating_mul(SECONDS_PER_DAY));
            removed += self
                .db
                .delete_articles_older_than(source_id, cutoff, true)
                .await?;
        }

        if removed > 0 {
            report.pruned += removed;
            tracing::debug!(source_id = source_id, removed = removed, "Retention applied");
            self.emit(SyncEvent::ArticlesPruned { source_id, removed })
                .await;
        }

        Ok(())
    }

    // ========================================================================
    // Single-page sources
    // ========================================================================

    async fn sync_single_page(
        &self,
        source: &Source,
        engine: &ExtractionEngine,
        report: &mut SyncReport,
    ) -> Result<()> {
        let now = Utc::now().timestamp();

        let Some(mut article) = self.db.get_article_by_key(source.id, &source.url).await? else {
            let content = self.pages.fetch(&source.url, engine, None).await;
            let cached = content.is_some();
            let mut article = Article {
                id: 0,
                source_id: source.id,
                title: source.title.clone(),
                url: source.url.clone(),
                content: content.unwrap_or_default(),
                published: now,
                cached,
                local_path: None,
                favorite: false,
                read: false,
                image_url: None,
                local_image_path: None,
            };
            // Remembered so later refreshes can inject it
            if let Some(found) = extract_image(&article.content) {
                let resolved = resolve_url(&found, &source.url);
                article.local_image_path = self.store_image(&resolved, report).await;
                article.image_url = Some(resolved);
            }
            let article_id = self.db.upsert_article(&article).await?;
            report.inserted += 1;
            self.emit(SyncEvent::ArticleInserted {
                source_id: source.id,
                article_id,
            })
            .await;
            return self.finish_single_page(source, cached, now, report).await;
        };

        if let Some(url) = article.image_url.clone() {
            if article.local_image_path.is_none() {
                article.local_image_path = self.store_image(&url, report).await;
            }
        }
        let inject = injectable_image(&article);

        let Some(content) = self.pages.fetch(&source.url, engine, inject.as_deref()).await else {
            self.emit(SyncEvent::SinglePageRefreshed {
                source_id: source.id,
                cached: false,
            })
            .await;
            return Ok(());
        };

        article.content = content;
        if !self.db.store_downloaded_content(&article, Some(now)).await? {
            tracing::debug!(source_id = source.id, url = %source.url, "Single page removed during refresh");
            return Ok(());
        }
        report.updated += 1;
        self.emit(SyncEvent::ArticleUpdated {
            source_id: source.id,
            article_id: article.id,
        })
        .await;

        self.finish_single_page(source, true, now, report).await
    }

    async fn finish_single_page(
        &self,
        source: &Source,
        cached: bool,
        now: i64,
        report: &mut SyncReport,
    ) -> Result<()> {
        report.fetched = cached;
        if cached {
            report.cached += 1;
            self.db.record_source_synced(source.id, None, now).await?;
        }
        self.emit(SyncEvent::SinglePageRefreshed {
            source_id: source.id,
            cached,
        })
        .await;
        Ok(())
    }

    // ========================================================================
    // Content and images
    // ========================================================================

    /// Fetch, extract, and store the full content of one article on demand.
    ///
    /// Already cached articles are left alone. Returns whether the article
    /// is cached afterwards.
    pub async fn download_article_content(&self, article: &Article) -> bool {
        if article.cached {
            return true;
        }
        let engine = self.load_engine().await;
        let mut report = SyncReport::new(article.source_id);

        match self.cache_article(article, &engine, &mut report).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(article_id = article.id, url = %article.url, error = %e, "Failed to store downloaded article");
                false
            }
        }
    }

    /// Download the image, then the page with the image injected, then mark
    /// the article cached. When no image was known beforehand, one found in
    /// the fetched content is stored but not injected.
    async fn cache_article(
        &self,
        article: &Article,
        engine: &ExtractionEngine,
        report: &mut SyncReport,
    ) -> Result<bool> {
        let mut article = article.clone();
        let known_image = article.image_url.clone();

        if let Some(url) = &known_image {
            if article.local_image_path.is_none() {
                article.local_image_path = self.store_image(url, report).await;
            }
        }
        let inject = injectable_image(&article);

        let Some(content) = self.pages.fetch(&article.url, engine, inject.as_deref()).await else {
            return Ok(false);
        };
        article.content = content;

        if known_image.is_none() {
            if let Some(found) = extract_image(&article.content) {
                let resolved = resolve_url(&found, &article.url);
                article.local_image_path = self.store_image(&resolved, report).await;
                article.image_url = Some(resolved);
            }
        }

        if !self.db.store_downloaded_content(&article, None).await? {
            tracing::debug!(article_id = article.id, url = %article.url, "Article removed during download");
            return Ok(false);
        }
        report.cached += 1;
        self.emit(SyncEvent::ArticleCached {
            source_id: article.source_id,
            article_id: article.id,
        })
        .await;
        Ok(true)
    }

    async fn store_image(&self, url: &str, report: &mut SyncReport) -> Option<String> {
        let path = self.images.download(url).await?;
        report.images += 1;
        self.emit(SyncEvent::ImageStored {
            url: url.to_string(),
            path: path.clone(),
        })
        .await;
        Some(path.to_string_lossy().into_owned())
    }

    async fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

/// Image reference to place in fetched HTML: the cached copy as a `file://`
/// URL when available, otherwise the remote URL.
fn injectable_image(article: &Article) -> Option<String> {
    article
        .local_image_path
        .as_deref()
        .and_then(|path| url::Url::from_file_path(Path::new(path)).ok())
        .map(|u| u.to_string())
        .or_else(|| article.image_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(local: Option<&str>, remote: Option<&str>) -> Article {
        Article {
            id: 1,
            source_id: 1,
            title: "t".to_string(),
            url: "https://example.com/a".to_string(),
            content: String::new(),
            published: 0,
            cached: false,
            local_path: None,
            favorite: false,
            read: false,
            image_url: remote.map(String::from),
            local_image_path: local.map(String::from),
        }
    }

    #[test]
    fn test_injectable_image_prefers_local_copy() {
        let a = article(Some("/data/images/abc.jpg"), Some("https://cdn.test/a.jpg"));
        assert_eq!(
            injectable_image(&a).as_deref(),
            Some("file:///data/images/abc.jpg")
        );
    }

    #[test]
    fn test_injectable_image_falls_back_to_remote() {
        let a = article(Some("relative/abc.jpg"), Some("https://cdn.test/a.jpg"));
        assert_eq!(injectable_image(&a).as_deref(), Some("https://cdn.test/a.jpg"));
        assert_eq!(injectable_image(&article(None, None)), None);
    }

    #[test]
    fn test_default_settings_match_config_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.max_articles_per_source, 50);
        assert_eq!(settings.max_article_age_days, 30);
        assert_eq!(settings.feed_timeout, Duration::from_secs(10));
        assert_eq!(settings.page_timeout, Duration::from_secs(30));
    }
}
