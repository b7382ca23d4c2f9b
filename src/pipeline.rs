use crate::attribution::{ImageResolver, PoolCategory};
use crate::extractor::ContentExtractor;
use crate::fetcher::Fetcher;
use crate::filter::TopicFilter;
use crate::frontmatter::{Frontmatter, PhotographerField};
use crate::parser::FeedParser;
use crate::repair::is_valid_image_url;
use crate::rewrite::RewriteEngine;
use crate::store::{ContentStore, StoryRecord};
use crate::types::{
    BatchReport, CandidateItem, FetchConfig, PipelineConfig, PipelineError, Result, RewriteOutcome,
};
use crate::utils::slugify;
use chrono::{SecondsFormat, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

const SAMPLE_TITLE_LIMIT: usize = 5;

enum ItemOutcome {
    Published(String),
    SkippedSensitive,
    SkippedExisting,
    SkippedEmpty,
}

/// Serial ingestion pipeline: feed -> filter -> extract -> rewrite ->
/// image attribution -> persist. One item at a time, with a fixed delay
/// between items to respect upstream rate limits; a failed item is counted
/// and the batch moves on.
pub struct IngestionPipeline {
    config: PipelineConfig,
    fetcher: Fetcher,
    parser: FeedParser,
    filter: TopicFilter,
    extractor: ContentExtractor,
    engine: RewriteEngine,
    resolver: ImageResolver,
    store: ContentStore,
}

impl IngestionPipeline {
    pub fn new(
        config: PipelineConfig,
        fetch_config: FetchConfig,
        engine: RewriteEngine,
        resolver: ImageResolver,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(fetch_config)?;
        let store = ContentStore::new(&config.content_dir);

        Ok(Self {
            config,
            fetcher,
            parser: FeedParser::new(),
            filter: TopicFilter::new(),
            extractor: ContentExtractor::new(),
            engine,
            resolver,
            store,
        })
    }

    pub fn with_filter(mut self, filter: TopicFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Fetch and parse the feed without processing anything. Backs the
    /// RSS-only trigger and the full run.
    pub async fn fetch_candidates(&mut self) -> Result<Vec<CandidateItem>> {
        if self.config.feed_url.is_empty() {
            return Err(PipelineError::MissingConfig("feed URL".to_string()));
        }

        let fetch = self.fetcher.fetch_feed(&self.config.feed_url, None, None).await?;
        let content = match fetch.content {
            Some(content) => content,
            None => return Ok(Vec::new()),
        };

        if !FeedParser::is_valid_feed_content(&content) {
            return Err(PipelineError::Parse(
                "Feed content does not look like RSS/Atom".to_string(),
            ));
        }

        self.parser.parse_feed(&content)
    }

    /// Run one bounded batch. Always returns a report, even when the feed
    /// itself could not be fetched or every item failed.
    pub async fn run_batch(&mut self) -> BatchReport {
        let mut report = BatchReport::new();
        info!("Starting ingestion run {}", report.run_id);

        let candidates = match self.fetch_candidates().await {
            Ok(candidates) => candidates,
            Err(PipelineError::MissingConfig(what)) => {
                warn!("No {} configured; nothing to ingest", what);
                return report;
            }
            Err(e) => {
                error!("Feed fetch failed: {}", e);
                report.errors += 1;
                return report;
            }
        };

        let batch: Vec<CandidateItem> = candidates
            .into_iter()
            .take(self.config.max_items_per_run)
            .collect();
        report.candidates = batch.len();

        for (index, item) in batch.iter().enumerate() {
            // Space items out for the extraction and rewrite providers.
            if index > 0 && self.config.item_delay_seconds > 0 {
                sleep(Duration::from_secs(self.config.item_delay_seconds)).await;
            }

            match self.process_item(item).await {
                Ok(ItemOutcome::Published(title)) => {
                    report.published += 1;
                    if report.sample_titles.len() < SAMPLE_TITLE_LIMIT {
                        report.sample_titles.push(title);
                    }
                }
                Ok(ItemOutcome::SkippedSensitive) => report.skipped_sensitive += 1,
                Ok(ItemOutcome::SkippedExisting) => report.skipped_existing += 1,
                Ok(ItemOutcome::SkippedEmpty) => report.skipped_empty += 1,
                Err(e) => {
                    // Per-item boundary: one bad item never aborts the run.
                    error!("Failed to process {:?}: {}", item.title, e);
                    report.errors += 1;
                }
            }
        }

        info!(
            "Run {} done: {} candidates, {} published, {} sensitive, {} existing, {} empty, {} errors",
            report.run_id,
            report.candidates,
            report.published,
            report.skipped_sensitive,
            report.skipped_existing,
            report.skipped_empty,
            report.errors
        );
        report
    }

    async fn process_item(&mut self, item: &CandidateItem) -> Result<ItemOutcome> {
        let slug = slugify(&item.title);

        if self.store.exists(&slug) {
            info!("Skipping already-published story: {}", slug);
            return Ok(ItemOutcome::SkippedExisting);
        }

        let screen_text = match &item.raw_summary {
            Some(summary) => format!("{} {}", item.title, summary),
            None => item.title.clone(),
        };
        if self.filter.is_sensitive(&screen_text) {
            info!("Skipping sensitive topic: {:?}", item.title);
            return Ok(ItemOutcome::SkippedSensitive);
        }

        let html = self.fetcher.fetch_page(&item.source_url).await?;
        let raw_text = match self.extractor.extract(&html, &item.source_url) {
            Ok(text) => text,
            Err(PipelineError::EmptyExtraction { url }) => {
                warn!("Nothing extractable at {}", url);
                return Ok(ItemOutcome::SkippedEmpty);
            }
            Err(e) => return Err(e),
        };

        let outcome = self.engine.rewrite(&raw_text, &item.title).await?;
        if !outcome.is_clean() {
            warn!(
                "Rewrite of {:?} needed {} defaulted fields",
                item.title,
                outcome.defaulted.len()
            );
        }

        let assignment = self
            .resolver
            .assign_image(&slug, &outcome.result.category)?;

        let record = build_record(&slug, item, &outcome, assignment);
        self.store.write(&record)?;

        Ok(ItemOutcome::Published(record.front.title.clone()))
    }

    /// See [`run_image_backfill`].
    pub fn run_image_backfill(&mut self) -> Result<usize> {
        run_image_backfill(&self.store, &mut self.resolver)
    }
}

/// Standalone backfill over the persisted corpus: stories with a missing or
/// invalid image get one assigned; valid assignments are left alone. Only
/// image and photographer fields are touched, never the rest of the header
/// or the body.
pub fn run_image_backfill(store: &ContentStore, resolver: &mut ImageResolver) -> Result<usize> {
    let mut updated = 0;

    for slug in store.list_slugs()? {
        let mut record = match store.read(&slug)? {
            Some(record) => record,
            None => continue,
        };

        let photographer_ok = record
            .front
            .photographer
            .as_ref()
            .map(|p| p.is_normalized())
            .unwrap_or(false);
        if is_valid_image_url(&record.front.image_url) && photographer_ok {
            continue;
        }

        let assignment = resolver.assign_image(&slug, &record.front.story_type)?;

        record.front.image_url = assignment.image_url.clone();
        record.front.image_alt = Some(record.front.title.clone());
        record.front.image_credit = Some(format!(
            "Photo by {} on Unsplash",
            assignment.photographer.name
        ));
        record.front.image_link = Some(assignment.photographer.url.clone());
        record.front.photographer = Some(PhotographerField::Full(assignment.photographer));

        store.write(&record)?;
        updated += 1;
    }

    info!("Image backfill updated {} stories", updated);
    Ok(updated)
}

fn build_record(
    slug: &str,
    item: &CandidateItem,
    outcome: &RewriteOutcome,
    assignment: crate::types::ImageAssignment,
) -> StoryRecord {
    let result = &outcome.result;

    let date = item
        .publish_date
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    let country = if result.country.is_empty() || result.country == "Unknown" {
        "Global".to_string()
    } else {
        result.country.clone()
    };
    let story_type = PoolCategory::classify(&result.category).label().to_string();

    let front = Frontmatter {
        title: result.title.clone(),
        summary: result.summary.clone(),
        excerpt: None,
        date,
        country,
        story_type,
        image_url: assignment.image_url.clone(),
        image_alt: Some(result.title.clone()),
        image_credit: Some(format!(
            "Photo by {} on Unsplash",
            assignment.photographer.name
        )),
        image_link: Some(assignment.photographer.url.clone()),
        slug: slug.to_string(),
        meta_title: Some(result.meta_title.clone()),
        meta_description: Some(result.meta_description.clone()),
        keywords: result.keywords.clone(),
        photographer: Some(PhotographerField::Full(assignment.photographer)),
    };

    StoryRecord {
        slug: slug.to_string(),
        front,
        body: result.body.clone(),
    }
}
