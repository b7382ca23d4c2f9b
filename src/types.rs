use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A feed entry that survived parsing and is waiting to be processed.
/// Never persisted; the pipeline either turns it into a story or drops it.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    pub title: String,
    pub source_url: String,
    pub raw_summary: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
}

/// Fields of a rewrite response that can be individually defaulted when the
/// model omits or empties a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteField {
    Title,
    Body,
    Summary,
    MetaTitle,
    MetaDescription,
    Keywords,
    Country,
    Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub title: String,
    pub body: String,
    pub summary: String,
    pub meta_title: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub country: String,
    pub category: String,
}

/// A rewrite result plus the list of fields that had to be substituted with
/// defaults. Callers can distinguish clean success from repaired success.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub result: RewriteResult,
    pub defaulted: Vec<RewriteField>,
}

impl RewriteOutcome {
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photographer {
    pub name: String,
    pub url: String,
}

/// One entry of a curated per-category image pool. Within a pool each image
/// URL belongs to exactly one photographer.
#[derive(Debug, Clone)]
pub struct ImagePoolEntry {
    pub photographer: Photographer,
    pub image_url: String,
}

/// The (image, credit) pair handed back to the pipeline for a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAssignment {
    pub image_url: String,
    pub photographer: Photographer,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
    pub min_request_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "travel-ingest/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 2,
            max_redirects: 5,
            min_request_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_attempts: u32,
    pub retry_base_seconds: u64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: None,
            model: "openai/gpt-4o-mini".to_string(),
            max_attempts: 3,
            retry_base_seconds: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feed_url: String,
    pub content_dir: String,
    pub tracker_path: String,
    pub max_items_per_run: usize,
    pub item_delay_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            content_dir: "content/stories".to_string(),
            tracker_path: "data/image-tracker.json".to_string(),
            max_items_per_run: 5,
            item_delay_seconds: 10,
        }
    }
}

/// Aggregate outcome of one batch run. Always produced, even when every
/// individual item failed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub candidates: usize,
    pub published: usize,
    pub skipped_sensitive: usize,
    pub skipped_existing: usize,
    pub skipped_empty: usize,
    pub errors: usize,
    pub sample_titles: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            candidates: 0,
            published: 0,
            skipped_sensitive: 0,
            skipped_existing: 0,
            skipped_empty: 0,
            errors: 0,
            sample_titles: Vec::new(),
        }
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Extraction produced no text for {url}")]
    EmptyExtraction { url: String },

    #[error("Rewrite failed after {attempts} attempts: {reason}")]
    RewriteFailed { attempts: u32, reason: String },

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] serde_yaml::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
