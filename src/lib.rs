pub mod attribution;
pub mod extractor;
pub mod fetcher;
pub mod filter;
pub mod frontmatter;
pub mod parser;
pub mod pipeline;
pub mod repair;
pub mod retry;
pub mod rewrite;
pub mod store;
pub mod tracker;
pub mod types;
pub mod utils;

pub use attribution::{ImageResolver, PoolCategory};
pub use extractor::ContentExtractor;
pub use fetcher::Fetcher;
pub use filter::TopicFilter;
pub use parser::FeedParser;
pub use pipeline::{run_image_backfill, IngestionPipeline};
pub use repair::{repair_corpus, repair_document, RepairStats};
pub use retry::RetryPolicy;
pub use rewrite::{ChatCompletionGenerator, MockGenerator, RewriteEngine, TextGenerator};
pub use store::{ContentStore, StoryRecord};
pub use tracker::{ImageTracker, JsonFileStore, MemoryStore, TrackerStore};
pub use types::*;
