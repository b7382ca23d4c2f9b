use crate::types::{CandidateItem, PipelineError, Result};
use chrono::Utc;
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Parses feed XML into candidate items, dropping duplicates by guid and by
/// link URL across the parser's lifetime (one parser per run).
pub struct FeedParser {
    seen_guids: HashSet<String>,
    seen_urls: HashSet<String>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_guids: HashSet::new(),
            seen_urls: HashSet::new(),
        }
    }

    pub fn parse_feed(&mut self, content: &str) -> Result<Vec<CandidateItem>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| PipelineError::Parse(format!("Failed to parse feed: {}", e)))?;

        let mut items = Vec::new();
        for entry in feed.entries {
            if let Some(item) = self.parse_entry(entry) {
                items.push(item);
            }
        }

        info!("Parsed feed with {} candidate items", items.len());
        Ok(items)
    }

    fn parse_entry(&mut self, entry: feed_rs::model::Entry) -> Option<CandidateItem> {
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        let source_url = entry.links.first()?.href.clone();

        if !entry.id.is_empty() {
            if self.seen_guids.contains(&entry.id) {
                debug!("Skipping duplicate entry with GUID: {}", entry.id);
                return None;
            }
            self.seen_guids.insert(entry.id.clone());
        }

        if self.seen_urls.contains(&source_url) {
            debug!("Skipping duplicate entry with URL: {}", source_url);
            return None;
        }
        self.seen_urls.insert(source_url.clone());

        // Prefer the full content block over the summary when the feed
        // carries one; it makes the sensitive-topic check see more text.
        let raw_summary = match &entry.content {
            Some(content) => content.body.clone(),
            None => entry.summary.map(|s| s.content),
        };

        let publish_date = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        Some(CandidateItem {
            title,
            source_url,
            raw_summary,
            publish_date,
        })
    }

    /// Cheap sanity check before handing content to the real parser.
    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();

        let has_feed_indicators = content_lower.contains("<rss")
            || content_lower.contains("<feed")
            || content_lower.contains("<channel");

        let has_xml_declaration = content.trim_start().starts_with("<?xml");

        has_feed_indicators && (has_xml_declaration || content_lower.contains('<'))
    }

    pub fn clear_deduplication_cache(&mut self) {
        self.seen_guids.clear();
        self.seen_urls.clear();
        debug!("Cleared deduplication cache");
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}
