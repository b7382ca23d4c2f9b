use crate::types::{PipelineError, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

// Containers tried in order; the first one present wins.
const CONTENT_CONTAINERS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".article-body",
    ".entry-content",
    "body",
];

// Anything inside these is navigation chrome or ads, not article text.
const BOILERPLATE_ANCESTORS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "script", "style", "noscript",
];

const MIN_PARAGRAPH_CHARS: usize = 40;

/// Pulls readable article text out of a fetched page, dropping scripts,
/// navigation and ad containers. Blunt compared to a real readability
/// engine, but travel articles are paragraph-heavy and survive it well.
pub struct ContentExtractor {
    containers: Vec<Selector>,
    paragraph: Selector,
}

impl ContentExtractor {
    pub fn new() -> Self {
        let containers = CONTENT_CONTAINERS
            .iter()
            .map(|s| Selector::parse(s).expect("static selector"))
            .collect();
        let paragraph = Selector::parse("p").expect("static selector");

        Self {
            containers,
            paragraph,
        }
    }

    /// Extract article text from raw HTML. Fails with `EmptyExtraction` when
    /// nothing that looks like prose is found, so the caller can skip the
    /// item and keep the batch moving.
    pub fn extract(&self, html: &str, url: &str) -> Result<String> {
        let document = Html::parse_document(html);

        for container in &self.containers {
            if let Some(root) = document.select(container).next() {
                let text = self.collect_paragraphs(root);
                if !text.is_empty() {
                    debug!("Extracted {} chars from {}", text.len(), url);
                    return Ok(text);
                }
            }
        }

        Err(PipelineError::EmptyExtraction {
            url: url.to_string(),
        })
    }

    fn collect_paragraphs(&self, root: ElementRef) -> String {
        let mut paragraphs = Vec::new();

        for p in root.select(&self.paragraph) {
            if Self::inside_boilerplate(p) {
                continue;
            }

            let text = p
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");

            if text.len() >= MIN_PARAGRAPH_CHARS {
                paragraphs.push(text);
            }
        }

        paragraphs.join("\n\n")
    }

    fn inside_boilerplate(element: ElementRef) -> bool {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| BOILERPLATE_ANCESTORS.contains(&ancestor.value().name()))
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}
