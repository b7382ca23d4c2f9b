use crate::retry::RetryPolicy;
use crate::types::{PipelineError, Result, RewriteConfig, RewriteField, RewriteOutcome, RewriteResult};
use crate::utils::text;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Seam in front of the text-generation provider. The engine only ever sees
/// prompt-in, text-out; provider wire formats stay behind this trait.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn generator_name(&self) -> String;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Chat-completions client (OpenRouter-compatible endpoint).
#[derive(Debug)]
pub struct ChatCompletionGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionGenerator {
    /// Fails with `MissingConfig` when no API key is configured; the caller
    /// downgrades that to a no-op run instead of crashing.
    pub fn from_config(config: &RewriteConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::MissingConfig("rewrite API key".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    fn generator_name(&self) -> String {
        format!("chat-completions ({})", self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::General(format!(
                "Provider returned HTTP {}",
                status
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::Parse("Provider response had no choices".to_string()))?;

        Ok(content)
    }
}

/// Canned-response generator for development and testing.
pub struct MockGenerator {
    response: String,
    fail_first: AtomicU32,
    delay_ms: u64,
}

impl MockGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_first: AtomicU32::new(0),
            delay_ms: 0,
        }
    }

    /// Fail the first `n` calls with a transient error, then succeed.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = AtomicU32::new(n);
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn generator_name(&self) -> String {
        "mock".to_string()
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::General("simulated provider failure".to_string()));
        }

        Ok(self.response.clone())
    }
}

/// Fields as they came back from the model, before default substitution.
#[derive(Debug, Default)]
struct ParsedRewrite {
    title: Option<String>,
    body: Option<String>,
    summary: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    keywords: Vec<String>,
    country: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct JsonRewrite {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, alias = "body")]
    content: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default, alias = "metaTitle")]
    meta_title: Option<String>,
    #[serde(default, alias = "metaDescription")]
    meta_description: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Rewrites extracted article text through a text-generation model with
/// retry/backoff, parsing the structured response and substituting
/// documented defaults for anything the model left out.
pub struct RewriteEngine {
    generator: Box<dyn TextGenerator>,
    retry: RetryPolicy,
}

impl RewriteEngine {
    pub fn new(generator: Box<dyn TextGenerator>, config: &RewriteConfig) -> Self {
        let retry = RetryPolicy::new(
            config.max_attempts,
            Duration::from_secs(config.retry_base_seconds),
        );
        info!("Rewrite engine using generator: {}", generator.generator_name());

        Self { generator, retry }
    }

    /// One structured generation request per article. Up to `max_attempts`
    /// tries with exponential backoff; exhaustion surfaces as the terminal
    /// `RewriteFailed`, which the batch loop counts and moves past.
    pub async fn rewrite(&self, raw_text: &str, original_title: &str) -> Result<RewriteOutcome> {
        let prompt = build_prompt(raw_text, original_title);
        let prompt = prompt.as_str();

        let this = self;
        let parsed = this
            .retry
            .run(move |attempt| async move {
                debug!("Rewrite attempt {} for {:?}", attempt, original_title);
                let response = this.generator.generate(prompt).await?;
                parse_response(&response).ok_or_else(|| {
                    PipelineError::Parse(
                        "Response was neither JSON nor delimited sections".to_string(),
                    )
                })
            })
            .await
            .map_err(|e| PipelineError::RewriteFailed {
                attempts: e.attempts,
                reason: e.last_error.to_string(),
            })?;

        Ok(apply_defaults(parsed, original_title, raw_text))
    }
}

const SECTION_TITLE: &str = "TITLE";
const SECTION_SUMMARY: &str = "SUMMARY";
const SECTION_CONTENT: &str = "CONTENT";
const SECTION_META_TITLE: &str = "META_TITLE";
const SECTION_META_DESCRIPTION: &str = "META_DESCRIPTION";
const SECTION_KEYWORDS: &str = "KEYWORDS";
const SECTION_COUNTRY: &str = "COUNTRY";
const SECTION_CATEGORY: &str = "CATEGORY";

fn build_prompt(raw_text: &str, original_title: &str) -> String {
    format!(
        "You are an editor for a travel publication. Rewrite the article below \
         in an original voice, keeping all facts. Respond with a single JSON \
         object with these keys: title, summary, content, metaTitle, \
         metaDescription, keywords (array of strings), country, category \
         (one of Travel, Cruise, Food & Wine, Adventure, Culture).\n\n\
         Original title: {}\n\nArticle:\n{}",
        original_title, raw_text
    )
}

/// Accepts both response variants: a strict JSON object, or
/// `###SECTION###`-delimited text from the older pipeline. Returns `None`
/// when the response has neither shape, which counts as a failed attempt.
fn parse_response(response: &str) -> Option<ParsedRewrite> {
    let trimmed = strip_code_fence(response.trim());
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<JsonRewrite>(trimmed) {
        return Some(ParsedRewrite {
            title: non_empty(json.title),
            body: non_empty(json.content),
            summary: non_empty(json.summary),
            meta_title: non_empty(json.meta_title),
            meta_description: non_empty(json.meta_description),
            keywords: clean_keywords(json.keywords),
            country: non_empty(json.country),
            category: non_empty(json.category),
        });
    }

    parse_sections(trimmed)
}

fn parse_sections(response: &str) -> Option<ParsedRewrite> {
    let mut parsed = ParsedRewrite::default();
    let mut current: Option<String> = None;
    let mut buffer = String::new();
    let mut seen_any = false;

    for line in response.lines() {
        let trimmed_line = line.trim();
        let is_marker = trimmed_line.len() > 6
            && trimmed_line.starts_with("###")
            && trimmed_line.ends_with("###");

        if is_marker {
            if let Some(section) = current.take() {
                assign_section(&mut parsed, &section, buffer.trim());
            }
            buffer.clear();
            current = Some(
                trimmed_line
                    .trim_matches('#')
                    .trim()
                    .to_uppercase(),
            );
            seen_any = true;
        } else if current.is_some() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }

    if let Some(section) = current.take() {
        assign_section(&mut parsed, &section, buffer.trim());
    }

    if seen_any {
        Some(parsed)
    } else {
        None
    }
}

fn assign_section(parsed: &mut ParsedRewrite, section: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let value = value.to_string();

    match section {
        SECTION_TITLE => parsed.title = Some(value),
        SECTION_SUMMARY => parsed.summary = Some(value),
        SECTION_CONTENT => parsed.body = Some(value),
        SECTION_META_TITLE => parsed.meta_title = Some(value),
        SECTION_META_DESCRIPTION => parsed.meta_description = Some(value),
        SECTION_KEYWORDS => {
            parsed.keywords = clean_keywords(value.split(',').map(|k| k.to_string()).collect())
        }
        SECTION_COUNTRY => parsed.country = Some(value),
        SECTION_CATEGORY => parsed.category = Some(value),
        _ => debug!("Ignoring unknown response section: {}", section),
    }
}

/// Substitute the documented default for every missing field and record
/// which ones needed it. Robustness to partial model output is deliberate;
/// one thin response must not sink the item.
fn apply_defaults(parsed: ParsedRewrite, original_title: &str, raw_text: &str) -> RewriteOutcome {
    let mut defaulted = Vec::new();

    let title = parsed.title.unwrap_or_else(|| {
        defaulted.push(RewriteField::Title);
        if original_title.trim().is_empty() {
            "Untitled Story".to_string()
        } else {
            original_title.to_string()
        }
    });

    let body = parsed.body.unwrap_or_else(|| {
        defaulted.push(RewriteField::Body);
        raw_text.to_string()
    });

    let summary = parsed.summary.unwrap_or_else(|| {
        defaulted.push(RewriteField::Summary);
        text::first_sentence(&body).unwrap_or_else(|| title.clone())
    });

    let meta_title = parsed.meta_title.unwrap_or_else(|| {
        defaulted.push(RewriteField::MetaTitle);
        title.clone()
    });

    let meta_description = parsed.meta_description.unwrap_or_else(|| {
        defaulted.push(RewriteField::MetaDescription);
        text::smart_truncate(&summary, 160)
    });

    let keywords = if parsed.keywords.is_empty() {
        defaulted.push(RewriteField::Keywords);
        let mut derived: Vec<String> = title
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .take(5)
            .collect();
        if derived.is_empty() {
            derived.push("travel".to_string());
        }
        derived
    } else {
        parsed.keywords
    };

    let country = parsed.country.unwrap_or_else(|| {
        defaulted.push(RewriteField::Country);
        "Unknown".to_string()
    });

    let category = parsed.category.unwrap_or_else(|| {
        defaulted.push(RewriteField::Category);
        "General".to_string()
    });

    RewriteOutcome {
        result: RewriteResult {
            title,
            body,
            summary,
            meta_title,
            meta_description,
            keywords,
            country,
            category,
        },
        defaulted,
    }
}

fn strip_code_fence(response: &str) -> &str {
    let response = response.trim();
    if let Some(rest) = response.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    response
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}
