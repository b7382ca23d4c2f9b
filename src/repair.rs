use crate::attribution::{default_photographer, DEFAULT_IMAGE_URL};
use crate::frontmatter::{self, Frontmatter, PhotographerField};
use crate::types::Result;
use crate::utils::{text, title_from_slug};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::{debug, info};

/// Which repairs were applied to a record. Aggregated per-kind for the run
/// report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    SynthesizedHeader,
    SlugCorrected,
    DateRepaired,
    CountryDisambiguated,
    CountryDefaulted,
    TypeDefaulted,
    ImageUrlReplaced,
    PhotographerNormalized,
    SummaryBackfilled,
}

#[derive(Debug, Default, Clone)]
pub struct RepairStats {
    pub records_scanned: usize,
    pub records_changed: usize,
    pub synthesized_headers: usize,
    pub slugs_corrected: usize,
    pub dates_repaired: usize,
    pub countries_disambiguated: usize,
    pub countries_defaulted: usize,
    pub types_defaulted: usize,
    pub image_urls_replaced: usize,
    pub photographers_normalized: usize,
    pub summaries_backfilled: usize,
}

impl RepairStats {
    pub fn absorb(&mut self, repairs: &[RepairKind]) {
        self.records_scanned += 1;
        if !repairs.is_empty() {
            self.records_changed += 1;
        }
        for repair in repairs {
            match repair {
                RepairKind::SynthesizedHeader => self.synthesized_headers += 1,
                RepairKind::SlugCorrected => self.slugs_corrected += 1,
                RepairKind::DateRepaired => self.dates_repaired += 1,
                RepairKind::CountryDisambiguated => self.countries_disambiguated += 1,
                RepairKind::CountryDefaulted => self.countries_defaulted += 1,
                RepairKind::TypeDefaulted => self.types_defaulted += 1,
                RepairKind::ImageUrlReplaced => self.image_urls_replaced += 1,
                RepairKind::PhotographerNormalized => self.photographers_normalized += 1,
                RepairKind::SummaryBackfilled => self.summaries_backfilled += 1,
            }
        }
    }
}

// Values that mean the country field is actually holding a category.
const CATEGORY_MARKERS: &[&str] = &["travel", "cruise", "adventure", "culture", "food", "wine"];

/// Repair a persisted document. Stages run in a fixed order and each is
/// idempotent, so re-running the whole pass over an already-normalized
/// record changes nothing. The body is never touched.
pub fn repair_document(identity_key: &str, content: &str) -> Result<(String, Vec<RepairKind>)> {
    let mut repairs = Vec::new();

    // Stage 1: parse, or synthesize a header from whatever is derivable.
    // A record is never rejected for a missing or mangled header.
    let (mut front, body) = match frontmatter::parse_document(content) {
        Some(parsed) => parsed,
        None => {
            debug!("{}: no parsable header, synthesizing", identity_key);
            repairs.push(RepairKind::SynthesizedHeader);
            (synthesize_header(identity_key, content), content.to_string())
        }
    };

    repair_frontmatter(identity_key, &mut front, &body, &mut repairs);

    let rendered = frontmatter::render_document(&front, &body)?;
    Ok((rendered, repairs))
}

/// Stages 2-7, shared by the full-document pass and callers that already
/// hold a parsed header.
pub fn repair_frontmatter(
    identity_key: &str,
    front: &mut Frontmatter,
    body: &str,
    repairs: &mut Vec<RepairKind>,
) {
    // Stage 2: the file's identity key is the authority on the slug.
    if front.slug != identity_key {
        front.slug = identity_key.to_string();
        repairs.push(RepairKind::SlugCorrected);
    }

    if front.title.trim().is_empty() {
        front.title = title_from_slug(identity_key);
    }

    // Stage 3: dates must parse. Future dates are legitimate scheduled
    // stories and are preserved; only unparsable values are replaced.
    match normalize_date(&front.date) {
        Some(normalized) => {
            if normalized != front.date {
                front.date = normalized;
                repairs.push(RepairKind::DateRepaired);
            }
        }
        None => {
            front.date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            repairs.push(RepairKind::DateRepaired);
        }
    }

    // Stage 4: country sometimes holds a category value from older runs.
    let country_trim = front.country.trim().to_string();
    let looks_like_category = CATEGORY_MARKERS
        .iter()
        .any(|marker| country_trim.to_lowercase().contains(marker));
    if looks_like_category {
        front.story_type = country_trim;
        front.country = "Global".to_string();
        repairs.push(RepairKind::CountryDisambiguated);
    } else if country_trim.is_empty() || country_trim == "Unknown" {
        front.country = "Global".to_string();
        repairs.push(RepairKind::CountryDefaulted);
    }
    if front.story_type.trim().is_empty() || front.story_type.trim() == "General" {
        front.story_type = "Travel".to_string();
        repairs.push(RepairKind::TypeDefaulted);
    }

    // Stage 5: an image URL is valid only with an http(s) scheme. Empty
    // values, YAML fold markers and relative paths all get the default.
    if !is_valid_image_url(&front.image_url) {
        front.image_url = DEFAULT_IMAGE_URL.to_string();
        repairs.push(RepairKind::ImageUrlReplaced);
    }

    // Stage 6: photographer is always a {name, url} object.
    match front.photographer.take() {
        Some(field) if field.is_normalized() => {
            front.photographer = Some(field);
        }
        Some(field) => {
            front.photographer = Some(PhotographerField::Full(
                field.into_photographer("https://unsplash.com"),
            ));
            repairs.push(RepairKind::PhotographerNormalized);
        }
        None => {
            front.photographer = Some(PhotographerField::Full(default_photographer()));
            repairs.push(RepairKind::PhotographerNormalized);
        }
    }

    // Stage 7: summary backfill from the body's first sentence.
    let excerpt_empty = front
        .excerpt
        .as_deref()
        .map(|e| e.trim().is_empty())
        .unwrap_or(true);
    if front.summary.trim().is_empty() && excerpt_empty {
        front.summary = text::first_sentence(body).unwrap_or_else(|| front.title.clone());
        repairs.push(RepairKind::SummaryBackfilled);
    }

    debug!("{}: {} repairs applied", identity_key, repairs.len());
}

fn synthesize_header(identity_key: &str, body: &str) -> Frontmatter {
    let title = title_from_slug(identity_key);
    let summary = text::first_paragraph(body)
        .map(|p| text::smart_truncate(&p, 200))
        .unwrap_or_default();

    Frontmatter {
        title,
        summary,
        date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        slug: identity_key.to_string(),
        ..Default::default()
    }
}

/// Parse the stored date in the formats previous pipeline generations used
/// and normalize to RFC 3339. `None` means unparsable.
fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0)?;
        return Some(dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    None
}

/// An image URL is usable only with an explicit http(s) scheme; YAML fold
/// markers and relative paths are not.
pub fn is_valid_image_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

/// Batch repair over every record in the content directory. Rewrites files
/// in place and reports per-kind counts.
pub fn repair_corpus(content_dir: &std::path::Path) -> Result<RepairStats> {
    let mut stats = RepairStats::default();

    let mut entries: Vec<_> = std::fs::read_dir(content_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    entries.sort();

    for path in entries {
        let identity_key = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let content = std::fs::read_to_string(&path)?;
        let (repaired, repairs) = repair_document(&identity_key, &content)?;

        if repaired != content {
            std::fs::write(&path, &repaired)?;
        }
        stats.absorb(&repairs);
    }

    info!(
        "Repair pass: {} scanned, {} changed",
        stats.records_scanned, stats.records_changed
    );
    Ok(stats)
}
