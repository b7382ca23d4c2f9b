/// Derive a filesystem-safe slug from a story title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true; // suppress a leading dash

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Reverse of slugify, for synthesizing a title when a record has none:
/// de-hyphenate and title-case each word.
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text helpers shared by the rewrite parser and the repair pass.
pub mod text {
    /// First sentence of a body, for summary backfill.
    pub fn first_sentence(text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        match trimmed.find(['.', '!', '?']) {
            Some(end) => Some(trimmed[..=end].trim().to_string()),
            None => Some(smart_truncate(trimmed, 160)),
        }
    }

    /// First non-empty paragraph of a body.
    pub fn first_paragraph(text: &str) -> Option<String> {
        text.split("\n\n")
            .map(str::trim)
            .find(|p| !p.is_empty())
            .map(|p| p.to_string())
    }

    /// Truncate text to a maximum length, preferring sentence or word
    /// boundaries over a hard cut.
    pub fn smart_truncate(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            return text.to_string();
        }

        // Don't split a multi-byte character.
        let mut cut = max_length;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let truncated = &text[..cut];

        if let Some(last_sentence) = truncated.rfind('.') {
            truncated[..last_sentence + 1].to_string()
        } else if let Some(last_space) = truncated.rfind(' ') {
            format!("{}...", &truncated[..last_space])
        } else {
            format!("{}...", truncated)
        }
    }

    /// Collapse runs of whitespace into single spaces.
    pub fn normalize_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_punctuation_and_case() {
        assert_eq!(slugify("Exploring Hidden Beaches!"), "exploring-hidden-beaches");
        assert_eq!(slugify("  Rome: A City Guide  "), "rome-a-city-guide");
        assert_eq!(slugify("***"), "untitled");
    }

    #[test]
    fn title_from_slug_round_trips_words() {
        assert_eq!(title_from_slug("exploring-hidden-beaches"), "Exploring Hidden Beaches");
        assert_eq!(title_from_slug("a--double"), "A Double");
    }

    #[test]
    fn first_sentence_stops_at_terminator() {
        assert_eq!(
            text::first_sentence("One sentence. Another one."),
            Some("One sentence.".to_string())
        );
        assert_eq!(text::first_sentence("   "), None);
    }
}
