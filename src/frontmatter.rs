use crate::types::{Photographer, Result};
use serde::{Deserialize, Serialize};

/// Photographer credit as found in the wild: either the normalized
/// `{name, url}` object or a bare name string left behind by early pipeline
/// runs. The repair pass coerces the latter into the former.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhotographerField {
    Full(Photographer),
    Name(String),
}

impl PhotographerField {
    pub fn into_photographer(self, default_url: &str) -> Photographer {
        match self {
            Self::Full(p) => p,
            Self::Name(name) => Photographer {
                name,
                url: default_url.to_string(),
            },
        }
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

/// The structured header block of a persisted story. Every field is
/// tolerant of absence; the repair pass is responsible for filling holes.
/// `date` stays a raw string here so unparsable values survive long enough
/// to be repaired instead of killing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, rename = "type")]
    pub story_type: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_credit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photographer: Option<PhotographerField>,
}

/// Split a document into its raw YAML header and body. `None` when there is
/// no recognizable `---` block at all.
pub fn split_document(content: &str) -> Option<(&str, &str)> {
    let rest = content.trim_start_matches('\u{feff}');
    let rest = rest.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }

    // An opening delimiter with no closing one is not a recognizable block.
    None
}

/// Parse a document into frontmatter and body. `None` when the header block
/// is absent or the YAML does not deserialize; the repair pass treats both
/// the same way and synthesizes a fresh header.
pub fn parse_document(content: &str) -> Option<(Frontmatter, String)> {
    let (yaml, body) = split_document(content)?;
    let front: Frontmatter = serde_yaml::from_str(yaml).ok()?;
    Some((front, body.to_string()))
}

/// Render frontmatter and body back into the on-disk document format.
pub fn render_document(front: &Frontmatter, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(front)?;
    Ok(format!("---\n{}---\n\n{}\n", yaml, body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_header_and_body() {
        let doc = "---\ntitle: Hello\n---\n\nBody text here.\n";
        let (yaml, body) = split_document(doc).unwrap();
        assert_eq!(yaml, "title: Hello\n");
        assert_eq!(body.trim(), "Body text here.");
    }

    #[test]
    fn missing_header_is_none() {
        assert!(split_document("Just a body, no header.").is_none());
    }

    #[test]
    fn bare_string_photographer_deserializes() {
        let front: Frontmatter =
            serde_yaml::from_str("title: T\nphotographer: Jane Doe\n").unwrap();
        let field = front.photographer.unwrap();
        assert!(!field.is_normalized());
        assert_eq!(
            field.into_photographer("https://unsplash.com"),
            Photographer {
                name: "Jane Doe".to_string(),
                url: "https://unsplash.com".to_string(),
            }
        );
    }

    #[test]
    fn render_parse_round_trip() {
        let front = Frontmatter {
            title: "A Title".to_string(),
            summary: "A summary.".to_string(),
            date: "2026-01-01T00:00:00Z".to_string(),
            country: "Italy".to_string(),
            story_type: "Travel".to_string(),
            image_url: "https://images.example.com/a.jpg".to_string(),
            slug: "a-title".to_string(),
            keywords: vec!["rome".to_string()],
            photographer: Some(PhotographerField::Full(Photographer {
                name: "Jane Doe".to_string(),
                url: "https://unsplash.com/@janedoe".to_string(),
            })),
            ..Default::default()
        };

        let rendered = render_document(&front, "The body.").unwrap();
        let (parsed, body) = parse_document(&rendered).unwrap();
        assert_eq!(parsed, front);
        assert_eq!(body.trim(), "The body.");
    }
}
