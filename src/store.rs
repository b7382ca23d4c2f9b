use crate::frontmatter::{self, Frontmatter};
use crate::types::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A complete persisted story: header plus untouched body, addressed by
/// slug. The slug doubles as the filename stem and the identity key.
#[derive(Debug, Clone)]
pub struct StoryRecord {
    pub slug: String,
    pub front: Frontmatter,
    pub body: String,
}

/// Markdown-file persistence for the story corpus: one file per story,
/// `<slug>.md`, structured header followed by the body.
pub struct ContentStore {
    content_dir: PathBuf,
}

impl ContentStore {
    pub fn new(content_dir: impl AsRef<Path>) -> Self {
        Self {
            content_dir: content_dir.as_ref().to_path_buf(),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.content_dir.join(format!("{}.md", slug))
    }

    pub fn exists(&self, slug: &str) -> bool {
        self.path_for(slug).exists()
    }

    pub fn write(&self, record: &StoryRecord) -> Result<()> {
        std::fs::create_dir_all(&self.content_dir)?;
        let rendered = frontmatter::render_document(&record.front, &record.body)?;
        let path = self.path_for(&record.slug);
        std::fs::write(&path, rendered)?;
        info!("Persisted story: {}", path.display());
        Ok(())
    }

    /// Load a story by slug. `None` when the file is missing; a file whose
    /// header cannot be parsed comes back with a default header and the raw
    /// content as body, ready for the repair pass.
    pub fn read(&self, slug: &str) -> Result<Option<StoryRecord>> {
        let path = self.path_for(slug);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let (front, body) = match frontmatter::parse_document(&content) {
            Some(parsed) => parsed,
            None => {
                debug!("{}: unparsable header", slug);
                (Frontmatter::default(), content)
            }
        };

        Ok(Some(StoryRecord {
            slug: slug.to_string(),
            front,
            body,
        }))
    }

    /// All story slugs in the corpus, sorted for stable batch ordering.
    pub fn list_slugs(&self) -> Result<Vec<String>> {
        if !self.content_dir.exists() {
            return Ok(Vec::new());
        }

        let mut slugs: Vec<String> = std::fs::read_dir(&self.content_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(|s| s.to_string()))
            .collect();
        slugs.sort();

        Ok(slugs)
    }
}
