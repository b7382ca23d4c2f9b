use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Per-image usage record. `used_in_stories` only ever grows; a reassignment
/// may supersede an entry but never silently removes history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUsage {
    pub photographer: String,
    pub category: String,
    #[serde(default, rename = "usedInStories")]
    pub used_in_stories: BTreeSet<String>,
}

/// Durable record of which stories consumed which images, shared across
/// runs. Read fully at session start, rewritten fully on every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageTracker {
    #[serde(default)]
    pub images: BTreeMap<String, ImageUsage>,
    #[serde(default, rename = "photographerToImage")]
    pub photographer_to_image: BTreeMap<String, String>,
    #[serde(default, rename = "usedImageUrls")]
    pub used_image_urls: BTreeSet<String>,
}

impl ImageTracker {
    /// The image already on record for a story, if any.
    pub fn assignment_for(&self, identity_key: &str) -> Option<(&str, &ImageUsage)> {
        self.images
            .iter()
            .find(|(_, usage)| usage.used_in_stories.contains(identity_key))
            .map(|(url, usage)| (url.as_str(), usage))
    }

    pub fn record_assignment(
        &mut self,
        identity_key: &str,
        image_url: &str,
        photographer: &str,
        category: &str,
    ) {
        let usage = self
            .images
            .entry(image_url.to_string())
            .or_insert_with(|| ImageUsage {
                photographer: photographer.to_string(),
                category: category.to_string(),
                used_in_stories: BTreeSet::new(),
            });
        usage.used_in_stories.insert(identity_key.to_string());

        self.photographer_to_image
            .insert(photographer.to_string(), image_url.to_string());
        self.used_image_urls.insert(image_url.to_string());
    }

    /// Release a pool's reservations once every member has been used, so
    /// rotation can start over. Usage history in `images` is untouched.
    pub fn reset_pool_reservations<'a>(&mut self, pool_urls: impl Iterator<Item = &'a str>) {
        for url in pool_urls {
            self.used_image_urls.remove(url);
        }
    }
}

/// Storage seam for the tracker. Injected into the resolver so tests can run
/// against memory instead of disk.
pub trait TrackerStore: Send + Sync {
    fn load(&self) -> Result<ImageTracker>;
    fn save(&self, tracker: &ImageTracker) -> Result<()>;
}

/// File-backed store: one JSON document, read and written wholesale. Not
/// safe under concurrent processes; the serial batch model is the guard.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TrackerStore for JsonFileStore {
    fn load(&self) -> Result<ImageTracker> {
        if !self.path.exists() {
            debug!("No tracker file at {}, starting empty", self.path.display());
            return Ok(ImageTracker::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(tracker) => Ok(tracker),
            Err(e) => {
                // A corrupt tracker must not block publication; assignments
                // will be rebuilt as stories are (re)processed.
                warn!(
                    "Tracker file {} is unreadable ({}), starting empty",
                    self.path.display(),
                    e
                );
                Ok(ImageTracker::default())
            }
        }
    }

    fn save(&self, tracker: &ImageTracker) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(tracker)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<ImageTracker>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackerStore for MemoryStore {
    fn load(&self) -> Result<ImageTracker> {
        Ok(self.inner.lock().expect("tracker lock").clone())
    }

    fn save(&self, tracker: &ImageTracker) -> Result<()> {
        *self.inner.lock().expect("tracker lock") = tracker.clone();
        Ok(())
    }
}
