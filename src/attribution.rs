use crate::tracker::{ImageTracker, TrackerStore};
use crate::types::{ImageAssignment, ImagePoolEntry, Photographer, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Closed set of image pools. Free-form category strings from the model or
/// from legacy frontmatter are folded into one of these by `classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolCategory {
    Cruise,
    FoodWine,
    Adventure,
    Culture,
    Travel,
}

impl PoolCategory {
    /// Substring heuristic over the raw category value. Many-to-one by
    /// design: unknown and composite categories land in the Travel pool.
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        if lowered.contains("cruise") {
            Self::Cruise
        } else if lowered.contains("food") || lowered.contains("wine") {
            Self::FoodWine
        } else if lowered.contains("adventure") {
            Self::Adventure
        } else if lowered.contains("culture") {
            Self::Culture
        } else {
            Self::Travel
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cruise => "Cruise",
            Self::FoodWine => "Food & Wine",
            Self::Adventure => "Adventure",
            Self::Culture => "Culture",
            Self::Travel => "Travel",
        }
    }
}

// Curated pools: (photographer, profile URL, image URL). The profile URL is
// a hand-maintained mapping per photographer, never derived from the image.
// Within a pool, each image belongs to exactly one photographer.
const TRAVEL_POOL: &[(&str, &str, &str)] = &[
    ("Anete Lusina", "https://unsplash.com/@anete_lusina", "https://images.unsplash.com/photo-1488646953014-85cb44e25828"),
    ("Jared Rice", "https://unsplash.com/@jareddrice", "https://images.unsplash.com/photo-1507525428034-b723cf961d3e"),
    ("Luca Bravo", "https://unsplash.com/@lucabravo", "https://images.unsplash.com/photo-1469474968028-56623f02e42e"),
    ("Tom Barrett", "https://unsplash.com/@wistomsin", "https://images.unsplash.com/photo-1502920917128-1aa500764cbd"),
    ("Sime Basioli", "https://unsplash.com/@basecore", "https://images.unsplash.com/photo-1476514525535-07fb3b4ae5f1"),
    ("Dino Reichmuth", "https://unsplash.com/@dinoreichmuth", "https://images.unsplash.com/photo-1469854523086-cc02fe5d8800"),
    ("Annie Spratt", "https://unsplash.com/@anniespratt", "https://images.unsplash.com/photo-1502082553048-f009c37129b9"),
    ("Jaime Reimer", "https://unsplash.com/@jaimereimer", "https://images.unsplash.com/photo-1533587851505-d119e13fa0d7"),
];

const CRUISE_POOL: &[(&str, &str, &str)] = &[
    ("Alonso Reyes", "https://unsplash.com/@alonsoreyes", "https://images.unsplash.com/photo-1548574505-5e239809ee19"),
    ("Josiah Weiss", "https://unsplash.com/@jweiss19", "https://images.unsplash.com/photo-1599640842225-85d111c60e6b"),
    ("Peter Hansen", "https://unsplash.com/@peterhansen", "https://images.unsplash.com/photo-1559599746-8823b38544c6"),
    ("Vidar Nordli-Mathisen", "https://unsplash.com/@vidarnm", "https://images.unsplash.com/photo-1514214246283-d427a95c5d2f"),
    ("Zorik D", "https://unsplash.com/@zorik", "https://images.unsplash.com/photo-1580541832626-2a7131ee809f"),
];

const FOOD_WINE_POOL: &[(&str, &str, &str)] = &[
    ("Brooke Lark", "https://unsplash.com/@brookelark", "https://images.unsplash.com/photo-1414235077428-338989a2e8c0"),
    ("Kelsey Knight", "https://unsplash.com/@kelseyannvere", "https://images.unsplash.com/photo-1510812431401-41d2bd2722f3"),
    ("Jay Wennington", "https://unsplash.com/@jaywennington", "https://images.unsplash.com/photo-1504674900247-0877df9cc836"),
    ("Lefteris Kallergis", "https://unsplash.com/@lefterisk", "https://images.unsplash.com/photo-1481931098730-318b6f776db0"),
    ("Rod Long", "https://unsplash.com/@rodlong", "https://images.unsplash.com/photo-1506377247377-2a5b3b417ebb"),
];

const ADVENTURE_POOL: &[(&str, &str, &str)] = &[
    ("Holly Mandarich", "https://unsplash.com/@hollymandarich", "https://images.unsplash.com/photo-1551632811-561732d1e306"),
    ("Jakob Owens", "https://unsplash.com/@jakobowens1", "https://images.unsplash.com/photo-1502680390469-be75c86b636f"),
    ("Flo Maderebner", "https://unsplash.com/@flomaderebner", "https://images.unsplash.com/photo-1473773508845-188df298d2d1"),
    ("Patrick Hendry", "https://unsplash.com/@worldsbetweenlines", "https://images.unsplash.com/photo-1464822759023-fed622ff2c3b"),
    ("Marc Zimmer", "https://unsplash.com/@mrc_zmm", "https://images.unsplash.com/photo-1522163182402-834f871fd851"),
];

const CULTURE_POOL: &[(&str, &str, &str)] = &[
    ("Raimond Klavins", "https://unsplash.com/@raimondklavins", "https://images.unsplash.com/photo-1552832230-c0197dd311b5"),
    ("Heidi Kaden", "https://unsplash.com/@heidikaden", "https://images.unsplash.com/photo-1533929736458-ca588d08c8be"),
    ("Diego Gennaro", "https://unsplash.com/@diegogennaro", "https://images.unsplash.com/photo-1528181304800-259b08848526"),
    ("Shripal Daphtary", "https://unsplash.com/@shripal", "https://images.unsplash.com/photo-1524492412937-b28074a5d7da"),
    ("Kit Suman", "https://unsplash.com/@cobblepot", "https://images.unsplash.com/photo-1545893835-abaa50cbe628"),
];

/// Last-resort pair when even the Travel pool is unavailable. Image
/// assignment must never block publication.
pub const DEFAULT_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1488646953014-85cb44e25828";

pub fn default_photographer() -> Photographer {
    Photographer {
        name: "Anete Lusina".to_string(),
        url: "https://unsplash.com/@anete_lusina".to_string(),
    }
}

fn build_pools() -> HashMap<PoolCategory, Vec<ImagePoolEntry>> {
    let mut pools = HashMap::new();
    for (category, table) in [
        (PoolCategory::Travel, TRAVEL_POOL),
        (PoolCategory::Cruise, CRUISE_POOL),
        (PoolCategory::FoodWine, FOOD_WINE_POOL),
        (PoolCategory::Adventure, ADVENTURE_POOL),
        (PoolCategory::Culture, CULTURE_POOL),
    ] {
        let entries = table
            .iter()
            .map(|(name, profile, image)| ImagePoolEntry {
                photographer: Photographer {
                    name: name.to_string(),
                    url: profile.to_string(),
                },
                image_url: image.to_string(),
            })
            .collect();
        pools.insert(category, entries);
    }
    pools
}

/// Stable hash of the identity key: sum of char codes. Cheap, deterministic
/// across runs, and spreads starting positions well enough for small pools.
fn identity_hash(identity_key: &str) -> usize {
    identity_key.chars().map(|c| c as usize).sum()
}

/// Assigns images and photographer credit to stories, spreading reuse fairly
/// across each category pool. Stateful through the injected tracker store:
/// every mutation is flushed before the assignment is returned.
pub struct ImageResolver {
    pools: HashMap<PoolCategory, Vec<ImagePoolEntry>>,
    store: Box<dyn TrackerStore>,
    tracker: ImageTracker,
}

impl ImageResolver {
    pub fn new(store: Box<dyn TrackerStore>) -> Result<Self> {
        let tracker = store.load()?;
        info!(
            "Image resolver loaded tracker: {} images, {} reserved",
            tracker.images.len(),
            tracker.used_image_urls.len()
        );
        Ok(Self {
            pools: build_pools(),
            store,
            tracker,
        })
    }

    /// Custom pools, for tests and themed sites.
    pub fn with_pools(
        store: Box<dyn TrackerStore>,
        pools: HashMap<PoolCategory, Vec<ImagePoolEntry>>,
    ) -> Result<Self> {
        let tracker = store.load()?;
        Ok(Self {
            pools,
            store,
            tracker,
        })
    }

    /// Assign an image and credit to a story. A story that already holds an
    /// assignment keeps it; a new story gets the first unreserved image in
    /// its pool, scanning from a position derived from the identity key.
    /// When the whole pool is reserved, the pool's reservations are cleared
    /// and rotation starts over rather than failing.
    pub fn assign_image(&mut self, identity_key: &str, category: &str) -> Result<ImageAssignment> {
        if let Some((url, usage)) = self.tracker.assignment_for(identity_key) {
            debug!("{} already assigned {}", identity_key, url);
            let photographer = Photographer {
                name: usage.photographer.clone(),
                url: self.profile_url_for(&usage.photographer),
            };
            return Ok(ImageAssignment {
                image_url: url.to_string(),
                photographer,
            });
        }

        let pool_category = PoolCategory::classify(category);
        let (entry, pool_used) = match self.pick_from_pool(identity_key, pool_category) {
            Some(entry) => (entry, pool_category),
            None => {
                // Empty or missing pool: fall back to Travel, then to the
                // hardcoded pair. Never an error.
                warn!(
                    "Pool {:?} unavailable, falling back to Travel",
                    pool_category
                );
                match self.pick_from_pool(identity_key, PoolCategory::Travel) {
                    Some(entry) => (entry, PoolCategory::Travel),
                    None => (
                        ImagePoolEntry {
                            photographer: default_photographer(),
                            image_url: DEFAULT_IMAGE_URL.to_string(),
                        },
                        PoolCategory::Travel,
                    ),
                }
            }
        };

        self.tracker.record_assignment(
            identity_key,
            &entry.image_url,
            &entry.photographer.name,
            pool_used.label(),
        );
        self.store.save(&self.tracker)?;

        debug!(
            "Assigned {} -> {} (by {})",
            identity_key, entry.image_url, entry.photographer.name
        );
        Ok(ImageAssignment {
            image_url: entry.image_url,
            photographer: entry.photographer,
        })
    }

    fn pick_from_pool(
        &mut self,
        identity_key: &str,
        category: PoolCategory,
    ) -> Option<ImagePoolEntry> {
        let pool = self.pools.get(&category)?;
        if pool.is_empty() {
            return None;
        }

        let start = identity_hash(identity_key) % pool.len();

        for offset in 0..pool.len() {
            let entry = &pool[(start + offset) % pool.len()];
            if !self.tracker.used_image_urls.contains(&entry.image_url) {
                return Some(entry.clone());
            }
        }

        // Exhaustion-and-reset: every image in this pool has been used at
        // least once, so reuse may begin again from the start.
        info!("Pool {:?} exhausted, resetting reservations", category);
        let urls: Vec<String> = pool.iter().map(|e| e.image_url.clone()).collect();
        self.tracker
            .reset_pool_reservations(urls.iter().map(|u| u.as_str()));

        let pool = self.pools.get(&category)?;
        Some(pool[start].clone())
    }

    /// Fixed photographer → profile URL mapping, looked up across all pools.
    fn profile_url_for(&self, photographer_name: &str) -> String {
        for pool in self.pools.values() {
            for entry in pool {
                if entry.photographer.name == photographer_name {
                    return entry.photographer.url.clone();
                }
            }
        }
        "https://unsplash.com".to_string()
    }

    pub fn tracker(&self) -> &ImageTracker {
        &self.tracker
    }
}
