use tempfile::TempDir;
use travel_ingest::rewrite::{MockGenerator, RewriteEngine};
use travel_ingest::tracker::{JsonFileStore, TrackerStore};
use travel_ingest::types::{FetchConfig, PipelineConfig, RewriteConfig};
use travel_ingest::{frontmatter, ImageResolver, IngestionPipeline};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feed_xml(server_uri: &str, items: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n\
         <title>Travel Wire</title>\n<link>https://example.com</link>\n\
         <description>Syndicated travel stories</description>\n",
    );
    for (title, slug, description) in items {
        xml.push_str(&format!(
            "<item><title>{}</title><link>{}/articles/{}</link>\
             <description>{}</description>\
             <guid>{}</guid>\
             <pubDate>Mon, 21 Jul 2025 08:00:00 GMT</pubDate></item>\n",
            title, server_uri, slug, description, slug
        ));
    }
    xml.push_str("</channel>\n</rss>\n");
    xml
}

fn article_html(lede: &str) -> String {
    format!(
        "<html><head><title>t</title></head><body>\
         <nav><p>Home News Destinations Newsletter Sign-up And More Links</p></nav>\
         <article>\
         <p>{} The walk in takes about forty minutes from the last bus stop.</p>\
         <p>Bring water and cash; the one kiosk on the headland closes whenever the owner goes fishing.</p>\
         </article>\
         <footer><p>Subscribe to our newsletter for weekly travel deals and updates</p></footer>\
         </body></html>",
        lede
    )
}

fn canned_rewrite() -> String {
    // Country and category intentionally omitted: the engine must default
    // them and the pipeline must map the defaults to Global / Travel.
    serde_json::json!({
        "title": "Hidden Beaches Worth the Ferry Ride",
        "summary": "Five coves you can still have to yourself.",
        "content": "Skip the marina crowds and ride the first ferry north.\n\nThe coves past the headland stay empty until noon.",
        "keywords": ["beaches", "ferries", "coves"],
        "metaTitle": "Hidden Beaches Guide",
        "metaDescription": "Five quiet coves reached by ferry."
    })
    .to_string()
}

struct TestHarness {
    _content_dir: TempDir,
    config: PipelineConfig,
}

impl TestHarness {
    fn new(server_uri: &str) -> Self {
        let content_dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            feed_url: format!("{}/feed.xml", server_uri),
            content_dir: content_dir.path().join("stories").display().to_string(),
            tracker_path: content_dir.path().join("tracker.json").display().to_string(),
            max_items_per_run: 10,
            item_delay_seconds: 0,
        };
        Self {
            _content_dir: content_dir,
            config,
        }
    }

    fn pipeline(&self) -> IngestionPipeline {
        let rewrite_config = RewriteConfig {
            retry_base_seconds: 0,
            ..Default::default()
        };
        let engine = RewriteEngine::new(Box::new(MockGenerator::new(canned_rewrite())), &rewrite_config);
        let tracker = JsonFileStore::new(&self.config.tracker_path);
        let resolver = ImageResolver::new(Box::new(tracker)).unwrap();

        let fetch_config = FetchConfig {
            min_request_interval_ms: 0,
            retry_delay_seconds: 0,
            ..Default::default()
        };

        IngestionPipeline::new(self.config.clone(), fetch_config, engine, resolver).unwrap()
    }
}

#[tokio::test]
async fn full_run_publishes_clean_items_and_screens_sensitive_ones() {
    let _ = tracing_subscriber::fmt().try_init();
    let server = MockServer::start().await;

    let feed = feed_xml(
        &server.uri(),
        &[
            (
                "Exploring Hidden Beaches",
                "exploring-hidden-beaches",
                "Quiet sand and clear water beyond the marina.",
            ),
            (
                "Earthquake Strikes Island Resort",
                "earthquake-strikes",
                "Damage reported across the region.",
            ),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles/exploring-hidden-beaches"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("The beaches north of town empty out by late August.")),
        )
        .mount(&server)
        .await;

    let harness = TestHarness::new(&server.uri());
    let mut pipeline = harness.pipeline();
    let report = pipeline.run_batch().await;

    assert_eq!(report.candidates, 2);
    assert_eq!(report.published, 1);
    assert_eq!(report.skipped_sensitive, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(report.sample_titles, vec!["Hidden Beaches Worth the Ferry Ride"]);

    // The sensitive item never cost a page fetch or a model call.
    let record = pipeline
        .store()
        .read("exploring-hidden-beaches")
        .unwrap()
        .expect("story should be persisted");

    assert_eq!(record.front.slug, "exploring-hidden-beaches");
    assert_eq!(record.front.story_type, "Travel", "unset category maps to Travel");
    assert_eq!(record.front.country, "Global", "Unknown country maps to Global");
    assert!(record.front.image_url.starts_with("https://"));
    let photographer = record.front.photographer.clone().unwrap();
    assert!(photographer.is_normalized());
    assert!(record.body.contains("ferry north"));

    // Image usage was flushed to the durable tracker.
    let tracker = JsonFileStore::new(&harness.config.tracker_path)
        .load()
        .unwrap();
    assert!(tracker
        .images
        .get(&record.front.image_url)
        .unwrap()
        .used_in_stories
        .contains("exploring-hidden-beaches"));
}

#[tokio::test]
async fn one_failing_item_does_not_abort_the_batch() {
    let _ = tracing_subscriber::fmt().try_init();
    let server = MockServer::start().await;

    let feed = feed_xml(
        &server.uri(),
        &[
            ("A Story That Breaks", "broken-page", "This article page will 404."),
            ("A Story That Works", "working-page", "This one is fine."),
        ],
    );

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&server)
        .await;
    // Only the second article exists; the first 404s.
    Mock::given(method("GET"))
        .and(path("/articles/working-page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("A perfectly ordinary cove with a perfectly ordinary cafe.")),
        )
        .mount(&server)
        .await;

    let harness = TestHarness::new(&server.uri());
    let mut pipeline = harness.pipeline();
    let report = pipeline.run_batch().await;

    assert_eq!(report.candidates, 2);
    assert_eq!(report.errors, 1);
    assert_eq!(report.published, 1);
}

#[tokio::test]
async fn rerun_does_not_republish_existing_stories() {
    let _ = tracing_subscriber::fmt().try_init();
    let server = MockServer::start().await;

    let feed = feed_xml(
        &server.uri(),
        &[(
            "Exploring Hidden Beaches",
            "exploring-hidden-beaches",
            "Quiet sand and clear water.",
        )],
    );

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles/exploring-hidden-beaches"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html("The beaches.")))
        .mount(&server)
        .await;

    let harness = TestHarness::new(&server.uri());

    let report = harness.pipeline().run_batch().await;
    assert_eq!(report.published, 1);

    // Fresh pipeline, same corpus: at-least-once delivery must not double
    // up on the same slug.
    let report = harness.pipeline().run_batch().await;
    assert_eq!(report.published, 0);
    assert_eq!(report.skipped_existing, 1);
}

#[tokio::test]
async fn missing_feed_url_degrades_to_an_empty_report() {
    let _ = tracing_subscriber::fmt().try_init();
    let server = MockServer::start().await;

    let mut harness = TestHarness::new(&server.uri());
    harness.config.feed_url = String::new();

    let report = harness.pipeline().run_batch().await;
    assert_eq!(report.candidates, 0);
    assert_eq!(report.errors, 0);
    assert_eq!(report.published, 0);
}

#[tokio::test]
async fn image_backfill_fixes_only_broken_records() {
    let _ = tracing_subscriber::fmt().try_init();

    let dir = TempDir::new().unwrap();
    let store = travel_ingest::ContentStore::new(dir.path().join("stories"));

    let good = "---\ntitle: Good Story\nsummary: S.\ndate: 2025-06-01T00:00:00Z\ncountry: Italy\ntype: Travel\nimageUrl: https://images.example.com/keep.jpg\nslug: good-story\nphotographer:\n  name: Keep Me\n  url: https://unsplash.com/@keepme\n---\n\nBody.\n";
    let broken = "---\ntitle: Broken Story\nsummary: S.\ndate: 2025-06-01T00:00:00Z\ncountry: Italy\ntype: Cruise\nimageUrl: \">-\"\nslug: broken-story\n---\n\nBody.\n";

    std::fs::create_dir_all(dir.path().join("stories")).unwrap();
    std::fs::write(dir.path().join("stories/good-story.md"), good).unwrap();
    std::fs::write(dir.path().join("stories/broken-story.md"), broken).unwrap();

    let tracker = JsonFileStore::new(dir.path().join("tracker.json"));
    let mut resolver = ImageResolver::new(Box::new(tracker)).unwrap();

    let updated = travel_ingest::run_image_backfill(&store, &mut resolver).unwrap();
    assert_eq!(updated, 1);

    let good_after = store.read("good-story").unwrap().unwrap();
    assert_eq!(good_after.front.image_url, "https://images.example.com/keep.jpg");

    let broken_after = store.read("broken-story").unwrap().unwrap();
    assert!(broken_after.front.image_url.starts_with("https://images.unsplash.com/"));
    let photographer = broken_after.front.photographer.unwrap();
    assert!(photographer.is_normalized());
    // Cruise record draws from the Cruise pool's photographers.
    match photographer {
        frontmatter::PhotographerField::Full(p) => {
            assert!(!p.name.is_empty());
            assert!(p.url.starts_with("https://unsplash.com/@"));
        }
        other => panic!("expected normalized photographer, got {:?}", other),
    }
}
