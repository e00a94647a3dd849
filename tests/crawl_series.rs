use async_trait::async_trait;
use mangafox_fetch::crawler::parser::CatalogResolver;
use mangafox_fetch::{
    ChapterKey, DownloadOptions, DownloadRange, FetchError, Fetcher, MangaCrawler, SiteSchema,
};
use std::collections::HashMap;
use std::fs::{self, File};
use std::sync::{Arc, Mutex};
use zip::ZipArchive;

const SITE: &str = "http://mangafox.me/";

#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, Vec<u8>>,
    hits: Mutex<Vec<String>>,
}

impl FakeSite {
    fn page(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.pages.insert(url.into(), body.into());
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.hits.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Newest-first listing with a fractional side story.
fn tower_of_god() -> FakeSite {
    let mut site = FakeSite::default();
    site.page(
        format!("{SITE}manga/tower_of_god/?no_warning=1"),
        r#"<html><body><div id="chapters"><ul class="chlist">
            <li><a class="tips" href="http://mangafox.me/manga/tower_of_god/v01/c003/1.html">Tower of God 3</a></li>
            <li><a class="tips" href="http://mangafox.me/manga/tower_of_god/v01/c002.5/1.html">Tower of God 2.5</a></li>
            <li><a class="tips" href="http://mangafox.me/manga/tower_of_god/v01/c002/1.html">Tower of God 2</a></li>
            <li><a class="tips" href="http://mangafox.me/manga/tower_of_god/v01/c001/1.html">Tower of God 1</a></li>
        </ul></div></body></html>"#,
    );

    for (chapter, pages) in [("001", 2), ("002", 3), ("002.5", 1), ("003", 2)] {
        let base = format!("{SITE}manga/tower_of_god/v01/c{chapter}/");
        let options: String = (0..=pages)
            .map(|p| format!(r#"<option value="{p}">{p}</option>"#))
            .collect();
        site.page(base.clone(), format!(r#"<select class="m">{options}</select>"#));
        for p in 1..=pages {
            let image = format!("http://img.test/tog/{chapter}/{p:02}.jpg");
            site.page(
                format!("{base}{p}.html"),
                format!(r#"<div id="viewer"><a><img id="image" src="{image}"></a></div>"#),
            );
            site.page(image, format!("tog {chapter} page {p}"));
        }
    }
    site
}

fn keys(list: &[ChapterKey]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn catalog_is_ascending_and_unique() {
    let resolver = CatalogResolver::new(Arc::new(tower_of_god()), SiteSchema::default());
    let catalog = resolver.resolve("Tower of God").await.unwrap();
    let listed: Vec<String> = catalog.keys().map(ToString::to_string).collect();
    assert_eq!(listed, ["1", "2", "2.5", "3"]);
}

#[tokio::test]
async fn ranged_download_with_archives_is_reproducible() {
    let out = tempfile::tempdir().unwrap();
    let site = Arc::new(tower_of_god());
    let crawler = MangaCrawler::new(
        site.clone(),
        SiteSchema::default(),
        DownloadOptions {
            output_dir: out.path().to_path_buf(),
            archive: true,
            delete_after_archive: false,
        },
    );
    let range = DownloadRange::new("2".parse().unwrap(), Some("2.5".parse().unwrap())).unwrap();

    let summary = crawler.crawl_series("tower-of-god", &range).await.unwrap();
    assert_eq!(keys(&summary.completed), ["2", "2.5"]);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.images, 4);

    let series = out.path().join("tower_of_god");
    assert_eq!(
        fs::read_to_string(series.join("002").join("002.jpg")).unwrap(),
        "tog 002 page 3"
    );
    assert_eq!(
        fs::read_to_string(series.join("002.5").join("000.jpg")).unwrap(),
        "tog 002.5 page 1"
    );

    let archive_path = series.join("002.cbz");
    let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, ["000.jpg", "001.jpg", "002.jpg"]);

    let before = fs::read(&archive_path).unwrap();
    crawler.crawl_series("Tower of God", &range).await.unwrap();
    assert_eq!(fs::read(&archive_path).unwrap(), before);

    // the comments page (value 0) is never requested
    assert!(!site.hits.lock().unwrap().iter().any(|url| url.ends_with("/0.html")));
}
