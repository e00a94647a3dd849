pub mod archive;
pub mod config;
pub mod crawler;
pub mod error;
pub mod markup;
pub mod models;
pub mod utils;

pub use archive::ChapterArchiver;
pub use config::{DownloadOptions, FetchPolicy, RetryPolicy, SiteSchema};
pub use crawler::{CatalogResolver, ChapterPager, Fetcher, HttpFetcher, MangaCrawler, RunSummary};
pub use error::{FetchError, PagerError, ResolveError};
pub use models::{ChapterCatalog, ChapterKey, ChapterLocator, DownloadRange, PageImageUrl};
