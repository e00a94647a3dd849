use anyhow::Result;
use clap::Parser;
use mangafox_fetch::{
    ChapterKey, DownloadOptions, DownloadRange, FetchPolicy, HttpFetcher, MangaCrawler, RetryPolicy,
    SiteSchema,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

/// Download a series chapter by chapter.
#[derive(Parser)]
#[clap(version, about)]
struct Opts {
    /// Series name, e.g. "one piece" or one-piece
    series: String,
    /// First chapter to download
    #[clap(short, long, default_value = "1")]
    start: ChapterKey,
    /// Last chapter to download (defaults to the newest)
    #[clap(short, long)]
    end: Option<ChapterKey>,
    /// Download a single chapter
    #[clap(short, long, conflicts_with_all = ["start", "end"])]
    chapter: Option<ChapterKey>,
    /// Only print the chapter list
    #[clap(short, long)]
    list: bool,
    /// Print the chapter list as JSON
    #[clap(long, requires = "list")]
    json: bool,
    /// Pack each chapter into a .cbz
    #[clap(long)]
    cbz: bool,
    /// Delete chapter images once packed
    #[clap(long, requires = "cbz")]
    delete: bool,
    #[clap(short, long, default_value = ".")]
    output: PathBuf,
    /// Milliseconds between requests
    #[clap(long, default_value_t = 2000)]
    delay_ms: u64,
    /// Attempts per request for transient failures
    #[clap(long, default_value_t = 4)]
    retries: u32,
    /// JSON file overriding the site schema
    #[clap(long)]
    schema: Option<PathBuf>,
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();

    let default_level = if opts.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: Opts) -> Result<()> {
    let schema = match &opts.schema {
        Some(path) => SiteSchema::from_json_file(path)?,
        None => SiteSchema::default(),
    };

    let delay = Duration::from_millis(opts.delay_ms);
    let policy = FetchPolicy {
        request_delay: delay,
        retry: RetryPolicy {
            max_attempts: opts.retries.max(1),
            initial_delay: delay.max(Duration::from_millis(500)),
            ..RetryPolicy::default()
        },
        ..FetchPolicy::default()
    };
    let fetcher = Arc::new(HttpFetcher::new(policy)?);

    let options = DownloadOptions {
        output_dir: opts.output.clone(),
        archive: opts.cbz,
        delete_after_archive: opts.delete,
    };
    let crawler = MangaCrawler::new(fetcher, schema, options);

    if opts.list {
        let catalog = crawler.fetch_catalog(&opts.series).await?;
        if opts.json {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        } else {
            for (key, locator) in catalog.iter() {
                println!("{:>8}  {}", key.to_string(), locator);
            }
        }
        return Ok(());
    }

    let range = match opts.chapter {
        Some(chapter) => DownloadRange::single(chapter),
        None => DownloadRange::new(opts.start, opts.end)?,
    };

    let summary = crawler.crawl_series(&opts.series, &range).await?;
    if !summary.skipped.is_empty() {
        let skipped: Vec<String> = summary.skipped.iter().map(ToString::to_string).collect();
        tracing::warn!("skipped chapters: {}", skipped.join(", "));
    }
    Ok(())
}
