mod arguments;

use anyhow::{Context, bail};
use arguments::Args;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use minidb_client::{CacheStore, PortalClient};
use minidb_core::config::Config;
use minidb_core::crawl::Crawler;
use minidb_core::profile::ProfileSet;
use minidb_core::report::{
    ReportFormat, gather_report_data, generate_json_report, generate_text_report, save_report,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let format = match ReportFormat::from_str(&args.format) {
        Some(format) => format,
        None => bail!("unknown report format '{}'", args.format),
    };

    let config = Config::load(&args.conf_file)?;

    let cache_path = shellexpand::tilde(&args.cache_db).into_owned();
    let cache_path = Path::new(&cache_path);
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory {}", parent.display()))?;
    }
    let cache = CacheStore::open(cache_path)?;

    let mut client = PortalClient::new(&config.endpoint)?.with_cache(cache);
    if let (Some(key), Some(secret)) = (args.key, args.secret) {
        client = client.with_credentials(key, secret);
    }

    let schema_doc = client.get(&config.profiles_query).await?;
    let mut set = ProfileSet::from_schema_document(&schema_doc, &config.subsampling)?;
    set.resolve(&client, &config.subsampling).await?;
    if !args.quiet {
        println!(
            "{} Resolved {} profiles from {}",
            "✓".green().bold(),
            set.profiles.len(),
            config.endpoint
        );
    }

    let mut crawler = Crawler::new(&client).with_max_depth(args.max_depth);

    let spinner = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("static spinner template"),
        );
        pb.set_message("Crawling...");
        Some(Arc::new(pb))
    };

    if let Some(pb) = &spinner {
        let pb = pb.clone();
        let recorded = Arc::new(AtomicUsize::new(0));
        crawler = crawler.with_progress_callback(Arc::new(move |profile: String, uuid: String| {
            let count = recorded.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_message(format!("Crawling... {} objects ({}/{})", count, profile, uuid));
            pb.tick();
        }));
    }

    crawler.crawl(&mut set).await?;

    if let Some(pb) = &spinner {
        pb.finish_with_message(format!("Crawl complete! {} objects retained", set.total_objects()));
    }

    let metrics = client.metrics();
    info!(
        "Cache: {} hits, {} misses, {} upstream requests, {} retries",
        metrics.cache_hits, metrics.cache_misses, metrics.upstream_requests, metrics.retries
    );

    let data = gather_report_data(&set, client.endpoint());
    let rendered = match format {
        ReportFormat::Text => generate_text_report(&data, args.hide_empty),
        ReportFormat::Json => generate_json_report(&data)?,
    };

    match &args.output {
        Some(path) => {
            save_report(&rendered, path)
                .with_context(|| format!("writing report to {}", path.display()))?;
            if !args.quiet {
                println!("{} Report saved to {}", "✓".green().bold(), path.display());
            }
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
