use publictax_core::{ClientConfig, MissingFieldPolicy, ScrapeJob, TaxScraper};
use tracing_subscriber::EnvFilter;

// Usage: cargo run --example beta_scrape -- [full] [page_limit]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut job = if args.iter().any(|a| a == "full") {
        ScrapeJob::full()
    } else {
        ScrapeJob::beta()
    };
    if let Some(limit) = args.iter().find_map(|a| a.parse::<u32>().ok()) {
        job = job.with_page_limit(limit);
    }

    let scraper = TaxScraper::with_config(ClientConfig::from_env(), MissingFieldPolicy::Fail)?;
    let report = scraper.scrape_report(&job).await;

    for outcome in &report.prefixes {
        eprintln!("{}: {:?}", outcome.prefix, outcome.status);
    }

    if report.records.is_empty() {
        eprintln!("No results found.");
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&report.records)?);
    eprintln!("Total records: {}", report.records.len());

    Ok(())
}
