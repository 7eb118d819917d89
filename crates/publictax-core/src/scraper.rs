//! Scrape orchestration
//!
//! This module drives a crawl across query prefixes and their result pages.
//! It combines the HTTP client with the parsers and turns every failure into
//! a logged, per-prefix outcome so callers always get the records collected
//! so far.

use tracing::{error, info, warn};

use crate::client::{ClientConfig, TaxClient};
use crate::error::{Result, TaxError};
use crate::parser::{parse_page_metadata, AccountExtractor, MissingFieldPolicy};
use crate::types::{
    AccountRecord, PageMetadata, PrefixOutcome, PrefixStatus, QuerySpec, ScrapeJob, ScrapeReport,
};

/// Crawls the public tax search portal.
///
/// Fetches are strictly sequential: one request is in flight at a time.
///
/// # Example
/// ```no_run
/// use publictax_core::{ScrapeJob, TaxScraper};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scraper = TaxScraper::new()?;
///     let records = scraper.scrape(&ScrapeJob::beta().with_page_limit(1)).await;
///     println!("Found {} accounts", records.len());
///     Ok(())
/// }
/// ```
pub struct TaxScraper {
    client: TaxClient,
    extractor: AccountExtractor,
}

impl TaxScraper {
    /// Create a new scraper with default configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default(), MissingFieldPolicy::default())
    }

    /// Create a scraper with a custom client configuration and field policy.
    ///
    /// Detail links are built against the configured base URL.
    pub fn with_config(config: ClientConfig, policy: MissingFieldPolicy) -> Result<Self> {
        let client = TaxClient::with_config(config)?;
        Self::with_client(client, policy)
    }

    /// Create a scraper around a pre-configured client.
    pub fn with_client(client: TaxClient, policy: MissingFieldPolicy) -> Result<Self> {
        let extractor = AccountExtractor::new(client.base_url(), policy)?;
        Ok(Self { client, extractor })
    }

    /// Run a job and return every record collected.
    ///
    /// Never fails: network and structural errors abort only the affected
    /// prefix and are reported through the log.
    pub async fn scrape(&self, job: &ScrapeJob) -> Vec<AccountRecord> {
        self.scrape_report(job).await.records
    }

    /// Run a job and return the records together with per-prefix outcomes.
    pub async fn scrape_report(&self, job: &ScrapeJob) -> ScrapeReport {
        let mut report = ScrapeReport::default();

        for prefix in &job.prefixes {
            let before = report.records.len();
            let status = self
                .scrape_prefix(prefix, job.page_limit, &mut report.records)
                .await;

            match &status {
                PrefixStatus::Completed { pages, records } => {
                    info!(prefix = prefix.trim(), pages, records, "Prefix completed");
                }
                PrefixStatus::NoResults => {
                    info!(prefix = prefix.trim(), "No results for prefix");
                }
                PrefixStatus::Aborted { page, error, .. } => {
                    error!(
                        prefix = prefix.trim(),
                        page,
                        kept = report.records.len() - before,
                        error = %error,
                        "Prefix crawl aborted"
                    );
                }
            }

            report.prefixes.push(PrefixOutcome {
                prefix: prefix.clone(),
                status,
            });
        }

        info!(
            prefixes = report.prefixes.len(),
            aborted = report.aborted_count(),
            records = report.records.len(),
            "Scrape finished"
        );
        report
    }

    /// Fetch one results page and extract its records.
    pub async fn fetch_page(&self, query: &QuerySpec) -> Result<Vec<AccountRecord>> {
        let html = self.client.fetch(query).await?;
        self.extractor.extract(&html, query.prefix(), query.page())
    }

    async fn scrape_prefix(
        &self,
        prefix: &str,
        page_limit: Option<u32>,
        records: &mut Vec<AccountRecord>,
    ) -> PrefixStatus {
        let before = records.len();
        let aborted = |page: u32, kept: usize, e: TaxError| PrefixStatus::Aborted {
            page,
            records: kept,
            error: e.to_string(),
        };

        let first = match QuerySpec::new(prefix, 1) {
            Ok(query) => query,
            Err(e) => return aborted(1, 0, e),
        };
        let prefix = first.prefix();

        let (metadata, first_page) = match self.discover(&first).await {
            Ok(Some(found)) => found,
            Ok(None) => return PrefixStatus::NoResults,
            Err(e) => return aborted(1, 0, e),
        };

        info!(
            prefix,
            total_results = metadata.total_results,
            total_pages = metadata.total_pages,
            "Discovered result pages"
        );
        append_page(prefix, 1, first_page, records);

        let last_page = metadata.last_page(page_limit);
        for page in 2..=last_page {
            let query = match QuerySpec::new(prefix, page) {
                Ok(query) => query,
                Err(e) => return aborted(page, records.len() - before, e),
            };
            match self.fetch_page(&query).await {
                Ok(page_records) => append_page(prefix, page, page_records, records),
                Err(e) => return aborted(page, records.len() - before, e),
            }
        }

        PrefixStatus::Completed {
            pages: last_page,
            records: records.len() - before,
        }
    }

    /// Fetch page 1, read its metadata and records.
    ///
    /// Returns `None` when the page reports neither results nor pages.
    async fn discover(
        &self,
        query: &QuerySpec,
    ) -> Result<Option<(PageMetadata, Vec<AccountRecord>)>> {
        let html = self.client.fetch(query).await?;
        let metadata = parse_page_metadata(&html)?;

        if metadata.is_empty() {
            return Ok(None);
        }
        if metadata.total_pages == 0 {
            return Err(TaxError::Structural(format!(
                "{} results reported for {} but pagination indicator unreadable",
                metadata.total_results,
                query.search_text()
            )));
        }

        if !metadata.has_results() {
            warn!(
                prefix = query.prefix(),
                total_pages = metadata.total_pages,
                "Result count unreadable, crawling reported pages"
            );
        }

        let records = self
            .extractor
            .extract(&html, query.prefix(), query.page())?;
        Ok(Some((metadata, records)))
    }
}

fn append_page(
    prefix: &str,
    page: u32,
    page_records: Vec<AccountRecord>,
    records: &mut Vec<AccountRecord>,
) {
    if page_records.is_empty() {
        warn!(prefix, page, "No real property accounts on page");
    } else {
        info!(prefix, page, records = page_records.len(), "Page scraped");
    }
    records.extend(page_records);
}
