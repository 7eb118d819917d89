//! Data types for the public tax scraper
//!
//! This module contains all the core data structures used throughout the library.
//! Output types implement Serialize and Deserialize so export collaborators
//! can consume them directly.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaxError};

/// Wildcard marker appended to every query prefix
pub const WILDCARD: char = '%';

/// Property type retained by the record extractor
pub const REAL_PROPERTY: &str = "Real";

/// Identifies one search request: a name prefix and a 1-based page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    prefix: String,
    page: u32,
}

impl QuerySpec {
    /// Create a validated query.
    ///
    /// # Errors
    /// * `TaxError::InvalidQuery` if the prefix is blank or the page is 0
    pub fn new(prefix: &str, page: u32) -> Result<Self> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(TaxError::InvalidQuery(
                "query prefix cannot be empty".to_string(),
            ));
        }
        if page == 0 {
            return Err(TaxError::InvalidQuery(
                "page must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            page,
        })
    }

    /// The bare prefix, without wildcard
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Search text sent to the endpoint: prefix followed by the wildcard
    pub fn search_text(&self) -> String {
        format!("{}{}", self.prefix, WILDCARD)
    }
}

/// Result totals read from the first page of a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Total number of matching accounts
    pub total_results: u32,
    /// Total number of result pages
    pub total_pages: u32,
}

impl PageMetadata {
    pub fn new(total_results: u32, total_pages: u32) -> Self {
        Self {
            total_results,
            total_pages,
        }
    }

    /// Whether the query matched anything at all
    pub fn has_results(&self) -> bool {
        self.total_results > 0
    }

    /// Neither a result count nor a page count: the query matched nothing
    pub fn is_empty(&self) -> bool {
        self.total_results == 0 && self.total_pages == 0
    }

    /// Last page to crawl, bounded by an optional page limit.
    ///
    /// A limit of 0 is treated as 1: the first page is always fetched.
    pub fn last_page(&self, page_limit: Option<u32>) -> u32 {
        match page_limit {
            Some(limit) => self.total_pages.min(limit.max(1)),
            None => self.total_pages,
        }
    }
}

/// One property tax account scraped from a results page.
///
/// Serialized field names match the export columns
/// (`Query`, `Page`, `Acct`, `Due`, `Owner`, `Type`, `Location`, `Link`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Prefix that produced this record, with the wildcard marker
    #[serde(rename = "Query")]
    pub query_prefix: String,
    /// Page on which the record was found
    #[serde(rename = "Page")]
    pub page: u32,
    /// Tax account number
    #[serde(rename = "Acct")]
    pub account_number: String,
    /// Amount due, exactly as displayed (e.g. "$1,234.56")
    #[serde(rename = "Due")]
    pub amount_due: String,
    /// Owner name, if the card shows one
    #[serde(rename = "Owner")]
    pub owner_name: Option<String>,
    /// Property type; always "Real" for emitted records
    #[serde(rename = "Type")]
    pub property_type: String,
    /// Property address
    #[serde(rename = "Location")]
    pub location: String,
    /// Account details URL
    #[serde(rename = "Link")]
    pub detail_link: String,
}

/// Named scrape job: the prefixes to crawl and an optional page limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeJob {
    /// Query prefixes, crawled in order
    pub prefixes: Vec<String>,
    /// Maximum number of pages per prefix (None = all pages)
    pub page_limit: Option<u32>,
}

impl ScrapeJob {
    /// Job over an explicit list of prefixes with no page limit
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            page_limit: None,
        }
    }

    /// Every single alphanumeric prefix: `0`-`9` then `A`-`Z`
    pub fn full() -> Self {
        Self::new(('0'..='9').chain('A'..='Z').map(String::from))
    }

    /// Reduced job over the single prefix `0`
    pub fn beta() -> Self {
        Self::new(["0"])
    }

    /// Limit every prefix to its first `limit` pages
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }
}

/// How one prefix's crawl ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrefixStatus {
    /// Every page up to the bound was crawled
    Completed {
        /// Number of pages fetched
        pages: u32,
        /// Records kept from this prefix
        records: usize,
    },
    /// The query matched no accounts
    NoResults,
    /// The crawl stopped at `page` because of an error
    Aborted {
        /// Page whose fetch or parse failed
        page: u32,
        /// Records kept from earlier pages
        records: usize,
        /// Display text of the error
        error: String,
    },
}

/// Per-prefix outcome of a scrape run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixOutcome {
    pub prefix: String,
    #[serde(flatten)]
    pub status: PrefixStatus,
}

/// Records of a scrape run plus an audit trail of what happened per prefix
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub records: Vec<AccountRecord>,
    pub prefixes: Vec<PrefixOutcome>,
}

impl ScrapeReport {
    /// Number of prefixes whose crawl was aborted
    pub fn aborted_count(&self) -> usize {
        self.prefixes
            .iter()
            .filter(|p| matches!(p.status, PrefixStatus::Aborted { .. }))
            .count()
    }
}
