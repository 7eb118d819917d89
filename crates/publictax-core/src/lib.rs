//! Public Tax Scraper Core Library
//!
//! This crate retrieves property tax account records from a county public
//! tax search portal.
//!
//! # Features
//! - Paginated owner-name prefix searches restricted to unpaid, active accounts
//! - Result and page totals read from the pagination indicator
//! - Positional account card extraction driven by a declarative schema
//! - Best-effort orchestration: failures abort one prefix, never the caller
//! - Optional retry with exponential backoff and request pacing

pub mod client;
pub mod error;
pub mod parser;
pub mod scraper;
pub mod types;

// Re-export main types for convenience
pub use crate::client::{ClientConfig, RateLimiter, RetryPolicy, TaxClient};
pub use crate::error::{Result, TaxError};
pub use crate::parser::{AccountExtractor, MissingFieldPolicy};
pub use crate::scraper::TaxScraper;
pub use crate::types::{
    AccountRecord, PageMetadata, PrefixOutcome, PrefixStatus, QuerySpec, ScrapeJob, ScrapeReport,
};
