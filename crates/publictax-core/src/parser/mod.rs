//! HTML parsers for public tax search pages
//!
//! This module contains parsers for extracting data from search results pages:
//! - `pagination`: Parse result and page totals
//! - `accounts`: Parse account cards into records

pub mod accounts;
pub mod pagination;

// Re-export main parsing functions
pub use accounts::{
    detail_link, parse_account_records, AccountExtractor, CardField, Extraction, FieldRule,
    MissingFieldPolicy, CARD_SCHEMA, MISSING_SENTINEL,
};
pub use pagination::{extract_total_pages, parse_count, parse_page_metadata};

use scraper::Selector;

use crate::error::{Result, TaxError};

/// Compile a CSS selector, reporting failures as `TaxError::InvalidSelector`
pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| TaxError::InvalidSelector(format!("{}: {:?}", selector, e)))
}
