//! Error types for the public tax scraper
//!
//! This module defines all error types used throughout the library.
//! TaxError implements Serialize so transport layers can forward it as text.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error type for public tax scraping operations
#[derive(Error, Debug)]
pub enum TaxError {
    /// Search endpoint answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Network {
        /// HTTP status code returned by the server
        status: u16,
        /// Full request URL
        url: String,
    },

    /// Transport failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Page markup does not have the expected structure
    #[error("Unexpected page structure: {0}")]
    Structural(String),

    /// A required account field was absent from an account card
    #[error("Missing {field} in account card{}", account_suffix(.account))]
    MissingField {
        /// Name of the missing field
        field: &'static str,
        /// Account number of the card, when it could be read
        account: Option<String>,
    },

    /// Query parameters rejected before any request was made
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A CSS selector in the card schema failed to compile
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

fn account_suffix(account: &Option<String>) -> String {
    match account {
        Some(acct) => format!(" {}", acct),
        None => String::new(),
    }
}

impl TaxError {
    /// True for transport failures and non-success HTTP statuses.
    pub fn is_network(&self) -> bool {
        matches!(self, TaxError::Network { .. } | TaxError::Http(_))
    }

    /// True when the page markup violated the expected structure.
    pub fn is_structural(&self) -> bool {
        matches!(self, TaxError::Structural(_) | TaxError::MissingField { .. })
    }
}

/// Serialize TaxError as its display string
impl Serialize for TaxError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for public tax scraping operations
pub type Result<T> = std::result::Result<T, TaxError>;
