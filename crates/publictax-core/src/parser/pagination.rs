//! Pagination metadata parser
//!
//! Reads the total result count and the total page count from the first
//! results page of a query.

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::types::PageMetadata;

use super::accounts::CARD_SELECTOR;
use super::compile_selector;

/// Element carrying "(showing page N of M)"
const PAGE_INDICATOR_SELECTOR: &str = "span.page-number";

/// Parse result totals from a search results page.
///
/// A page without a pagination indicator yields `(0, 0)`, meaning the query
/// matched nothing. Either value is 0 when it cannot be read.
///
/// # Errors
/// * `TaxError::InvalidSelector` if a built-in selector fails to compile
pub fn parse_page_metadata(html: &str) -> Result<PageMetadata> {
    let document = Html::parse_document(html);
    let indicator_selector = compile_selector(PAGE_INDICATOR_SELECTOR)?;
    let strong_selector = compile_selector("strong")?;
    let card_selector = compile_selector(CARD_SELECTOR)?;

    let Some(indicator) = document.select(&indicator_selector).next() else {
        return Ok(PageMetadata::default());
    };

    let total_pages = indicator
        .parent()
        .and_then(ElementRef::wrap)
        .map(|container| container.text().collect::<String>())
        .and_then(|text| extract_total_pages(&text))
        .unwrap_or(0);

    let total_results =
        find_result_count(indicator, &strong_selector, &card_selector).unwrap_or(0);

    Ok(PageMetadata::new(total_results, total_pages))
}

/// Walk the indicator's ancestors, nearest first, looking for the summary
/// count. Account cards are never searched, and the walk ends at the first
/// ancestor that encloses a card: above that lies the whole results list.
fn find_result_count(
    indicator: ElementRef,
    strong_selector: &Selector,
    card_selector: &Selector,
) -> Option<u32> {
    for ancestor in indicator.ancestors().filter_map(ElementRef::wrap) {
        let count = ancestor
            .select(strong_selector)
            .filter(|strong| !inside_card(strong, card_selector))
            .find_map(|strong| parse_count(&strong.text().collect::<String>()));
        if count.is_some() {
            return count;
        }
        if ancestor.select(card_selector).next().is_some() {
            return None;
        }
    }
    None
}

fn inside_card(element: &ElementRef, card_selector: &Selector) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| card_selector.matches(&ancestor))
}

/// Extract the page count following "of " in text like "(showing page 1 of 39)".
pub fn extract_total_pages(text: &str) -> Option<u32> {
    let re = regex_lite::Regex::new(r"of\s+(\d[\d,]*)").ok()?;
    let caps = re.captures(text)?;
    parse_count(caps.get(1)?.as_str())
}

/// Parse a count such as "1,234", stripping thousands separators.
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
