//! Account card extractor
//!
//! Each results page lists accounts as repeating "account card" blocks.
//! The portal exposes no stable field labels, so fields are addressed by
//! position: the card's detail rows are matched against `CARD_SCHEMA`,
//! which maps a row index and extraction rule to each record field. A
//! markup change should only ever need an edit to that table.

use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::error::{Result, TaxError};
use crate::types::{AccountRecord, REAL_PROPERTY, WILDCARD};

use super::compile_selector;

/// One repeating account block
pub(crate) const CARD_SELECTOR: &str = "div.account-card-container";

/// Detail rows inside a card, in display order
const ROW_SELECTOR: &str = "div.card-body > div.row > div.col > div.row";

/// Sentinel written for missing fields under `MissingFieldPolicy::Substitute`
pub const MISSING_SENTINEL: &str = "N/A";

/// Path of the account details page, relative to the portal host
const DETAIL_PATH: &str = "/Accounts/AccountDetails?taxAccountNumber=";

/// What to do when a card that passed the property type filter lacks a
/// required field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingFieldPolicy {
    /// Fail the page with `TaxError::MissingField`
    #[default]
    Fail,
    /// Keep the record with `"N/A"` in place of the missing value
    Substitute,
}

/// Record fields read from a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    AccountNumber,
    AmountDue,
    OwnerName,
    PropertyType,
    Location,
}

impl CardField {
    fn label(self) -> &'static str {
        match self {
            CardField::AccountNumber => "account number",
            CardField::AmountDue => "amount due",
            CardField::OwnerName => "owner name",
            CardField::PropertyType => "property type",
            CardField::Location => "location",
        }
    }
}

/// How a field's text is located inside its row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Text of the first descendant matching the selector
    First(&'static str),
    /// Text of the n-th child node (elements and text nodes alike) of the
    /// first descendant matching the selector
    NthChild(&'static str, usize),
}

/// Schema entry: which row holds a field and how to read it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub row: usize,
    pub field: CardField,
    pub extraction: Extraction,
    pub required: bool,
}

/// Positional layout of an account card.
///
/// Row 0: account number (`strong`) and amount due (`h4`).
/// Row 1: owner name (`strong`) and property type (`span`).
/// Row 2: address, third child node of the first nested `div`.
pub const CARD_SCHEMA: &[FieldRule] = &[
    FieldRule {
        row: 0,
        field: CardField::AccountNumber,
        extraction: Extraction::First("strong"),
        required: true,
    },
    FieldRule {
        row: 0,
        field: CardField::AmountDue,
        extraction: Extraction::First("h4"),
        required: true,
    },
    FieldRule {
        row: 1,
        field: CardField::OwnerName,
        extraction: Extraction::First("strong"),
        required: false,
    },
    FieldRule {
        row: 1,
        field: CardField::PropertyType,
        extraction: Extraction::First("span"),
        required: true,
    },
    FieldRule {
        row: 2,
        field: CardField::Location,
        extraction: Extraction::NthChild("div", 2),
        required: true,
    },
];

struct CompiledRule {
    rule: FieldRule,
    selector: Selector,
}

/// Values read from one card, before validation
#[derive(Debug, Default)]
struct CardFields {
    account_number: Option<String>,
    amount_due: Option<String>,
    owner_name: Option<String>,
    property_type: Option<String>,
    location: Option<String>,
}

impl CardFields {
    fn set(&mut self, field: CardField, value: String) {
        let slot = match field {
            CardField::AccountNumber => &mut self.account_number,
            CardField::AmountDue => &mut self.amount_due,
            CardField::OwnerName => &mut self.owner_name,
            CardField::PropertyType => &mut self.property_type,
            CardField::Location => &mut self.location,
        };
        *slot = Some(value);
    }

    fn get(&self, field: CardField) -> Option<&String> {
        match field {
            CardField::AccountNumber => self.account_number.as_ref(),
            CardField::AmountDue => self.amount_due.as_ref(),
            CardField::OwnerName => self.owner_name.as_ref(),
            CardField::PropertyType => self.property_type.as_ref(),
            CardField::Location => self.location.as_ref(),
        }
    }
}

/// Extracts validated `AccountRecord`s from results pages.
///
/// Selectors are compiled once; the extractor holds no per-page state, so
/// the same document always yields the same records.
pub struct AccountExtractor {
    card_selector: Selector,
    row_selector: Selector,
    rules: Vec<CompiledRule>,
    policy: MissingFieldPolicy,
    detail_base_url: String,
}

impl AccountExtractor {
    /// Create an extractor for the standard card layout.
    ///
    /// # Arguments
    /// * `detail_base_url` - Portal host used to build account detail links
    /// * `policy` - Handling of missing required fields
    ///
    /// # Errors
    /// * `TaxError::InvalidSelector` if a schema selector fails to compile
    pub fn new(detail_base_url: &str, policy: MissingFieldPolicy) -> Result<Self> {
        Self::with_schema(detail_base_url, policy, CARD_SCHEMA)
    }

    /// Create an extractor for a custom card layout
    pub fn with_schema(
        detail_base_url: &str,
        policy: MissingFieldPolicy,
        schema: &[FieldRule],
    ) -> Result<Self> {
        let rules = schema
            .iter()
            .map(|rule| -> Result<CompiledRule> {
                let selector = match rule.extraction {
                    Extraction::First(sel) | Extraction::NthChild(sel, _) => {
                        compile_selector(sel)?
                    }
                };
                Ok(CompiledRule {
                    rule: *rule,
                    selector,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            card_selector: compile_selector(CARD_SELECTOR)?,
            row_selector: compile_selector(ROW_SELECTOR)?,
            rules,
            policy,
            detail_base_url: detail_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Account details URL for an account number, without any encoding
    pub fn detail_link(&self, account_number: &str) -> String {
        detail_link(&self.detail_base_url, account_number)
    }

    /// Extract every "Real" property account from a results page, in
    /// document order.
    ///
    /// Cards whose property type is anything other than "Real" are dropped
    /// silently. A page with no cards yields an empty vector.
    ///
    /// # Errors
    /// * `TaxError::MissingField` if a kept card lacks a required field and
    ///   the policy is `MissingFieldPolicy::Fail`
    pub fn extract(&self, html: &str, prefix: &str, page: u32) -> Result<Vec<AccountRecord>> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for card in document.select(&self.card_selector) {
            if let Some(record) = self.extract_card(&card, prefix, page)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn extract_card(
        &self,
        card: &ElementRef,
        prefix: &str,
        page: u32,
    ) -> Result<Option<AccountRecord>> {
        let rows: Vec<ElementRef> = card.select(&self.row_selector).collect();
        let mut fields = CardFields::default();

        for compiled in &self.rules {
            let value = rows
                .get(compiled.rule.row)
                .and_then(|row| read_field(row, compiled));
            if let Some(value) = value {
                fields.set(compiled.rule.field, value);
            }
        }

        if let Some(kind) = &fields.property_type {
            if kind != REAL_PROPERTY {
                debug!(
                    prefix,
                    page,
                    account = fields.account_number.as_deref().unwrap_or("?"),
                    property_type = %kind,
                    "Skipping non-real property account"
                );
                return Ok(None);
            }
        }

        for compiled in self.rules.iter().filter(|c| c.rule.required) {
            let field = compiled.rule.field;
            if fields.get(field).is_some() {
                continue;
            }
            match self.policy {
                MissingFieldPolicy::Fail => {
                    return Err(TaxError::MissingField {
                        field: field.label(),
                        account: fields.account_number.clone(),
                    });
                }
                MissingFieldPolicy::Substitute => {
                    warn!(
                        prefix,
                        page,
                        field = field.label(),
                        account = fields.account_number.as_deref().unwrap_or("?"),
                        "Substituting missing account field"
                    );
                    fields.set(field, MISSING_SENTINEL.to_string());
                }
            }
        }

        // A substituted property type is not "Real"
        let property_type = fields.property_type.unwrap_or_default();
        if property_type != REAL_PROPERTY {
            return Ok(None);
        }

        let account_number = fields.account_number.unwrap_or_default();
        Ok(Some(AccountRecord {
            query_prefix: format!("{}{}", prefix, WILDCARD),
            page,
            detail_link: self.detail_link(&account_number),
            account_number,
            amount_due: fields.amount_due.unwrap_or_default(),
            owner_name: fields.owner_name,
            property_type,
            location: fields.location.unwrap_or_default(),
        }))
    }
}

/// Parse all "Real" property accounts from a results page with the standard
/// card layout.
///
/// # Arguments
/// * `html` - Raw HTML content of a results page
/// * `prefix` - Query prefix that produced the page (without wildcard)
/// * `page` - Page number of the document
/// * `detail_base_url` - Portal host used to build detail links
/// * `policy` - Handling of missing required fields
pub fn parse_account_records(
    html: &str,
    prefix: &str,
    page: u32,
    detail_base_url: &str,
    policy: MissingFieldPolicy,
) -> Result<Vec<AccountRecord>> {
    AccountExtractor::new(detail_base_url, policy)?.extract(html, prefix, page)
}

/// `<base>/Accounts/AccountDetails?taxAccountNumber=<account_number>`
pub fn detail_link(base_url: &str, account_number: &str) -> String {
    format!("{}{}{}", base_url, DETAIL_PATH, account_number)
}

fn read_field(row: &ElementRef, compiled: &CompiledRule) -> Option<String> {
    let target = row.select(&compiled.selector).next()?;
    let text = match compiled.rule.extraction {
        Extraction::First(_) => target.text().collect::<String>(),
        Extraction::NthChild(_, index) => {
            let node = target.children().nth(index)?;
            match node.value() {
                Node::Text(text) => String::from(&**text),
                Node::Element(_) => ElementRef::wrap(node)?.text().collect::<String>(),
                _ => return None,
            }
        }
    };

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: &str = "https://publictax.smith-county.com";

    fn card(acct: &str, due: &str, owner: &str, kind: &str, address: &str) -> String {
        format!(
            r#"<div class="account-card-container"><div class="card"><div class="card-body">
                <div class="row"><div class="col">
                    <div class="row"><div class="col">Account <strong>{acct}</strong></div><div class="col"><h4>{due}</h4></div></div>
                    <div class="row"><div class="col"><strong>{owner}</strong></div><div class="col"><span>{kind}</span></div></div>
                    <div class="row"><div><i class="fa fa-map"></i><b>Location</b>{address}</div></div>
                </div></div>
            </div></div></div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body><div class=\"results\">{}</div></body></html>", cards.concat())
    }

    #[test]
    fn test_extract_real_property_card() {
        let html = page(&[card("100000012345", "$1,234.56", "SMITH JOHN", "Real", "123 MAIN ST TYLER")]);
        let records = parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Fail).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.query_prefix, "0%");
        assert_eq!(record.page, 1);
        assert_eq!(record.account_number, "100000012345");
        assert_eq!(record.amount_due, "$1,234.56");
        assert_eq!(record.owner_name.as_deref(), Some("SMITH JOHN"));
        assert_eq!(record.property_type, "Real");
        assert_eq!(record.location, "123 MAIN ST TYLER");
        assert_eq!(
            record.detail_link,
            "https://publictax.smith-county.com/Accounts/AccountDetails?taxAccountNumber=100000012345"
        );
    }

    #[test]
    fn test_non_real_cards_are_dropped() {
        let html = page(&[
            card("1", "$10.00", "A", "Personal", "1 ELM ST"),
            card("2", "$20.00", "B", "Real", "2 OAK ST"),
        ]);
        let records = parse_account_records(&html, "A", 3, BASE, MissingFieldPolicy::Fail).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account_number, "2");
        assert_eq!(records[0].page, 3);
    }

    #[test]
    fn test_non_real_card_with_missing_fields_is_not_an_error() {
        let html = page(&[card("", "", "A", "Mineral", "")]);
        let records = parse_account_records(&html, "A", 1, BASE, MissingFieldPolicy::Fail).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_no_cards_yields_empty() {
        let records =
            parse_account_records("<html><body></body></html>", "0", 1, BASE, MissingFieldPolicy::Fail)
                .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_location_fails_in_strict_mode() {
        let html = page(&[card("555", "$1.00", "OWNER", "Real", "")]);
        match parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Fail) {
            Err(TaxError::MissingField { field, account }) => {
                assert_eq!(field, "location");
                assert_eq!(account.as_deref(), Some("555"));
            }
            other => panic!("Expected MissingField error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_amount_substituted_in_lenient_mode() {
        let html = page(&[card("555", "", "OWNER", "Real", "9 PINE ST")]);
        let records =
            parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Substitute).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount_due, MISSING_SENTINEL);
        assert_eq!(records[0].location, "9 PINE ST");
    }

    #[test]
    fn test_missing_owner_is_optional() {
        let html = page(&[card("555", "$3.00", "", "Real", "9 PINE ST")]);
        let records = parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Fail).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner_name, None);
    }

    #[test]
    fn test_missing_property_type_fails_in_strict_mode() {
        let html = page(&[card("777", "$3.00", "OWNER", "", "9 PINE ST")]);
        let result = parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Fail);
        assert!(matches!(
            result,
            Err(TaxError::MissingField { field: "property type", .. })
        ));
    }

    #[test]
    fn test_missing_property_type_dropped_in_lenient_mode() {
        let html = page(&[card("777", "$3.00", "OWNER", "", "9 PINE ST")]);
        let records =
            parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Substitute).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_card_without_rows_fails_in_strict_mode() {
        let html = page(&["<div class=\"account-card-container\"><p>broken</p></div>".to_string()]);
        let result = parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Fail);
        assert!(matches!(result, Err(TaxError::MissingField { account: None, .. })));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let html = page(&[
            card("1", "$10.00", "A", "Real", "1 ELM ST"),
            card("2", "$20.00", "B", "Personal", "2 OAK ST"),
            card("3", "$30.00", "C", "Real", "3 ASH ST"),
        ]);
        let extractor = AccountExtractor::new(BASE, MissingFieldPolicy::Fail).unwrap();

        let first = extractor.extract(&html, "0", 1).unwrap();
        let second = extractor.extract(&html, "0", 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|r| r.account_number.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );
    }

    #[test]
    fn test_address_text_node_position() {
        let html = page(&[
            r#"<div class="account-card-container"><div class="card-body"><div class="row"><div class="col">
                <div class="row"><strong>42</strong><h4>$0.01</h4></div>
                <div class="row"><span>Real</span></div>
                <div class="row"><div><strong>Address</strong><br>  77 CEDAR LN  </div></div>
            </div></div></div></div>"#
                .to_string(),
        ]);
        let records = parse_account_records(&html, "Z", 1, BASE, MissingFieldPolicy::Fail).unwrap();
        assert_eq!(records[0].location, "77 CEDAR LN");
        assert_eq!(records[0].owner_name, None);
    }

    #[test]
    fn test_detail_link() {
        assert_eq!(
            detail_link("http://localhost", "000123"),
            "http://localhost/Accounts/AccountDetails?taxAccountNumber=000123"
        );
    }

    proptest! {
        #[test]
        fn prop_detail_link_is_direct_substitution(acct in "[0-9A-Z]{1,20}") {
            let html = page(&[card(&acct, "$1.00", "OWNER", "Real", "1 MAIN ST")]);
            let records = parse_account_records(&html, "0", 1, BASE, MissingFieldPolicy::Fail).unwrap();
            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(
                &records[0].detail_link,
                &format!("{}/Accounts/AccountDetails?taxAccountNumber={}", BASE, acct)
            );
        }
    }
}
