//! HTML record extraction behind the `ExtractRecords` capability.
//!
//! Selector sets are injected configuration, never compiled in: registry
//! sites restyle their listings without notice, so which elements count as
//! a record and which sub-elements are label/value pairs must stay
//! adjustable per source.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Typed parse failure. Only returned when the payload cannot be treated
/// as markup at all; a page with no matching record elements is a
/// legitimate end-of-data signal, not an error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response body is not valid markup: {0}")]
    InvalidMarkup(String),
    #[error("invalid selector `{0}`")]
    Selector(String),
}

/// Raw label/value records extracted from one page, plus the page's own
/// claim about whether a further page exists.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub records: Vec<BTreeMap<String, String>>,
    pub has_next_link: bool,
}

/// Capability to turn raw page bytes into an ordered sequence of raw
/// field maps. One concrete implementation per known source layout.
pub trait ExtractRecords: Send + Sync {
    fn extract(&self, page: &[u8]) -> Result<ExtractedPage, ParseError>;
}

fn parse_selector(raw: &str) -> Result<Selector, ParseError> {
    Selector::parse(raw).map_err(|_| ParseError::Selector(raw.to_string()))
}

fn decode(page: &[u8]) -> Result<Html, ParseError> {
    let text = std::str::from_utf8(page)
        .map_err(|e| ParseError::InvalidMarkup(e.to_string()))?;
    Ok(Html::parse_document(text))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extractor for card-style listings: a container element per record,
/// holding item elements that pair a label element with a value element.
pub struct CardExtractor {
    record: Selector,
    item: Selector,
    label: Selector,
    value: Selector,
    next_link: Selector,
}

impl CardExtractor {
    /// Build from raw CSS selectors. Fails on any invalid selector so a
    /// broken source config surfaces before the first fetch.
    pub fn new(
        record: &str,
        item: &str,
        label: &str,
        value: &str,
        next_link: &str,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            record: parse_selector(record)?,
            item: parse_selector(item)?,
            label: parse_selector(label)?,
            value: parse_selector(value)?,
            next_link: parse_selector(next_link)?,
        })
    }
}

impl ExtractRecords for CardExtractor {
    fn extract(&self, page: &[u8]) -> Result<ExtractedPage, ParseError> {
        let document = decode(page)?;
        let mut records = Vec::new();

        for container in document.select(&self.record) {
            let mut record = BTreeMap::new();
            for item in container.select(&self.item) {
                let label = item.select(&self.label).next().map(element_text);
                let value = item.select(&self.value).next().map(element_text);
                if let (Some(label), Some(value)) = (label, value) {
                    if !label.is_empty() {
                        record.insert(label, value);
                    }
                }
            }
            if !record.is_empty() {
                records.push(record);
            }
        }

        let has_next_link = document.select(&self.next_link).next().is_some();

        Ok(ExtractedPage {
            records,
            has_next_link,
        })
    }
}

/// Extractor for table-style listings: header cells name the fields and
/// each data row whose cell count matches the header becomes a record.
pub struct TableExtractor {
    table: Selector,
    row: Selector,
    header_cell: Selector,
    data_cell: Selector,
    next_link: Selector,
}

impl TableExtractor {
    pub fn new(table: &str, next_link: &str) -> Result<Self, ParseError> {
        Ok(Self {
            table: parse_selector(table)?,
            row: parse_selector("tr")?,
            header_cell: parse_selector("th")?,
            data_cell: parse_selector("td")?,
            next_link: parse_selector(next_link)?,
        })
    }
}

impl ExtractRecords for TableExtractor {
    fn extract(&self, page: &[u8]) -> Result<ExtractedPage, ParseError> {
        let document = decode(page)?;
        let mut records = Vec::new();

        if let Some(table) = document.select(&self.table).next() {
            let mut rows = table.select(&self.row);

            let headers: Vec<String> = rows
                .next()
                .map(|header_row| {
                    header_row
                        .select(&self.header_cell)
                        .map(element_text)
                        .collect()
                })
                .unwrap_or_default();

            if !headers.is_empty() {
                for row in rows {
                    let cells: Vec<String> = row.select(&self.data_cell).map(element_text).collect();
                    if cells.len() == headers.len() {
                        let record: BTreeMap<String, String> = headers
                            .iter()
                            .cloned()
                            .zip(cells)
                            .collect();
                        records.push(record);
                    }
                }
            }
        }

        let has_next_link = document.select(&self.next_link).next().is_some();

        Ok(ExtractedPage {
            records,
            has_next_link,
        })
    }
}
