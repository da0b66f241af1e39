//! Core data types for registry scraping runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One intermediary entity scraped from a source page.
///
/// Records are immutable after creation. Two records with the same
/// `identity_key` within the same entity type are the same logical entity;
/// a later write fully replaces an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Natural key derived from the source's registration number, with
    /// slashes and whitespace stripped. Never empty.
    pub identity_key: String,
    /// Which logical source produced this record (not part of identity).
    pub entity_type: String,
    /// Normalized field name to value.
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Create a new record.
    pub fn new(
        identity_key: String,
        entity_type: String,
        fields: BTreeMap<String, String>,
    ) -> Self {
        Self {
            identity_key,
            entity_type,
            fields,
        }
    }
}

/// The outcome of fetching, parsing and normalizing one page.
///
/// Ephemeral: produced and consumed within one pagination iteration.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub page_number: u32,
    pub records: Vec<Record>,
    /// Trust-but-verify signal from the source's own navigation markup.
    pub has_next_link: bool,
    /// Raw records dropped because they lacked an identity field.
    pub dropped: usize,
}

impl PageResult {
    /// Identity keys present on this page.
    pub fn identity_keys(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .map(|r| r.identity_key.clone())
            .collect()
    }
}

/// Why pagination stopped for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A page yielded zero record elements.
    EmptyPage,
    /// The page's navigation markup reported no further page.
    NoNextLink,
    /// The page introduced no identity keys beyond the previous page.
    DuplicateContent,
    /// The configured maximum page ceiling was reached.
    PageLimit,
    /// The run was cancelled before the next page fetch.
    Cancelled,
    /// A fetch or parse failure ended pagination for this source.
    Error,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Termination::EmptyPage => "empty page",
            Termination::NoNextLink => "no next link",
            Termination::DuplicateContent => "duplicate content",
            Termination::PageLimit => "page limit reached",
            Termination::Cancelled => "cancelled",
            Termination::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Per-source result recorded in the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub record_count: usize,
    pub pages_scraped: u32,
    /// Records dropped for lacking an identity field. Expected, tolerated
    /// data loss; counted for observability only.
    pub dropped: usize,
    pub termination: Termination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    /// An outcome for a source that failed before any page was processed.
    pub fn failed(error: String) -> Self {
        Self {
            record_count: 0,
            pages_scraped: 0,
            dropped: 0,
            termination: Termination::Error,
            error: Some(error),
        }
    }
}

/// Top-level result of one run, keyed by source name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub sources: BTreeMap<String, SourceOutcome>,
}

impl RunSummary {
    /// Total records gathered across all sources.
    pub fn total_records(&self) -> usize {
        self.sources.values().map(|o| o.record_count).sum()
    }

    /// Human-readable report, one line per source.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (name, outcome) in &self.sources {
            match &outcome.error {
                Some(err) => out.push_str(&format!(
                    "{}: {} records, {} pages, {} ({})\n",
                    name, outcome.record_count, outcome.pages_scraped, outcome.termination, err
                )),
                None => out.push_str(&format!(
                    "{}: {} records, {} pages, {}\n",
                    name, outcome.record_count, outcome.pages_scraped, outcome.termination
                )),
            }
        }
        out.push_str("Scraping process completed.");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> Record {
        Record::new(key.to_string(), "type_x".to_string(), BTreeMap::new())
    }

    #[test]
    fn test_page_result_identity_keys() {
        let page = PageResult {
            page_number: 1,
            records: vec![record("A"), record("B"), record("A")],
            has_next_link: true,
            dropped: 0,
        };
        let keys = page.identity_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("A"));
        assert!(keys.contains("B"));
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::EmptyPage.to_string(), "empty page");
        assert_eq!(Termination::NoNextLink.to_string(), "no next link");
        assert_eq!(
            Termination::DuplicateContent.to_string(),
            "duplicate content"
        );
    }

    #[test]
    fn test_run_summary_report() {
        let mut summary = RunSummary::default();
        summary.sources.insert(
            "type_x".to_string(),
            SourceOutcome {
                record_count: 6,
                pages_scraped: 2,
                dropped: 0,
                termination: Termination::NoNextLink,
                error: None,
            },
        );
        summary.sources.insert(
            "type_y".to_string(),
            SourceOutcome::failed("boom".to_string()),
        );

        let report = summary.report();
        assert!(report.contains("type_x: 6 records, 2 pages, no next link"));
        assert!(report.contains("type_y: 0 records, 0 pages, error (boom)"));
        assert!(report.ends_with("Scraping process completed."));
        assert_eq!(summary.total_records(), 6);
    }

    #[test]
    fn test_termination_serializes_snake_case() {
        let json = serde_json::to_string(&Termination::DuplicateContent).unwrap();
        assert_eq!(json, "\"duplicate_content\"");
    }
}
