//! Scraping pipeline: fetch, extract, normalize, paginate.

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod paginate;

pub use extract::{CardExtractor, ExtractRecords, ExtractedPage, ParseError, TableExtractor};
pub use fetch::{FetchError, FetchPage, HttpPageFetcher};
pub use normalize::{normalize, normalize_key, DEFAULT_IDENTITY_FIELD};
pub use paginate::{paginate, CancelToken, ScrapeLimits, SourceRun};
