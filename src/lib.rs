//! regharvest - intermediary registry acquisition.
//!
//! Scrapes paginated registry listings from public intermediary registries,
//! normalizes the extracted records, and persists them idempotently to a
//! document store plus a per-source JSON snapshot.

pub mod cli;
pub mod config;
pub mod models;
pub mod runner;
pub mod scrape;
pub mod server;
pub mod store;
