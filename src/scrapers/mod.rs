//! Source site scrapers.
//!
//! One submodule per source. Each scraper follows the same two-phase
//! pattern: index the listing for episode URLs, then fetch and parse each
//! episode page. Only RFI's *Journal en français facile* is scraped today.

pub mod rfi;
