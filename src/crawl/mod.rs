//! Crawl Module
//!
//! Page discovery. The coordinator only sees the `Spider` trait; `HttpSpider`
//! is a same-origin breadth-first crawler that extracts link and form
//! element IDs from the pages it fetches.

pub mod extract;
pub mod spider;
pub mod types;
