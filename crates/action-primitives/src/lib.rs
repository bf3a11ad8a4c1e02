//! L1 Action Primitives - locator-driven browser operations
//!
//! This crate provides the building blocks the flow runner drives:
//! - Playwright-style locators resolved inside the page (label, role, text, css)
//! - navigate, fill, click, bounded waits and text expectations
//! - URL glob matching for redirect waits
//! - a single bounded polling loop shared by every wait, without retries

pub mod errors;
mod locator;
mod primitives;
pub mod types;
pub mod url_glob;
mod waiting;

#[cfg(test)]
mod test_support;

pub use errors::*;
pub use locator::*;
pub use primitives::*;
pub use types::*;
pub use url_glob::{glob_matches, UrlGlob};
pub use waiting::*;
