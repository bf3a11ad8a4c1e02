//! flowcheck CLI library
//!
//! Exposes the configuration, browser session scoping and CLI modules so the
//! binary stays a thin entry point and integration tests can reach them.

pub mod cli;
pub mod config;
pub mod session;

pub use config::Config;
pub use session::BrowserSession;
