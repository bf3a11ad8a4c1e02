pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod fixtures;
pub mod identity;
pub mod output;
pub mod run;
pub mod runtime;
