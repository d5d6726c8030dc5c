//! nhaystack: command line front end for the haystack index cache

pub mod report;
pub mod runner;
pub mod settings;

pub use runner::{RebuildError, rebuild_with_timeout};
pub use settings::{ConfigError, Settings};
