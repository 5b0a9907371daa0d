use crate::args::Args;
use crate::errors::{AnalyzerError, Result};

pub const DEFAULT_RANGE: &str = "1w";

/// Settings shared by every request, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Range specifier used when a request does not name one
    pub default_range: String,

    /// Emit diagnostic logging
    pub debug: bool,

    /// Fold records on a worker pool of this size instead of inline
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_range: DEFAULT_RANGE.to_string(),
            debug: false,
            workers: None,
        }
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.workers == Some(0) {
            return Err(AnalyzerError::InvalidWorkers);
        }

        Ok(Self {
            default_range: args.default_range.clone(),
            debug: args.verbose,
            workers: args.workers,
        })
    }
}
