pub mod aggregate;
pub mod analyzer;
pub mod args;
pub mod config;
pub mod errors;
pub mod model;
pub mod output;
pub mod selector;
pub mod sqlite;
pub mod stats;
pub mod utils;
pub mod window;

pub use aggregate::{fold_batches, RecordAggregator, ReportRecords};
pub use analyzer::{Analyzer, SenderFilter};
pub use args::{Args, Command, OutputFormat};
pub use config::Config;
pub use errors::{AnalyzerError, Result};
pub use model::{Record, Report};
pub use selector::ReportSelector;
pub use sqlite::{ReportStore, SqliteStore};
pub use stats::{ComplianceCounter, ComplianceMap};
pub use window::{DateWindow, DateWindowResolver};
