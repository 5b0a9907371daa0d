use thiserror::Error;

/// Failures surfaced by the analytics core. Every variant aborts the current
/// request; nothing here is retried or partially recovered.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("critical error: a domain name is required for domain-scoped selection")]
    MissingDomain,

    #[error("invalid date range '{range}': expected <number><unit> such as 4w, 2m or 1y")]
    InvalidRange { range: String },

    #[error("date range '{range}' reaches outside the representable calendar")]
    RangeOutOfBounds { range: String },

    #[error("no report found with serial {serial}")]
    ReportNotFound { serial: i64 },

    #[error("worker count must be greater than 0")]
    InvalidWorkers,

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("report store query failed: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
