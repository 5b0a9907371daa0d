use std::time::Instant;
use tracing::info;

use crate::errors::{AnalyzerError, Result};
use crate::model::Report;
use crate::sqlite::ReportStore;
use crate::window::DateWindow;

/// Picks the reports a request covers.
pub struct ReportSelector<'a, S: ReportStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ReportStore + ?Sized> ReportSelector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn select_reports(&self, window: &DateWindow, serial: Option<i64>) -> Result<Vec<Report>> {
        self.store.fetch_reports_by_window(window, serial)
    }

    /// Every in-window report from any batch that ever carried a record for
    /// `domain`, concatenated in serial order.
    pub fn select_reports_for_domain(&self, window: &DateWindow, domain: &str) -> Result<Vec<Report>> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(AnalyzerError::MissingDomain);
        }

        let start_time = Instant::now();
        let serials = self.store.fetch_distinct_serials_for_domain(domain)?;

        let mut reports = Vec::new();
        for serial in &serials {
            reports.extend(self.select_reports(window, Some(*serial))?);
        }

        info!(
            action = "select",
            component = "report_selector",
            domain = domain,
            serial_count = serials.len(),
            report_count = reports.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Selected reports for domain"
        );
        Ok(reports)
    }
}
