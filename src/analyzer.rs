use chrono::NaiveDateTime;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Instant;
use tracing::info;

use crate::aggregate::{RecordAggregator, ReportRecords};
use crate::config::Config;
use crate::errors::{AnalyzerError, Result};
use crate::model::{Record, Report};
use crate::selector::ReportSelector;
use crate::sqlite::ReportStore;
use crate::stats::ComplianceMap;
use crate::window::{DateWindow, DateWindowResolver};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub window: DateWindow,
    pub domains: ComplianceMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainView {
    pub domain: String,
    pub window: DateWindow,
    pub domains: ComplianceMap,
    /// Reports in scope, each with its records for this domain only
    pub reports: Vec<ReportRecords>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportView {
    pub report: Report,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendersView {
    pub window: DateWindow,
    pub senders: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderFilter {
    pub hfrom_contains: Option<String>,
    pub ip_contains: Option<String>,
}

/// Runs one request at a time against a report store.
pub struct Analyzer<'a, S: ReportStore + ?Sized> {
    store: &'a S,
    config: Config,
    resolver: DateWindowResolver,
}

impl<'a, S: ReportStore + ?Sized> Analyzer<'a, S> {
    pub fn new(store: &'a S, config: Config) -> Self {
        let resolver = DateWindowResolver::new(&config);
        Self {
            store,
            config,
            resolver,
        }
    }

    fn selector(&self) -> ReportSelector<'a, S> {
        ReportSelector::new(self.store)
    }

    fn aggregator(&self) -> RecordAggregator<'a, S> {
        RecordAggregator::new(self.store, &self.config)
    }

    pub fn dashboard(&self, range: Option<&str>, now: NaiveDateTime) -> Result<DashboardView> {
        let start_time = Instant::now();
        let window = self.resolver.resolve(range, now)?;
        let reports = self.selector().select_reports(&window, None)?;
        let domains = self.aggregator().aggregate(&reports, None)?;

        info!(
            action = "complete",
            component = "dashboard",
            report_count = reports.len(),
            domain_count = domains.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Dashboard built"
        );
        Ok(DashboardView { window, domains })
    }

    pub fn domain(&self, domain: &str, range: Option<&str>, now: NaiveDateTime) -> Result<DomainView> {
        let start_time = Instant::now();
        let domain = domain.trim();
        let window = self.resolver.resolve(range, now)?;
        let reports = self.selector().select_reports_for_domain(&window, domain)?;

        let aggregator = self.aggregator();
        let batches = aggregator.fetch_batches(&reports, Some(domain))?;
        let domains = aggregator.fold(&batches)?;

        info!(
            action = "complete",
            component = "domain_detail",
            domain = domain,
            report_count = batches.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Domain detail built"
        );
        Ok(DomainView {
            domain: domain.to_string(),
            window,
            domains,
            reports: batches,
        })
    }

    pub fn report(&self, serial: i64) -> Result<ReportView> {
        let report = self
            .store
            .fetch_report(serial)?
            .ok_or(AnalyzerError::ReportNotFound { serial })?;
        let records = self.store.fetch_records_by_serial(serial, None)?;
        Ok(ReportView { report, records })
    }

    pub fn senders(&self, range: Option<&str>, filter: &SenderFilter, now: NaiveDateTime) -> Result<SendersView> {
        let window = self.resolver.resolve(range, now)?;
        let senders = self
            .store
            .fetch_sender_ips(&window, filter.hfrom_contains.as_deref())?
            .into_iter()
            .map(Ipv4Addr::from)
            .filter(|addr| match &filter.ip_contains {
                Some(needle) => addr.to_string().contains(needle.as_str()),
                None => true,
            })
            .collect();

        Ok(SendersView { window, senders })
    }
}
