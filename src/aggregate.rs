use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::errors::{AnalyzerError, Result};
use crate::model::{Record, Report};
use crate::sqlite::ReportStore;
use crate::stats::{merge_maps, ComplianceCounter, ComplianceMap};

/// A report together with the records fetched for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecords {
    pub report: Report,
    pub records: Vec<Record>,
}

fn fold_batch(mut counts: ComplianceMap, batch: &ReportRecords) -> ComplianceMap {
    for record in &batch.records {
        let key = record.bucket_key();
        counts
            .entry(key.clone())
            .or_insert_with(|| ComplianceCounter::new(key, &batch.report))
            .record(&batch.report, record);
    }
    counts
}

/// Folds every record into its header-From bucket, in input order.
pub fn fold_batches(batches: &[ReportRecords]) -> ComplianceMap {
    batches.iter().fold(ComplianceMap::new(), fold_batch)
}

/// Same result as [`fold_batches`], computed on a dedicated pool. Chunks are
/// merged in input order so first-seen policies survive.
pub fn fold_batches_parallel(batches: &[ReportRecords], workers: usize) -> Result<ComplianceMap> {
    if workers == 0 {
        return Err(AnalyzerError::InvalidWorkers);
    }
    let threads = workers.min(num_cpus::get()).max(1);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;

    Ok(pool.install(|| {
        batches
            .par_iter()
            .fold(ComplianceMap::new, fold_batch)
            .reduce(ComplianceMap::new, merge_maps)
    }))
}

pub struct RecordAggregator<'a, S: ReportStore + ?Sized> {
    store: &'a S,
    workers: Option<usize>,
}

impl<'a, S: ReportStore + ?Sized> RecordAggregator<'a, S> {
    pub fn new(store: &'a S, config: &Config) -> Self {
        Self {
            store,
            workers: config.workers,
        }
    }

    /// Loads the records of each report, optionally only those whose
    /// header-From equals `domain`.
    pub fn fetch_batches(&self, reports: &[Report], domain: Option<&str>) -> Result<Vec<ReportRecords>> {
        let start_time = Instant::now();
        let batches = reports
            .iter()
            .map(|report| {
                let records = self.store.fetch_records_by_serial(report.serial, domain)?;
                Ok(ReportRecords {
                    report: report.clone(),
                    records,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            action = "query",
            component = "record_aggregator",
            report_count = batches.len(),
            record_count = batches.iter().map(|b| b.records.len()).sum::<usize>(),
            duration_ms = start_time.elapsed().as_millis(),
            "Fetched records for reports"
        );
        Ok(batches)
    }

    pub fn fold(&self, batches: &[ReportRecords]) -> Result<ComplianceMap> {
        let start_time = Instant::now();
        let counts = match self.workers {
            Some(workers) if workers > 1 => fold_batches_parallel(batches, workers)?,
            _ => fold_batches(batches),
        };

        info!(
            action = "complete",
            component = "record_aggregator",
            domain_count = counts.len(),
            worker_count = self.workers.unwrap_or(1),
            duration_ms = start_time.elapsed().as_millis(),
            "Aggregation completed"
        );
        Ok(counts)
    }

    pub fn aggregate(&self, reports: &[Report], domain: Option<&str>) -> Result<ComplianceMap> {
        let batches = self.fetch_batches(reports, domain)?;
        self.fold(&batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{record, report};
    use crate::sqlite::test_support::{insert_record, insert_report, store};

    fn batch(report: Report, records: Vec<Record>) -> ReportRecords {
        ReportRecords { report, records }
    }

    fn sample_batches() -> Vec<ReportRecords> {
        vec![
            batch(
                report(1, "google.com", "reject", 100),
                vec![
                    record(1, "example.com", 10, ("pass", "pass"), ("fail", "fail")),
                    record(1, "other.test", 3, ("fail", "fail"), ("fail", "fail")),
                ],
            ),
            batch(
                report(2, "yahoo.com", "none", 25),
                vec![
                    record(2, "Example.com", 4, ("fail", "fail"), ("pass", "pass")),
                    record(2, "example.com", 1, ("pass", "fail"), ("pass", "fail")),
                ],
            ),
            batch(
                report(3, "google.com", "quarantine", 50),
                vec![record(3, "third.test", 7, ("pass", "pass"), ("pass", "pass"))],
            ),
        ]
    }

    #[test]
    fn dkim_only_record_counts_dkim_and_compliance() {
        let counts = fold_batches(&[batch(
            report(1, "google.com", "none", 100),
            vec![record(1, "example.com", 2, ("pass", "pass"), ("fail", "fail"))],
        )]);
        let counter = &counts["example.com"];
        assert_eq!(counter.result_dkim, 1);
        assert_eq!(counter.align_dkim, 1);
        assert_eq!(counter.compliance, 1);
        assert_eq!(counter.result_spf, 0);
        assert_eq!(counter.align_spf, 0);
    }

    #[test]
    fn both_mechanisms_passing_count_compliance_once() {
        let counts = fold_batches(&[batch(
            report(1, "google.com", "none", 100),
            vec![
                record(1, "example.com", 2, ("fail", "pass"), ("pass", "pass")),
                record(1, "example.com", 2, ("pass", "pass"), ("pass", "pass")),
            ],
        )]);
        assert_eq!(counts["example.com"].compliance, 2);
        assert_eq!(counts["example.com"].num_report, 2);
    }

    #[test]
    fn header_from_buckets_are_case_insensitive() {
        let counts = fold_batches(&sample_batches());
        let keys: Vec<&str> = counts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["example.com", "other.test", "third.test"]);

        let counter = &counts["example.com"];
        assert_eq!(counter.hfrom, "example.com");
        assert_eq!(counter.num_report, 3);
        assert_eq!(counter.rcount, 15);
        assert_eq!(counter.result_dkim, 2);
        assert_eq!(counter.result_spf, 2);
        assert_eq!(counter.align_dkim, 1);
        assert_eq!(counter.align_spf, 1);
        assert_eq!(counter.compliance, 2);
        assert_eq!(counter.reports.get("google.com"), Some(&1));
        assert_eq!(counter.reports.get("yahoo.com"), Some(&2));
        assert_eq!(counter.percentages().compliance, 67);
    }

    #[test]
    fn first_report_seen_sets_policy() {
        let counts = fold_batches(&sample_batches());
        assert_eq!(counts["example.com"].policy.as_deref(), Some("reject"));
        assert_eq!(counts["example.com"].policy_pct, Some(100));
        assert_eq!(counts["third.test"].policy.as_deref(), Some("quarantine"));
    }

    #[test]
    fn counts_do_not_depend_on_report_order() {
        let forward = fold_batches(&sample_batches());
        let mut reversed_batches = sample_batches();
        reversed_batches.reverse();
        let reversed = fold_batches(&reversed_batches);

        assert_eq!(forward.len(), reversed.len());
        for (key, counter) in &forward {
            let other = &reversed[key];
            assert_eq!(counter.rcount, other.rcount);
            assert_eq!(counter.num_report, other.num_report);
            assert_eq!(counter.result_dkim, other.result_dkim);
            assert_eq!(counter.result_spf, other.result_spf);
            assert_eq!(counter.align_dkim, other.align_dkim);
            assert_eq!(counter.align_spf, other.align_spf);
            assert_eq!(counter.compliance, other.compliance);
            assert_eq!(counter.reports, other.reports);
        }
    }

    #[test]
    fn every_bucket_has_a_record() {
        let counts = fold_batches(&sample_batches());
        assert!(counts.values().all(|c| c.num_report >= 1));
    }

    #[test]
    fn no_reports_yields_empty_map() {
        assert!(fold_batches(&[]).is_empty());
        assert!(fold_batches(&[batch(report(1, "google.com", "none", 100), vec![])]).is_empty());
    }

    #[test]
    fn parallel_fold_matches_sequential() {
        let mut batches = Vec::new();
        for serial in 0..64 {
            let policy = if serial % 2 == 0 { "reject" } else { "none" };
            batches.push(batch(
                report(serial, &format!("org{}.test", serial % 5), policy, serial),
                vec![
                    record(serial, "example.com", serial, ("pass", "pass"), ("fail", "fail")),
                    record(serial, &format!("d{}.test", serial % 7), 1, ("fail", "fail"), ("pass", "pass")),
                ],
            ));
        }

        let sequential = fold_batches(&batches);
        let parallel = fold_batches_parallel(&batches, 4).unwrap();
        assert_eq!(sequential, parallel);
        assert!(matches!(
            fold_batches_parallel(&batches, 0),
            Err(AnalyzerError::InvalidWorkers)
        ));
    }

    #[test]
    fn aggregate_reads_records_from_store() {
        let store = store();
        let first = report(1, "google.com", "reject", 100);
        let second = report(2, "yahoo.com", "none", 0);
        insert_report(&store, &first);
        insert_report(&store, &second);
        insert_record(&store, &record(1, "example.com", 6, ("pass", "pass"), ("pass", "pass")));
        insert_record(&store, &record(1, "other.test", 2, ("fail", "fail"), ("fail", "fail")));
        insert_record(&store, &record(2, "example.com", 4, ("fail", "fail"), ("fail", "fail")));

        let aggregator = RecordAggregator::new(&store, &Config::default());
        let reports = vec![first, second];

        let counts = aggregator.aggregate(&reports, None).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["example.com"].rcount, 10);
        assert_eq!(counts["example.com"].percentages().compliance, 50);

        let scoped = aggregator.aggregate(&reports, Some("example.com")).unwrap();
        assert_eq!(scoped.keys().collect::<Vec<_>>(), vec!["example.com"]);

        assert!(aggregator.aggregate(&[], None).unwrap().is_empty());
    }
}
