use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{Record, Report};

/// Compliance counters for a single header-From domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceCounter {
    pub hfrom: String,
    pub rcount: i64,
    pub num_report: u64,
    pub result_dkim: u64,
    pub result_spf: u64,
    pub align_dkim: u64,
    pub align_spf: u64,
    pub compliance: u64,
    pub policy: Option<String>,
    pub policy_pct: Option<i64>,
    pub reports: BTreeMap<String, u64>,
}

/// Counters keyed by lower-cased header-From domain.
pub type ComplianceMap = BTreeMap<String, ComplianceCounter>;

/// Whole-number percentages derived from a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompliancePercentages {
    pub compliance: u32,
    pub dkim_aligned: u32,
    pub spf_aligned: u32,
    pub dkim_passed: u32,
    pub spf_passed: u32,
}

impl ComplianceCounter {
    /// Seeds an empty bucket; policy fields come from the report that first
    /// touched it and are never overwritten afterwards.
    pub fn new(hfrom: String, report: &Report) -> Self {
        Self {
            hfrom,
            rcount: 0,
            num_report: 0,
            result_dkim: 0,
            result_spf: 0,
            align_dkim: 0,
            align_spf: 0,
            compliance: 0,
            policy: report.policy_p.clone(),
            policy_pct: report.policy_pct,
            reports: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, report: &Report, record: &Record) {
        self.num_report += 1;
        self.rcount += record.rcount;
        if record.dkim_passed() {
            self.result_dkim += 1;
        }
        if record.spf_passed() {
            self.result_spf += 1;
        }
        if record.dkim_aligned() {
            self.align_dkim += 1;
        }
        if record.spf_aligned() {
            self.align_spf += 1;
        }
        if record.is_compliant() {
            self.compliance += 1;
        }
        *self.reports.entry(report.org.clone()).or_insert(0) += 1;
    }

    /// Adds `later`'s counts into `self`. `self` must cover the earlier part of
    /// the input so its policy stays the first-seen one.
    pub fn merge(&mut self, later: ComplianceCounter) {
        self.rcount += later.rcount;
        self.num_report += later.num_report;
        self.result_dkim += later.result_dkim;
        self.result_spf += later.result_spf;
        self.align_dkim += later.align_dkim;
        self.align_spf += later.align_spf;
        self.compliance += later.compliance;
        for (org, count) in later.reports {
            *self.reports.entry(org).or_insert(0) += count;
        }
    }

    pub fn percentages(&self) -> CompliancePercentages {
        CompliancePercentages {
            compliance: percent(self.compliance, self.num_report),
            dkim_aligned: percent(self.align_dkim, self.num_report),
            spf_aligned: percent(self.align_spf, self.num_report),
            dkim_passed: percent(self.result_dkim, self.num_report),
            spf_passed: percent(self.result_spf, self.num_report),
        }
    }
}

/// round(100 * count / total), halves rounded away from zero.
pub fn percent(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * count as f64 / total as f64).round() as u32
}

pub fn merge_maps(mut earlier: ComplianceMap, later: ComplianceMap) -> ComplianceMap {
    for (key, counter) in later {
        match earlier.get_mut(&key) {
            Some(existing) => existing.merge(counter),
            None => {
                earlier.insert(key, counter);
            }
        }
    }
    earlier
}
