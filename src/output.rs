//! Text and JSON rendering for the analyzer views.

use serde::Serialize;

use crate::aggregate::ReportRecords;
use crate::analyzer::{DashboardView, DomainView, ReportView, SendersView};
use crate::model::{Record, Report};
use crate::stats::{ComplianceCounter, ComplianceMap, CompliancePercentages};
use crate::utils::format_number;
use crate::window::DateWindow;

const NO_DATA: &str = "No report data in this window.";

#[derive(Serialize)]
struct DomainRow<'a> {
    #[serde(flatten)]
    counter: &'a ComplianceCounter,
    percentages: CompliancePercentages,
}

#[derive(Serialize)]
struct DashboardJson<'a> {
    window: &'a DateWindow,
    domains: Vec<DomainRow<'a>>,
}

#[derive(Serialize)]
struct DomainJson<'a> {
    domain: &'a str,
    window: &'a DateWindow,
    domains: Vec<DomainRow<'a>>,
    reports: &'a [ReportRecords],
}

fn rows(domains: &ComplianceMap) -> Vec<DomainRow<'_>> {
    domains
        .values()
        .map(|counter| DomainRow {
            counter,
            percentages: counter.percentages(),
        })
        .collect()
}

pub fn dashboard_json(view: &DashboardView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&DashboardJson {
        window: &view.window,
        domains: rows(&view.domains),
    })
}

pub fn domain_json(view: &DomainView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&DomainJson {
        domain: &view.domain,
        window: &view.window,
        domains: rows(&view.domains),
        reports: &view.reports,
    })
}

pub fn report_json(view: &ReportView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(view)
}

pub fn senders_json(view: &SendersView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(view)
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn policy_label(counter: &ComplianceCounter) -> String {
    match counter.policy_pct {
        Some(pct) => format!("{}% {}", pct, text(&counter.policy)),
        None => text(&counter.policy).to_string(),
    }
}

fn compliance_lines(domains: &ComplianceMap, lines: &mut Vec<String>) {
    if domains.is_empty() {
        lines.push(NO_DATA.to_string());
        return;
    }

    for counter in domains.values() {
        let pct = counter.percentages();
        let reporters: Vec<String> = counter
            .reports
            .iter()
            .map(|(org, count)| format!("{} ({})", org, count))
            .collect();

        lines.push(String::new());
        lines.push(counter.hfrom.clone());
        lines.push(format!(
            "  Volume: {} messages in {} records",
            format_number(counter.rcount),
            format_number(counter.num_report as i64)
        ));
        lines.push(format!("  Policy: {}", policy_label(counter)));
        lines.push(format!("  Compliance: {}%", pct.compliance));
        lines.push(format!(
            "  DKIM: {}% aligned | {}% passed",
            pct.dkim_aligned, pct.dkim_passed
        ));
        lines.push(format!(
            "  SPF: {}% aligned | {}% passed",
            pct.spf_aligned, pct.spf_passed
        ));
        lines.push(format!("  Reporters: {}", reporters.join(", ")));
    }
}

fn record_line(record: &Record) -> String {
    let addr = record
        .source_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    format!(
        "{:<15} {:>8}  {:<10} {:<12} DKIM {} (Result: {} | Alignment: {})  SPF {} (Result: {} | Alignment: {})",
        addr,
        format_number(record.rcount),
        text(&record.disposition),
        text(&record.reason),
        text(&record.dkimdomain),
        text(&record.dkimresult),
        text(&record.dkim_align),
        text(&record.spfdomain),
        text(&record.spfresult),
        text(&record.spf_align),
    )
}

fn report_span(report: &Report) -> String {
    format!("{} - {}", report.mindate, report.maxdate)
}

pub fn render_dashboard(view: &DashboardView) -> String {
    let mut lines = vec![
        "--- DMARC Compliance Dashboard ---".to_string(),
        format!("Reports since {}", view.window.start),
    ];
    compliance_lines(&view.domains, &mut lines);
    lines.join("\n")
}

pub fn render_domain(view: &DomainView) -> String {
    let mut lines = vec![format!(
        "--- Domain Details for {} - Since {} ---",
        view.domain, view.window.start
    )];
    compliance_lines(&view.domains, &mut lines);

    if view.reports.is_empty() {
        return lines.join("\n");
    }

    lines.push(String::new());
    lines.push("Reports:".to_string());
    for batch in &view.reports {
        lines.push(format!(
            "  {}  {}  {} (serial {})",
            report_span(&batch.report),
            batch.report.org,
            batch.report.reportid,
            batch.report.serial
        ));
    }

    lines.push(String::new());
    lines.push("Records:".to_string());
    for batch in &view.reports {
        for record in &batch.records {
            lines.push(format!("  {}  {}", batch.report.reportid, record_line(record)));
        }
    }
    lines.join("\n")
}

pub fn render_report(view: &ReportView) -> String {
    let report = &view.report;
    let mut lines = vec![
        format!("--- Details for Report {} ---", report.reportid),
        format!("Date Range: {}", report_span(report)),
        format!("Domain: {}", report.domain),
        format!("Reporting Org: {}", report.org),
        format!(
            "Domain DMARC Policy: {} | Subdomain Policy: {} | Enforcement Percentage: {}",
            text(&report.policy_p),
            text(&report.policy_sp),
            report.policy_pct.map(|pct| pct.to_string()).unwrap_or_default()
        ),
        format!(
            "DKIM Policy: {} | SPF Policy: {}",
            text(&report.policy_adkim),
            text(&report.policy_aspf)
        ),
        String::new(),
    ];

    if view.records.is_empty() {
        lines.push("No records in this report.".to_string());
    }
    for record in &view.records {
        lines.push(format!("  {:<24} {}", record.identifier_hfrom, record_line(record)));
    }
    lines.join("\n")
}

pub fn render_senders(view: &SendersView) -> String {
    let mut lines = vec![format!("--- Senders Since {} ---", view.window.start)];
    if view.senders.is_empty() {
        lines.push(NO_DATA.to_string());
    }
    lines.extend(view.senders.iter().map(|addr| format!("- {}", addr)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fold_batches;
    use crate::model::fixtures::{at, record, report};
    use std::net::Ipv4Addr;

    fn window() -> DateWindow {
        DateWindow {
            start: at(2024, 3, 1),
            end: at(2024, 3, 8),
        }
    }

    fn batches() -> Vec<ReportRecords> {
        vec![ReportRecords {
            report: report(7, "google.com", "reject", 100),
            records: vec![
                record(7, "example.com", 1500, ("pass", "pass"), ("pass", "fail")),
                record(7, "example.com", 20, ("fail", "fail"), ("fail", "fail")),
                record(7, "example.com", 3, ("fail", "fail"), ("pass", "pass")),
            ],
        }]
    }

    #[test]
    fn empty_dashboard_renders_no_data() {
        let view = DashboardView {
            window: window(),
            domains: ComplianceMap::new(),
        };
        let rendered = render_dashboard(&view);
        assert!(rendered.contains("Reports since 2024-03-01 00:00:00"));
        assert!(rendered.contains(NO_DATA));
    }

    #[test]
    fn dashboard_shows_percentages() {
        let view = DashboardView {
            window: window(),
            domains: fold_batches(&batches()),
        };
        let rendered = render_dashboard(&view);
        assert!(rendered.contains("Volume: 1,523 messages in 3 records"));
        assert!(rendered.contains("Policy: 100% reject"));
        assert!(rendered.contains("Compliance: 67%"));
        assert!(rendered.contains("DKIM: 33% aligned | 33% passed"));
        assert!(rendered.contains("SPF: 33% aligned | 67% passed"));
        assert!(rendered.contains("Reporters: google.com (3)"));
    }

    #[test]
    fn domain_detail_lists_reports_and_records() {
        let view = DomainView {
            domain: "example.com".to_string(),
            window: window(),
            domains: fold_batches(&batches()),
            reports: batches(),
        };
        let rendered = render_domain(&view);
        assert!(rendered.contains("rpt-7 (serial 7)"));
        assert!(rendered.contains("192.0.2.10"));
        assert_eq!(rendered.matches("  rpt-7  192.0.2.10").count(), 3);
    }

    #[test]
    fn report_header_lists_policy() {
        let view = ReportView {
            report: report(7, "google.com", "reject", 100),
            records: Vec::new(),
        };
        let rendered = render_report(&view);
        assert!(rendered.contains("Details for Report rpt-7"));
        assert!(rendered.contains("Domain DMARC Policy: reject | Subdomain Policy: none | Enforcement Percentage: 100"));
        assert!(rendered.contains("No records in this report."));
    }

    #[test]
    fn json_includes_percentages() {
        let view = DashboardView {
            window: window(),
            domains: fold_batches(&batches()),
        };
        let value: serde_json::Value = serde_json::from_str(&dashboard_json(&view).unwrap()).unwrap();
        let row = &value["domains"][0];
        assert_eq!(row["hfrom"], "example.com");
        assert_eq!(row["num_report"], 3);
        assert_eq!(row["percentages"]["compliance"], 67);
        assert_eq!(row["reports"]["google.com"], 3);
    }

    #[test]
    fn senders_render_dotted_quads() {
        let view = SendersView {
            window: window(),
            senders: vec![Ipv4Addr::new(198, 51, 100, 7)],
        };
        assert!(render_senders(&view).contains("- 198.51.100.7"));
        let json: serde_json::Value = serde_json::from_str(&senders_json(&view).unwrap()).unwrap();
        assert_eq!(json["senders"][0], "198.51.100.7");
    }
}
