use chrono::NaiveDateTime;
use rusqlite::{named_params, Connection, OpenFlags, Row};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::errors::Result;
use crate::model::{Record, Report};
use crate::window::DateWindow;

const SCHEMA: &str = include_str!("../schema.sql");

const REPORT_COLUMNS: &str = "serial, domain, org, reportid, mindate, maxdate, \
     policy_p, policy_sp, policy_adkim, policy_aspf, policy_pct";

const RECORD_COLUMNS: &str = "serial, ip, rcount, disposition, reason, dkimdomain, dkimresult, \
     dkim_align, spfdomain, spfresult, spf_align, identifier_hfrom";

/// Read access to ingested reports. All queries are equality or range
/// predicates; nothing here writes.
pub trait ReportStore {
    /// Reports whose `mindate` lies inside the window. With a serial, only that
    /// report, ordered by domain; otherwise every report ordered by serial.
    fn fetch_reports_by_window(&self, window: &DateWindow, serial: Option<i64>) -> Result<Vec<Report>>;

    /// Ascending serials of every report holding a record for `domain`,
    /// regardless of date. Domain matches ignore ASCII case.
    fn fetch_distinct_serials_for_domain(&self, domain: &str) -> Result<Vec<i64>>;

    fn fetch_records_by_serial(&self, serial: i64, domain: Option<&str>) -> Result<Vec<Record>>;

    fn fetch_report(&self, serial: i64) -> Result<Option<Report>>;

    /// Distinct non-null sender addresses across reports whose `mindate` lies
    /// inside the window, ascending. `hfrom_contains` is a substring match on
    /// the header-From domain.
    fn fetch_sender_ips(&self, window: &DateWindow, hfrom_contains: Option<&str>) -> Result<Vec<u32>>;
}

pub struct SqliteStore {
    conn: Connection,
}

/// Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text so range predicates
/// compare lexically.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        serial: row.get("serial")?,
        domain: row.get("domain")?,
        org: row.get("org")?,
        reportid: row.get("reportid")?,
        mindate: row.get("mindate")?,
        maxdate: row.get("maxdate")?,
        policy_p: row.get("policy_p")?,
        policy_sp: row.get("policy_sp")?,
        policy_adkim: row.get("policy_adkim")?,
        policy_aspf: row.get("policy_aspf")?,
        policy_pct: row.get("policy_pct")?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        serial: row.get("serial")?,
        ip: row.get("ip")?,
        rcount: row.get("rcount")?,
        disposition: row.get("disposition")?,
        reason: row.get("reason")?,
        dkimdomain: row.get("dkimdomain")?,
        dkimresult: row.get("dkimresult")?,
        dkim_align: row.get("dkim_align")?,
        spfdomain: row.get("spfdomain")?,
        spfresult: row.get("spfresult")?,
        spf_align: row.get("spf_align")?,
        identifier_hfrom: row.get("identifier_hfrom")?,
    })
}

impl SqliteStore {
    /// Opens an existing report database without write access.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let start_time = Instant::now();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(
            action = "open",
            component = "report_store",
            path = ?path,
            duration_ms = start_time.elapsed().as_millis(),
            "Connected to report database"
        );
        Ok(Self { conn })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ReportStore for SqliteStore {
    fn fetch_reports_by_window(&self, window: &DateWindow, serial: Option<i64>) -> Result<Vec<Report>> {
        let start_time = Instant::now();
        let start = format_timestamp(&window.start);
        let end = format_timestamp(&window.end);

        let reports = match serial {
            Some(serial) => {
                let sql = format!(
                    "SELECT {REPORT_COLUMNS} FROM report \
                     WHERE serial = :serial AND mindate BETWEEN :start AND :end ORDER BY domain"
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(
                    named_params! { ":serial": serial, ":start": start, ":end": end },
                    report_from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {REPORT_COLUMNS} FROM report \
                     WHERE mindate BETWEEN :start AND :end ORDER BY serial"
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(named_params! { ":start": start, ":end": end }, report_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        debug!(
            action = "query",
            component = "report_store",
            serial = ?serial,
            report_count = reports.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Fetched reports in window"
        );
        Ok(reports)
    }

    fn fetch_distinct_serials_for_domain(&self, domain: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT serial FROM rptrecord \
             WHERE identifier_hfrom = :domain COLLATE NOCASE ORDER BY serial",
        )?;
        let serials = stmt
            .query_map(named_params! { ":domain": domain }, |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(serials)
    }

    fn fetch_records_by_serial(&self, serial: i64, domain: Option<&str>) -> Result<Vec<Record>> {
        let records = match domain {
            Some(domain) => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM rptrecord \
                     WHERE serial = :serial AND identifier_hfrom = :domain COLLATE NOCASE \
                     ORDER BY identifier_hfrom, id"
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(
                    named_params! { ":serial": serial, ":domain": domain },
                    record_from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM rptrecord \
                     WHERE serial = :serial ORDER BY identifier_hfrom, id"
                );
                let mut stmt = self.conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(named_params! { ":serial": serial }, record_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    fn fetch_report(&self, serial: i64) -> Result<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM report WHERE serial = :serial");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query_map(named_params! { ":serial": serial }, report_from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn fetch_sender_ips(&self, window: &DateWindow, hfrom_contains: Option<&str>) -> Result<Vec<u32>> {
        let start_time = Instant::now();
        let pattern = format!("%{}%", hfrom_contains.unwrap_or_default());

        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT ip FROM rptrecord \
             WHERE ip IS NOT NULL AND identifier_hfrom LIKE :pattern \
             AND serial IN (SELECT serial FROM report WHERE mindate BETWEEN :start AND :end) \
             ORDER BY ip",
        )?;
        let ips = stmt
            .query_map(
                named_params! {
                    ":pattern": pattern,
                    ":start": format_timestamp(&window.start),
                    ":end": format_timestamp(&window.end),
                },
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<u32>>>()?;

        debug!(
            action = "query",
            component = "report_store",
            sender_count = ips.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Fetched sender addresses in window"
        );
        Ok(ips)
    }
}
