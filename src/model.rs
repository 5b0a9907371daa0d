use chrono::NaiveDateTime;
use serde::Serialize;
use std::net::Ipv4Addr;

const PASS: &str = "pass";

/// One ingested DMARC aggregate report (a row of the `report` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub serial: i64,
    pub domain: String,
    pub org: String,
    pub reportid: String,
    pub mindate: NaiveDateTime,
    pub maxdate: NaiveDateTime,
    pub policy_p: Option<String>,
    pub policy_sp: Option<String>,
    pub policy_adkim: Option<String>,
    pub policy_aspf: Option<String>,
    pub policy_pct: Option<i64>,
}

/// One observed sending source within a report (a row of `rptrecord`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub serial: i64,
    pub ip: Option<u32>,
    pub rcount: i64,
    pub disposition: Option<String>,
    pub reason: Option<String>,
    pub dkimdomain: Option<String>,
    pub dkimresult: Option<String>,
    pub dkim_align: Option<String>,
    pub spfdomain: Option<String>,
    pub spfresult: Option<String>,
    pub spf_align: Option<String>,
    pub identifier_hfrom: String,
}

fn is_pass(value: &Option<String>) -> bool {
    value.as_deref() == Some(PASS)
}

impl Record {
    pub fn dkim_passed(&self) -> bool {
        is_pass(&self.dkimresult)
    }

    pub fn spf_passed(&self) -> bool {
        is_pass(&self.spfresult)
    }

    pub fn dkim_aligned(&self) -> bool {
        is_pass(&self.dkim_align)
    }

    pub fn spf_aligned(&self) -> bool {
        is_pass(&self.spf_align)
    }

    /// DMARC passes when either mechanism both passed and aligned.
    pub fn is_compliant(&self) -> bool {
        (self.dkim_passed() && self.dkim_aligned()) || (self.spf_passed() && self.spf_aligned())
    }

    /// Key of the compliance bucket this record folds into.
    pub fn bucket_key(&self) -> String {
        self.identifier_hfrom.to_lowercase()
    }

    pub fn source_addr(&self) -> Option<Ipv4Addr> {
        self.ip.map(Ipv4Addr::from)
    }
}
