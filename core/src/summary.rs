//! Run-level aggregation of per-host results.

use crate::{HostStatus, ScanResult};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Final outcome of one sweep. Produced once by [`Tally::finish`].
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub range: String,
    /// Number of usable addresses in the range, probed or not.
    pub hosts: usize,
    pub up: usize,
    pub down: usize,
    pub error: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub started_at: String,
    pub ended_at: String,
    /// False when the sweep was cancelled before every address was probed.
    pub complete: bool,
    pub port_scan: bool,
    /// Results in ascending address order.
    pub results: Vec<ScanResult>,
}

impl SweepSummary {
    pub fn probed(&self) -> usize {
        self.results.len()
    }
}

/// Incremental accumulator for a sweep. Results may arrive in any order;
/// they are keyed by enumeration index and emitted in that order.
#[derive(Debug)]
pub struct Tally {
    range: String,
    hosts: usize,
    port_scan: bool,
    up: usize,
    down: usize,
    error: usize,
    started: Instant,
    started_at: String,
    slots: BTreeMap<usize, ScanResult>,
}

impl Tally {
    pub fn new(range: impl Into<String>, hosts: usize, port_scan: bool) -> Self {
        Tally {
            range: range.into(),
            hosts,
            port_scan,
            up: 0,
            down: 0,
            error: 0,
            started: Instant::now(),
            started_at: now_rfc3339(),
            slots: BTreeMap::new(),
        }
    }

    /// Record the result for the address at `index`. A second result for the
    /// same index is ignored; results are terminal.
    pub fn record(&mut self, index: usize, result: ScanResult) -> bool {
        if self.slots.contains_key(&index) {
            return false;
        }
        match result.status {
            HostStatus::Up => self.up += 1,
            HostStatus::Down => self.down += 1,
            HostStatus::Error => self.error += 1,
        }
        self.slots.insert(index, result);
        true
    }

    pub fn recorded(&self) -> usize {
        self.slots.len()
    }

    pub fn finish(self, complete: bool) -> SweepSummary {
        SweepSummary {
            range: self.range,
            hosts: self.hosts,
            up: self.up,
            down: self.down,
            error: self.error,
            elapsed: self.started.elapsed(),
            started_at: self.started_at,
            ended_at: now_rfc3339(),
            complete,
            port_scan: self.port_scan,
            results: self.slots.into_values().collect(),
        }
    }
}
