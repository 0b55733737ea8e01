//! Core types shared by the probe modules and the sweep binary.

pub mod error;
pub mod ratelimiter;
pub mod summary;

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

pub use error::{ProbeError, SweepError};
pub use summary::{SweepSummary, Tally};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Outcome class of one reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HostStatus {
    Up,
    Down,
    Error,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostStatus::Up => "UP",
            HostStatus::Down => "DOWN",
            HostStatus::Error => "ERROR",
        })
    }
}

/// Detail used for every DOWN result.
pub const NO_RESPONSE: &str = "No response";

/// Per-address result. `detail` holds the latency for UP hosts and the reason otherwise.
///
/// `open_ports` is `None` when no port scan ran for the host and `Some(vec![])`
/// when a scan ran and found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub address: Ipv4Addr,
    pub status: HostStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_ports: Option<Vec<u16>>,
}

impl ScanResult {
    pub fn up(address: Ipv4Addr, latency: impl Into<String>) -> Self {
        ScanResult { address, status: HostStatus::Up, detail: latency.into(), open_ports: None }
    }

    pub fn down(address: Ipv4Addr) -> Self {
        ScanResult { address, status: HostStatus::Down, detail: NO_RESPONSE.to_string(), open_ports: None }
    }

    pub fn error(address: Ipv4Addr, err: &ProbeError) -> Self {
        ScanResult { address, status: HostStatus::Error, detail: err.to_string(), open_ports: None }
    }

    pub fn with_open_ports(mut self, ports: Vec<u16>) -> Self {
        self.open_ports = Some(ports);
        self
    }
}
