use thiserror::Error;

/// Failures that abort a whole sweep.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error("Invalid CIDR notation: {0}")]
    InvalidRange(String),
}

/// Failures of the reachability mechanism itself. These never abort a sweep;
/// they become the ERROR result of a single host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("Ping timeout")]
    Timeout,
    #[error("{0}")]
    Failure(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Failure(e.to_string())
    }
}
