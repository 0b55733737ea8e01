//! Host discovery: CIDR enumeration, echo-based reachability and the
//! concurrent subnet sweep that ties them to the port scanner.

pub mod probe;
pub mod range;
pub mod sweep;

pub use probe::{EchoCommand, EchoOutput, ReachabilityProbe, SystemPing};
pub use range::AddressRange;
pub use sweep::{sweep, SweepOptions, Sweeper, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
