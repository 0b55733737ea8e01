//! Subnet sweep: reachability per host, optional port scan on live hosts,
//! bounded worker pool, address-ordered summary.

use crate::probe::ReachabilityProbe;
use crate::range::AddressRange;
use netsweep_core::ratelimiter::RateLimiter;
use netsweep_core::{HostStatus, ProbeError, ScanResult, SweepError, SweepSummary, Tally};
use port_scan::{PortProbe, TcpConnectScanner};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 64;
/// Upper bound on hosts in flight; larger requests are clamped.
pub const MAX_CONCURRENCY: usize = 4096;

#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Hosts probed at once.
    pub concurrency: usize,
    /// Reply wait handed to the echo utility.
    pub probe_timeout: Duration,
    pub scan_ports: bool,
    pub ports: Vec<u16>,
    pub port_timeout: Duration,
    /// Connect attempts in flight per host.
    pub port_concurrency: usize,
    pub shuffle_ports: bool,
    /// Cap on probe launches per second across all hosts.
    pub qps: Option<u32>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        SweepOptions {
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: Duration::from_secs(1),
            scan_ports: false,
            ports: port_scan::default_ports(),
            port_timeout: Duration::from_secs(1),
            port_concurrency: 1,
            shuffle_ports: false,
            qps: None,
        }
    }
}

/// Work for one address. Shares nothing mutable with other units.
#[derive(Clone)]
struct HostUnit {
    reach: ReachabilityProbe,
    ports: Option<(Arc<dyn PortProbe>, Arc<[u16]>)>,
}

impl HostUnit {
    async fn run(&self, address: Ipv4Addr) -> ScanResult {
        let result = self.reach.probe(address).await;
        match (&self.ports, result.status) {
            (Some((scanner, list)), HostStatus::Up) => {
                let open = scanner.scan(address, list).await;
                debug!(%address, open = ?open, "port scan done");
                result.with_open_ports(open)
            }
            _ => result,
        }
    }
}

pub struct Sweeper {
    reach: ReachabilityProbe,
    ports: Arc<dyn PortProbe>,
    opts: SweepOptions,
}

impl Sweeper {
    /// System `ping` and TCP connect scanning, configured from `opts`.
    pub fn new(opts: SweepOptions) -> Self {
        let scanner = TcpConnectScanner::new(opts.port_timeout)
            .with_concurrency(opts.port_concurrency)
            .with_shuffle(opts.shuffle_ports);
        Sweeper { reach: ReachabilityProbe::system(opts.probe_timeout), ports: Arc::new(scanner), opts }
    }

    pub fn with_probes(opts: SweepOptions, reach: ReachabilityProbe, ports: Arc<dyn PortProbe>) -> Self {
        Sweeper { reach, ports, opts }
    }

    fn unit(&self) -> HostUnit {
        let ports = if self.opts.scan_ports {
            Some((self.ports.clone(), Arc::from(self.opts.ports.as_slice())))
        } else {
            None
        };
        HostUnit { reach: self.reach.clone(), ports }
    }

    /// Probe every usable address of `cidr`. Only a malformed range fails;
    /// per-host problems become ERROR rows. Cancelling `cancel` stops new
    /// dispatches, waits for in-flight hosts and returns an incomplete summary.
    pub async fn sweep(&self, cidr: &str, cancel: CancellationToken) -> Result<SweepSummary, SweepError> {
        let range = AddressRange::parse(cidr)?;
        let hosts = range.host_count();
        let workers = self.opts.concurrency.clamp(1, MAX_CONCURRENCY);
        info!(range = %range, hosts, workers, scan_ports = self.opts.scan_ports, "starting sweep");

        let mut tally = Tally::new(range.to_string(), hosts, self.opts.scan_ports);
        let sem = Arc::new(Semaphore::new(workers));
        let pacer = RateLimiter::from_qps(self.opts.qps);
        let (tx, mut rx) = mpsc::channel::<(usize, ScanResult)>(workers * 2);
        let unit = self.unit();

        let sem = &sem;
        let pacer = pacer.as_ref();
        let cancel = &cancel;
        let dispatch = async move {
            for (idx, address) in range.hosts().enumerate() {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return false,
                    p = sem.clone().acquire_owned() => match p {
                        Ok(p) => p,
                        Err(_) => return false,
                    },
                };
                if let Some(p) = pacer {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return false,
                        _ = p.acquire() => {}
                    }
                }
                let unit = unit.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    // a panicking unit still yields a row
                    let result = match tokio::spawn(async move { unit.run(address).await }).await {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(%address, error = %e, "host task failed");
                            ScanResult::error(address, &ProbeError::Failure(format!("host task failed: {}", e)))
                        }
                    };
                    let _ = tx.send((idx, result)).await;
                    drop(permit);
                });
            }
            true
        };
        let collect = async {
            while let Some((idx, result)) = rx.recv().await {
                tally.record(idx, result);
            }
        };
        let (dispatched_all, ()) = tokio::join!(dispatch, collect);

        let complete = dispatched_all && tally.recorded() == hosts;
        if !complete {
            warn!(probed = tally.recorded(), hosts, "sweep incomplete");
        }
        let summary = tally.finish(complete);
        info!(up = summary.up, down = summary.down, error = summary.error, elapsed_ms = summary.elapsed.as_millis() as u64, "sweep finished");
        Ok(summary)
    }
}

/// Sweep `cidr` with default options and no cancellation.
pub async fn sweep(cidr: &str, scan_ports: bool) -> Result<SweepSummary, SweepError> {
    let opts = SweepOptions { scan_ports, ..Default::default() };
    Sweeper::new(opts).sweep(cidr, CancellationToken::new()).await
}
