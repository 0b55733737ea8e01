//! TCP connect scan of a candidate port list against one host.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

/// Well-known services probed when no port list is given.
pub const DEFAULT_PORTS: &[u16] = &[21, 22, 25, 53, 80, 110, 123, 143, 179, 443, 500, 3389];

pub fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

/// Parse a comma-separated list of ports/ranges (e.g., "22,80,443", "1-1024,8080").
pub fn parse_ports(spec: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();
    for part in spec.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let s: u16 = start.trim().parse().map_err(|_| anyhow!("invalid port: {}", start))?;
            let e: u16 = end.trim().parse().map_err(|_| anyhow!("invalid port: {}", end))?;
            if s == 0 || e == 0 || s > e {
                return Err(anyhow!("invalid port range: {}", part));
            }
            ports.extend(s..=e);
        } else {
            let p: u16 = part.parse().map_err(|_| anyhow!("invalid port: {}", part))?;
            if p == 0 {
                return Err(anyhow!("invalid port: {}", part));
            }
            ports.push(p);
        }
    }
    if ports.is_empty() {
        return Err(anyhow!("empty port list"));
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// Capability to find which of `ports` accept a TCP connection on `address`.
///
/// Implementations return a subset of `ports` in the order given, and hold no
/// state between calls that could leak from one host into another.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn scan(&self, address: Ipv4Addr, ports: &[u16]) -> Vec<u16>;
}

/// Single connect attempt. The stream is dropped before returning, so the
/// socket never outlives the attempt whatever the outcome.
pub async fn is_port_open(addr: SocketAddr, per_attempt: Duration) -> bool {
    match timeout(per_attempt, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        _ => false,
    }
}

/// Connect scanner: one fresh socket per port, bounded per-host concurrency.
/// Refused, unreachable and timed-out ports are all reported closed.
#[derive(Debug, Clone)]
pub struct TcpConnectScanner {
    pub timeout_per_port: Duration,
    pub concurrency: usize,
    pub shuffle: bool,
}

impl Default for TcpConnectScanner {
    fn default() -> Self {
        TcpConnectScanner { timeout_per_port: Duration::from_secs(1), concurrency: 1, shuffle: false }
    }
}

impl TcpConnectScanner {
    pub fn new(timeout_per_port: Duration) -> Self {
        TcpConnectScanner { timeout_per_port, ..Default::default() }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Randomise connect order. Reported order is unaffected.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    fn attempt_order(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        if self.shuffle {
            order.shuffle(&mut thread_rng());
        }
        order
    }
}

#[async_trait]
impl PortProbe for TcpConnectScanner {
    async fn scan(&self, address: Ipv4Addr, ports: &[u16]) -> Vec<u16> {
        if ports.is_empty() {
            return Vec::new();
        }
        let order = self.attempt_order(ports.len());
        // more permits than ports buys nothing
        let sem = Arc::new(Semaphore::new(self.concurrency.clamp(1, ports.len())));
        let (tx, mut rx) = mpsc::channel::<usize>(ports.len());

        for idx in order {
            let permit = match sem.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let tx = tx.clone();
            let addr = SocketAddr::V4(SocketAddrV4::new(address, ports[idx]));
            let per_attempt = self.timeout_per_port;
            tokio::spawn(async move {
                if is_port_open(addr, per_attempt).await {
                    debug!(%addr, "port open");
                    let _ = tx.send(idx).await;
                }
                drop(permit);
            });
        }
        drop(tx);

        let mut open = vec![false; ports.len()];
        while let Some(idx) = rx.recv().await {
            open[idx] = true;
        }
        ports.iter().zip(open).filter(|(_, o)| *o).map(|(p, _)| *p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn parse_simple_list() {
        let v = parse_ports("22,80,443").unwrap();
        assert_eq!(v, vec![22, 80, 443]);
    }

    #[test]
    fn parse_ranges_and_list() {
        let v = parse_ports("1-3,5,3").unwrap();
        assert_eq!(v, vec![1, 2, 3, 5]);
    }

    #[test]
    fn reject_invalid() {
        assert!(parse_ports("0").is_err());
        assert!(parse_ports("10-5").is_err());
        assert!(parse_ports("http").is_err());
        assert!(parse_ports(" , ").is_err());
    }

    #[test]
    fn default_set_is_well_known_services() {
        assert_eq!(default_ports(), vec![21, 22, 25, 53, 80, 110, 123, 143, 179, 443, 500, 3389]);
    }

    async fn closed_port() -> u16 {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    }

    async fn open_listeners(n: usize) -> Vec<TcpListener> {
        let mut v = Vec::new();
        for _ in 0..n {
            v.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        v
    }

    #[tokio::test]
    async fn reports_only_listening_ports() {
        let listeners = open_listeners(3).await;
        let mut open: Vec<u16> = listeners.iter().map(|l| l.local_addr().unwrap().port()).collect();
        open.sort_unstable();
        let closed = closed_port().await;
        let mut candidates = open.clone();
        candidates.push(closed);
        candidates.sort_unstable();

        let scanner = TcpConnectScanner::new(Duration::from_millis(500));
        let found = scanner.scan(Ipv4Addr::LOCALHOST, &candidates).await;
        assert_eq!(found, open);
    }

    #[tokio::test]
    async fn shuffled_concurrent_scan_keeps_candidate_order() {
        let listeners = open_listeners(3).await;
        let mut open: Vec<u16> = listeners.iter().map(|l| l.local_addr().unwrap().port()).collect();
        open.sort_unstable();
        let mut candidates = open.clone();
        candidates.push(closed_port().await);
        candidates.sort_unstable();

        let scanner = TcpConnectScanner::new(Duration::from_millis(500)).with_concurrency(4).with_shuffle(true);
        for _ in 0..5 {
            assert_eq!(scanner.scan(Ipv4Addr::LOCALHOST, &candidates).await, open);
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_bounded_by_timeout() {
        let scanner = TcpConnectScanner::new(Duration::from_millis(200));
        let start = std::time::Instant::now();
        // TEST-NET-1, never routed
        let found = scanner.scan(Ipv4Addr::new(192, 0, 2, 1), &[80, 443]).await;
        assert!(found.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn oversized_concurrency_is_clamped_to_port_count() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let scanner = TcpConnectScanner::new(Duration::from_millis(500)).with_concurrency(usize::MAX);
        assert_eq!(scanner.scan(Ipv4Addr::LOCALHOST, &[port]).await, vec![port]);
    }

    #[tokio::test]
    async fn empty_candidate_list() {
        let scanner = TcpConnectScanner::default();
        assert!(scanner.scan(Ipv4Addr::LOCALHOST, &[]).await.is_empty());
    }
}
