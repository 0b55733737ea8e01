//! Host reachability via the platform echo utility.

use async_trait::async_trait;
use netsweep_core::{ProbeError, ScanResult};
use regex::Regex;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Slack allowed on top of the echo timeout for process start-up and teardown.
pub const PROCESS_OVERHEAD: Duration = Duration::from_secs(1);

/// What one echo invocation reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoOutput {
    /// Completion code was zero.
    pub success: bool,
    pub stdout: String,
}

/// Capability that sends a single echo request to `address` and waits at most
/// `wait` for the reply.
#[async_trait]
pub trait EchoCommand: Send + Sync {
    async fn echo(&self, address: Ipv4Addr, wait: Duration) -> std::io::Result<EchoOutput>;

    /// Wait the mechanism will really honour when asked for `wait`.
    fn reply_wait(&self, wait: Duration) -> Duration {
        wait
    }
}

/// Runs the system `ping` with one request and a short reply wait.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
}

impl Default for SystemPing {
    fn default() -> Self {
        SystemPing { program: "ping".into() }
    }
}

impl SystemPing {
    pub fn with_program(program: impl Into<String>) -> Self {
        SystemPing { program: program.into() }
    }

    /// iputils `-W` only takes whole seconds; round up so the caller's
    /// deadline covers the real wait.
    fn whole_secs(wait: Duration) -> u64 {
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        secs.max(1)
    }

    pub fn args(address: Ipv4Addr, wait: Duration) -> Vec<String> {
        let ms = wait.as_millis().max(1);
        if cfg!(target_os = "windows") {
            vec!["-n".into(), "1".into(), "-w".into(), ms.to_string(), address.to_string()]
        } else if cfg!(target_os = "macos") {
            // -W is in milliseconds here
            vec!["-c".into(), "1".into(), "-W".into(), ms.to_string(), address.to_string()]
        } else {
            vec!["-c".into(), "1".into(), "-W".into(), Self::whole_secs(wait).to_string(), address.to_string()]
        }
    }
}

#[async_trait]
impl EchoCommand for SystemPing {
    async fn echo(&self, address: Ipv4Addr, wait: Duration) -> std::io::Result<EchoOutput> {
        let out = Command::new(&self.program)
            .args(Self::args(address, wait))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(EchoOutput { success: out.status.success(), stdout: String::from_utf8_lossy(&out.stdout).into_owned() })
    }

    fn reply_wait(&self, wait: Duration) -> Duration {
        if cfg!(any(target_os = "windows", target_os = "macos")) {
            wait
        } else {
            Duration::from_secs(Self::whole_secs(wait))
        }
    }
}

fn rtt_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time[=<]([\d.]+) ?ms").expect("static rtt pattern"))
}

/// Extract the round-trip time (`time=12.3 ms`, `time<1ms`) as `"12.3ms"`.
pub fn parse_round_trip(output: &str) -> Option<String> {
    rtt_pattern().captures(output).map(|c| format!("{}ms", &c[1]))
}

/// Latency when the host answered, `None` when it did not.
/// A non-zero completion code counts as no answer.
pub fn classify(out: &EchoOutput) -> Option<String> {
    if !out.success {
        return None;
    }
    parse_round_trip(&out.stdout)
}

/// Decides UP/DOWN/ERROR for one address.
#[derive(Clone)]
pub struct ReachabilityProbe {
    echo: Arc<dyn EchoCommand>,
    wait: Duration,
    overhead: Duration,
}

impl ReachabilityProbe {
    pub fn new(echo: Arc<dyn EchoCommand>, wait: Duration) -> Self {
        ReachabilityProbe { echo, wait, overhead: PROCESS_OVERHEAD }
    }

    pub fn system(wait: Duration) -> Self {
        Self::new(Arc::new(SystemPing::default()), wait)
    }

    pub fn with_overhead(mut self, overhead: Duration) -> Self {
        self.overhead = overhead;
        self
    }

    /// Hard bound on a single probe: the wait the echo mechanism really
    /// uses plus process overhead.
    pub fn deadline(&self) -> Duration {
        self.echo.reply_wait(self.wait) + self.overhead
    }

    pub async fn check(&self, address: Ipv4Addr) -> Result<Option<String>, ProbeError> {
        match timeout(self.deadline(), self.echo.echo(address, self.wait)).await {
            Err(_) => Err(ProbeError::Timeout),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(out)) => Ok(classify(&out)),
        }
    }

    pub async fn probe(&self, address: Ipv4Addr) -> ScanResult {
        match self.check(address).await {
            Ok(Some(latency)) => {
                debug!(%address, %latency, "host up");
                ScanResult::up(address, latency)
            }
            Ok(None) => {
                debug!(%address, "no response");
                ScanResult::down(address)
            }
            Err(e) => {
                warn!(%address, error = %e, "probe failed");
                ScanResult::error(address, &e)
            }
        }
    }
}
