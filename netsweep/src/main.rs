use anyhow::Result;
use clap::Parser;
use host_discovery::{AddressRange, SweepOptions, Sweeper, MAX_CONCURRENCY};
use netsweep_core::ratelimiter::MAX_QPS;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod logging;
mod report;

use report::OutputFormat;

/// Exit status after an operator interrupt.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "netsweep", version, about = "Find live hosts in an IPv4 range and optionally scan their TCP ports")]
struct Cli {
    /// CIDR (e.g., 192.168.1.0/24). A bare address scans that host only.
    cidr: String,
    /// Scan common TCP ports on hosts that answer
    #[arg(short = 'p', long = "scan-ports", env = "NETSWEEP_SCAN_PORTS")]
    scan_ports: bool,
    /// Ports: comma/range list (e.g., 22,80,443 or 1-1024,8080). Implies --scan-ports.
    #[arg(long, env = "NETSWEEP_PORTS")]
    ports: Option<String>,
    /// Hosts probed concurrently
    #[arg(long, default_value_t = host_discovery::DEFAULT_CONCURRENCY, env = "NETSWEEP_CONCURRENCY",
          value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=MAX_CONCURRENCY as u64))]
    concurrency: usize,
    /// Echo reply timeout in milliseconds
    #[arg(long, default_value_t = 1000, env = "NETSWEEP_TIMEOUT_MS")]
    timeout_ms: u64,
    /// Timeout per port connect in milliseconds
    #[arg(long, default_value_t = 1000, env = "NETSWEEP_PORT_TIMEOUT_MS")]
    port_timeout_ms: u64,
    /// Concurrent connect attempts per host
    #[arg(long, default_value_t = 1, env = "NETSWEEP_PORT_CONCURRENCY",
          value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=u64::from(u16::MAX)))]
    port_concurrency: usize,
    /// QPS cap for probe launches (across hosts); 0 disables pacing
    #[arg(long, default_value_t = 0, env = "NETSWEEP_QPS",
          value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_QPS)))]
    qps: u32,
    /// Try ports in random order (report order is unchanged)
    #[arg(long, default_value_t = false)]
    shuffle_ports: bool,
    /// Also report hosts that are down or errored
    #[arg(long, default_value_t = false, env = "NETSWEEP_SHOW_ALL")]
    show_all: bool,
    /// Output format: text, json, or jsonl
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn sweep_options(&self) -> Result<SweepOptions> {
        let mut opts = SweepOptions {
            concurrency: self.concurrency.max(1),
            probe_timeout: Duration::from_millis(self.timeout_ms.max(1)),
            scan_ports: self.scan_ports,
            port_timeout: Duration::from_millis(self.port_timeout_ms.max(1)),
            port_concurrency: self.port_concurrency.max(1),
            shuffle_ports: self.shuffle_ports,
            qps: if self.qps == 0 { None } else { Some(self.qps) },
            ..Default::default()
        };
        if let Some(spec) = &self.ports {
            opts.ports = port_scan::parse_ports(spec)?;
            opts.scan_ports = true;
        }
        Ok(opts)
    }
}

/// Run the sweep and write the report to `out`. Returns the exit status:
/// zero, or [`EXIT_INTERRUPTED`] when `token` cut the sweep short.
async fn execute(cli: &Cli, sweeper: &Sweeper, token: CancellationToken, out: &mut impl Write) -> Result<i32> {
    let summary = sweeper.sweep(&cli.cidr, token.clone()).await?;
    for line in report::render(&summary, cli.format, cli.show_all)? {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    if !summary.complete && token.is_cancelled() {
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(0)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let range = AddressRange::parse(&cli.cidr)?;
    let opts = cli.sweep_options()?;
    eprintln!("Scanning network {} ({} hosts)...", range, range.host_count());

    let sweeper = Sweeper::new(opts);
    let token = CancellationToken::new();
    let rt = tokio::runtime::Runtime::new()?;
    let code = rt.block_on(async {
        let trigger = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, waiting for in-flight probes");
                trigger.cancel();
            }
        });
        execute(&cli, &sweeper, token.clone(), &mut std::io::stdout()).await
    })?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
