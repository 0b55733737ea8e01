use anyhow::Result;
use clap::ValueEnum;
use netsweep_core::{HostStatus, ScanResult, SweepSummary};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat { Text, Json, Jsonl }

/// Rows that make it into the report. DOWN and ERROR hosts only with `show_all`.
fn reported(summary: &SweepSummary, show_all: bool) -> impl Iterator<Item = &ScanResult> {
    summary.results.iter().filter(move |r| show_all || r.status == HostStatus::Up)
}

pub fn host_line(r: &ScanResult) -> String {
    let mut line = format!("{} - {} ({})", r.address, r.status, r.detail);
    match &r.open_ports {
        None => {}
        Some(p) if p.is_empty() => line.push_str(" - No open ports"),
        Some(p) => {
            let list = p.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
            line.push_str(&format!(" - Open ports: {}", list));
        }
    }
    line
}

fn summary_lines(s: &SweepSummary) -> Vec<String> {
    let head = if s.complete {
        "Scan complete.".to_string()
    } else {
        format!("Scan interrupted ({} of {} addresses probed).", s.probed(), s.hosts)
    };
    vec![
        format!("{} Found {} active hosts, {} down, {} errors.", head, s.up, s.down, s.error),
        format!("Time elapsed: {:.2} seconds", s.elapsed.as_secs_f64()),
    ]
}

pub fn render(summary: &SweepSummary, format: OutputFormat, show_all: bool) -> Result<Vec<String>> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Text => {
            for r in reported(summary, show_all) { out.push(host_line(r)); }
            out.push(String::new());
            out.extend(summary_lines(summary));
        }
        OutputFormat::Json => {
            let view = SweepSummary { results: reported(summary, show_all).cloned().collect(), ..summary.clone() };
            out.push(serde_json::to_string(&view)?);
        }
        OutputFormat::Jsonl => {
            for r in reported(summary, show_all) { out.push(serde_json::to_string(r)?); }
            let obj = serde_json::json!({
                "summary": { "up": summary.up, "down": summary.down, "error": summary.error, "elapsed_ms": summary.elapsed.as_millis() as u64, "complete": summary.complete },
            });
            out.push(obj.to_string());
        }
    }
    Ok(out)
}
