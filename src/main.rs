//! sysload - print uptime, CPU load, memory and swap usage.
//!
//! CPU load is measured over `--interval` seconds by taking two tick samples.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::time::Duration;
use sysload::{CpuSample, MemSwapSample, UptimeSeconds};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Report system load from the kernel
#[derive(Parser, Debug)]
#[command(name = "sysload")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seconds between the two CPU samples
    #[arg(short = 'i', long, default_value = "1")]
    interval: f64,

    /// Print a single JSON object instead of text
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// One reading of every metric
#[derive(Debug, Serialize)]
struct Report {
    timestamp: DateTime<Utc>,
    uptime_secs: UptimeSeconds,
    cpu: CpuSample,
    /// Busy percentage over the sampling interval
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_percent: Option<f64>,
    memswap: MemSwapSample,
}

fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("sysload={}", level)
            .parse()
            .context("Invalid log directive")?,
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Format a kilobyte count with a binary unit
fn format_kb(kb: u64) -> String {
    const MB: u64 = 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if kb >= TB {
        format!("{:.2} TB", kb as f64 / TB as f64)
    } else if kb >= GB {
        format!("{:.2} GB", kb as f64 / GB as f64)
    } else if kb >= MB {
        format!("{:.2} MB", kb as f64 / MB as f64)
    } else {
        format!("{} KB", kb)
    }
}

/// Format seconds as `Nd HH:MM:SS`
fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * used as f64 / total as f64
    }
}

fn collect(interval: Duration) -> Result<Report> {
    let first = sysload::cpuload().context("Failed to read CPU ticks")?;
    std::thread::sleep(interval);
    let cpu = sysload::cpuload().context("Failed to read CPU ticks")?;
    let cpu_percent = cpu.utilization_since(&first).map(|f| f * 100.0);
    debug!(?first, ?cpu, "cpu samples");

    Ok(Report {
        timestamp: Utc::now(),
        uptime_secs: sysload::uptime().context("Failed to read uptime")?,
        cpu,
        cpu_percent,
        memswap: sysload::memswap().context("Failed to read memory usage")?,
    })
}

fn print_report(report: &Report) {
    let mem = &report.memswap;
    println!("Uptime: {}", format_uptime(report.uptime_secs));
    match report.cpu_percent {
        Some(pct) => println!("CPU: {:.1}%", pct),
        None => println!("CPU: n/a (no ticks elapsed)"),
    }
    println!(
        "Memory: {} / {} ({:.1}%)",
        format_kb(mem.mem_used_kb),
        format_kb(mem.mem_total_kb),
        percent(mem.mem_used_kb, mem.mem_total_kb)
    );
    println!(
        "Swap: {} / {} ({:.1}%)",
        format_kb(mem.swap_used_kb),
        format_kb(mem.swap_total_kb),
        percent(mem.swap_used_kb, mem.swap_total_kb)
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet)?;

    let interval = Duration::try_from_secs_f64(args.interval)
        .context("Interval must be a non-negative number")?;
    let report = collect(interval)?;

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}
