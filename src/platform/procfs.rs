//! Load metrics from /proc/uptime, /proc/stat and /proc/meminfo.

use super::SystemLoad;
use crate::error::{PlatformError, Result};
use crate::sample::{CpuSample, MemSwapSample, UptimeSeconds};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tick categories in /proc/stat order: user, nice, system, idle, iowait,
/// irq, softirq, steal. Older kernels report fewer.
const CPU_FIELDS: usize = 8;
const IDLE: usize = 3;
const IOWAIT: usize = 4;

/// Keys read from /proc/meminfo. Scanning stops once all of them were seen.
const MEMINFO_KEYS: [&str; 6] = [
    "MemTotal",
    "MemFree",
    "Buffers",
    "Cached",
    "SwapTotal",
    "SwapFree",
];

/// Reader for a procfs mount, `/proc` unless told otherwise.
#[derive(Debug, Clone)]
pub struct Procfs {
    root: PathBuf,
}

impl Procfs {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Reads from `root` instead of `/proc`, e.g. a host procfs bind-mounted
    /// into a container.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Default for Procfs {
    fn default() -> Self {
        Self::new()
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PlatformError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl SystemLoad for Procfs {
    fn uptime(&self) -> Result<UptimeSeconds> {
        let path = self.path("uptime");
        let content = read(&path)?;
        parse_uptime(&content).ok_or_else(|| PlatformError::Format {
            path,
            reason: "no uptime value".into(),
        })
    }

    fn cpuload(&self) -> Result<CpuSample> {
        let path = self.path("stat");
        let content = read(&path)?;
        parse_cpu_ticks(&content).ok_or_else(|| PlatformError::Format {
            path,
            reason: "first line is not an aggregate cpu line".into(),
        })
    }

    fn memswap(&self) -> Result<MemSwapSample> {
        let path = self.path("meminfo");
        let io_err = |source| PlatformError::Io {
            path: path.clone(),
            source,
        };
        let file = File::open(&path).map_err(io_err)?;
        parse_meminfo(BufReader::new(file)).map_err(io_err)
    }
}

/// Seconds since boot from the contents of /proc/uptime, fractional part
/// truncated.
pub fn parse_uptime(content: &str) -> Option<UptimeSeconds> {
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs as u64)
}

/// Busy/total ticks from the aggregate `cpu` line at the top of /proc/stat.
///
/// `used` excludes idle and iowait.
pub fn parse_cpu_ticks(content: &str) -> Option<CpuSample> {
    let mut tokens = content.lines().next()?.split_whitespace();
    if tokens.next()? != "cpu" {
        return None;
    }

    let mut ticks = tokens
        .map(|t| t.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;
    if ticks.is_empty() {
        return None;
    }
    if ticks.len() < CPU_FIELDS {
        ticks.resize(CPU_FIELDS, 0);
    }

    let total = ticks.iter().fold(0u64, |acc, t| acc.saturating_add(*t));
    let idle = ticks[IDLE].saturating_add(ticks[IOWAIT]);
    Some(CpuSample {
        used: total.saturating_sub(idle),
        total,
    })
}

/// Splits `Key:   1234 kB` into `("Key", "1234")`. The value is the run of
/// digits right after the colon, so a unit glued to it (`1234kB`) is dropped.
/// An empty value means the line had no digits there.
fn split_meminfo_line(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    let rest = rest.trim_start();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    Some((key, &rest[..digits]))
}

/// Memory and swap usage from /proc/meminfo.
///
/// Only exact `Key: number` lines for the six keys of interest contribute;
/// everything else is ignored. An expected key with a non-numeric value is
/// skipped. Reading stops as soon as all six keys were seen.
pub fn parse_meminfo<R: BufRead>(reader: R) -> io::Result<MemSwapSample> {
    let mut values = [0u64; MEMINFO_KEYS.len()];
    let mut seen = [false; MEMINFO_KEYS.len()];

    for line in reader.lines() {
        let line = line?;
        let Some((key, value)) = split_meminfo_line(&line) else {
            continue;
        };
        let Some(slot) = MEMINFO_KEYS.iter().position(|k| *k == key) else {
            continue;
        };

        match value.parse::<u64>() {
            Ok(v) => {
                values[slot] = v;
                seen[slot] = true;
            }
            Err(_) => {
                debug!(line = %line, "skipping malformed meminfo line");
                continue;
            }
        }

        if seen.iter().all(|s| *s) {
            break;
        }
    }

    let [mem_total, mem_free, buffers, cached, swap_total, swap_free] = values;
    Ok(MemSwapSample {
        mem_used_kb: mem_total
            .saturating_sub(mem_free)
            .saturating_sub(buffers)
            .saturating_sub(cached),
        mem_total_kb: mem_total,
        swap_used_kb: swap_total.saturating_sub(swap_free),
        swap_total_kb: swap_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    const MEMINFO: &str = "\
MemTotal:           1000 kB
MemFree:             200 kB
MemAvailable:        700 kB
Buffers:              50 kB
Cached:              150 kB
SwapCached:            0 kB
Active:              300 kB
Active(file):        100 kB
SwapTotal:           500 kB
SwapFree:            100 kB
Dirty:                 4 kB
";

    fn meminfo(content: &str) -> MemSwapSample {
        parse_meminfo(Cursor::new(content)).unwrap()
    }

    #[test]
    fn test_parse_meminfo_basic() {
        let sample = meminfo(MEMINFO);
        assert_eq!(sample.mem_used_kb, 600);
        assert_eq!(sample.mem_total_kb, 1000);
        assert_eq!(sample.swap_used_kb, 400);
        assert_eq!(sample.swap_total_kb, 500);
    }

    #[test]
    fn test_parse_meminfo_any_order() {
        let content = "\
SwapFree: 100 kB
Unrelated: 7 kB
Cached: 150 kB
SwapTotal: 500 kB
MemFree: 200 kB
Buffers: 50 kB
MemTotal: 1000 kB
";
        assert_eq!(
            <(u64, u64, u64, u64)>::from(meminfo(content)),
            (600, 1000, 400, 500)
        );
    }

    #[test]
    fn test_parse_meminfo_stops_after_all_keys() {
        // A second MemTotal after the full set must not be read.
        let content = format!("{MEMINFO}MemTotal: 99999 kB\n");
        assert_eq!(meminfo(&content).mem_total_kb, 1000);
    }

    #[test]
    fn test_parse_meminfo_skips_malformed_lines() {
        let content = "\
MemTotal: 1000 kB
MemFree: lots kB
garbage line without colon
Buffers:
Cached: 150 kB
";
        let sample = meminfo(content);
        assert_eq!(sample.mem_total_kb, 1000);
        assert_eq!(sample.mem_used_kb, 850);
        assert_eq!(sample.swap_total_kb, 0);
        assert_eq!(sample.swap_used_kb, 0);
    }

    #[test]
    fn test_parse_meminfo_unit_attached_to_value() {
        let content = "\
MemTotal:1000kB
MemFree:\t200kB
Buffers: 50kB
Cached:150
SwapTotal: 500 kB
SwapFree: 100kB
";
        assert_eq!(
            <(u64, u64, u64, u64)>::from(meminfo(content)),
            (600, 1000, 400, 500)
        );
    }

    #[test]
    fn test_parse_meminfo_ignores_similar_keys() {
        let content = "\
MemTotal: 1000 kB
SwapCached: 999 kB
Cached: 100 kB
";
        assert_eq!(meminfo(content).mem_used_kb, 900);
    }

    #[test]
    fn test_parse_meminfo_empty() {
        assert_eq!(meminfo(""), MemSwapSample::default());
    }

    #[test]
    fn test_parse_cpu_ticks_basic() {
        let content = "cpu 100 0 50 800 10 0 0 0\ncpu0 50 0 25 400 5 0 0 0\n";
        let sample = parse_cpu_ticks(content).unwrap();
        assert_eq!(sample.total, 960);
        assert_eq!(sample.used, 150);
    }

    #[test]
    fn test_parse_cpu_ticks_old_kernel_pads_fields() {
        // 2.4 kernels only report user, nice, system, idle.
        let sample = parse_cpu_ticks("cpu  10 20 30 40\n").unwrap();
        assert_eq!(sample.total, 100);
        assert_eq!(sample.used, 60);
    }

    #[test]
    fn test_parse_cpu_ticks_counts_guest_fields() {
        let sample = parse_cpu_ticks("cpu 1 1 1 1 1 1 1 1 1 1\n").unwrap();
        assert_eq!(sample.total, 10);
        assert_eq!(sample.used, 8);
    }

    #[test]
    fn test_parse_cpu_ticks_saturates_on_huge_counters() {
        let sample = parse_cpu_ticks("cpu 18446744073709551615 1 0 0\n").unwrap();
        assert_eq!(sample.total, u64::MAX);
        assert_eq!(sample.used, u64::MAX);

        let sample = parse_cpu_ticks("cpu 0 0 0 18446744073709551615 5\n").unwrap();
        assert_eq!(sample.total, u64::MAX);
        assert_eq!(sample.used, 0);
    }

    #[test]
    fn test_parse_cpu_ticks_rejects_bad_input() {
        assert!(parse_cpu_ticks("").is_none());
        assert!(parse_cpu_ticks("cpu\n").is_none());
        assert!(parse_cpu_ticks("intr 1 2 3\n").is_none());
        assert!(parse_cpu_ticks("cpu 1 two 3\n").is_none());
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("350735.47 234388.90\n"), Some(350735));
        assert_eq!(parse_uptime("0.99 0.10"), Some(0));
        assert_eq!(parse_uptime(""), None);
        assert_eq!(parse_uptime("abc 1.0"), None);
        assert_eq!(parse_uptime("-5.0 1.0"), None);
    }

    #[test]
    fn test_procfs_reads_from_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uptime"), "12345.67 9999.00\n").unwrap();
        fs::write(dir.path().join("stat"), "cpu 100 0 50 800 10 0 0 0\nctxt 1\n").unwrap();
        fs::write(dir.path().join("meminfo"), MEMINFO).unwrap();

        let procfs = Procfs::with_root(dir.path());
        assert_eq!(procfs.uptime().unwrap(), 12345);
        assert_eq!(procfs.cpuload().unwrap(), CpuSample { used: 150, total: 960 });
        assert_eq!(
            procfs.memswap().unwrap(),
            MemSwapSample {
                mem_used_kb: 600,
                mem_total_kb: 1000,
                swap_used_kb: 400,
                swap_total_kb: 500,
            }
        );
    }

    #[test]
    fn test_procfs_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let procfs = Procfs::with_root(dir.path());

        match procfs.memswap() {
            Err(PlatformError::Io { path, source }) => {
                assert!(path.ends_with("meminfo"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
        assert!(matches!(procfs.uptime(), Err(PlatformError::Io { .. })));
    }

    #[test]
    fn test_procfs_garbage_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("uptime"), "\n").unwrap();
        fs::write(dir.path().join("stat"), "not a stat file\n").unwrap();

        let procfs = Procfs::with_root(dir.path());
        assert!(matches!(procfs.uptime(), Err(PlatformError::Format { .. })));
        assert!(matches!(procfs.cpuload(), Err(PlatformError::Format { .. })));
    }

    proptest! {
        #[test]
        fn prop_cpu_used_never_exceeds_total(
            ticks in prop::collection::vec(any::<u64>(), 1..12)
        ) {
            let line = format!(
                "cpu {}\n",
                ticks.iter().map(u64::to_string).collect::<Vec<_>>().join(" ")
            );
            let sample = parse_cpu_ticks(&line).unwrap();
            prop_assert!(sample.used <= sample.total);
            prop_assert_eq!(
                sample.total,
                ticks.iter().fold(0u64, |acc, t| acc.saturating_add(*t))
            );
        }

        #[test]
        fn prop_meminfo_order_does_not_matter(
            lines in Just(vec![
                "MemTotal: 1000 kB",
                "MemFree: 200 kB",
                "Buffers: 50 kB",
                "Cached: 150 kB",
                "SwapTotal: 500 kB",
                "SwapFree: 100 kB",
                "Shmem: 12 kB",
                "HugePages_Total: 0",
            ]).prop_shuffle()
        ) {
            let sample = meminfo(&lines.join("\n"));
            prop_assert_eq!(<(u64, u64, u64, u64)>::from(sample), (600, 1000, 400, 500));
        }
    }
}
