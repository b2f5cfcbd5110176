use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use sentinel_core::{process_matches, SystemStats};

/// Longest name the kernel keeps in `/proc/<pid>/comm`.
const COMM_LEN: usize = 15;

/// Metrics of the machine the gate runs on. Memory and process data come
/// from procfs, so those probes only succeed on Linux.
#[derive(Clone, Debug)]
pub struct HostStats {
    proc_root: PathBuf,
}

impl Default for HostStats {
    fn default() -> Self {
        Self { proc_root: PathBuf::from("/proc") }
    }
}

impl HostStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read procfs from somewhere other than `/proc`.
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self { proc_root: proc_root.into() }
    }
}

/// Share of `total` not reported as `free`, in percent.
pub fn used_percent(total: u64, free: u64) -> Result<f64> {
    if total == 0 {
        bail!("filesystem reports zero capacity");
    }
    let used = total.saturating_sub(free);
    Ok(used as f64 / total as f64 * 100.0)
}

/// `(MemTotal - MemAvailable) / MemTotal` from a `/proc/meminfo` dump.
pub fn parse_meminfo(text: &str) -> Result<f64> {
    let field = |name: &str| -> Result<u64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| anyhow!("{name} missing from meminfo"))?
            .parse::<u64>()
            .with_context(|| format!("parse {name}"))
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    used_percent(total, available)
}

impl SystemStats for HostStats {
    fn disk_used_percent(&self, path: &Path) -> Result<f64> {
        let total = fs2::total_space(path).with_context(|| format!("statvfs {}", path.display()))?;
        let free = fs2::free_space(path).with_context(|| format!("statvfs {}", path.display()))?;
        used_percent(total, free)
    }

    fn memory_used_percent(&self) -> Result<f64> {
        let path = self.proc_root.join("meminfo");
        let text = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        parse_meminfo(&text)
    }

    fn find_process(&self, wanted: &str) -> Result<Option<String>> {
        let entries = std::fs::read_dir(&self.proc_root)
            .with_context(|| format!("list {}", self.proc_root.display()))?;
        for entry in entries.flatten() {
            let is_pid = entry.file_name().to_str().is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()));
            if !is_pid {
                continue;
            }
            // processes may exit between listing and reading
            let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };
            let name = comm.trim();
            if process_matches(name, wanted) {
                return Ok(Some(name.to_string()));
            }
            if name.len() == COMM_LEN {
                if let Some(full) = argv0_name(&entry.path()) {
                    if process_matches(&full, wanted) {
                        return Ok(Some(full));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Basename of `argv[0]` from `/proc/<pid>/cmdline`, for names `comm` cut short.
fn argv0_name(pid_dir: &Path) -> Option<String> {
    let raw = std::fs::read(pid_dir.join("cmdline")).ok()?;
    let argv0 = raw.split(|b| *b == 0).next().filter(|a| !a.is_empty())?;
    let argv0 = String::from_utf8_lossy(argv0);
    let base = argv0.rsplit('/').next().unwrap_or_default().trim();
    (!base.is_empty()).then(|| base.to_string())
}
