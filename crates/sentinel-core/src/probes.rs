use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::http::{is_retryable_status, HttpClient, HttpRequest, TransportError};
use crate::model::{CheckResult, CheckStatus};
use crate::retry::{Attempt, RetryError, RetryPolicy, Sleeper};
use crate::system::{SystemStats, Threshold};

/// A single health check producing one [`CheckResult`]. Probes never fail:
/// an inability to measure is itself reported as `CRIT`.
pub trait Probe {
    fn name(&self) -> &str;
    fn run(&self) -> CheckResult;
}

fn gauge_result(label: &str, status: CheckStatus, percent: f64) -> CheckResult {
    let word = match status {
        CheckStatus::Ok => "OK",
        CheckStatus::Warn => "WARNING",
        CheckStatus::Crit => "CRITICAL",
    };
    CheckResult::new(status, format!("{label} {word}: {percent:.1}%"))
}

pub struct DiskProbe<'a> {
    stats: &'a dyn SystemStats,
    path: PathBuf,
    threshold: Threshold,
}

impl<'a> DiskProbe<'a> {
    pub fn new(stats: &'a dyn SystemStats, path: impl Into<PathBuf>, threshold: Threshold) -> Self {
        Self { stats, path: path.into(), threshold }
    }
}

impl Probe for DiskProbe<'_> {
    fn name(&self) -> &str {
        "disk"
    }

    fn run(&self) -> CheckResult {
        match self.stats.disk_used_percent(&self.path) {
            Ok(pct) => gauge_result("Disk", self.threshold.classify(pct), pct),
            Err(e) => CheckResult::crit(format!("Disk CRITICAL: cannot read usage of {}: {e:#}", self.path.display())),
        }
    }
}

pub struct MemoryProbe<'a> {
    stats: &'a dyn SystemStats,
    threshold: Threshold,
}

impl<'a> MemoryProbe<'a> {
    pub fn new(stats: &'a dyn SystemStats, threshold: Threshold) -> Self {
        Self { stats, threshold }
    }
}

impl Probe for MemoryProbe<'_> {
    fn name(&self) -> &str {
        "memory"
    }

    fn run(&self) -> CheckResult {
        match self.stats.memory_used_percent() {
            Ok(pct) => gauge_result("Memory", self.threshold.classify(pct), pct),
            Err(e) => CheckResult::crit(format!("Memory CRITICAL: cannot read usage: {e:#}")),
        }
    }
}

pub struct ProcessProbe<'a> {
    stats: &'a dyn SystemStats,
    process: String,
}

impl<'a> ProcessProbe<'a> {
    pub fn new(stats: &'a dyn SystemStats, process: impl Into<String>) -> Self {
        Self { stats, process: process.into() }
    }
}

impl Probe for ProcessProbe<'_> {
    fn name(&self) -> &str {
        "process"
    }

    fn run(&self) -> CheckResult {
        match self.stats.find_process(&self.process) {
            Ok(Some(found)) => CheckResult::ok(format!("Process OK: {found} running")),
            Ok(None) => CheckResult::crit(format!("Process CRITICAL: {} not running", self.process)),
            Err(e) => CheckResult::crit(format!("Process CRITICAL: cannot list processes: {e:#}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reachability of an external dependency, retried with backoff. Exhausted
/// retries are `CRIT`, never `WARN`.
pub struct ApiProbe<'a> {
    http: &'a dyn HttpClient,
    sleeper: &'a dyn Sleeper,
    url: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<'a> ApiProbe<'a> {
    pub fn new(
        http: &'a dyn HttpClient,
        sleeper: &'a dyn Sleeper,
        url: impl Into<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self { http, sleeper, url: url.into(), policy, timeout }
    }

    fn attempt(&self) -> Result<u16, Attempt<ProbeFailure>> {
        let request = HttpRequest::get(&self.url, self.timeout);
        let response = self.http.send(&request).map_err(|e| {
            if e.is_retryable() {
                Attempt::retryable(ProbeFailure::Transport(e))
            } else {
                Attempt::fatal(ProbeFailure::Transport(e))
            }
        })?;

        if response.is_success() {
            return Ok(response.status);
        }
        if is_retryable_status(response.status) {
            let retry_after = if response.status == 429 { response.retry_after() } else { None };
            return Err(Attempt::Retryable { error: ProbeFailure::Status(response.status), retry_after });
        }
        Err(Attempt::fatal(ProbeFailure::Status(response.status)))
    }
}

impl Probe for ApiProbe<'_> {
    fn name(&self) -> &str {
        "api"
    }

    fn run(&self) -> CheckResult {
        match self.policy.execute(self.sleeper, |_| self.attempt()) {
            Ok(status) => CheckResult::ok(format!("API OK: {} ({status})", self.url)),
            Err(RetryError::Fatal { error: ProbeFailure::Status(code), .. }) => {
                CheckResult::crit(format!("API CRITICAL: {} returned {code}", self.url))
            }
            Err(RetryError::Fatal { error, .. }) => CheckResult::crit(format!("API CRITICAL: {} {error}", self.url)),
            Err(RetryError::Exhausted { attempts, last }) => CheckResult::crit(format!(
                "API CRITICAL: {} unreachable after {attempts} attempts ({last})",
                self.url
            )),
        }
    }
}
