use anyhow::Result;
use sentinel_core::GateOutcome;
use sentinel_release::ActuationError;
use tracing::{debug, warn};

/// What the side channels get to see about a finished run. Built from the
/// outcome only, so nothing in a [`sentinel_core::ReleaseContext`] can
/// reach an alert or metrics file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Environment exactly as requested, even when it failed validation.
    pub env: String,
    /// `safe`, `blocked`, `critical` or `failed`.
    pub result: &'static str,
    /// `None` for runs that need no alert.
    pub severity: Option<&'static str>,
    pub message: String,
}

pub const CRITICAL_MESSAGE: &str = "Release BLOCKED (CRITICAL): system or dependency unhealthy";

impl RunReport {
    pub fn from_outcome(env: &str, outcome: &GateOutcome) -> Self {
        let message = match outcome {
            GateOutcome::Safe => "Release published".to_string(),
            GateOutcome::Blocked(reason) => reason.clone(),
            GateOutcome::Critical(failed) if failed.is_empty() => CRITICAL_MESSAGE.to_string(),
            GateOutcome::Critical(failed) => {
                let detail: Vec<&str> = failed.iter().map(|c| c.message()).collect();
                format!("{CRITICAL_MESSAGE}: {}", detail.join("; "))
            }
        };
        Self { env: env.to_string(), result: outcome.label(), severity: outcome.severity(), message }
    }

    pub fn failed(env: &str, error: &ActuationError) -> Self {
        Self {
            env: env.to_string(),
            result: "failed",
            severity: Some("FAILED"),
            message: format!("Release FAILED after all gates passed: {error}"),
        }
    }

    pub fn is_safe(&self) -> bool {
        self.result == "safe"
    }
}

/// A non-critical effect of a run: an alert, a metrics file. Errors are
/// returned so they can be logged, never to change the outcome.
pub trait SideChannel {
    fn name(&self) -> &str;
    fn emit(&self, report: &RunReport) -> Result<()>;
}

/// Every side channel of a run. [`Effects::dispatch`] returns nothing, so
/// a failing channel cannot alter what the caller returns.
#[derive(Default)]
pub struct Effects {
    channels: Vec<Box<dyn SideChannel>>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: impl SideChannel + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn dispatch(&self, report: &RunReport) {
        for channel in &self.channels {
            match channel.emit(report) {
                Ok(()) => debug!(channel = channel.name(), "side channel done"),
                Err(e) => warn!(channel = channel.name(), error = %format!("{e:#}"), "side channel failed"),
            }
        }
    }
}

/// Keeps every report it is given. For tests.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    reports: std::sync::Arc<std::sync::Mutex<Vec<RunReport>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl SideChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn emit(&self, report: &RunReport) -> Result<()> {
        self.reports.lock().unwrap_or_else(|p| p.into_inner()).push(report.clone());
        Ok(())
    }
}
