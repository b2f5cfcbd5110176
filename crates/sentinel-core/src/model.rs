use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secret::Secret;

/// Severity of a single probe. Ordered so that `max` yields the worst case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckStatus {
    Ok,
    Warn,
    Crit,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Crit => "CRIT",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one health probe. Fields are private so a result cannot be
/// altered once a probe has produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    status: CheckStatus,
    message: String,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Ok, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Warn, message)
    }

    pub fn crit(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Crit, message)
    }

    pub fn status(&self) -> CheckStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_critical(&self) -> bool {
        self.status == CheckStatus::Crit
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

/// The single value a gate run resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Safe,
    Blocked(String),
    Critical(Vec<CheckResult>),
}

impl GateOutcome {
    /// Process exit code: 0 safe, 1 blocked, 2 critical.
    pub fn exit_code(&self) -> i32 {
        match self {
            GateOutcome::Safe => 0,
            GateOutcome::Blocked(_) => 1,
            GateOutcome::Critical(_) => 2,
        }
    }

    /// Value of the `result` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            GateOutcome::Safe => "safe",
            GateOutcome::Blocked(_) => "blocked",
            GateOutcome::Critical(_) => "critical",
        }
    }

    /// Alert severity, `None` when nothing needs to be reported.
    pub fn severity(&self) -> Option<&'static str> {
        match self {
            GateOutcome::Safe => None,
            GateOutcome::Blocked(_) => Some("BLOCKED"),
            GateOutcome::Critical(_) => Some("CRITICAL"),
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, GateOutcome::Safe)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid environment: {0}")]
pub struct UnknownEnvironment(pub String);

/// Closed set of deployable environments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Environment {
    Dev,
    Stage,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Stage, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    // Exact match only; "Prod" or " dev" are rejected rather than normalized.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownEnvironment(s.to_string()))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid version format: {0}")]
pub struct InvalidVersion(pub String);

/// A release version of the form `vMAJOR.MINOR.PATCH`. Only constructible
/// through [`ReleaseVersion::parse`], so holding one proves the format.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReleaseVersion(String);

static VERSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^v[0-9]+\.[0-9]+\.[0-9]+$").ok());

impl ReleaseVersion {
    pub fn parse(raw: &str) -> Result<Self, InvalidVersion> {
        if VERSION_PATTERN.as_ref().is_some_and(|re| re.is_match(raw)) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidVersion(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a release needs once the gates have passed. Built by the
/// config gate and only ever lent out by reference.
#[derive(Clone, Debug)]
pub struct ReleaseContext {
    pub env: Environment,
    pub version: ReleaseVersion,
    pub required_process: String,
    pub api_url: String,
    pub deploy_token: Secret,
    /// `owner/name` of the repository receiving the release record.
    pub repository: String,
}
