use tracing::{error, info, warn};

use crate::model::{CheckResult, CheckStatus};
use crate::probes::Probe;

/// Worst status wins; an empty set is `Ok`.
pub fn reduce<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> CheckStatus {
    results.into_iter().map(CheckResult::status).max().unwrap_or(CheckStatus::Ok)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub probe: String,
    pub result: CheckResult,
}

/// Every probe result of one collection pass, in probe order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthReport {
    findings: Vec<Finding>,
}

impl HealthReport {
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn overall(&self) -> CheckStatus {
        reduce(self.findings.iter().map(|f| &f.result))
    }

    /// The aggregate as a single result.
    pub fn verdict(&self) -> CheckResult {
        let count = |s: CheckStatus| self.findings.iter().filter(|f| f.result.status() == s).count();
        CheckResult::new(
            self.overall(),
            format!(
                "{} probes: {} OK, {} WARN, {} CRIT",
                self.findings.len(),
                count(CheckStatus::Ok),
                count(CheckStatus::Warn),
                count(CheckStatus::Crit)
            ),
        )
    }

    pub fn critical(&self) -> Vec<CheckResult> {
        self.findings.iter().filter(|f| f.result.is_critical()).map(|f| f.result.clone()).collect()
    }
}

/// Runs every probe (no short-circuit) and logs each result in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealthAggregator;

impl HealthAggregator {
    pub fn collect(&self, probes: &[&dyn Probe]) -> HealthReport {
        let findings = probes
            .iter()
            .map(|probe| {
                let result = probe.run();
                match result.status() {
                    CheckStatus::Ok => info!(probe = probe.name(), "{}", result.message()),
                    CheckStatus::Warn => warn!(probe = probe.name(), "{}", result.message()),
                    CheckStatus::Crit => error!(probe = probe.name(), "{}", result.message()),
                }
                Finding { probe: probe.name().to_string(), result }
            })
            .collect();
        HealthReport { findings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Canned {
        result: CheckResult,
        runs: Cell<u32>,
    }

    impl Canned {
        fn new(status: CheckStatus) -> Self {
            Self { result: CheckResult::new(status, status.as_str()), runs: Cell::new(0) }
        }
    }

    impl Probe for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn run(&self) -> CheckResult {
            self.runs.set(self.runs.get() + 1);
            self.result.clone()
        }
    }

    fn overall(statuses: &[CheckStatus]) -> CheckStatus {
        let probes: Vec<Canned> = statuses.iter().map(|s| Canned::new(*s)).collect();
        let refs: Vec<&dyn Probe> = probes.iter().map(|p| p as &dyn Probe).collect();
        HealthAggregator.collect(&refs).overall()
    }

    #[test]
    fn worst_status_wins() {
        use CheckStatus::*;
        assert_eq!(overall(&[Ok, Warn, Ok]), Warn);
        assert_eq!(overall(&[Ok, Crit, Warn]), Crit);
        assert_eq!(overall(&[Ok, Ok, Ok]), Ok);
        assert_eq!(overall(&[]), Ok);
    }

    #[test]
    fn every_probe_runs_after_a_critical() {
        let probes = [Canned::new(CheckStatus::Crit), Canned::new(CheckStatus::Ok), Canned::new(CheckStatus::Warn)];
        let refs: Vec<&dyn Probe> = probes.iter().map(|p| p as &dyn Probe).collect();

        let report = HealthAggregator.collect(&refs);

        assert!(probes.iter().all(|p| p.runs.get() == 1));
        assert_eq!(report.findings().len(), 3);
        assert_eq!(report.critical().len(), 1);
        assert_eq!(report.verdict().message(), "3 probes: 1 OK, 1 WARN, 1 CRIT");
        assert_eq!(report.findings()[2].result.status(), CheckStatus::Warn);
    }
}
