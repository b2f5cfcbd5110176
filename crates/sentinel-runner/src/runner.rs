use std::sync::Arc;

use sentinel_core::{
    ApiProbe, CheckStatus, DiskProbe, GateOutcome, HealthAggregator, HealthReport, HttpClient, MemoryProbe, Probe,
    ProcessProbe, ReleaseContext, Sleeper, SystemStats,
};
use sentinel_release::{ActuationError, ReleaseActuator, ReleasePublisher};
use sentinel_vcs::Repository;
use tracing::{error, info, info_span, Span};
use uuid::Uuid;

use crate::alerts::WebhookAlertSink;
use crate::config_gate::ConfigGate;
use crate::effects::{Effects, RunReport};
use crate::metrics::MetricsWriter;
use crate::policy::PolicyGate;
use crate::settings::{ConfigSource, Settings};

/// The span every log line of one run is recorded in.
pub fn run_span(env: &str) -> Span {
    info_span!("release_sentinel", run_id = %Uuid::new_v4(), env)
}

/// The alert webhook and metrics file configured in `settings`.
pub fn standard_effects(settings: &Settings, http: Arc<dyn HttpClient>) -> Effects {
    Effects::new()
        .with(WebhookAlertSink::new(http, settings.alert_webhook.clone(), settings.alert_timeout()))
        .with(MetricsWriter::new(settings.metrics_dir.clone()))
}

/// External systems a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub source: &'a dyn ConfigSource,
    pub repo: &'a dyn Repository,
    pub stats: &'a dyn SystemStats,
    pub http: &'a dyn HttpClient,
    pub sleeper: &'a dyn Sleeper,
    pub publisher: &'a dyn ReleasePublisher,
}

/// Policy, config, health, then actuation. The first two end a run as
/// `Blocked`, a `CRIT` health finding as `Critical`; anything going wrong
/// during actuation is returned as an [`ActuationError`].
pub struct GateRunner<'a> {
    settings: &'a Settings,
    with: Collaborators<'a>,
    effects: Effects,
    span: Span,
}

impl<'a> GateRunner<'a> {
    pub fn new(settings: &'a Settings, with: Collaborators<'a>, effects: Effects, span: Span) -> Self {
        Self { settings, with, effects, span }
    }

    pub fn run(&self, env: &str, version: &str) -> Result<GateOutcome, ActuationError> {
        let _entered = self.span.enter();
        info!(version, "release gate started");

        let result = self.evaluate(env, version);
        let report = match &result {
            Ok(outcome) => {
                match outcome {
                    GateOutcome::Safe => info!(version, "release SAFE"),
                    other => error!(outcome = other.label(), "release not allowed"),
                }
                RunReport::from_outcome(env, outcome)
            }
            Err(e) => {
                error!(error = %e, "release actuation failed; remediate by hand");
                RunReport::failed(env, e)
            }
        };
        self.effects.dispatch(&report);
        result
    }

    fn evaluate(&self, env: &str, version: &str) -> Result<GateOutcome, ActuationError> {
        let policy = PolicyGate::new(self.with.repo, &self.settings.allowed_branches)
            .skip_repo_checks(self.settings.skip_git_checks);
        let approved = match policy.check(env, version) {
            Ok(approved) => approved,
            Err(e) => {
                error!(reason = %e, "policy gate failed");
                return Ok(GateOutcome::Blocked(format!("Release BLOCKED (policy): {e}")));
            }
        };

        let ctx = match ConfigGate::new(self.with.source).resolve(approved.env, approved.version) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(reason = %e, "config gate failed");
                return Ok(GateOutcome::Blocked(format!("Release BLOCKED (config): {e}")));
            }
        };

        let health = self.health(&ctx);
        let verdict = health.verdict();
        if health.overall() == CheckStatus::Crit {
            error!(%verdict, "health check failed");
            return Ok(GateOutcome::Critical(health.critical()));
        }
        info!(%verdict, "health check passed");

        ReleaseActuator::new(self.with.repo, self.with.publisher, self.settings.remote.as_str()).publish(&ctx)?;
        Ok(GateOutcome::Safe)
    }

    fn health(&self, ctx: &ReleaseContext) -> HealthReport {
        let s = self.settings;
        let disk = DiskProbe::new(self.with.stats, &s.disk_path, s.thresholds.disk);
        let memory = MemoryProbe::new(self.with.stats, s.thresholds.memory);
        let process = ProcessProbe::new(self.with.stats, ctx.required_process.as_str());
        let api = ApiProbe::new(self.with.http, self.with.sleeper, ctx.api_url.as_str(), s.retry_policy(), s.api_timeout());
        let probes: [&dyn Probe; 4] = [&disk, &memory, &process, &api];
        HealthAggregator.collect(&probes)
    }
}
