use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use sentinel_core::Secret;
use tracing::info;

use crate::actuator::ActuationError;

/// Reverts a deployment to its previous rollout.
pub trait RolloutController: Send + Sync {
    fn undo(&self, deployment: &str, namespace: &str) -> Result<()>;
}

/// `kubectl rollout undo`. The kubeconfig path is handed to the child
/// through `KUBECONFIG` and never appears on the command line.
pub struct KubectlRollout {
    program: PathBuf,
    kubeconfig: Option<Secret>,
}

impl KubectlRollout {
    pub fn new(kubeconfig: Option<Secret>) -> Self {
        Self { program: PathBuf::from("kubectl"), kubeconfig }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl RolloutController for KubectlRollout {
    fn undo(&self, deployment: &str, namespace: &str) -> Result<()> {
        let target = format!("deployment/{deployment}");
        let mut cmd = Command::new(&self.program);
        cmd.args(["rollout", "undo", &target, "-n", namespace]);
        if let Some(path) = &self.kubeconfig {
            cmd.env("KUBECONFIG", path.expose());
        }
        let out = cmd.output().with_context(|| format!("run {}", self.program.display()))?;
        if !out.status.success() {
            bail!("kubectl exited with {}: {}", out.status, String::from_utf8_lossy(&out.stderr).trim());
        }
        Ok(())
    }
}

/// Undo the last rollout of `deployment`. Independent of tagging.
pub fn rollback(controller: &dyn RolloutController, deployment: &str, namespace: &str) -> Result<(), ActuationError> {
    let fail = |reason: String| ActuationError::Rollback {
        deployment: deployment.to_string(),
        namespace: namespace.to_string(),
        reason,
    };
    if deployment.trim().is_empty() {
        return Err(fail("deployment name is empty".into()));
    }
    controller.undo(deployment, namespace).map_err(|e| fail(format!("{e:#}")))?;
    info!(deployment, namespace, "rollback triggered");
    Ok(())
}

/// Records `(deployment, namespace)` pairs instead of calling a cluster.
#[derive(Debug, Default)]
pub struct RecordingRollout {
    fail: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingRollout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl RolloutController for RecordingRollout {
    fn undo(&self, deployment: &str, namespace: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((deployment.to_string(), namespace.to_string()));
        if self.fail {
            bail!("deployments.apps \"{deployment}\" not found");
        }
        Ok(())
    }
}
