use sentinel_core::{Environment, ReleaseContext, ReleaseVersion, Secret};
use thiserror::Error;
use tracing::info;

use crate::settings::ConfigSource;

/// A required setting and the alternate names it may be given under, in
/// lookup order. Errors always name `names[0]`.
#[derive(Clone, Copy, Debug)]
pub struct RequiredKey {
    pub names: &'static [&'static str],
}

impl RequiredKey {
    pub fn primary(&self) -> &'static str {
        self.names[0]
    }
}

pub const REQUIRED_PROCESS: RequiredKey = RequiredKey { names: &["RS_REQUIRED_PROCESS"] };
pub const API_URL: RequiredKey = RequiredKey { names: &["RS_API_URL", "SERVICE_URL"] };
pub const DEPLOY_TOKEN: RequiredKey = RequiredKey { names: &["RS_DEPLOY_TOKEN", "GITHUB_TOKEN"] };
pub const REPOSITORY: RequiredKey = RequiredKey { names: &["GITHUB_REPOSITORY"] };

/// Checked in this order; the first one missing is reported.
pub const REQUIRED_KEYS: [RequiredKey; 4] = [REQUIRED_PROCESS, API_URL, DEPLOY_TOKEN, REPOSITORY];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
}

pub struct ConfigGate<'a> {
    source: &'a dyn ConfigSource,
}

impl<'a> ConfigGate<'a> {
    pub fn new(source: &'a dyn ConfigSource) -> Self {
        Self { source }
    }

    fn lookup(&self, key: RequiredKey) -> Option<String> {
        key.names.iter().find_map(|name| self.source.get(name))
    }

    /// Fails closed on the first required key that is absent or blank.
    pub fn resolve(&self, env: Environment, version: ReleaseVersion) -> Result<ReleaseContext, ConfigError> {
        if let Some(missing) = REQUIRED_KEYS.iter().find(|k| self.lookup(**k).is_none()) {
            return Err(ConfigError::Missing(missing.primary()));
        }
        let take = |key: RequiredKey| self.lookup(key).ok_or(ConfigError::Missing(key.primary()));

        let ctx = ReleaseContext {
            env,
            version,
            required_process: take(REQUIRED_PROCESS)?,
            api_url: take(API_URL)?,
            deploy_token: Secret::new(take(DEPLOY_TOKEN)?),
            repository: take(REPOSITORY)?,
        };
        info!("Config OK: process={}, api_url={}", ctx.required_process, ctx.api_url);
        Ok(ctx)
    }
}
