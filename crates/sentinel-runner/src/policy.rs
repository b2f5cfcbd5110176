use sentinel_core::{Environment, InvalidVersion, ReleaseVersion, UnknownEnvironment};
use sentinel_vcs::Repository;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    InvalidEnvironment(#[from] UnknownEnvironment),
    #[error("not inside a git work tree")]
    NotARepository,
    #[error("working tree has uncommitted changes")]
    DirtyTree,
    #[error("branch '{branch}' is not allowed for release (allowed: {allowed})")]
    BranchNotAllowed { branch: String, allowed: String },
    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersion),
    #[error("tag {0} already exists")]
    TagExists(String),
    #[error("inspect repository: {0}")]
    Inspect(String),
}

/// Inputs that passed every policy check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Approved {
    pub env: Environment,
    pub version: ReleaseVersion,
}

/// Static preconditions, checked in order and stopping at the first
/// failure: environment, repository present, clean tree, branch, version
/// format, tag not yet taken.
pub struct PolicyGate<'a> {
    repo: &'a dyn Repository,
    allowed_branches: &'a [String],
    skip_repo_checks: bool,
}

fn inspect<T>(result: anyhow::Result<T>) -> Result<T, PolicyError> {
    result.map_err(|e| PolicyError::Inspect(format!("{e:#}")))
}

impl<'a> PolicyGate<'a> {
    pub fn new(repo: &'a dyn Repository, allowed_branches: &'a [String]) -> Self {
        Self { repo, allowed_branches, skip_repo_checks: false }
    }

    /// Skip the repository validators, for runs without a checkout. The
    /// version format is still enforced.
    pub fn skip_repo_checks(mut self, skip: bool) -> Self {
        self.skip_repo_checks = skip;
        self
    }

    pub fn check(&self, env: &str, version: &str) -> Result<Approved, PolicyError> {
        let env: Environment = env.parse()?;

        if self.skip_repo_checks {
            debug!("repository checks skipped");
        } else {
            if !inspect(self.repo.is_work_tree())? {
                return Err(PolicyError::NotARepository);
            }
            if !inspect(self.repo.is_clean())? {
                return Err(PolicyError::DirtyTree);
            }
            let branch = inspect(self.repo.current_branch())?;
            if !self.allowed_branches.iter().any(|b| *b == branch) {
                return Err(PolicyError::BranchNotAllowed { branch, allowed: self.allowed_branches.join(", ") });
            }
        }

        let version = ReleaseVersion::parse(version)?;

        if !self.skip_repo_checks && inspect(self.repo.tag_exists(version.as_str()))? {
            return Err(PolicyError::TagExists(version.to_string()));
        }

        info!(%env, %version, "policy checks passed");
        Ok(Approved { env, version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_vcs::MemoryRepository;

    fn branches() -> Vec<String> {
        vec!["main".to_string(), "master".to_string()]
    }

    #[test]
    fn clean_main_passes() {
        let repo = MemoryRepository::new("main").commit("a", "init");
        let allowed = branches();
        let ok = PolicyGate::new(&repo, &allowed).check("prod", "v2.0.0").unwrap();
        assert_eq!(ok.env, Environment::Prod);
        assert_eq!(ok.version.as_str(), "v2.0.0");
    }

    #[test]
    fn rejects_unknown_environments() {
        let repo = MemoryRepository::new("main");
        let allowed = branches();
        for env in ["production", "qa", "DEV", ""] {
            let err = PolicyGate::new(&repo, &allowed).check(env, "v1.0.0").unwrap_err();
            assert!(matches!(err, PolicyError::InvalidEnvironment(_)), "{env}");
        }
    }

    #[test]
    fn rejects_bad_versions() {
        let repo = MemoryRepository::new("main");
        let allowed = branches();
        for version in ["1.0.0", "v1.0", "v1.0.0-beta", "latest"] {
            let err = PolicyGate::new(&repo, &allowed).check("dev", version).unwrap_err();
            assert!(matches!(err, PolicyError::InvalidVersion(_)), "{version}");
        }
    }

    #[test]
    fn first_failure_wins() {
        let allowed = branches();

        // dirty tree is reported before the branch and the version
        let repo = MemoryRepository::new("feature/x").dirty();
        let err = PolicyGate::new(&repo, &allowed).check("dev", "bogus").unwrap_err();
        assert!(matches!(err, PolicyError::DirtyTree));

        let repo = MemoryRepository::new("feature/x");
        let err = PolicyGate::new(&repo, &allowed).check("dev", "bogus").unwrap_err();
        assert!(matches!(err, PolicyError::BranchNotAllowed { ref branch, .. } if branch == "feature/x"));

        let repo = MemoryRepository::new("main").not_a_repo().dirty();
        let err = PolicyGate::new(&repo, &allowed).check("dev", "v1.0.0").unwrap_err();
        assert!(matches!(err, PolicyError::NotARepository));

        let err = PolicyGate::new(&repo, &allowed).check("qa", "v1.0.0").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidEnvironment(_)));
    }

    #[test]
    fn existing_tag_is_rejected() {
        let repo = MemoryRepository::new("master").commit("a", "init").tag("v1.0.0");
        let allowed = branches();
        let err = PolicyGate::new(&repo, &allowed).check("stage", "v1.0.0").unwrap_err();
        assert_eq!(err.to_string(), "tag v1.0.0 already exists");
    }

    #[test]
    fn skipping_repo_checks_keeps_env_and_version() {
        let repo = MemoryRepository::new("detached").not_a_repo().dirty().tag("v1.0.0");
        let allowed = branches();
        let gate = PolicyGate::new(&repo, &allowed).skip_repo_checks(true);

        assert!(gate.check("dev", "v1.0.0").is_ok());
        assert!(matches!(gate.check("qa", "v1.0.0"), Err(PolicyError::InvalidEnvironment(_))));
        assert!(matches!(gate.check("dev", "1.0"), Err(PolicyError::InvalidVersion(_))));
    }
}
