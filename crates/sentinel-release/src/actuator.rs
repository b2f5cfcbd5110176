use sentinel_core::ReleaseContext;
use sentinel_vcs::Repository;
use thiserror::Error;
use tracing::{info, warn};

use crate::notes::release_notes;
use crate::publisher::{PublishError, ReleaseDraft, ReleasePublisher};

/// Failures after every gate has passed. None of these are retried or
/// reversed; a pushed tag stays pushed.
#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("tag {0} already exists; refusing to release it twice")]
    DuplicateTag(String),
    #[error("inspect repository: {0}")]
    Inspect(String),
    #[error("generate release notes: {0}")]
    Notes(String),
    #[error("create tag {tag}: {reason}")]
    Tag { tag: String, reason: String },
    #[error("push tag {tag} to {remote}: {reason}")]
    Push { tag: String, remote: String, reason: String },
    #[error("publish release {tag}: {error}")]
    Publish { tag: String, error: PublishError },
    #[error("rollback of deployment/{deployment} in {namespace}: {reason}")]
    Rollback { deployment: String, namespace: String, reason: String },
}

/// Tags, pushes and publishes one version.
pub struct ReleaseActuator<'a> {
    repo: &'a dyn Repository,
    publisher: &'a dyn ReleasePublisher,
    remote: String,
}

impl<'a> ReleaseActuator<'a> {
    pub fn new(repo: &'a dyn Repository, publisher: &'a dyn ReleasePublisher, remote: impl Into<String>) -> Self {
        Self { repo, publisher, remote: remote.into() }
    }

    pub fn publish(&self, ctx: &ReleaseContext) -> Result<(), ActuationError> {
        let tag = ctx.version.as_str();

        if self.tag_exists(tag)? {
            return Err(ActuationError::DuplicateTag(tag.to_string()));
        }
        let body = release_notes(self.repo, &ctx.version).map_err(|e| ActuationError::Notes(format!("{e:#}")))?;

        let name = format!("Release {tag}");
        if let Err(e) = self.repo.create_annotated_tag(tag, &name) {
            // another run may have tagged between the check and here
            if self.tag_exists(tag)? {
                return Err(ActuationError::DuplicateTag(tag.to_string()));
            }
            return Err(ActuationError::Tag { tag: tag.to_string(), reason: format!("{e:#}") });
        }
        info!(tag, "created annotated tag");

        self.repo.push_tag(&self.remote, tag).map_err(|e| ActuationError::Push {
            tag: tag.to_string(),
            remote: self.remote.clone(),
            reason: format!("{e:#}"),
        })?;
        info!(tag, remote = %self.remote, "pushed tag");

        let draft = ReleaseDraft { tag_name: tag.to_string(), name, body };
        self.publisher.create_release(ctx, &draft).map_err(|error| {
            warn!(tag, "tag is pushed but the release record is missing; fix by hand");
            ActuationError::Publish { tag: tag.to_string(), error }
        })?;
        Ok(())
    }

    fn tag_exists(&self, tag: &str) -> Result<bool, ActuationError> {
        self.repo.tag_exists(tag).map_err(|e| ActuationError::Inspect(format!("{e:#}")))
    }
}
