use anyhow::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub short_id: String,
    pub subject: String,
}

/// Source-control operations the gate and the actuator need. Tags double as
/// the idempotency key of a release.
pub trait Repository: Send + Sync {
    fn is_work_tree(&self) -> Result<bool>;

    fn is_clean(&self) -> Result<bool>;

    fn current_branch(&self) -> Result<String>;

    fn tags(&self) -> Result<Vec<String>>;

    fn tag_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.tags()?.iter().any(|t| t == tag))
    }

    /// Fails if `tag` already exists; never moves an existing tag.
    fn create_annotated_tag(&self, tag: &str, message: &str) -> Result<()>;

    fn push_tag(&self, remote: &str, tag: &str) -> Result<()>;

    /// Most recent tag reachable from HEAD, if any.
    fn latest_tag(&self) -> Result<Option<String>>;

    /// Commits after `since` (exclusive) up to HEAD, newest first. `None`
    /// means the whole history.
    fn log_since(&self, since: Option<&str>) -> Result<Vec<Commit>>;
}
