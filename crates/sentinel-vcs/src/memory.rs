use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use crate::types::{Commit, Repository};

/// In-memory repository for tests. Not a git emulation; just enough state
/// for the gate and the actuator.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    not_a_repo: bool,
    dirty: bool,
    branch: String,
    /// Oldest first.
    commits: Vec<Commit>,
    /// Tag name -> number of commits reachable when it was created.
    tags: Vec<(String, usize)>,
    messages: HashMap<String, String>,
    pushed: Vec<(String, String)>,
    reject_push: bool,
}

impl MemoryRepository {
    pub fn new(branch: &str) -> Self {
        let repo = Self::default();
        repo.lock().branch = branch.to_string();
        repo
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn commit(self, short_id: &str, subject: &str) -> Self {
        self.lock().commits.push(Commit { short_id: short_id.into(), subject: subject.into() });
        self
    }

    pub fn tag(self, tag: &str) -> Self {
        {
            let mut inner = self.lock();
            let at = inner.commits.len();
            inner.tags.push((tag.to_string(), at));
        }
        self
    }

    pub fn dirty(self) -> Self {
        self.lock().dirty = true;
        self
    }

    pub fn not_a_repo(self) -> Self {
        self.lock().not_a_repo = true;
        self
    }

    pub fn rejecting_push(self) -> Self {
        self.lock().reject_push = true;
        self
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.lock().tags.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn tag_message(&self, tag: &str) -> Option<String> {
        self.lock().messages.get(tag).cloned()
    }

    /// `(remote, tag)` pairs in push order.
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.lock().pushed.clone()
    }
}

impl Repository for MemoryRepository {
    fn is_work_tree(&self) -> Result<bool> {
        Ok(!self.lock().not_a_repo)
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(!self.lock().dirty)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.lock().branch.clone())
    }

    fn tags(&self) -> Result<Vec<String>> {
        Ok(self.tag_names())
    }

    fn create_annotated_tag(&self, tag: &str, message: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.tags.iter().any(|(t, _)| t == tag) {
            bail!("tag '{tag}' already exists");
        }
        let at = inner.commits.len();
        inner.tags.push((tag.to_string(), at));
        inner.messages.insert(tag.to_string(), message.to_string());
        Ok(())
    }

    fn push_tag(&self, remote: &str, tag: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.reject_push {
            bail!("remote '{remote}' rejected {tag}");
        }
        if !inner.tags.iter().any(|(t, _)| t == tag) {
            bail!("src refspec {tag} does not match any");
        }
        inner.pushed.push((remote.to_string(), tag.to_string()));
        Ok(())
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        Ok(self.lock().tags.last().map(|(t, _)| t.clone()))
    }

    fn log_since(&self, since: Option<&str>) -> Result<Vec<Commit>> {
        let inner = self.lock();
        let start = match since {
            None => 0,
            Some(tag) => inner
                .tags
                .iter()
                .find(|(t, _)| t == tag)
                .map(|(_, at)| *at)
                .ok_or_else(|| anyhow!("unknown revision '{tag}'"))?,
        };
        Ok(inner.commits[start..].iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::run_repository_contract_suite;

    #[test]
    fn memory_repository_contract() {
        let repo = MemoryRepository::new("main").commit("a1b2c3d", "init");
        run_repository_contract_suite(&repo, "origin").unwrap();
    }

    #[test]
    fn log_since_tag_excludes_tagged_history() {
        let repo = MemoryRepository::new("main")
            .commit("1111111", "first")
            .tag("v0.1.0")
            .commit("2222222", "second")
            .commit("3333333", "third");

        let since: Vec<String> = repo.log_since(Some("v0.1.0")).unwrap().into_iter().map(|c| c.subject).collect();
        assert_eq!(since, ["third", "second"]);
        assert_eq!(repo.log_since(None).unwrap().len(), 3);
        assert!(repo.log_since(Some("v9.9.9")).is_err());
    }
}
