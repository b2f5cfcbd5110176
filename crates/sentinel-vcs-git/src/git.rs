use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{anyhow, Context, Result};
use sentinel_vcs::{Commit, Repository};
use tracing::debug;

/// [`Repository`] backed by the `git` binary, run in `root`.
#[derive(Clone, Debug)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(?args, "git");
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("run git {:?}", args))
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let out = self.output(args)?;
        if !out.status.success() {
            return Err(anyhow!(
                "git {:?} failed: {}",
                args,
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl Repository for GitRepository {
    fn is_work_tree(&self) -> Result<bool> {
        let out = self.output(&["rev-parse", "--is-inside-work-tree"])?;
        Ok(out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true")
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.run(&["status", "--porcelain"])?.is_empty())
    }

    fn current_branch(&self) -> Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn tags(&self) -> Result<Vec<String>> {
        let out = self.run(&["tag", "--list"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn tag_exists(&self, tag: &str) -> Result<bool> {
        let refname = format!("refs/tags/{tag}");
        Ok(self.output(&["rev-parse", "--quiet", "--verify", &refname])?.status.success())
    }

    fn create_annotated_tag(&self, tag: &str, message: &str) -> Result<()> {
        // `git tag -a` refuses to overwrite without -f
        self.run(&["tag", "-a", tag, "-m", message])?;
        Ok(())
    }

    fn push_tag(&self, remote: &str, tag: &str) -> Result<()> {
        let refspec = format!("refs/tags/{tag}");
        self.run(&["push", "--quiet", remote, &refspec])?;
        Ok(())
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        let out = self.output(&["describe", "--tags", "--abbrev=0"])?;
        if !out.status.success() {
            return Ok(None);
        }
        let tag = String::from_utf8_lossy(&out.stdout).trim().to_string();
        Ok((!tag.is_empty()).then_some(tag))
    }

    fn log_since(&self, since: Option<&str>) -> Result<Vec<Commit>> {
        let range = since.map(|tag| format!("{tag}..HEAD"));
        let mut args = vec!["log", "--pretty=format:%h%x09%s"];
        if let Some(range) = range.as_deref() {
            args.push(range);
        }
        let out = self.run(&args)?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| match line.split_once('\t') {
                Some((id, subject)) => Commit { short_id: id.to_string(), subject: subject.to_string() },
                None => Commit { short_id: line.to_string(), subject: String::new() },
            })
            .collect())
    }
}
