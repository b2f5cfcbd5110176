use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};

use crate::types::Repository;

/// Shared adapter contract suite. Runs against both the git adapter and the
/// in-memory repository; expects a clean repo with at least one commit and
/// no tags.
pub fn run_repository_contract_suite(repo: &dyn Repository, remote: &str) -> Result<()> {
    if !repo.is_work_tree()? {
        return Err(anyhow!("expected a work tree"));
    }
    if !repo.is_clean()? {
        return Err(anyhow!("repo must be clean for contract tests"));
    }
    if repo.latest_tag()?.is_some() {
        return Err(anyhow!("contract tests need an untagged repo"));
    }
    let history = repo.log_since(None)?;
    if history.is_empty() {
        return Err(anyhow!("expected at least one commit"));
    }

    let tag = "v0.0.1";
    if repo.tag_exists(tag)? {
        return Err(anyhow!("tag {tag} must not exist yet"));
    }
    repo.create_annotated_tag(tag, "Release v0.0.1")?;
    if !repo.tag_exists(tag)? {
        return Err(anyhow!("tag {tag} missing after creation"));
    }
    if repo.create_annotated_tag(tag, "Release v0.0.1").is_ok() {
        return Err(anyhow!("re-creating {tag} must fail"));
    }
    repo.push_tag(remote, tag)?;

    if repo.latest_tag()?.as_deref() != Some(tag) {
        return Err(anyhow!("latest tag should be {tag}"));
    }
    if !repo.log_since(Some(tag))?.is_empty() {
        return Err(anyhow!("no commits expected after a tag on HEAD"));
    }
    Ok(())
}

/// Initialize a minimal git repo fixture with one commit on `branch`.
pub fn init_git_repo(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["git", "init", "--quiet"])?;
    run(dir, &["git", "checkout", "--quiet", "-b", branch])?;
    run(dir, &["git", "config", "user.email", "sentinel@example.com"])?;
    run(dir, &["git", "config", "user.name", "sentinel"])?;
    run(dir, &["git", "config", "tag.gpgSign", "false"])?;
    std::fs::write(dir.join("README.md"), "fixture")?;
    run(dir, &["git", "add", "."])?;
    run(dir, &["git", "commit", "--quiet", "-m", "init"])?;
    Ok(())
}

/// Create a bare repository at `remote_dir` and register it as `name`.
pub fn add_bare_remote(dir: &Path, remote_dir: &Path, name: &str) -> Result<()> {
    std::fs::create_dir_all(remote_dir)?;
    run(remote_dir, &["git", "init", "--quiet", "--bare"])?;
    let url = remote_dir.to_str().ok_or_else(|| anyhow!("non-utf8 remote path"))?;
    run(dir, &["git", "remote", "add", name, url])?;
    Ok(())
}

/// Commit a file change in the fixture repo.
pub fn commit_file(dir: &Path, file: &str, contents: &str, message: &str) -> Result<()> {
    std::fs::write(dir.join(file), contents)?;
    run(dir, &["git", "add", file])?;
    run(dir, &["git", "commit", "--quiet", "-m", message])?;
    Ok(())
}

fn run(dir: &Path, args: &[&str]) -> Result<()> {
    let mut cmd = Command::new(args[0]);
    cmd.args(&args[1..]).current_dir(dir);
    let out = cmd.output().with_context(|| format!("run {:?}", args))?;
    if !out.status.success() {
        return Err(anyhow!(
            "command failed: {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(())
}
