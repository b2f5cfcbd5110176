use anyhow::Result;
use sentinel_core::ReleaseVersion;
use sentinel_vcs::Repository;

/// Markdown notes for `version`: one line per commit since the latest tag,
/// newest first. Must be called before `version` itself is tagged.
pub fn release_notes(repo: &dyn Repository, version: &ReleaseVersion) -> Result<String> {
    let previous = repo.latest_tag()?;
    let commits = repo.log_since(previous.as_deref())?;

    let mut notes = format!("## Changes in {version}\n");
    if commits.is_empty() {
        notes.push_str("- Initial release\n");
    }
    for commit in &commits {
        notes.push_str(&format!("- {} {}\n", commit.short_id, commit.subject));
    }
    Ok(notes)
}
