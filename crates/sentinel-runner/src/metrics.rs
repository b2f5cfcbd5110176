use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::effects::{RunReport, SideChannel};

pub const GAUGE: &str = "release_sentinel_status";
pub const METRICS_FILE: &str = "release_sentinel.prom";

/// Escapes a label value for the text exposition format.
pub fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

pub fn render(report: &RunReport) -> String {
    let value = if report.is_safe() { 1 } else { 0 };
    format!(
        "# TYPE {GAUGE} gauge\n{GAUGE}{{result=\"{}\",env=\"{}\"}} {value}\n",
        escape_label(report.result),
        escape_label(&report.env),
    )
}

/// Rewrites `<dir>/release_sentinel.prom` after every run. The new file is
/// written beside the old one and renamed over it, so a scraper never sees
/// a partial file.
#[derive(Clone, Debug)]
pub struct MetricsWriter {
    dir: PathBuf,
}

impl MetricsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("create temp file in {}", self.dir.display()))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("write {}", tmp.path().display()))?;
        tmp.persist(path).with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }
}

impl SideChannel for MetricsWriter {
    fn name(&self) -> &str {
        "metrics"
    }

    fn emit(&self, report: &RunReport) -> Result<()> {
        let path = self.path();
        self.write(&path, &render(report))?;
        info!(path = %path.display(), result = report.result, "metrics written");
        Ok(())
    }
}
