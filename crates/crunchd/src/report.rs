//! JSON artifacts, one file per subject.
//!
//! Log-analysis output goes to `{hostname}_output.json` directly under the
//! output directory; compatibility issues go to
//! `compat_issues/{computer}_CompatIssues.json`. Artifacts are written
//! whether or not the database sink is enabled; the pipelines decide when.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use cruncher_common::{CompatIssueRecord, LogAnalysisResult};

/// Subdirectory holding the compatibility-issue artifacts.
const COMPAT_ISSUES_DIR: &str = "compat_issues";

/// Write the log-analysis artifact for one host. A pre-existing file is
/// deleted first, then rewritten.
pub fn write_log_analysis(output_dir: &Path, result: &LogAnalysisResult) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let path = output_dir.join(format!("{}_output.json", result.system_info.hostname));
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed to delete previous {}", path.display()))?;
    }

    let json = serde_json::to_string_pretty(result)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    debug!("log analysis results saved to {}", path.display());
    Ok(path)
}

/// Write the compatibility-issue artifact for one computer, creating the
/// `compat_issues` subdirectory as needed.
pub fn write_compat_issues(output_dir: &Path, record: &CompatIssueRecord) -> Result<PathBuf> {
    let dir = output_dir.join(COMPAT_ISSUES_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join(format!("{}_CompatIssues.json", record.computer_name));
    let json = serde_json::to_string_pretty(record)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    debug!("compatibility issues saved to {}", path.display());
    Ok(path)
}
