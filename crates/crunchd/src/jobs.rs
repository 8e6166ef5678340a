//! The per-file pipelines and the combined scan run.
//!
//! Every file is processed independently: a failure on one file is logged
//! and the batch moves on. Files are handled strictly one at a time; the
//! dedup check in the store is exists-then-insert and relies on a single
//! writer.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info};

use cruncher_common::{
    hostname_for, CompatibilityIssueDetector, FileLocator, InventoryDocumentMapper,
    LogLineReader, SetupLogParser,
};

use crate::config::Settings;
use crate::report;
use crate::store::ResultStore;

/// One full scan: appraiser documents first, then setup logs. A host whose
/// appraiser document produced blocking issues is not eligible for the
/// upgrade, so its setup log is skipped.
pub async fn run(settings: &Settings) -> Result<()> {
    let mut store = if settings.save_to_database {
        Some(ResultStore::open(&settings.database_path)?)
    } else {
        debug!("database saving is disabled, writing JSON artifacts only");
        None
    };

    let blocked = run_appraiser_scan(settings, store.as_mut()).await?;
    run_setupact_scan(settings, store.as_mut(), &blocked).await?;
    Ok(())
}

/// Process every appraiser document under the logs root. Returns the
/// computer names for which blocking issues were recorded.
pub async fn run_appraiser_scan(
    settings: &Settings,
    mut store: Option<&mut ResultStore>,
) -> Result<HashSet<String>> {
    let locator =
        FileLocator::new(&settings.appraiser_pattern).context("invalid appraiser file pattern")?;
    let mut blocked = HashSet::new();

    for file in locator.find(&settings.logs_root_path) {
        debug!("processing appraiser file: {}", file.display());
        match process_appraiser_file(&file, settings, store.as_deref_mut()).await {
            Ok(Some(computer_name)) => {
                blocked.insert(computer_name);
            }
            Ok(None) => {}
            Err(err) => error!("failed to process {}: {err:#}", file.display()),
        }
    }
    Ok(blocked)
}

async fn process_appraiser_file(
    path: &Path,
    settings: &Settings,
    store: Option<&mut ResultStore>,
) -> Result<Option<String>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = InventoryDocumentMapper::map_bytes(&bytes)
        .with_context(|| format!("failed to map {}", path.display()))?;

    let findings = CompatibilityIssueDetector::detect(&document);
    if findings.issues.is_empty() {
        debug!("no compatibility issues found in {}", path.display());
        return Ok(None);
    }

    // Issues without a computer name cannot be keyed to a host; the
    // detector already warned, nothing persists.
    let Some(record) = findings.to_record() else {
        return Ok(None);
    };

    report::write_compat_issues(&settings.output_path, &record)?;
    if let Some(store) = store {
        store.insert_compat_issues(&record)?;
    }

    info!(
        "compatibility issues found, no further processing for {}",
        record.computer_name
    );
    Ok(Some(record.computer_name))
}

/// Process every setup log under the logs root, skipping hosts in `blocked`.
pub async fn run_setupact_scan(
    settings: &Settings,
    mut store: Option<&mut ResultStore>,
    blocked: &HashSet<String>,
) -> Result<()> {
    let locator =
        FileLocator::new(&settings.setupact_pattern).context("invalid setup log file pattern")?;
    let parser = SetupLogParser::new();

    for file in locator.find(&settings.logs_root_path) {
        let hostname = hostname_for(&file);
        if blocked.contains(&hostname) {
            info!(
                "skipping {}: upgrade is blocked for {hostname}",
                file.display()
            );
            continue;
        }
        debug!("starting log analysis for {}", file.display());
        if let Err(err) = process_setupact_file(&file, &parser, settings, store.as_deref_mut()) {
            error!("failed to process {}: {err:#}", file.display());
        }
    }
    Ok(())
}

fn process_setupact_file(
    path: &Path,
    parser: &SetupLogParser,
    settings: &Settings,
    store: Option<&mut ResultStore>,
) -> Result<()> {
    let reader = LogLineReader::new(path);
    let lines = reader
        .lines()
        .with_context(|| format!("failed to open {}", path.display()))?;
    let result = parser.parse(path, lines);

    // A fingerprint match means this exact result is already on record;
    // leave the previous artifact alone too.
    if let Some(store) = store {
        if !store.insert_log_analysis(&result)? {
            return Ok(());
        }
    }
    report::write_log_analysis(&settings.output_path, &result)?;
    Ok(())
}
