//! Content fingerprints for idempotent persistence.
//!
//! Two records are the same record when the canonical string over their
//! semantically significant fields is byte-identical; the SHA-256 of that
//! string is the dedup key. This is a dedup key, not a security boundary;
//! no claim is made about adversarial collisions.

use sha2::{Digest, Sha256};

use crate::inventory::PropertyEntity;
use crate::setup_log::{SystemInfo, UncompleteAction, TIME_FORMAT};

/// Fingerprint of a log-analysis result: hostname, OS version and the
/// pending action's name/start time. Absent parts contribute nothing.
pub fn log_analysis(info: &SystemInfo, pending: &UncompleteAction) -> String {
    let mut canonical = String::new();
    canonical.push_str(&info.hostname);
    canonical.push_str(&info.os_version);
    if let Some(name) = &pending.action_name {
        canonical.push_str(name);
    }
    if let Some(start) = pending.start_time {
        canonical.push_str(&start.format(TIME_FORMAT).to_string());
    }
    digest(&canonical)
}

/// Fingerprint of a compatibility-issue record: the computer name followed
/// by every flagged (name, value) pair in traversal order.
pub fn compat_issues<'a>(
    computer_name: &str,
    properties: impl IntoIterator<Item = &'a PropertyEntity>,
) -> String {
    let mut canonical = String::from(computer_name);
    for property in properties {
        canonical.push_str(&property.name);
        canonical.push_str(&property.value);
    }
    digest(&canonical)
}

fn digest(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
