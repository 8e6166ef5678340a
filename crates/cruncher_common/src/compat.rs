//! Compatibility-issue detection.
//!
//! An asset blocks the upgrade when any of its `DecisionMaker` properties
//! carries a blocking flag with the exact value `"TRUE"`. For every blocked
//! asset the detector surfaces the asset's `Inventory` property list, which
//! names the hardware or software doing the blocking.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fingerprint;
use crate::inventory::{HumanReadableOutputEntity, PropertyListEntity};

const METADATA_TYPE: &str = "Metadata";
const INVENTORY_TYPE: &str = "Inventory";
const DECISION_MAKER_TYPE: &str = "DecisionMaker";
const COMPUTER_NAME_PROPERTY: &str = "ComputerName";

/// DecisionMaker property names that mark a host as ineligible.
pub const BLOCKING_PROPERTIES: [&str; 2] = ["DT_ANY_SVH_BlockingSV", "DT_ANY_SYS_BlockingSystem"];

/// Output of one detection pass. Issues borrow from the scanned document;
/// [`CompatFindings::to_record`] clones them out for persistence.
#[derive(Debug, Default)]
pub struct CompatFindings<'a> {
    /// From the first RunInfo's first `Metadata` component; absent when any
    /// link in that chain is missing.
    pub computer_name: Option<&'a str>,
    /// One `Inventory` list per blocked asset, in asset order.
    pub issues: Vec<&'a PropertyListEntity>,
}

impl CompatFindings<'_> {
    /// Build the persistable record: computer name, cloned issue lists and
    /// the content fingerprint over every flagged (name, value) pair.
    ///
    /// Returns `None` when there are no issues, or when the computer name
    /// is missing: a record that cannot be keyed to a host is not
    /// persisted (a generated placeholder would never dedup across runs).
    pub fn to_record(&self) -> Option<CompatIssueRecord> {
        if self.issues.is_empty() {
            return None;
        }
        let computer_name = match self.computer_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!("computer name is missing; skipping compatibility issue record");
                return None;
            }
        };

        let upgrade_issues: Vec<PropertyListEntity> =
            self.issues.iter().map(|list| (*list).clone()).collect();
        let hash = fingerprint::compat_issues(
            &computer_name,
            upgrade_issues.iter().flat_map(|list| list.properties.iter()),
        );

        Some(CompatIssueRecord {
            computer_name,
            upgrade_issues,
            hash,
        })
    }
}

/// The unit persisted and serialized as a compatibility ("upgrade") issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatIssueRecord {
    pub computer_name: String,
    pub upgrade_issues: Vec<PropertyListEntity>,
    pub hash: String,
}

/// Applies the blocking rule to a mapped appraiser document.
pub struct CompatibilityIssueDetector;

impl CompatibilityIssueDetector {
    pub fn detect(document: &HumanReadableOutputEntity) -> CompatFindings<'_> {
        let computer_name = document
            .run_infos
            .first()
            .and_then(|run| {
                run.components
                    .iter()
                    .find(|c| c.type_name.as_deref() == Some(METADATA_TYPE))
            })
            .and_then(|component| {
                component
                    .properties
                    .iter()
                    .find(|p| p.name == COMPUTER_NAME_PROPERTY)
            })
            .map(|property| property.value.as_str());
        debug!("computer name: {:?}", computer_name);

        let mut issues = Vec::new();
        for asset in &document.assets {
            let inventory = asset
                .property_lists
                .iter()
                .find(|list| list.type_name.as_deref() == Some(INVENTORY_TYPE));
            let Some(inventory) = inventory else {
                continue;
            };

            let blocked = asset
                .property_lists
                .iter()
                .filter(|list| list.type_name.as_deref() == Some(DECISION_MAKER_TYPE))
                .flat_map(|list| list.properties.iter())
                .any(|p| BLOCKING_PROPERTIES.contains(&p.name.as_str()) && p.value == "TRUE");

            if blocked {
                issues.push(inventory);
            }
        }

        if issues.is_empty() {
            debug!("no assets with blocking properties found");
        } else {
            debug!("{} asset(s) with blocking properties", issues.len());
        }

        CompatFindings {
            computer_name,
            issues,
        }
    }
}
