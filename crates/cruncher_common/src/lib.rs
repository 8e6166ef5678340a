//! Cruncher Common - core extraction pipeline for upgrade-assessment logs.
//!
//! Turns the two artifacts an OS upgrade assessment leaves behind into
//! structured, fingerprinted records:
//!
//! - `setupact.log`, a free-text log with a host-inventory block and timed
//!   operation tables → [`setup_log::LogAnalysisResult`]
//! - the appraiser "human readable" XML document with per-asset
//!   upgrade-blocking decisions → [`inventory::HumanReadableOutputEntity`]
//!   plus the [`compat`] blocking rule
//!
//! Every derived record carries a SHA-256 content fingerprint so a sink can
//! persist it exactly once per logically-identical input.

pub mod compat;
pub mod discover;
pub mod error;
pub mod fingerprint;
pub mod inventory;
pub mod lines;
pub mod setup_log;

pub use compat::*;
pub use discover::*;
pub use error::*;
pub use inventory::*;
pub use lines::*;
pub use setup_log::*;
