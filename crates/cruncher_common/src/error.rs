//! Error types for the cruncher core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CruncherError {
    /// The appraiser document deserialized to nothing: no run infos and no
    /// assets. Downstream has nothing to detect against, so this aborts the
    /// file (and only the file).
    #[error("appraiser document is empty: no run info and no assets")]
    EmptyDocument,

    #[error("XML deserialization failed: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] globset::Error),
}
