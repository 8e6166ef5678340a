//! Appraiser "human readable" document handling.
//!
//! The appraiser writes a `WicaRun` XML document: an optional `RunInfos`
//! section (run → component → property) and a list of `Asset` elements,
//! each holding typed `PropertyList`s. The wire structs below mirror that
//! schema; [`InventoryDocumentMapper`] copies them into the entity graph
//! the rest of the pipeline consumes, where every optional collection is an
//! empty `Vec` rather than an `Option` so consumers never branch on
//! missing collections. Scalar attributes such as `Type` stay optional.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CruncherError;

// ---------------------------------------------------------------------------
// Wire schema (deserialization only)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename = "WicaRun")]
pub struct WicaRun {
    #[serde(rename = "RunInfos")]
    pub run_infos: Option<RunInfos>,
    #[serde(rename = "Assets")]
    pub assets: Option<Assets>,
}

#[derive(Debug, Deserialize)]
pub struct RunInfos {
    #[serde(rename = "RunInfo", default)]
    pub run_info: Vec<RunInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RunInfo {
    #[serde(rename = "Component", default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
pub struct Component {
    #[serde(rename = "@Type")]
    pub type_name: Option<String>,
    #[serde(rename = "@TypeIdentifier")]
    pub type_identifier: Option<String>,
    #[serde(rename = "Property", default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
pub struct Assets {
    #[serde(rename = "Asset", default)]
    pub asset: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
pub struct Asset {
    #[serde(rename = "PropertyList", default)]
    pub property_lists: Vec<PropertyList>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyList {
    #[serde(rename = "@Type")]
    pub type_name: Option<String>,
    #[serde(rename = "Property", default)]
    pub properties: Vec<Property>,
}

/// `Name` and `Value` are required attributes; a document missing either
/// fails deserialization outright.
#[derive(Debug, Deserialize)]
pub struct Property {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Value")]
    pub value: String,
    #[serde(rename = "@Ordinal", default)]
    pub ordinal: i32,
}

// ---------------------------------------------------------------------------
// Entity graph (what the detector and the sinks see)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanReadableOutputEntity {
    pub run_infos: Vec<RunInfoEntity>,
    pub assets: Vec<AssetEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInfoEntity {
    pub components: Vec<ComponentEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntity {
    pub type_name: Option<String>,
    pub type_identifier: Option<String>,
    pub properties: Vec<PropertyEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetEntity {
    pub property_lists: Vec<PropertyListEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyListEntity {
    pub type_name: Option<String>,
    pub properties: Vec<PropertyEntity>,
}

/// (Name, Value, Ordinal) triple. Ordinal orders display output only; it
/// carries no semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntity {
    pub name: String,
    pub value: String,
    pub ordinal: i32,
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

/// Deserializes an appraiser document and maps it into the entity graph.
pub struct InventoryDocumentMapper;

impl InventoryDocumentMapper {
    /// Map raw XML bytes into a [`HumanReadableOutputEntity`].
    ///
    /// Fails when the XML does not parse or when it parses to a void
    /// document (no run infos and no assets). Anything else, missing
    /// sections and empty lists included, maps to empty collections.
    pub fn map_bytes(bytes: &[u8]) -> Result<HumanReadableOutputEntity, CruncherError> {
        let document: WicaRun = quick_xml::de::from_reader(bytes)?;
        let entity = Self::map_document(document);
        if entity.run_infos.is_empty() && entity.assets.is_empty() {
            return Err(CruncherError::EmptyDocument);
        }
        debug!(
            "mapped appraiser document: {} run infos, {} assets",
            entity.run_infos.len(),
            entity.assets.len()
        );
        Ok(entity)
    }

    fn map_document(document: WicaRun) -> HumanReadableOutputEntity {
        HumanReadableOutputEntity {
            run_infos: document
                .run_infos
                .map(|infos| infos.run_info.into_iter().map(Self::map_run_info).collect())
                .unwrap_or_default(),
            assets: document
                .assets
                .map(|assets| assets.asset.into_iter().map(Self::map_asset).collect())
                .unwrap_or_default(),
        }
    }

    fn map_run_info(run_info: RunInfo) -> RunInfoEntity {
        RunInfoEntity {
            components: run_info
                .components
                .into_iter()
                .map(|component| ComponentEntity {
                    type_name: component.type_name,
                    type_identifier: component.type_identifier,
                    properties: component
                        .properties
                        .into_iter()
                        .map(Self::map_property)
                        .collect(),
                })
                .collect(),
        }
    }

    fn map_asset(asset: Asset) -> AssetEntity {
        AssetEntity {
            property_lists: asset
                .property_lists
                .into_iter()
                .map(|list| PropertyListEntity {
                    type_name: list.type_name,
                    properties: list.properties.into_iter().map(Self::map_property).collect(),
                })
                .collect(),
        }
    }

    fn map_property(property: Property) -> PropertyEntity {
        PropertyEntity {
            name: property.name,
            value: property.value,
            ordinal: property.ordinal,
        }
    }
}
