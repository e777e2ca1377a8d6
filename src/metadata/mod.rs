//! Metadata Fetcher: per-type remote schemas normalised into [`ConvertedMetadata`].
//!
//! Every fetcher follows the same shape: a `FIELDS` selection string, a
//! private API struct mirroring the payload, a pure `convert` and an async
//! `fetch`. Payloads that do not match the API struct fail with
//! [`ConfigError::MetadataShape`]; nothing is defaulted.

pub mod context;
pub mod event_program;
pub mod program_stage;
pub mod tracked_entity_type;
pub mod tracker_program;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dhis2::Dhis2Client;
use crate::error::{ConfigError, Result};

pub use context::{MetadataCatalog, ProgramType, ResolvedContext};

/// Id of the synthetic section used when the remote object has no sections.
pub const DEFAULT_SECTION_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataType {
    TrackerProgram,
    EventProgram,
    TrackedEntityType,
    ProgramStage,
}

impl MetadataType {
    pub const ALL: [MetadataType; 4] = [
        MetadataType::TrackerProgram,
        MetadataType::EventProgram,
        MetadataType::TrackedEntityType,
        MetadataType::ProgramStage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataType::TrackerProgram => "trackerProgram",
            MetadataType::EventProgram => "eventProgram",
            MetadataType::TrackedEntityType => "trackedEntityType",
            MetadataType::ProgramStage => "programStage",
        }
    }

    /// Human label, also used in shape errors.
    pub fn label(self) -> &'static str {
        match self {
            MetadataType::TrackerProgram => "tracker program",
            MetadataType::EventProgram => "event program",
            MetadataType::TrackedEntityType => "tracked entity type",
            MetadataType::ProgramStage => "program stage",
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        MetadataType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown metadata type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccess {
    pub read: bool,
    pub write: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub read: bool,
    pub write: bool,
    pub data: DataAccess,
}

/// One attribute or data element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub display_name: String,
    pub value_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSection {
    pub id: String,
    pub display_name: String,
    pub attributes: Vec<FormField>,
}

/// The normalised shape every fetcher produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedMetadata {
    pub id: String,
    pub display_name: String,
    pub access: Access,
    pub attributes: BTreeMap<String, FormField>,
    pub sections: Vec<FormSection>,
}

impl ConvertedMetadata {
    pub fn attribute(&self, id: &str) -> Option<&FormField> {
        self.attributes.get(id)
    }

    pub fn section(&self, id: &str) -> Option<&FormSection> {
        self.sections.iter().find(|s| s.id == id)
    }
}

/// Index fields by id.
pub(crate) fn attribute_map<'a>(fields: impl IntoIterator<Item = &'a FormField>) -> BTreeMap<String, FormField> {
    fields
        .into_iter()
        .map(|f| (f.id.clone(), f.clone()))
        .collect()
}

/// Decode a remote payload, turning serde errors into shape errors for `resource`.
pub(crate) fn parse_payload<T: DeserializeOwned>(resource: &'static str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ConfigError::MetadataShape {
        resource,
        message: e.to_string(),
    })
}

/// Fetch `resource_id` as `metadata_type` and normalise it.
pub async fn fetch_metadata(
    client: &Dhis2Client,
    resource_id: &str,
    metadata_type: MetadataType,
) -> Result<ConvertedMetadata> {
    let metadata = match metadata_type {
        MetadataType::TrackerProgram => tracker_program::fetch(client, resource_id).await?,
        MetadataType::EventProgram => event_program::fetch(client, resource_id).await?,
        MetadataType::TrackedEntityType => tracked_entity_type::fetch(client, resource_id).await?,
        MetadataType::ProgramStage => program_stage::fetch(client, resource_id).await?,
    };
    tracing::debug!(
        id = %metadata.id,
        kind = %metadata_type,
        sections = metadata.sections.len(),
        attributes = metadata.attributes.len(),
        "Loaded metadata"
    );
    Ok(metadata)
}
