//! Catalog of programs and tracked entity types, used to tell what kind of
//! object a context id refers to.

use serde::{Deserialize, Serialize};

use super::{parse_payload, Access, MetadataType};
use crate::dhis2::Dhis2Client;
use crate::error::{ConfigError, Result};

pub(crate) const PROGRAM_FIELDS: &str =
    "id,displayName,access,trackedEntityType[id,displayName],programType,programStages[id,displayName]";
pub(crate) const TRACKED_ENTITY_TYPE_FIELDS: &str = "id,displayName,access";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramType {
    WithRegistration,
    WithoutRegistration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSummary {
    pub id: String,
    pub display_name: String,
    pub program_type: ProgramType,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub tracked_entity_type: Option<Reference>,
    #[serde(default)]
    pub program_stages: Vec<Reference>,
}

impl ProgramSummary {
    pub fn is_tracker(&self) -> bool {
        self.program_type == ProgramType::WithRegistration
    }

    /// Metadata write access; programs without an access block are treated as read-only.
    pub fn can_write_metadata(&self) -> bool {
        self.access.is_some_and(|a| a.write)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityTypeSummary {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub access: Option<Access>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramsResponse {
    programs: Vec<ProgramSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackedEntityTypesResponse {
    tracked_entity_types: Vec<TrackedEntityTypeSummary>,
}

/// What a context id refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedContext {
    pub id: String,
    pub display_name: String,
    pub metadata_type: MetadataType,
    /// Owning program for program stages; the program itself otherwise.
    pub parent_program: Option<Reference>,
    pub tracked_entity_type: Option<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataCatalog {
    pub programs: Vec<ProgramSummary>,
    pub tracked_entity_types: Vec<TrackedEntityTypeSummary>,
}

impl MetadataCatalog {
    /// Load programs and tracked entity types in parallel.
    pub async fn fetch(client: &Dhis2Client) -> Result<Self> {
        let programs = async {
            let value = client
                .get_value("programs", &[("fields", PROGRAM_FIELDS), ("pageSize", "1000")])
                .await?;
            parse_payload::<ProgramsResponse>("programs", value)
        };
        let types = async {
            let value = client
                .get_value(
                    "trackedEntityTypes",
                    &[("fields", TRACKED_ENTITY_TYPE_FIELDS), ("pageSize", "1000")],
                )
                .await?;
            parse_payload::<TrackedEntityTypesResponse>("tracked entity types", value)
        };

        let (programs, types) = tokio::try_join!(programs, types)?;
        tracing::debug!(
            programs = programs.programs.len(),
            tracked_entity_types = types.tracked_entity_types.len(),
            "Loaded metadata catalog"
        );
        Ok(Self {
            programs: programs.programs,
            tracked_entity_types: types.tracked_entity_types,
        })
    }

    pub fn program(&self, id: &str) -> Option<&ProgramSummary> {
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn tracker_programs(&self) -> impl Iterator<Item = &ProgramSummary> {
        self.programs.iter().filter(|p| p.is_tracker())
    }

    /// Tracker programs registering entities of the given type.
    pub fn programs_for_type<'a>(&'a self, type_id: &'a str) -> impl Iterator<Item = &'a ProgramSummary> {
        self.tracker_programs().filter(move |p| {
            p.tracked_entity_type
                .as_ref()
                .is_some_and(|t| t.id == type_id)
        })
    }

    /// Classify `id`. Programs win over types, types over stages.
    pub fn resolve_context(&self, id: &str) -> Result<ResolvedContext> {
        if let Some(program) = self.program(id) {
            return Ok(ResolvedContext {
                id: program.id.clone(),
                display_name: program.display_name.clone(),
                metadata_type: if program.is_tracker() {
                    MetadataType::TrackerProgram
                } else {
                    MetadataType::EventProgram
                },
                parent_program: Some(Reference {
                    id: program.id.clone(),
                    display_name: program.display_name.clone(),
                }),
                tracked_entity_type: program.tracked_entity_type.clone(),
            });
        }

        if let Some(tet) = self.tracked_entity_types.iter().find(|t| t.id == id) {
            return Ok(ResolvedContext {
                id: tet.id.clone(),
                display_name: tet.display_name.clone(),
                metadata_type: MetadataType::TrackedEntityType,
                parent_program: None,
                tracked_entity_type: Some(Reference {
                    id: tet.id.clone(),
                    display_name: tet.display_name.clone(),
                }),
            });
        }

        for program in &self.programs {
            if let Some(stage) = program.program_stages.iter().find(|s| s.id == id) {
                return Ok(ResolvedContext {
                    id: stage.id.clone(),
                    display_name: stage.display_name.clone(),
                    metadata_type: MetadataType::ProgramStage,
                    parent_program: Some(Reference {
                        id: program.id.clone(),
                        display_name: program.display_name.clone(),
                    }),
                    tracked_entity_type: program.tracked_entity_type.clone(),
                });
            }
        }

        Err(ConfigError::NotFound(format!(
            "No program, program stage or tracked entity type with id '{id}'"
        )))
    }
}
