use serde::Deserialize;

use super::program_stage::{ApiStageSection, stage_sections};
use super::{attribute_map, parse_payload, Access, ConvertedMetadata, FormField};
use crate::dhis2::Dhis2Client;
use crate::error::{ConfigError, Result};

pub(crate) const FIELDS: &str = "id,displayName,access[read,write,data[read,write]],\
programStages[id,programStageDataElements[dataElement[id,displayName,valueType]],\
programStageSections[id,displayName,sortOrder,dataElements[id]]]";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventProgram {
    id: String,
    display_name: String,
    access: Access,
    program_stages: Vec<ApiEventStage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventStage {
    id: String,
    program_stage_data_elements: Vec<ApiStageDataElement>,
    #[serde(default)]
    program_stage_sections: Vec<ApiStageSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStageDataElement {
    data_element: FormField,
}

fn convert(data: ApiEventProgram) -> Result<ConvertedMetadata> {
    // event programs carry exactly one stage
    let Some(stage) = data.program_stages.into_iter().next() else {
        return Err(ConfigError::MetadataShape {
            resource: "event program",
            message: format!("No program stage found in event program {}", data.id),
        });
    };

    let fields: Vec<FormField> = stage
        .program_stage_data_elements
        .into_iter()
        .map(|e| e.data_element)
        .collect();
    let attributes = attribute_map(&fields);
    let sections = stage_sections(&stage.id, stage.program_stage_sections, &fields, &attributes);

    Ok(ConvertedMetadata {
        id: data.id,
        display_name: data.display_name,
        access: data.access,
        attributes,
        sections,
    })
}

pub(crate) fn convert_value(value: serde_json::Value) -> Result<ConvertedMetadata> {
    convert(parse_payload("event program", value)?)
}

pub async fn fetch(client: &Dhis2Client, program_id: &str) -> Result<ConvertedMetadata> {
    let value = client
        .get_value(&format!("programs/{program_id}"), &[("fields", FIELDS)])
        .await?;
    convert_value(value)
}
