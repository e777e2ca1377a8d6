use std::collections::BTreeMap;

use serde::Deserialize;

use super::{attribute_map, parse_payload, Access, ConvertedMetadata, FormField, FormSection, DEFAULT_SECTION_ID};
use crate::dhis2::Dhis2Client;
use crate::error::Result;

pub(crate) const FIELDS: &str = "id,displayName,access[read,write,data[read,write]],\
programStageDataElements[dataElement[id,displayName,valueType]],\
programStageSections[id,displayName,sortOrder,dataElements[id,displayName,valueType]]";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProgramStage {
    id: String,
    display_name: String,
    access: Access,
    program_stage_data_elements: Vec<ApiStageDataElement>,
    #[serde(default)]
    program_stage_sections: Vec<ApiStageSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStageDataElement {
    data_element: FormField,
}

/// A stage section; only the element ids are used, names come from the stage.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApiStageSection {
    id: String,
    display_name: String,
    sort_order: f64,
    data_elements: Vec<ApiElementRef>,
}

#[derive(Debug, Deserialize)]
struct ApiElementRef {
    id: String,
}

/// Sections of one stage: sorted stage sections, or one "Default" section.
pub(super) fn stage_sections(
    stage_id: &str,
    mut sections: Vec<ApiStageSection>,
    fields: &[FormField],
    attributes: &BTreeMap<String, FormField>,
) -> Vec<FormSection> {
    if sections.is_empty() {
        return vec![FormSection {
            id: DEFAULT_SECTION_ID.to_string(),
            display_name: "Default".to_string(),
            attributes: fields.to_vec(),
        }];
    }

    sections.sort_by(|a, b| a.sort_order.total_cmp(&b.sort_order));
    sections
        .into_iter()
        .map(|section| {
            let attrs = section
                .data_elements
                .iter()
                .filter_map(|r| match attributes.get(&r.id) {
                    Some(field) => Some(field.clone()),
                    None => {
                        tracing::warn!(
                            stage = stage_id,
                            section = %section.id,
                            data_element = %r.id,
                            "Section references a data element missing from the stage"
                        );
                        None
                    }
                })
                .collect();
            FormSection {
                id: section.id,
                display_name: section.display_name,
                attributes: attrs,
            }
        })
        .collect()
}

fn convert(data: ApiProgramStage) -> ConvertedMetadata {
    let fields: Vec<FormField> = data
        .program_stage_data_elements
        .into_iter()
        .map(|e| e.data_element)
        .collect();
    let attributes = attribute_map(&fields);
    let sections = stage_sections(&data.id, data.program_stage_sections, &fields, &attributes);

    ConvertedMetadata {
        id: data.id,
        display_name: data.display_name,
        access: data.access,
        attributes,
        sections,
    }
}

pub(crate) fn convert_value(value: serde_json::Value) -> Result<ConvertedMetadata> {
    Ok(convert(parse_payload("program stage", value)?))
}

pub async fn fetch(client: &Dhis2Client, stage_id: &str) -> Result<ConvertedMetadata> {
    let value = client
        .get_value(&format!("programStages/{stage_id}"), &[("fields", FIELDS)])
        .await?;
    convert_value(value)
}
