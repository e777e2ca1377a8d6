use serde::Deserialize;

use super::{attribute_map, parse_payload, Access, ConvertedMetadata, FormField, FormSection, DEFAULT_SECTION_ID};
use crate::dhis2::Dhis2Client;
use crate::error::Result;

pub(crate) const FIELDS: &str = "id,displayName,\
trackedEntityTypeAttributes[trackedEntityAttribute[id],displayName,valueType],\
access[read,write,data[read,write]]";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrackedEntityType {
    id: String,
    display_name: String,
    tracked_entity_type_attributes: Vec<ApiTypeAttribute>,
    access: Access,
}

/// Names live on the type attribute, the id on the nested attribute.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTypeAttribute {
    tracked_entity_attribute: ApiRef,
    display_name: String,
    value_type: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    id: String,
}

fn convert(data: ApiTrackedEntityType) -> ConvertedMetadata {
    let fields: Vec<FormField> = data
        .tracked_entity_type_attributes
        .into_iter()
        .map(|a| FormField {
            id: a.tracked_entity_attribute.id,
            display_name: a.display_name,
            value_type: a.value_type,
        })
        .collect();

    ConvertedMetadata {
        id: data.id,
        display_name: data.display_name,
        access: data.access,
        attributes: attribute_map(&fields),
        sections: vec![FormSection {
            id: DEFAULT_SECTION_ID.to_string(),
            display_name: "Profile".to_string(),
            attributes: fields,
        }],
    }
}

pub(crate) fn convert_value(value: serde_json::Value) -> Result<ConvertedMetadata> {
    Ok(convert(parse_payload("tracked entity type", value)?))
}

pub async fn fetch(client: &Dhis2Client, type_id: &str) -> Result<ConvertedMetadata> {
    let value = client
        .get_value(&format!("trackedEntityTypes/{type_id}"), &[("fields", FIELDS)])
        .await?;
    convert_value(value)
}
