use serde::Deserialize;

use super::{attribute_map, parse_payload, Access, ConvertedMetadata, FormField, FormSection, DEFAULT_SECTION_ID};
use crate::dhis2::Dhis2Client;
use crate::error::Result;

pub(crate) const FIELDS: &str = "id,displayName,\
programTrackedEntityAttributes[sortOrder,trackedEntityAttribute[id,displayName,valueType]],\
access[read,write,data[read,write]],\
programSections[id,displayName,sortOrder,trackedEntityAttributes]";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrackerProgram {
    id: String,
    display_name: String,
    program_tracked_entity_attributes: Vec<ApiProgramAttribute>,
    access: Access,
    program_sections: Vec<ApiProgramSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProgramAttribute {
    tracked_entity_attribute: FormField,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiProgramSection {
    id: String,
    display_name: String,
    sort_order: f64,
    tracked_entity_attributes: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    id: String,
}

fn convert(data: ApiTrackerProgram) -> ConvertedMetadata {
    let fields: Vec<FormField> = data
        .program_tracked_entity_attributes
        .into_iter()
        .map(|a| a.tracked_entity_attribute)
        .collect();
    let attributes = attribute_map(&fields);

    let sections = if data.program_sections.is_empty() {
        vec![FormSection {
            id: DEFAULT_SECTION_ID.to_string(),
            display_name: "Profile".to_string(),
            attributes: fields,
        }]
    } else {
        let mut program_sections = data.program_sections;
        program_sections.sort_by(|a, b| a.sort_order.total_cmp(&b.sort_order));
        program_sections
            .into_iter()
            .map(|section| FormSection {
                attributes: section
                    .tracked_entity_attributes
                    .iter()
                    .filter_map(|r| {
                        let found = attributes.get(&r.id).cloned();
                        if found.is_none() {
                            tracing::warn!(
                                program = %data.id,
                                section = %section.id,
                                attribute = %r.id,
                                "Section references an attribute missing from the program"
                            );
                        }
                        found
                    })
                    .collect(),
                id: section.id,
                display_name: section.display_name,
            })
            .collect()
    };

    ConvertedMetadata {
        id: data.id,
        display_name: data.display_name,
        access: data.access,
        attributes,
        sections,
    }
}

pub(crate) fn convert_value(value: serde_json::Value) -> Result<ConvertedMetadata> {
    Ok(convert(parse_payload("tracker program", value)?))
}

pub async fn fetch(client: &Dhis2Client, program_id: &str) -> Result<ConvertedMetadata> {
    let value = client
        .get_value(
            &format!("programs/{program_id}"),
            &[("fields", FIELDS), ("filter", "programType:eq:WITH_REGISTRATION")],
        )
        .await?;
    convert_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use serde_json::{json, Value};

    fn payload(sections: Value) -> Value {
        json!({
            "id": "IpHINAT79UW",
            "displayName": "Child Programme",
            "access": {"read": true, "write": true, "data": {"read": true, "write": true}},
            "programTrackedEntityAttributes": [
                {"sortOrder": 1, "trackedEntityAttribute": {"id": "w75KJ2mc4zz", "displayName": "First name", "valueType": "TEXT"}},
                {"sortOrder": 2, "trackedEntityAttribute": {"id": "zDhUuAYrxNC", "displayName": "Last name", "valueType": "TEXT"}},
                {"sortOrder": 3, "trackedEntityAttribute": {"id": "cejWyOfXge6", "displayName": "Gender", "valueType": "TEXT"}}
            ],
            "programSections": sections
        })
    }

    #[test]
    fn no_sections_gives_one_profile_section_in_api_order() {
        let m = convert_value(payload(json!([]))).unwrap();
        assert_eq!(m.sections.len(), 1);
        assert_eq!(m.sections[0].id, "default");
        assert_eq!(m.sections[0].display_name, "Profile");
        let ids: Vec<_> = m.sections[0].attributes.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["w75KJ2mc4zz", "zDhUuAYrxNC", "cejWyOfXge6"]);
        assert_eq!(m.attributes.len(), 3);
    }

    #[test]
    fn sections_are_sorted_and_unknown_attributes_dropped() {
        let m = convert_value(payload(json!([
            {"id": "s2", "displayName": "Second", "sortOrder": 2, "trackedEntityAttributes": [{"id": "cejWyOfXge6"}]},
            {"id": "s1", "displayName": "First", "sortOrder": 1, "trackedEntityAttributes": [{"id": "w75KJ2mc4zz"}, {"id": "gone"}]}
        ])))
        .unwrap();
        assert_eq!(m.sections[0].id, "s1");
        assert_eq!(m.sections[1].id, "s2");
        assert_eq!(m.sections[0].attributes.len(), 1);
        assert_eq!(m.sections[0].attributes[0].display_name, "First name");
    }

    #[test]
    fn missing_access_is_a_shape_error() {
        let mut value = payload(json!([]));
        value.as_object_mut().unwrap().remove("access");
        let err = convert_value(value).unwrap_err();
        assert!(matches!(err, ConfigError::MetadataShape { resource: "tracker program", .. }));
        assert!(err.to_string().contains("access"));
    }

    #[test]
    fn missing_program_sections_is_a_shape_error() {
        let mut value = payload(json!([]));
        value.as_object_mut().unwrap().remove("programSections");
        let err = convert_value(value).unwrap_err();
        assert!(matches!(err, ConfigError::MetadataShape { resource: "tracker program", .. }));
        assert!(err.to_string().contains("programSections"));
    }
}
