//! Wire shape of a stored page layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, Result};

pub type Settings = Map<String, Value>;

/// One entry in a column, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutElement {
    Component {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<Settings>,
    },
    Plugin {
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<Settings>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_column: Option<Vec<LayoutElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_column: Option<Vec<LayoutElement>>,
}

impl PageLayout {
    pub fn validate(&self) -> Result<()> {
        let has_title = self.title.as_deref().is_some_and(|t| !t.is_empty());
        if !has_title && self.left_column.is_none() && self.right_column.is_none() {
            return Err(ConfigError::validation(
                "At least one of title, leftColumn, or rightColumn must be defined",
            ));
        }

        let columns = [("leftColumn", &self.left_column), ("rightColumn", &self.right_column)];
        for (column, elements) in columns {
            for (index, element) in elements.iter().flatten().enumerate() {
                match element {
                    LayoutElement::Component { name, .. } if name.is_empty() => {
                        return Err(ConfigError::validation(format!(
                            "{column}[{index}]: component name is empty"
                        )));
                    }
                    LayoutElement::Plugin { source, .. } if source.is_empty() => {
                        return Err(ConfigError::validation(format!(
                            "{column}[{index}]: plugin source is empty"
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Decode and validate one stored entry.
    pub fn from_value(value: &Value) -> Result<Self> {
        let layout: PageLayout = serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::validation(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn elements(&self) -> impl Iterator<Item = &LayoutElement> {
        self.left_column
            .iter()
            .flatten()
            .chain(self.right_column.iter().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format_uses_type_tag() {
        let layout = PageLayout {
            title: None,
            left_column: Some(vec![LayoutElement::Component {
                name: "QuickActions".into(),
                settings: None,
            }]),
            right_column: Some(vec![LayoutElement::Plugin {
                source: "https://x/plugin.html".into(),
                settings: None,
            }]),
        };
        assert_eq!(
            serde_json::to_value(&layout).unwrap(),
            json!({
                "leftColumn": [{"type": "component", "name": "QuickActions"}],
                "rightColumn": [{"type": "plugin", "source": "https://x/plugin.html"}]
            })
        );
    }

    #[test]
    fn empty_layout_is_invalid() {
        let err = PageLayout::from_value(&json!({"title": ""})).unwrap_err();
        assert!(err.to_string().contains("At least one of"));
    }

    #[test]
    fn empty_column_counts_as_defined() {
        assert!(PageLayout::from_value(&json!({"leftColumn": []})).is_ok());
    }

    #[test]
    fn unknown_type_is_invalid() {
        assert!(PageLayout::from_value(&json!({"leftColumn": [{"type": "iframe", "src": "x"}]})).is_err());
        assert!(PageLayout::from_value(&json!({"leftColumn": [{"type": "plugin", "source": ""}]})).is_err());
    }

    #[test]
    fn settings_round_trip() {
        let value = json!({
            "title": "T",
            "rightColumn": [{"type": "component", "name": "ProfileWidget", "settings": {"readOnlyMode": true}}]
        });
        let layout = PageLayout::from_value(&value).unwrap();
        assert_eq!(serde_json::to_value(&layout).unwrap(), value);
    }
}
