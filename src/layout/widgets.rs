//! Static registry of native widgets and the default layout of each page.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{LayoutElement, PageLayout, Settings};

/// The three enrollment pages a layout can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnrollmentPage {
    Overview,
    NewEvent,
    EditEvent,
}

impl EnrollmentPage {
    pub const ALL: [EnrollmentPage; 3] = [
        EnrollmentPage::Overview,
        EnrollmentPage::NewEvent,
        EnrollmentPage::EditEvent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentPage::Overview => "overview",
            EnrollmentPage::NewEvent => "newEvent",
            EnrollmentPage::EditEvent => "editEvent",
        }
    }

    /// Data store key of the document holding this page's layouts.
    pub fn datastore_key(self) -> &'static str {
        match self {
            EnrollmentPage::Overview => "enrollmentOverviewLayout",
            EnrollmentPage::NewEvent => "enrollmentEventNewLayout",
            EnrollmentPage::EditEvent => "enrollmentEventEditLayout",
        }
    }

    fn default_title(self) -> &'static str {
        match self {
            EnrollmentPage::Overview => "Enrollment Dashboard",
            EnrollmentPage::NewEvent => "Enrollment Dashboard: New event",
            EnrollmentPage::EditEvent => "Enrollment Dashboard: Edit event",
        }
    }
}

impl fmt::Display for EnrollmentPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EnrollmentPage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnrollmentPage::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s) || p.datastore_key() == s)
            .ok_or_else(|| format!("Unknown page: {s} (expected overview, newEvent or editEvent)"))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingValueType {
    Boolean,
}

/// A per-widget setting the host app understands.
#[derive(Debug, PartialEq, Eq)]
pub struct WidgetSetting {
    pub key: &'static str,
    pub value_type: SettingValueType,
    pub label: &'static str,
}

impl WidgetSetting {
    pub fn accepts(&self, value: &Value) -> bool {
        match self.value_type {
            SettingValueType::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct NativeWidget {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub allowed_pages: &'static [EnrollmentPage],
    pub settings: &'static [WidgetSetting],
}

impl NativeWidget {
    pub fn allowed_on(&self, page: EnrollmentPage) -> bool {
        self.allowed_pages.contains(&page)
    }

    pub fn setting(&self, key: &str) -> Option<&'static WidgetSetting> {
        self.settings.iter().find(|s| s.key == key)
    }
}

use EnrollmentPage::{EditEvent, NewEvent, Overview};

const ALL_PAGES: &[EnrollmentPage] = &[Overview, NewEvent, EditEvent];

const READ_ONLY_MODE: &[WidgetSetting] = &[WidgetSetting {
    key: "readOnlyMode",
    value_type: SettingValueType::Boolean,
    label: "Read only mode",
}];

pub static WIDGETS: &[NativeWidget] = &[
    NativeWidget {
        name: "QuickActions",
        title: "Quick actions",
        description: "Simple actions to quickly navigate to common tasks",
        allowed_pages: &[Overview],
        settings: &[],
    },
    NativeWidget {
        name: "StagesAndEvents",
        title: "Stages and events",
        description: "Overview of all stages and events in the enrollment",
        allowed_pages: &[Overview],
        settings: &[],
    },
    NativeWidget {
        name: "NewEventWorkspace",
        title: "New event workspace",
        description: "Workspace to create a new event",
        allowed_pages: &[NewEvent],
        settings: &[],
    },
    NativeWidget {
        name: "EditEventWorkspace",
        title: "Edit event workspace",
        description: "Workspace to edit an event",
        allowed_pages: &[EditEvent],
        settings: &[],
    },
    NativeWidget {
        name: "WidgetAssignee",
        title: "Assignee",
        description: "Assignee of the event",
        allowed_pages: &[EditEvent],
        settings: &[],
    },
    NativeWidget {
        name: "ErrorWidget",
        title: "Error widget",
        description: "Widget to display errors from program rules",
        allowed_pages: ALL_PAGES,
        settings: &[],
    },
    NativeWidget {
        name: "WarningWidget",
        title: "Warning widget",
        description: "Widget to display warnings from program rules",
        allowed_pages: ALL_PAGES,
        settings: &[],
    },
    NativeWidget {
        name: "EventComment",
        title: "Event comment",
        description: "Comments and notes for the event",
        allowed_pages: &[EditEvent],
        settings: &[],
    },
    NativeWidget {
        name: "EnrollmentNote",
        title: "Enrollment note",
        description: "Notes for the enrollment",
        allowed_pages: &[Overview],
        settings: &[],
    },
    NativeWidget {
        name: "FeedbackWidget",
        title: "Feedback widget",
        description: "Widget to display feedback from program rules",
        allowed_pages: ALL_PAGES,
        settings: &[],
    },
    NativeWidget {
        name: "IndicatorWidget",
        title: "Indicator widget",
        description: "Widget to display indicators from program rules",
        allowed_pages: ALL_PAGES,
        settings: &[],
    },
    NativeWidget {
        name: "TrackedEntityRelationship",
        title: "Tracked entity relationship",
        description: "Display, edit and create relationships between tracked entities",
        allowed_pages: ALL_PAGES,
        settings: &[],
    },
    NativeWidget {
        name: "ProfileWidget",
        title: "Profile widget",
        description: "Display and edit the profile of the tracked entity",
        allowed_pages: ALL_PAGES,
        settings: READ_ONLY_MODE,
    },
    NativeWidget {
        name: "EnrollmentWidget",
        title: "Enrollment widget",
        description: "Display and edit the enrollment details",
        allowed_pages: ALL_PAGES,
        settings: READ_ONLY_MODE,
    },
];

pub fn find_widget(name: &str) -> Option<&'static NativeWidget> {
    WIDGETS.iter().find(|w| w.name == name)
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn component(name: &str) -> LayoutElement {
    LayoutElement::Component {
        name: name.to_string(),
        settings: None,
    }
}

/// Settings map with a single `readOnlyMode` flag.
pub fn read_only_settings(read_only: bool) -> Settings {
    let mut settings = Settings::new();
    settings.insert("readOnlyMode".into(), Value::Bool(read_only));
    settings
}

fn read_only(name: &str, read_only: bool) -> LayoutElement {
    LayoutElement::Component {
        name: name.to_string(),
        settings: Some(read_only_settings(read_only)),
    }
}

/// The layout the host app renders when nothing is stored for a program.
pub fn default_layout(page: EnrollmentPage) -> PageLayout {
    let (left, right) = match page {
        Overview => (
            vec![component("QuickActions"), component("StagesAndEvents")],
            vec![
                component("ErrorWidget"),
                component("WarningWidget"),
                component("EnrollmentNote"),
                component("FeedbackWidget"),
                component("IndicatorWidget"),
                component("TrackedEntityRelationship"),
                read_only("ProfileWidget", false),
                read_only("EnrollmentWidget", false),
            ],
        ),
        NewEvent => (
            vec![component("NewEventWorkspace")],
            vec![
                component("ErrorWidget"),
                component("WarningWidget"),
                component("FeedbackWidget"),
                component("IndicatorWidget"),
                component("TrackedEntityRelationship"),
                read_only("ProfileWidget", true),
                read_only("EnrollmentWidget", true),
            ],
        ),
        EditEvent => (
            vec![component("EditEventWorkspace")],
            vec![
                component("WidgetAssignee"),
                component("EventComment"),
                component("ErrorWidget"),
                component("WarningWidget"),
                component("FeedbackWidget"),
                component("IndicatorWidget"),
                component("TrackedEntityRelationship"),
                read_only("ProfileWidget", true),
                read_only("EnrollmentWidget", true),
            ],
        ),
    };

    PageLayout {
        title: Some(page.default_title().to_string()),
        left_column: Some(left),
        right_column: Some(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = WIDGETS.iter().map(|w| w.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), WIDGETS.len());
    }

    #[test]
    fn default_layouts_only_use_allowed_widgets() {
        for page in EnrollmentPage::ALL {
            let layout = default_layout(page);
            assert!(layout.validate().is_ok());
            let columns = [layout.left_column.unwrap(), layout.right_column.unwrap()];
            for element in columns.iter().flatten() {
                let LayoutElement::Component { name, .. } = element else {
                    panic!("default layouts only hold components");
                };
                let widget = find_widget(name).unwrap_or_else(|| panic!("{name} not registered"));
                assert!(widget.allowed_on(page), "{name} not allowed on {page}");
            }
        }
    }

    #[test]
    fn page_parses_from_name_or_key() {
        assert_eq!("newEvent".parse::<EnrollmentPage>().unwrap(), NewEvent);
        assert_eq!("overview".parse::<EnrollmentPage>().unwrap(), Overview);
        assert_eq!(
            "enrollmentEventEditLayout".parse::<EnrollmentPage>().unwrap(),
            EditEvent
        );
        assert!("dashboard".parse::<EnrollmentPage>().is_err());
    }

    #[test]
    fn read_only_setting_accepts_booleans_only() {
        let profile = find_widget("ProfileWidget").unwrap();
        let setting = profile.setting("readOnlyMode").unwrap();
        assert!(setting.accepts(&Value::Bool(true)));
        assert!(!setting.accepts(&Value::String("yes".into())));
        assert!(find_widget("QuickActions").unwrap().setting("readOnlyMode").is_none());
    }
}
