//! Widget and placement records shared by every store implementation.

use serde::Serialize;

/// Display name of the holiday calendar widget.
pub const HOLIDAY_WIDGET_NAME: &str = "Holiday Block";

/// Unique content key of the holiday calendar widget. Doubles as the
/// template file stem deployed into the host's block directory.
pub const HOLIDAY_CONTENT_REFERENCE: &str = "holiday_calendar_block";

/// Page layout the widget is placed on (the shop's top page).
pub const DEFAULT_PAGE_ID: i64 = 1;

/// Layout zone used when the caller does not name one.
pub const DEFAULT_SURFACE: &str = "bottom-surface";

/// Layout zones seeded by the host schema, in display order.
pub const LAYOUT_SURFACES: &[(&str, &str)] = &[
    ("head", "Head"),
    ("header", "Header"),
    ("top-surface", "Top of contents"),
    ("left-surface", "Left side"),
    ("main-top-surface", "Main top"),
    ("main-bottom-surface", "Main bottom"),
    ("right-surface", "Right side"),
    ("bottom-surface", "Bottom of contents"),
    ("footer", "Footer"),
];

/// A registered widget (one row per content reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Widget {
    pub id: String,
    pub name: String,
    pub content_reference: String,
    pub deletable: bool,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A widget's slot on a page-layout surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub id: String,
    pub widget_id: String,
    pub page_id: i64,
    pub surface_id: String,
    pub order_index: i64,
    pub visible: bool,
    pub created_at: String,
}

/// What the registrar registers: the widget's identity and its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetDefinition {
    pub name: String,
    pub content_reference: String,
    pub page_id: i64,
}

impl WidgetDefinition {
    pub fn new(name: impl Into<String>, content_reference: impl Into<String>, page_id: i64) -> Self {
        Self {
            name: name.into(),
            content_reference: content_reference.into(),
            page_id,
        }
    }

    /// The holiday calendar widget as shipped by the plugin.
    pub fn holiday_calendar() -> Self {
        Self::new(HOLIDAY_WIDGET_NAME, HOLIDAY_CONTENT_REFERENCE, DEFAULT_PAGE_ID)
    }

    /// File name of the widget template inside a block directory.
    pub fn template_file_name(&self) -> String {
        format!("{}.twig", self.content_reference)
    }
}

/// Column values written by a widget upsert, keyed by `content_reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetUpsert {
    pub name: String,
    pub content_reference: String,
    pub deletable: bool,
    pub enabled: bool,
}

impl WidgetUpsert {
    /// Plugin-owned widgets are active and may not be deleted from the
    /// host's layout editor.
    pub fn from_definition(definition: &WidgetDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            content_reference: definition.content_reference.clone(),
            deletable: false,
            enabled: true,
        }
    }
}

/// Column values for a placement insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlacement {
    pub widget_id: String,
    pub page_id: i64,
    pub surface_id: String,
    pub order_index: i64,
    pub visible: bool,
}

/// Next tail position on a surface: one past the current maximum, or 1 on
/// an empty surface. Gaps left by deleted rows are never refilled.
pub fn next_order_index(current_max: Option<i64>) -> i64 {
    current_max.map_or(1, |max| max + 1)
}
