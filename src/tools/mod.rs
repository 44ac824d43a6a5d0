//! Tool catalog and input validation
//!
//! Tools fall into two visibility classes: public tools the conversational
//! model may invoke directly, and private tools reachable only from inside the
//! rendered widget. The flag travels in the catalog metadata and must survive
//! any re-rendering of the list.

pub mod booking;

use serde_json::{Value, json};

pub use booking::{BookingRequest, SENSITIVE_FRAGMENTS, validate_open_booking};

/// URI of the booking widget resource template.
pub const WIDGET_RESOURCE_URI: &str = "resource://booking-widget";

/// A tool entry in the catalog.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    /// False for widget-internal tools the model must not call directly.
    pub public: bool,
    pub widget_accessible: bool,
    /// Resource template this tool's result points the client at.
    pub output_template: Option<String>,
}

impl ToolDefinition {
    /// Serialize for a `tools/list` response, including visibility metadata.
    pub fn to_json(&self) -> Value {
        let mut meta = serde_json::Map::new();
        if !self.public {
            meta.insert("openai/visibility".to_string(), json!("private"));
        }
        if self.widget_accessible {
            meta.insert("openai/widgetAccessible".to_string(), json!(true));
        }
        if let Some(template) = &self.output_template {
            meta.insert("openai/outputTemplate".to_string(), json!(template));
            meta.insert("openai/resultCanProduceWidget".to_string(), json!(true));
        }

        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
            "_meta": Value::Object(meta),
        })
    }
}

/// The static tool catalog.
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "open_booking_widget_v2",
            description: "Opens an interactive booking widget with available doctors. \
                Use this to show doctor availability and let users book appointments.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "searchText": {
                        "type": "string",
                        "description": "Doctor name, specialty, or condition without titles or prefixes"
                    }
                },
                "required": ["searchText"]
            }),
            public: true,
            widget_accessible: true,
            output_template: Some(format!("{WIDGET_RESOURCE_URI}?searchText={{{{searchText}}}}")),
        },
        ToolDefinition {
            name: "search_doctors",
            description: "Search doctors by name, specialty, or facility and return a formatted list.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "searchText": {
                        "type": "string",
                        "description": "Doctor name, specialty, or facility to search for"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of results",
                        "default": 10
                    }
                },
                "required": ["searchText"]
            }),
            public: false,
            widget_accessible: true,
            output_template: None,
        },
        ToolDefinition {
            name: "get_timeslots",
            description: "Get available appointment timeslots for a specific doctor.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "doctorId": {
                        "type": "string",
                        "description": "Doctor ID from search results"
                    }
                },
                "required": ["doctorId"]
            }),
            public: false,
            widget_accessible: true,
            output_template: None,
        },
        ToolDefinition {
            name: "get_search_context",
            description: "Widget-only tool to retrieve the current search context.",
            input_schema: json!({ "type": "object", "properties": {} }),
            public: false,
            widget_accessible: true,
            output_template: None,
        },
        ToolDefinition {
            name: "lookup_specialty",
            description: "Convert specialty name to specialty ID.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "specialtyName": {
                        "type": "string",
                        "description": "Specialty name (e.g. \"endocrinology\", \"dermatology\")"
                    }
                },
                "required": ["specialtyName"]
            }),
            public: false,
            widget_accessible: false,
            output_template: None,
        },
        ToolDefinition {
            name: "lookup_facility",
            description: "Convert facility/hospital name to facility ID.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "facilityName": {
                        "type": "string",
                        "description": "Facility name (e.g. \"Soliman Fakeeh Hospital\")"
                    }
                },
                "required": ["facilityName"]
            }),
            public: false,
            widget_accessible: false,
            output_template: None,
        },
        ToolDefinition {
            name: "open_booking",
            description: "Open the secure booking flow for a chosen timeslot.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeslotId": { "type": "string", "description": "Numeric timeslot ID from get_timeslots" },
                    "doctorName": { "type": "string" },
                    "facilityName": { "type": "string" },
                    "dateTime": { "type": "string" },
                    "specialty": { "type": "string" },
                    "price": { "type": "string" }
                },
                "required": ["timeslotId", "doctorName", "facilityName", "dateTime"]
            }),
            public: true,
            widget_accessible: true,
            output_template: Some(WIDGET_RESOURCE_URI.to_string()),
        },
    ]
}
