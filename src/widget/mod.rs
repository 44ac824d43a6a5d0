//! Booking widget rendering
//!
//! The widget markup itself is an external artifact; this layer only injects a
//! JSON parameter block and the pre-fetched doctor data into it before the
//! dispatcher returns it as a `text/html` resource. A cache-bust marker is
//! appended on every render because the content is personalized per
//! session/search and must never be served stale by an intermediary.

use anyhow::{Context, Result};
use serde_json::json;

use crate::doctors::DoctorRecord;
use crate::search::Language;

const DEFAULT_TEMPLATE: &str = include_str!("../../assets/booking-widget.html");

const NO_CACHE_META: &str = concat!(
    r#"<meta http-equiv="Cache-Control" content="no-cache, no-store, must-revalidate" />"#,
    r#"<meta http-equiv="Pragma" content="no-cache" />"#,
    r#"<meta http-equiv="Expires" content="0" />"#,
);

/// Parameters injected into the widget page.
pub struct WidgetParams<'a> {
    pub search_text: &'a str,
    pub language: Language,
    pub doctors: &'a [DoctorRecord],
}

/// Renders the booking widget HTML with injected parameters.
#[derive(Clone)]
pub struct WidgetRenderer {
    template: String,
    booking_app_url: String,
}

impl WidgetRenderer {
    pub fn new(booking_app_url: String) -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            booking_app_url,
        }
    }

    /// Use custom widget markup instead of the bundled template. The markup
    /// must contain a `</head>` for the parameter block to be injected into.
    pub fn with_template(booking_app_url: String, template: String) -> Self {
        Self {
            template,
            booking_app_url,
        }
    }

    pub fn render(&self, params: &WidgetParams<'_>) -> Result<String> {
        let widget_params = json!({
            "searchText": params.search_text,
            "preloadedResults": !params.doctors.is_empty(),
            "lang": params.language.as_str(),
        });
        let doctors_json = serde_json::to_string(params.doctors)
            .context("failed to serialize doctor records for widget injection")?;

        let script = format!(
            "<script>\nwindow.WIDGET_PARAMS = {widget_params};\nwindow.PRELOADED_DOCTORS_DATA = {doctors_json};\n</script>"
        );

        let html = self
            .template
            .replace("{{BOOKING_APP_URL}}", &self.booking_app_url)
            .replace("</head>", &format!("{NO_CACHE_META}{script}</head>"));

        Ok(format!(
            "{html}<!-- cache-bust: {} -->",
            chrono::Utc::now().timestamp_millis()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctors::{merge, tests_support::row};

    fn renderer() -> WidgetRenderer {
        WidgetRenderer::new("https://booking.example".to_string())
    }

    #[test]
    fn test_render_injects_params_and_doctors() {
        let doctors = merge(vec![row("d1", "Khalid Farouqi", "f1", "s1", "100")]);
        let html = renderer()
            .render(&WidgetParams {
                search_text: "Khalid Farouqi",
                language: Language::English,
                doctors: &doctors,
            })
            .unwrap();

        assert!(html.contains(r#""searchText":"Khalid Farouqi""#));
        assert!(html.contains(r#""preloadedResults":true"#));
        assert!(html.contains(r#""lang":"en""#));
        assert!(html.contains("Khalid Farouqi"));
        assert!(html.contains("window.PRELOADED_DOCTORS_DATA"));
    }

    #[test]
    fn test_render_replaces_booking_app_url() {
        let html = renderer()
            .render(&WidgetParams {
                search_text: "",
                language: Language::English,
                doctors: &[],
            })
            .unwrap();
        assert!(html.contains("https://booking.example"));
        assert!(!html.contains("{{BOOKING_APP_URL}}"));
    }

    #[test]
    fn test_render_marks_empty_results() {
        let html = renderer()
            .render(&WidgetParams {
                search_text: "nobody",
                language: Language::English,
                doctors: &[],
            })
            .unwrap();
        assert!(html.contains(r#""preloadedResults":false"#));
    }

    #[test]
    fn test_render_defeats_caching() {
        let html = renderer()
            .render(&WidgetParams {
                search_text: "",
                language: Language::Arabic,
                doctors: &[],
            })
            .unwrap();
        assert!(html.contains("no-store"));
        assert!(html.contains("cache-bust:"));
        assert!(html.contains(r#""lang":"ar""#));
    }

    #[test]
    fn test_two_renders_differ() {
        let r = renderer();
        let p = WidgetParams {
            search_text: "x",
            language: Language::English,
            doctors: &[],
        };
        let a = r.render(&p).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = r.render(&p).unwrap();
        assert_ne!(a, b);
    }
}
