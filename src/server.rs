//! MCP dispatcher
//!
//! Routes protocol messages to the tool and resource implementations. Tool
//! failures the model can act on (bad arguments, no results) come back as
//! `isError` tool results; protocol-level failures (unknown method, unknown
//! tool, unreadable resource) come back as JSON-RPC errors.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::doctors::{DoctorRecord, merge};
use crate::matching::rank_candidates;
use crate::search::{Language, NormalizedSearch, detect_language, normalize};
use crate::session::SessionStore;
use crate::tools::{WIDGET_RESOURCE_URI, catalog, validate_open_booking};
use crate::transport::{
    InitializeParams, McpMessage, MessageHandler, ResourcesReadParams, RpcError, ToolsCallParams,
};
use crate::upstream::{EtabebClient, UpstreamError, UpstreamGateway};
use crate::widget::{WidgetParams, WidgetRenderer};
use crate::{DEFAULT_PROTOCOL_VERSION, VERSION};

#[derive(Clone)]
pub struct McpServer {
    config: ServerConfig,
    upstream: Arc<dyn UpstreamGateway>,
    sessions: Arc<SessionStore>,
    widget: WidgetRenderer,
}

impl McpServer {
    /// Build a server with an injected upstream gateway.
    pub fn new(config: ServerConfig, upstream: Arc<dyn UpstreamGateway>) -> Self {
        let sessions = SessionStore::new(config.session_ttl(), config.session_capacity);
        let widget = WidgetRenderer::new(config.booking_app_url.clone());
        Self {
            config,
            upstream,
            sessions,
            widget,
        }
    }

    /// Build a server backed by the real eTabeb API client.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let client =
            EtabebClient::new(config.upstream_base_url.clone(), config.upstream_timeout())?;
        Ok(Self::new(config, Arc::new(client)))
    }

    fn handle_initialize(&self, params: &InitializeParams) -> Value {
        let protocol_version = params
            .protocol_version
            .clone()
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());
        if let Some(client) = &params.client_info {
            info!(client = %client.name, "client initialized");
        }

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": {}
            },
            "serverInfo": { "name": "etabeb-mcp", "version": VERSION }
        })
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<Value> = catalog().iter().map(|t| t.to_json()).collect();
        json!({ "tools": tools })
    }

    fn handle_resources_list(&self) -> Value {
        json!({
            "resources": [{
                "uri": WIDGET_RESOURCE_URI,
                "name": "Booking Widget",
                "description": "Interactive doctor booking widget with preloaded search results",
                "mimeType": "text/html"
            }]
        })
    }

    /// Search with fallbacks: titles kept, then titles stripped, then fuzzy
    /// ranking over the full pool for multi-word queries. Returns the search
    /// text that actually produced results alongside the merged records.
    async fn run_search(
        &self,
        normalized: &NormalizedSearch,
    ) -> Result<(String, Vec<DoctorRecord>), UpstreamError> {
        let rows = self
            .upstream
            .doctor_search(&normalized.common_removed)
            .await?;
        if !rows.is_empty() {
            return Ok((normalized.common_removed.clone(), merge(rows)));
        }

        if normalized.has_distinct_fallback() && !normalized.honorifics_removed.is_empty() {
            let rows = self
                .upstream
                .doctor_search(&normalized.honorifics_removed)
                .await?;
            if !rows.is_empty() {
                return Ok((normalized.honorifics_removed.clone(), merge(rows)));
            }
        }

        let canonical = if normalized.honorifics_removed.is_empty() {
            normalized.common_removed.clone()
        } else {
            normalized.honorifics_removed.clone()
        };

        // Likely a misspelled full name; single words are too ambiguous to
        // rank against the whole pool.
        if canonical.split_whitespace().count() > 1 {
            let pool = self.upstream.doctor_search("").await?;
            let ranked = rank_candidates(&canonical, pool);
            if !ranked.is_empty() {
                debug!(query = %canonical, matches = ranked.len(), "fuzzy fallback matched");
                return Ok((canonical, merge(ranked)));
            }
        }

        Ok((canonical, Vec::new()))
    }

    async fn call_open_widget(&self, session_id: &str, args: &Value) -> Value {
        let raw = args
            .get("searchText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return tool_error(
                "Error: searchText is required. Provide a doctor name, specialty, or condition to search for.",
            );
        }

        let language = detect_language(raw);
        let (search_text, doctors) = match self.run_search(&normalized).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Degraded mode: the widget still opens and lets the user
                // search interactively.
                warn!("doctor search failed, opening widget without results: {e}");
                (normalized.honorifics_removed.clone(), Vec::new())
            }
        };

        self.sessions
            .put(session_id, search_text.clone(), doctors.clone(), language)
            .await;

        let count = doctors.len();
        let ack = if count > 0 {
            format!("Found {count} doctor(s) for \"{search_text}\". Opening the booking widget.")
        } else {
            format!(
                "No doctors matched \"{search_text}\". Opening the booking widget so the user can search directly."
            )
        };

        json!({
            "content": [{ "type": "text", "text": ack }],
            "structuredContent": {
                "searchText": search_text,
                "resultsCount": count,
                "lang": language.as_str()
            },
            "_meta": {
                "openai/outputTemplate": format!(
                    "{WIDGET_RESOURCE_URI}?searchText={}",
                    urlencoding::encode(&search_text)
                )
            }
        })
    }

    async fn call_search_doctors(&self, session_id: &str, args: &Value) -> Value {
        let raw = args
            .get("searchText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .max(1) as usize;

        let normalized = normalize(raw);
        if normalized.is_empty() {
            return tool_error("Error: searchText is required.");
        }

        let language = detect_language(raw);
        let (search_text, doctors) = match self.run_search(&normalized).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("doctor search failed: {e}");
                return tool_error(
                    "Error: Doctor search is temporarily unavailable. Please try again.",
                );
            }
        };

        self.sessions
            .put(session_id, search_text.clone(), doctors.clone(), language)
            .await;

        if doctors.is_empty() {
            return tool_text(format!(
                "No doctors found for \"{search_text}\". Try a different name or specialty."
            ));
        }

        let listing = format_doctor_list(&doctors, limit);
        tool_text(format!(
            "Found {} doctor(s) for \"{search_text}\":\n\n{listing}",
            doctors.len()
        ))
    }

    async fn call_get_timeslots(&self, session_id: &str, args: &Value) -> Value {
        let Some(doctor_id) = args.get("doctorId").and_then(Value::as_str) else {
            return tool_error("Error: doctorId is required. Get it from search_doctors results.");
        };

        // The timeslot endpoint is keyed by the (doctor, facility, specialty)
        // relation id, which the session's search results carry.
        let mut relation_id = doctor_id.to_string();
        let mut slot_context = String::new();
        if let Some(entry) = self.sessions.get(session_id).await
            && let Some(doctor) = entry
                .doctors
                .iter()
                .find(|d| d.doctor_id.as_str() == doctor_id)
        {
            let best = doctor
                .facilities
                .iter()
                .flat_map(|f| f.specialties.iter().map(move |s| (f, s)))
                .max_by_key(|(_, s)| s.timeslot_count);
            if let Some((facility, specialty)) = best {
                relation_id = specialty.relation_timeslot_id.to_string();
                slot_context = format!(
                    " at {}{}",
                    facility.facility_name.as_deref().unwrap_or("the facility"),
                    specialty
                        .specialty_text
                        .as_deref()
                        .map(|t| format!(" ({t})"))
                        .unwrap_or_default()
                );
            }
        }

        let slots = match self.upstream.timeslot_list(&relation_id).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("timeslot lookup failed: {e}");
                return tool_error(
                    "Error: Could not load timeslots right now. Please try again.",
                );
            }
        };

        if slots.is_empty() {
            return tool_text(format!(
                "No appointments found for this doctor{slot_context} in the coming days."
            ));
        }

        let lines: Vec<String> = slots
            .iter()
            .take(20)
            .map(|s| {
                format!(
                    "- {} {} (timeslotId: {})",
                    s.date.as_deref().unwrap_or("?"),
                    s.time.as_deref().unwrap_or("?"),
                    s.timeslot_id
                )
            })
            .collect();
        tool_text(format!(
            "Available timeslots{slot_context}:\n{}",
            lines.join("\n")
        ))
    }

    async fn call_get_search_context(&self, session_id: &str) -> Value {
        match self.sessions.get(session_id).await {
            Some(entry) => {
                let names: Vec<String> = entry
                    .doctors
                    .iter()
                    .map(|d| d.doctor_name.clone().unwrap_or_else(|| d.doctor_id.to_string()))
                    .collect();
                json!({
                    "content": [{ "type": "text", "text": format!(
                        "Current search: \"{}\" ({} doctor(s))",
                        entry.search_text, entry.doctors.len()
                    )}],
                    "structuredContent": {
                        "searchText": entry.search_text,
                        "lang": entry.language.as_str(),
                        "doctorNames": names
                    }
                })
            }
            None => tool_text("No active search context for this session."),
        }
    }

    async fn call_lookup_specialty(&self, args: &Value) -> Value {
        let Some(name) = args.get("specialtyName").and_then(Value::as_str) else {
            return tool_error("Error: specialtyName is required.");
        };
        let entries = match self.upstream.specialty_list().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("specialty lookup failed: {e}");
                return tool_error("Error: Specialty lookup is temporarily unavailable.");
            }
        };

        let matches: Vec<String> = entries
            .iter()
            .filter(|entry| entry.matches(name))
            .map(|entry| {
                format!(
                    "- {} (ID: {})",
                    entry.text.as_deref().or(entry.text1.as_deref()).unwrap_or("?"),
                    entry.value
                )
            })
            .collect();

        if matches.is_empty() {
            tool_text(format!("No specialty found matching \"{name}\"."))
        } else {
            tool_text(format!("Matching specialties:\n{}", matches.join("\n")))
        }
    }

    async fn call_lookup_facility(&self, args: &Value) -> Value {
        let Some(name) = args.get("facilityName").and_then(Value::as_str) else {
            return tool_error("Error: facilityName is required.");
        };
        let entries = match self.upstream.facility_list().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("facility lookup failed: {e}");
                return tool_error("Error: Facility lookup is temporarily unavailable.");
            }
        };

        let matches: Vec<String> = entries
            .iter()
            .filter(|entry| entry.matches(name))
            .map(|entry| {
                format!(
                    "- {} (ID: {})",
                    entry.text.as_deref().or(entry.text1.as_deref()).unwrap_or("?"),
                    entry.value
                )
            })
            .collect();

        if matches.is_empty() {
            tool_text(format!("No facility found matching \"{name}\"."))
        } else {
            tool_text(format!("Matching facilities:\n{}", matches.join("\n")))
        }
    }

    fn call_open_booking(&self, args: &Value) -> Value {
        match validate_open_booking(args) {
            Ok(request) => {
                let booking_url = format!(
                    "{}/widget-booking?timeslotId={}",
                    self.config.booking_app_url,
                    urlencoding::encode(&request.timeslot_id)
                );
                json!({
                    "content": [{ "type": "text", "text": format!(
                        "Opening secure booking for {} at {} on {}. The widget collects phone \
                         verification and patient details.",
                        request.doctor_name, request.facility_name, request.date_time
                    )}],
                    "structuredContent": {
                        "timeslotId": request.timeslot_id,
                        "doctorName": request.doctor_name,
                        "facilityName": request.facility_name,
                        "dateTime": request.date_time,
                        "specialty": request.specialty,
                        "price": request.price,
                        "bookingUrl": booking_url
                    },
                    "_meta": { "openai/outputTemplate": WIDGET_RESOURCE_URI }
                })
            }
            Err(message) => tool_error(message),
        }
    }

    async fn handle_tools_call(&self, params: &ToolsCallParams) -> Result<Value, RpcError> {
        let session_id = session_id_from_meta(params.meta.as_ref());
        let args = params.arguments.clone().unwrap_or_else(|| json!({}));
        debug!(tool = %params.name, session = %session_id, "tool call");

        let result = match params.name.as_str() {
            "open_booking_widget_v2" => self.call_open_widget(&session_id, &args).await,
            "search_doctors" => self.call_search_doctors(&session_id, &args).await,
            "get_timeslots" => self.call_get_timeslots(&session_id, &args).await,
            "get_search_context" => self.call_get_search_context(&session_id).await,
            "lookup_specialty" => self.call_lookup_specialty(&args).await,
            "lookup_facility" => self.call_lookup_facility(&args).await,
            "open_booking" => self.call_open_booking(&args),
            other => {
                return Err(RpcError::invalid_params(format!("Unknown tool: {other}")));
            }
        };
        Ok(result)
    }

    async fn handle_resources_read(
        &self,
        params: &ResourcesReadParams,
    ) -> Result<Value, RpcError> {
        if !params.uri.starts_with(WIDGET_RESOURCE_URI) {
            return Err(RpcError::invalid_params(format!(
                "Unknown resource: {}",
                params.uri
            )));
        }

        let session_id = session_id_from_meta(params.meta.as_ref());
        let uri_search_text = url::Url::parse(&params.uri)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "searchText")
                    .map(|(_, v)| v.into_owned())
            })
            .filter(|s| !s.trim().is_empty());

        // Prefer the session's already-fetched results; fall back to the
        // search text baked into the resource URI, which covers reads landing
        // on an instance that never saw the tool call.
        let (search_text, mut doctors, language) = match self.sessions.get(&session_id).await {
            Some(entry) => (entry.search_text, entry.doctors, entry.language),
            None => match uri_search_text {
                Some(raw) => {
                    let normalized = normalize(&raw);
                    let language = detect_language(&raw);
                    let (search_text, doctors) = if normalized.is_empty() {
                        (raw, Vec::new())
                    } else {
                        match self.run_search(&normalized).await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                warn!("widget re-query failed: {e}");
                                (normalized.honorifics_removed.clone(), Vec::new())
                            }
                        }
                    };
                    self.sessions
                        .put(&session_id, search_text.clone(), doctors.clone(), language)
                        .await;
                    (search_text, doctors, language)
                }
                None => (String::new(), Vec::new(), Language::English),
            },
        };

        // A degraded earlier tool call can leave an empty list in the session;
        // give the upstream one more chance before rendering without results.
        if doctors.is_empty() && !search_text.is_empty() {
            let normalized = normalize(&search_text);
            if !normalized.is_empty()
                && let Ok((refreshed_text, refreshed)) = self.run_search(&normalized).await
                && !refreshed.is_empty()
            {
                self.sessions
                    .put(&session_id, refreshed_text, refreshed.clone(), language)
                    .await;
                doctors = refreshed;
            }
        }

        let html = self
            .widget
            .render(&WidgetParams {
                search_text: &search_text,
                language,
                doctors: &doctors,
            })
            .map_err(|e| RpcError::internal(format!("Widget rendering failed: {e}")))?;

        Ok(json!({
            "contents": [{
                "uri": params.uri,
                "mimeType": "text/html",
                "text": html
            }]
        }))
    }
}

fn session_id_from_meta(meta: Option<&Value>) -> String {
    meta.and_then(|m| m.get("openai/session"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        // No session context: use a throwaway id so anonymous calls never
        // share or clobber each other's state.
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn tool_text(text: impl Into<String>) -> Value {
    json!({ "content": [{ "type": "text", "text": text.into() }] })
}

fn tool_error(text: impl Into<String>) -> Value {
    json!({
        "content": [{ "type": "text", "text": text.into() }],
        "isError": true
    })
}

fn format_doctor_list(doctors: &[DoctorRecord], limit: usize) -> String {
    doctors
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, d)| {
            let name = d.doctor_name.as_deref().unwrap_or("Unknown");
            let price = d
                .price_rate_min
                .map(|p| {
                    format!(
                        "from {p} {}",
                        d.currency_code.as_deref().unwrap_or("SAR")
                    )
                })
                .unwrap_or_else(|| "N/A".to_string());
            let places: Vec<String> = d
                .facilities
                .iter()
                .map(|f| {
                    let specs: Vec<&str> = f
                        .specialties
                        .iter()
                        .filter_map(|s| s.specialty_text.as_deref())
                        .collect();
                    format!(
                        "{}{}",
                        f.facility_name.as_deref().unwrap_or("?"),
                        if specs.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", specs.join(", "))
                        }
                    )
                })
                .collect();
            format!(
                "{}. {name} (ID: {})\n   {}\n   Price: {price} | Rating: {}",
                i + 1,
                d.doctor_id,
                places.join("; "),
                d.rating_display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl MessageHandler for McpServer {
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>> {
        let response = match message {
            McpMessage::Initialize { id, params } => McpMessage::Response {
                id,
                result: Some(self.handle_initialize(&params)),
                error: None,
            },
            McpMessage::Initialized { id } => McpMessage::Response {
                id,
                result: Some(json!({})),
                error: None,
            },
            McpMessage::ToolsList { id } => McpMessage::Response {
                id,
                result: Some(self.handle_tools_list()),
                error: None,
            },
            McpMessage::ToolsCall { id, params } => match self.handle_tools_call(&params).await {
                Ok(result) => McpMessage::Response {
                    id,
                    result: Some(result),
                    error: None,
                },
                Err(error) => McpMessage::Response {
                    id,
                    result: None,
                    error: Some(error),
                },
            },
            McpMessage::ResourcesList { id } => McpMessage::Response {
                id,
                result: Some(self.handle_resources_list()),
                error: None,
            },
            McpMessage::ResourcesRead { id, params } => {
                match self.handle_resources_read(&params).await {
                    Ok(result) => McpMessage::Response {
                        id,
                        result: Some(result),
                        error: None,
                    },
                    Err(error) => McpMessage::Response {
                        id,
                        result: None,
                        error: Some(error),
                    },
                }
            }
            McpMessage::Unknown { id, method } => McpMessage::Response {
                id,
                result: None,
                error: Some(RpcError::method_not_found(&method)),
            },
            McpMessage::Response { .. } => return Ok(None),
        };
        Ok(Some(response))
    }
}
