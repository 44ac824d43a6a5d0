//! Upstream eTabeb booking API gateway
//!
//! Thin client over the third-party REST API. Every endpoint is a POST with a
//! JSON body, and the API is loose about response shapes: a list endpoint may
//! return a bare JSON array or an object wrapping the array under some key
//! (`{"PatientList": [...]}`). Shape detection happens once at the ingestion
//! boundary instead of being duck-typed through every call site.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::doctors::{OpaqueId, RawDoctorRow};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("upstream returned malformed payload: {0}")]
    Malformed(String),
}

/// One reference row from the specialty or hospital list.
/// `text` is the English label, `text1` the Arabic one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub value: OpaqueId,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub text1: Option<String>,
}

impl ReferenceEntry {
    /// Case-insensitive substring match against either language label.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let hit = |label: &Option<String>| {
            label
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle))
        };
        hit(&self.text) || hit(&self.text1)
    }
}

/// One available timeslot for a relation-timeslot id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeslotRow {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "timeslotRTId")]
    pub timeslot_id: OpaqueId,
}

/// Seam for the upstream booking API, mockable in tests.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    /// Doctor search; an empty `search_text` lists the full pool.
    async fn doctor_search(&self, search_text: &str) -> Result<Vec<RawDoctorRow>, UpstreamError>;

    async fn specialty_list(&self) -> Result<Vec<ReferenceEntry>, UpstreamError>;

    async fn facility_list(&self) -> Result<Vec<ReferenceEntry>, UpstreamError>;

    /// Timeslots for a relation-timeslot composite id (not a doctor id).
    async fn timeslot_list(&self, relation_timeslot_id: &str)
    -> Result<Vec<TimeslotRow>, UpstreamError>;
}

/// Extract rows from an array-or-object payload.
///
/// A bare array is the row list; an object is scanned for its first
/// array-valued field. Rows that fail to decode are skipped with a warning so
/// one malformed row cannot poison a whole response.
pub fn extract_rows<T: DeserializeOwned>(payload: Value) -> Result<Vec<T>, UpstreamError> {
    let raw_rows = match payload {
        Value::Array(rows) => rows,
        Value::Object(map) => match map.into_iter().find_map(|(_, v)| match v {
            Value::Array(rows) => Some(rows),
            _ => None,
        }) {
            Some(rows) => rows,
            None => Vec::new(),
        },
        Value::Null => Vec::new(),
        other => {
            return Err(UpstreamError::Malformed(format!(
                "expected array or object, got {other}"
            )));
        }
    };

    let total = raw_rows.len();
    let rows: Vec<T> = raw_rows
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("skipping undecodable upstream row: {e}");
                None
            }
        })
        .collect();
    debug!(decoded = rows.len(), total, "decoded upstream rows");
    Ok(rows)
}

/// reqwest-backed eTabeb API client.
pub struct EtabebClient {
    http: reqwest::Client,
    base_url: String,
}

impl EtabebClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(%url, "upstream POST");

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl UpstreamGateway for EtabebClient {
    async fn doctor_search(&self, search_text: &str) -> Result<Vec<RawDoctorRow>, UpstreamError> {
        let payload = self
            .post_json("/api/AI/DoctorList", serde_json::json!({ "searchText": search_text }))
            .await?;
        extract_rows(payload)
    }

    async fn specialty_list(&self) -> Result<Vec<ReferenceEntry>, UpstreamError> {
        let payload = self
            .post_json("/api/AI/SpecialitiesList", serde_json::json!({}))
            .await?;
        extract_rows(payload)
    }

    async fn facility_list(&self) -> Result<Vec<ReferenceEntry>, UpstreamError> {
        let payload = self
            .post_json("/api/AI/HospitalList", serde_json::json!({}))
            .await?;
        extract_rows(payload)
    }

    async fn timeslot_list(
        &self,
        relation_timeslot_id: &str,
    ) -> Result<Vec<TimeslotRow>, UpstreamError> {
        let payload = self
            .post_json(
                "/api/AI/TimeslotList",
                serde_json::json!({ "medicalFacilityDoctorSpecialityRTId": relation_timeslot_id }),
            )
            .await?;
        extract_rows(payload)
    }
}
