//! Shared test fixtures: an in-memory upstream gateway and row builders.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use etabeb_mcp::doctors::{OpaqueId, RawDoctorRow};
use etabeb_mcp::upstream::{ReferenceEntry, TimeslotRow, UpstreamError, UpstreamGateway};

pub fn doctor_row(
    doctor: &str,
    name: &str,
    facility: &str,
    specialty: &str,
    rt: &str,
) -> RawDoctorRow {
    serde_json::from_value(serde_json::json!({
        "doctorId": doctor,
        "doctorName": name,
        "ratingAvg": 4.5,
        "priceRateMin": 250.0,
        "currencyCode": "SAR",
        "medicalFacilityId": facility,
        "medicalFacilityName": format!("Facility {facility}"),
        "medicalSpecialityId": specialty,
        "medicalSpecialityText": format!("Specialty {specialty}"),
        "medicalFacilityDoctorSpecialityRTId": rt,
        "timeslotCount": 3
    }))
    .expect("fixture row decodes")
}

pub fn timeslot(date: &str, time: &str, id: &str) -> TimeslotRow {
    TimeslotRow {
        date: Some(date.to_string()),
        time: Some(time.to_string()),
        timeslot_id: OpaqueId::new(id),
    }
}

/// Scriptable upstream gateway. Doctor responses are keyed by exact search
/// text; the empty-string key stands in for the full pool used by fuzzy
/// fallback. Queries and timeslot lookups are recorded for assertions.
#[derive(Default)]
pub struct MockUpstream {
    pub doctors: HashMap<String, Vec<RawDoctorRow>>,
    pub timeslots: Vec<TimeslotRow>,
    pub specialties: Vec<ReferenceEntry>,
    pub facilities: Vec<ReferenceEntry>,
    pub fail_doctor_search: bool,
    pub doctor_queries: Mutex<Vec<String>>,
    pub timeslot_queries: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(mut self, query: &str, rows: Vec<RawDoctorRow>) -> Self {
        self.doctors.insert(query.to_string(), rows);
        self
    }

    pub fn with_timeslots(mut self, slots: Vec<TimeslotRow>) -> Self {
        self.timeslots = slots;
        self
    }
}

#[async_trait]
impl UpstreamGateway for MockUpstream {
    async fn doctor_search(&self, search_text: &str) -> Result<Vec<RawDoctorRow>, UpstreamError> {
        if self.fail_doctor_search {
            return Err(UpstreamError::Malformed("unavailable".into()));
        }
        self.doctor_queries
            .lock()
            .unwrap()
            .push(search_text.to_string());
        Ok(self.doctors.get(search_text).cloned().unwrap_or_default())
    }

    async fn specialty_list(&self) -> Result<Vec<ReferenceEntry>, UpstreamError> {
        Ok(self.specialties.clone())
    }

    async fn facility_list(&self) -> Result<Vec<ReferenceEntry>, UpstreamError> {
        Ok(self.facilities.clone())
    }

    async fn timeslot_list(
        &self,
        relation_timeslot_id: &str,
    ) -> Result<Vec<TimeslotRow>, UpstreamError> {
        self.timeslot_queries
            .lock()
            .unwrap()
            .push(relation_timeslot_id.to_string());
        Ok(self.timeslots.clone())
    }
}
