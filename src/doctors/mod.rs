//! Doctor record model and deduplication
//!
//! The upstream doctor search returns one flat row per
//! (doctor, facility, specialty) tuple, so a physician practicing two
//! specialties at two hospitals arrives as four rows sharing a doctor id.
//! [`merge`] folds those rows into one record per physical doctor with nested
//! facility and specialty lists.
//!
//! The relation-timeslot id (`rtId`) on each specialty is the composite key
//! downstream timeslot and reservation calls need. It identifies a specific
//! (doctor, facility, specialty) offering and must not be confused with the
//! doctor's own id.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque upstream identifier. The API is inconsistent about whether ids are
/// JSON strings or numbers, so both are accepted on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OpaqueId(String);

impl OpaqueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OpaqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => Ok(OpaqueId(s)),
            serde_json::Value::Number(n) => Ok(OpaqueId(n.to_string())),
            other => Err(de::Error::custom(format!(
                "expected string or number id, got {other}"
            ))),
        }
    }
}

/// One flat row from the upstream doctor search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDoctorRow {
    pub doctor_id: OpaqueId,
    #[serde(default)]
    pub doctor_name: Option<String>,
    /// Localized (Arabic) display name.
    #[serde(default, rename = "doctorNameOTE")]
    pub doctor_name_localized: Option<String>,
    #[serde(default, rename = "picURL01")]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub rating_avg: Option<f64>,
    #[serde(default)]
    pub rating_text: Option<String>,
    #[serde(default)]
    pub price_rate_min: Option<f64>,
    #[serde(default)]
    pub currency_code: Option<String>,
    pub medical_facility_id: OpaqueId,
    #[serde(default)]
    pub medical_facility_name: Option<String>,
    pub medical_speciality_id: OpaqueId,
    #[serde(default)]
    pub medical_speciality_text: Option<String>,
    #[serde(rename = "medicalFacilityDoctorSpecialityRTId")]
    pub relation_timeslot_id: OpaqueId,
    #[serde(default)]
    pub timeslot_count: u64,
}

/// A specialty offered by a doctor at one facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialty {
    pub specialty_id: OpaqueId,
    pub specialty_text: Option<String>,
    /// Composite (doctor, facility, specialty) key for timeslot and
    /// reservation calls.
    #[serde(rename = "rtId")]
    pub relation_timeslot_id: OpaqueId,
    pub timeslot_count: u64,
}

/// A facility where a doctor practices, with the specialties offered there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub facility_id: OpaqueId,
    pub facility_name: Option<String>,
    pub specialties: Vec<Specialty>,
}

/// A merged, deduplicated practitioner entity. Constructed fresh on every
/// upstream search response; never persisted beyond the session entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRecord {
    pub doctor_id: OpaqueId,
    pub doctor_name: Option<String>,
    #[serde(rename = "doctorNameOTE")]
    pub doctor_name_localized: Option<String>,
    #[serde(rename = "picURL01")]
    pub picture_url: Option<String>,
    pub rating_avg: Option<f64>,
    pub rating_text: Option<String>,
    pub price_rate_min: Option<f64>,
    pub currency_code: Option<String>,
    pub timeslot_count: u64,
    pub facilities: Vec<Facility>,
}

impl DoctorRecord {
    fn from_row(row: &RawDoctorRow) -> Self {
        Self {
            doctor_id: row.doctor_id.clone(),
            doctor_name: row.doctor_name.clone(),
            doctor_name_localized: row.doctor_name_localized.clone(),
            picture_url: row.picture_url.clone(),
            rating_avg: row.rating_avg,
            rating_text: row.rating_text.clone(),
            price_rate_min: row.price_rate_min,
            currency_code: row.currency_code.clone(),
            timeslot_count: row.timeslot_count,
            facilities: vec![facility_from_row(row)],
        }
    }

    /// Human-readable rating, falling back to the textual rating when no
    /// numeric average exists.
    pub fn rating_display(&self) -> String {
        match (self.rating_avg, &self.rating_text) {
            (Some(avg), _) => format!("{avg}"),
            (None, Some(text)) => text.clone(),
            (None, None) => "New".to_string(),
        }
    }
}

fn specialty_from_row(row: &RawDoctorRow) -> Specialty {
    Specialty {
        specialty_id: row.medical_speciality_id.clone(),
        specialty_text: row.medical_speciality_text.clone(),
        relation_timeslot_id: row.relation_timeslot_id.clone(),
        timeslot_count: row.timeslot_count,
    }
}

fn facility_from_row(row: &RawDoctorRow) -> Facility {
    Facility {
        facility_id: row.medical_facility_id.clone(),
        facility_name: row.medical_facility_name.clone(),
        specialties: vec![specialty_from_row(row)],
    }
}

/// Deduplicate flat upstream rows into one record per physical doctor.
///
/// First-seen order of distinct doctor ids is preserved. Scalar display fields
/// come from the first row for a doctor; later rows only contribute their
/// facility/specialty tuple. Feeding the exact same row twice is a no-op.
pub fn merge(rows: Vec<RawDoctorRow>) -> Vec<DoctorRecord> {
    let mut records: Vec<DoctorRecord> = Vec::new();
    let mut index: HashMap<OpaqueId, usize> = HashMap::new();

    for row in rows {
        match index.get(&row.doctor_id) {
            None => {
                index.insert(row.doctor_id.clone(), records.len());
                records.push(DoctorRecord::from_row(&row));
            }
            Some(&i) => {
                let record = &mut records[i];
                match record
                    .facilities
                    .iter_mut()
                    .find(|f| f.facility_id == row.medical_facility_id)
                {
                    None => record.facilities.push(facility_from_row(&row)),
                    Some(facility) => {
                        let exists = facility
                            .specialties
                            .iter()
                            .any(|s| s.specialty_id == row.medical_speciality_id);
                        if !exists {
                            facility.specialties.push(specialty_from_row(&row));
                        }
                    }
                }
            }
        }
    }

    records
}
