//! `open_booking` input validation
//!
//! Two hard rules guard the direct-booking tool. The timeslot id must be a
//! real numeric id obtained from `get_timeslots`; a model must never invent
//! one. And no personally identifying data may travel through tool arguments:
//! phone numbers, OTP codes, and patient identifiers belong exclusively to the
//! secure widget flow. The deny-list scan fails closed on any extra argument
//! whose key contains a sensitive fragment, no matter how many valid fields
//! accompany it.

use serde_json::Value;

/// Key fragments that mark an argument as sensitive, matched as
/// case-insensitive substrings.
pub const SENSITIVE_FRAGMENTS: &[&str] =
    &["phone", "mobile", "otp", "password", "patientid", "nationalid"];

/// The booking fields the tool accepts.
const ALLOWED_KEYS: &[&str] =
    &["timeslotId", "doctorName", "facilityName", "dateTime", "specialty", "price"];

const WORKFLOW_GUIDANCE: &str = "You MUST follow this workflow:\n\
    1. Call search_doctors with the doctor name or specialty\n\
    2. Show results to the user and let them choose\n\
    3. Call get_timeslots with the doctor ID from search results\n\
    4. Show available times to the user and let them choose\n\
    5. Then call open_booking with the timeslot ID\n\n\
    Start by calling search_doctors now.";

/// Validated booking parameters. Never carries sensitive fields; those are
/// rejected before this struct exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub timeslot_id: String,
    pub doctor_name: String,
    pub facility_name: String,
    pub date_time: String,
    pub specialty: Option<String>,
    pub price: Option<String>,
}

fn str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate `open_booking` arguments. Errors are actionable messages destined
/// for an `isError: true` tool result, never protocol failures.
pub fn validate_open_booking(args: &Value) -> Result<BookingRequest, String> {
    let sensitive: Vec<&str> = args
        .as_object()
        .map(|map| {
            map.keys()
                .filter(|key| !ALLOWED_KEYS.contains(&key.as_str()))
                .filter(|key| {
                    let lower = key.to_lowercase();
                    SENSITIVE_FRAGMENTS.iter().any(|frag| lower.contains(frag))
                })
                .map(String::as_str)
                .collect()
        })
        .unwrap_or_default();

    if !sensitive.is_empty() {
        return Err(format!(
            "Error: Never include sensitive data ({}) in tool calls. The secure booking \
             widget will collect: phone number, OTP verification, and patient selection. \
             Only pass timeslotId, doctorName, facilityName, dateTime, specialty, and price.",
            sensitive.join(", ")
        ));
    }

    let timeslot_id = str_arg(args, "timeslotId");
    let doctor_name = str_arg(args, "doctorName");
    let facility_name = str_arg(args, "facilityName");
    let date_time = str_arg(args, "dateTime");

    let (Some(timeslot_id), Some(doctor_name), Some(facility_name), Some(date_time)) =
        (timeslot_id, doctor_name, facility_name, date_time)
    else {
        return Err(format!(
            "Error: Cannot open booking without complete appointment details.\n\n{WORKFLOW_GUIDANCE}"
        ));
    };

    if !timeslot_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!(
            "Error: Invalid timeslotId \"{timeslot_id}\". The timeslot ID must be a numeric \
             ID from get_timeslots results (e.g. \"7762646\"). You cannot infer or make up \
             timeslot IDs.\n\n{WORKFLOW_GUIDANCE}"
        ));
    }

    Ok(BookingRequest {
        timeslot_id,
        doctor_name,
        facility_name,
        date_time,
        specialty: str_arg(args, "specialty"),
        price: str_arg(args, "price"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn valid_args() -> Value {
        json!({
            "timeslotId": "7762646",
            "doctorName": "Khalid Farouqi",
            "facilityName": "Fakeeh Hospital",
            "dateTime": "2026-09-01 10:00"
        })
    }

    #[test]
    fn test_valid_booking_accepted() {
        let request = validate_open_booking(&valid_args()).unwrap();
        assert_eq!(request.timeslot_id, "7762646");
        assert_eq!(request.doctor_name, "Khalid Farouqi");
        assert!(request.specialty.is_none());
    }

    #[rstest]
    #[case("timeslotId")]
    #[case("doctorName")]
    #[case("facilityName")]
    #[case("dateTime")]
    fn test_missing_required_field_rejected(#[case] field: &str) {
        let mut args = valid_args();
        args.as_object_mut().unwrap().remove(field);
        let err = validate_open_booking(&args).unwrap_err();
        assert!(err.contains("search_doctors"), "guidance missing from: {err}");
    }

    #[rstest]
    #[case("abc")]
    #[case("7762646x")]
    #[case("12 34")]
    fn test_non_numeric_timeslot_rejected(#[case] id: &str) {
        let mut args = valid_args();
        args["timeslotId"] = json!(id);
        let err = validate_open_booking(&args).unwrap_err();
        assert!(err.contains("numeric"));
        assert!(err.contains("search_doctors"));
    }

    #[rstest]
    #[case("phone")]
    #[case("phoneNumber")]
    #[case("mobileNumber")]
    #[case("otp")]
    #[case("otpCode")]
    #[case("password")]
    #[case("patientId")]
    #[case("nationalId")]
    #[case("PATIENTID")]
    #[case("user_otp_code")]
    fn test_sensitive_key_always_rejected(#[case] key: &str) {
        let mut args = valid_args();
        args[key] = json!("0501234567");
        let err = validate_open_booking(&args).unwrap_err();
        assert!(err.contains("sensitive"), "deny-list missed {key}: {err}");
    }

    #[test]
    fn test_sensitive_rejection_wins_over_missing_fields() {
        // Fails closed on sensitive data even when required fields are absent too.
        let args = json!({ "otp": "1234" });
        let err = validate_open_booking(&args).unwrap_err();
        assert!(err.contains("sensitive"));
    }

    #[test]
    fn test_optional_fields_pass_through() {
        let mut args = valid_args();
        args["specialty"] = json!("Cardiology");
        args["price"] = json!("300 SAR");
        let request = validate_open_booking(&args).unwrap();
        assert_eq!(request.specialty.as_deref(), Some("Cardiology"));
        assert_eq!(request.price.as_deref(), Some("300 SAR"));
    }

    #[test]
    fn test_harmless_extra_key_allowed() {
        let mut args = valid_args();
        args["note"] = json!("morning preferred");
        assert!(validate_open_booking(&args).is_ok());
    }
}
