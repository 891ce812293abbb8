//! Pure display helpers for emergency cards.

use chrono::{Local, TimeZone};

use crate::model::{EmergencyLocation, EmergencyType, Patient, PatientId, UnixTimeMs};
use crate::{ABSOLUTE_TIME_FORMAT, UNKNOWN_PATIENT_NAME};

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

#[must_use]
pub fn emergency_icon(kind: &EmergencyType) -> &'static str {
    match kind {
        EmergencyType::Sos => "alert-circle",
        EmergencyType::LocationBreach => "location",
        EmergencyType::MedicationMissed => "medical",
        EmergencyType::Inactivity => "time",
        EmergencyType::Other(_) => "warning",
    }
}

#[must_use]
pub fn emergency_color(kind: &EmergencyType) -> &'static str {
    match kind {
        EmergencyType::Sos => "#FF3B30",
        EmergencyType::LocationBreach => "#FF9500",
        EmergencyType::MedicationMissed => "#5856D6",
        EmergencyType::Inactivity => "#FFCC00",
        EmergencyType::Other(_) => "#8E8E93",
    }
}

#[must_use]
pub fn emergency_title(kind: &EmergencyType) -> &'static str {
    match kind {
        EmergencyType::Sos => "SOS Alert",
        EmergencyType::LocationBreach => "Location Alert",
        EmergencyType::MedicationMissed => "Missed Medication",
        EmergencyType::Inactivity => "Inactivity Alert",
        EmergencyType::Other(_) => "Emergency Alert",
    }
}

/// Minutes under an hour, hours under a day, otherwise a short local date.
/// Timestamps in the future read as "0m ago".
#[must_use]
pub fn format_timestamp(timestamp: UnixTimeMs, now: UnixTimeMs) -> String {
    let diff_ms = now.elapsed_since(timestamp);

    if diff_ms < HOUR_MS {
        return format!("{}m ago", diff_ms / MINUTE_MS);
    }
    if diff_ms < DAY_MS {
        return format!("{}h ago", diff_ms / HOUR_MS);
    }

    format_absolute(timestamp)
}

#[must_use]
pub fn format_absolute(timestamp: UnixTimeMs) -> String {
    let Ok(millis) = i64::try_from(timestamp.0) else {
        return "Unknown time".into();
    };

    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format(ABSOLUTE_TIME_FORMAT).to_string(),
        None => "Unknown time".into(),
    }
}

#[must_use]
pub fn format_location(location: &EmergencyLocation) -> String {
    match location.address.as_deref().map(str::trim) {
        Some(address) if !address.is_empty() => address.to_string(),
        _ => format!("{:.4}, {:.4}", location.latitude, location.longitude),
    }
}

#[must_use]
pub fn patient_name<'a>(patients: &'a [Patient], id: &PatientId) -> &'a str {
    patients
        .iter()
        .find(|p| &p.id == id)
        .map_or(UNKNOWN_PATIENT_NAME, |p| p.name.as_str())
}
