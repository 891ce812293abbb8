use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AppError, AppResult, ErrorKind};
use crate::{
    get_current_time_ms, DEFAULT_RESOLUTION_RESPONSE, MAX_NOTE_CHARS, RESOLVED_HISTORY_LIMIT,
};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(EmergencyId);
typed_id!(PatientId);

/// Explicit timestamp unit.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub const fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Stored as its wire string; values this build does not know survive a
/// load/save cycle untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmergencyType {
    Sos,
    LocationBreach,
    MedicationMissed,
    Inactivity,
    Other(String),
}

impl EmergencyType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sos => "sos",
            Self::LocationBreach => "location_breach",
            Self::MedicationMissed => "medication_missed",
            Self::Inactivity => "inactivity",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for EmergencyType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "sos" => Self::Sos,
            "location_breach" => Self::LocationBreach,
            "medication_missed" => Self::MedicationMissed,
            "inactivity" => Self::Inactivity,
            _ => Self::Other(raw),
        }
    }
}

impl From<EmergencyType> for String {
    fn from(kind: EmergencyType) -> Self {
        match kind {
            EmergencyType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emergency {
    pub id: EmergencyId,
    pub patient_id: PatientId,
    #[serde(rename = "type")]
    pub kind: EmergencyType,
    pub timestamp: UnixTimeMs,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<EmergencyLocation>,

    /// Fields written by other parts of the app; carried through saves.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Emergency {
    #[must_use]
    pub fn new(
        id: EmergencyId,
        patient_id: PatientId,
        kind: EmergencyType,
        timestamp: UnixTimeMs,
    ) -> Self {
        Self {
            id,
            patient_id,
            kind,
            timestamp,
            is_resolved: false,
            response: None,
            location: None,
            extra: serde_json::Map::new(),
        }
    }

    /// An emergency that is already resolved keeps its original response.
    pub fn resolve(&mut self, response: &str) {
        if self.is_resolved && self.response.as_deref().is_some_and(|r| !r.is_empty()) {
            return;
        }
        self.is_resolved = true;
        self.response = Some(response.to_string());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
}

/// Runtime settings the shell may override.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub resolved_history_limit: usize,
    pub default_response: String,
    pub max_note_chars: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            resolved_history_limit: RESOLVED_HISTORY_LIMIT,
            default_response: DEFAULT_RESOLUTION_RESPONSE.to_string(),
            max_note_chars: MAX_NOTE_CHARS,
        }
    }
}

impl AlertsConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.resolved_history_limit == 0 {
            return Err(AppError::new(
                ErrorKind::Validation,
                "Resolved history must show at least one alert.",
            )
            .with_context("field", "resolved_history_limit"));
        }
        if self.default_response.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Validation,
                "The default resolution note cannot be empty.",
            )
            .with_context("field", "default_response"));
        }
        if self.max_note_chars == 0 {
            return Err(AppError::new(
                ErrorKind::Validation,
                "Resolution notes must allow at least one character.",
            )
            .with_context("field", "max_note_chars"));
        }
        Ok(())
    }

    /// Trimmed caregiver note, capped on a char boundary; blank falls back
    /// to the default response.
    #[must_use]
    pub fn response_for(&self, note: Option<&str>) -> String {
        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) => note.chars().take(self.max_note_chars).collect(),
            None => self.default_response.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadId(pub u64);

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadTrigger {
    Mount,
    Refresh,
}

/// One resolution as baked into a specific write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub id: EmergencyId,
    pub response: String,
}

/// A resolution awaiting confirmation. It stays pending until every write
/// that carries it has settled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingResolution {
    pub response: String,
    pub writes_in_flight: usize,
}

/// Join state of one load: both reads must land before anything is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingLoad {
    pub trigger: LoadTrigger,
    pub emergencies: Option<Vec<Emergency>>,
    pub patients: Option<Vec<Patient>>,
}

impl PendingLoad {
    #[must_use]
    pub const fn new(trigger: LoadTrigger) -> Self {
        Self {
            trigger,
            emergencies: None,
            patients: None,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.emergencies.is_some() && self.patients.is_some()
    }
}

#[derive(Debug)]
pub struct Model {
    pub emergencies: Vec<Emergency>,
    pub patients: Vec<Patient>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub next_load_id: u64,
    pub pending_loads: BTreeMap<LoadId, PendingLoad>,
    /// Resolutions whose writes have been requested but not yet settled.
    pub pending_resolutions: BTreeMap<EmergencyId, PendingResolution>,
    pub active_error: Option<AppError>,
    pub config: AlertsConfig,
    pub view_timestamp_ms: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            emergencies: Vec::new(),
            patients: Vec::new(),
            is_loading: true,
            is_refreshing: false,
            next_load_id: 0,
            pending_loads: BTreeMap::new(),
            pending_resolutions: BTreeMap::new(),
            active_error: None,
            config: AlertsConfig::default(),
            view_timestamp_ms: get_current_time_ms(),
        }
    }
}

impl Model {
    pub fn update_timestamp(&mut self) {
        self.view_timestamp_ms = get_current_time_ms();
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn begin_load(&mut self, trigger: LoadTrigger) -> LoadId {
        let id = LoadId(self.next_load_id);
        self.next_load_id = self.next_load_id.wrapping_add(1);
        self.pending_loads.insert(id, PendingLoad::new(trigger));
        id
    }

    /// Newest first. Stable, so equal timestamps keep their stored order.
    pub fn replace_data(&mut self, mut emergencies: Vec<Emergency>, patients: Vec<Patient>) {
        sort_by_recency(&mut emergencies);
        self.emergencies = emergencies;
        self.patients = patients;
    }

    pub fn finish_load(&mut self, trigger: LoadTrigger) {
        self.is_loading = false;
        if trigger == LoadTrigger::Refresh {
            self.is_refreshing = false;
        }
    }

    /// Queues a resolution. A second press on a pending emergency keeps the
    /// first response so every write carries the same text.
    pub fn queue_resolution(&mut self, id: EmergencyId, response: String) {
        self.pending_resolutions
            .entry(id)
            .or_insert(PendingResolution {
                response,
                writes_in_flight: 0,
            });
    }

    /// Every pending resolution, in the form a write carries them.
    #[must_use]
    pub fn pending_resolution_set(&self) -> Vec<Resolution> {
        self.pending_resolutions
            .iter()
            .map(|(id, pending)| Resolution {
                id: id.clone(),
                response: pending.response.clone(),
            })
            .collect()
    }

    /// The list to persist for a resolve: the current list with every
    /// pending resolution applied.
    #[must_use]
    pub fn emergencies_with_pending_resolutions(&self) -> Vec<Emergency> {
        let mut list = self.emergencies.clone();
        for emergency in &mut list {
            if let Some(pending) = self.pending_resolutions.get(&emergency.id) {
                emergency.resolve(&pending.response);
            }
        }
        list
    }

    pub fn write_requested(&mut self, carried: &[Resolution]) {
        for resolution in carried {
            if let Some(pending) = self.pending_resolutions.get_mut(&resolution.id) {
                pending.writes_in_flight += 1;
            }
        }
    }

    /// Drops queued resolutions that no write ever carried.
    pub fn drop_unsent_resolutions(&mut self) {
        self.pending_resolutions
            .retain(|_, pending| pending.writes_in_flight > 0);
    }

    /// Marks one write carrying `carried` as settled, whatever its outcome.
    /// Returns the ids that are no longer pending.
    pub fn write_settled(&mut self, carried: &[Resolution]) -> Vec<EmergencyId> {
        let mut released = Vec::new();
        for resolution in carried {
            let Some(pending) = self.pending_resolutions.get_mut(&resolution.id) else {
                continue;
            };
            pending.writes_in_flight = pending.writes_in_flight.saturating_sub(1);
            if pending.writes_in_flight == 0 {
                self.pending_resolutions.remove(&resolution.id);
                released.push(resolution.id.clone());
            }
        }
        released
    }

    /// Mirrors a confirmed write into local state. Returns whether an
    /// emergency with that id was present.
    pub fn apply_resolution(&mut self, id: &EmergencyId, response: &str) -> bool {
        let mut found = false;
        for emergency in self.emergencies.iter_mut().filter(|e| &e.id == id) {
            emergency.resolve(response);
            found = true;
        }
        found
    }

    #[must_use]
    pub fn is_resolving(&self, id: &EmergencyId) -> bool {
        self.pending_resolutions.contains_key(id)
    }
}

pub fn sort_by_recency(emergencies: &mut [Emergency]) {
    emergencies.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
