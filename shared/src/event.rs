use serde::{Deserialize, Serialize};

use crate::capabilities::StorageError;
use crate::model::{AlertsConfig, Emergency, EmergencyId, LoadId, Patient, Resolution};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Event {
    #[default]
    Noop,

    /// The alerts screen was mounted.
    AppStarted,
    /// Pull-to-refresh.
    RefreshRequested,
    /// Periodic tick from the shell so relative times stay current.
    ClockTicked,

    ConfigUpdated(AlertsConfig),

    ResolveEmergency {
        id: EmergencyId,
        note: Option<String>,
    },
    ErrorDismissed,

    // Shell responses
    EmergenciesFetched {
        load_id: LoadId,
        result: Result<Vec<Emergency>, StorageError>,
    },
    PatientsFetched {
        load_id: LoadId,
        result: Result<Vec<Patient>, StorageError>,
    },
    /// `id` is the press that issued the write; `resolutions` is every
    /// resolution the written list carried.
    ResolvePersisted {
        id: EmergencyId,
        resolutions: Vec<Resolution>,
        result: Result<(), StorageError>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted => "app_started",
            Self::RefreshRequested => "refresh_requested",
            Self::ClockTicked => "clock_ticked",
            Self::ConfigUpdated(_) => "config_updated",
            Self::ResolveEmergency { .. } => "resolve_emergency",
            Self::ErrorDismissed => "error_dismissed",
            Self::EmergenciesFetched { .. } => "emergencies_fetched",
            Self::PatientsFetched { .. } => "patients_fetched",
            Self::ResolvePersisted { .. } => "resolve_persisted",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::RefreshRequested | Self::ResolveEmergency { .. } | Self::ErrorDismissed
        )
    }
}

/// What a button in the view model sends back when pressed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ButtonAction {
    ResolveEmergency { emergency_id: String },
    DismissError,
}

impl From<ButtonAction> for Event {
    fn from(action: ButtonAction) -> Self {
        match action {
            ButtonAction::ResolveEmergency { emergency_id } => Self::ResolveEmergency {
                id: EmergencyId::new(emergency_id),
                note: None,
            },
            ButtonAction::DismissError => Self::ErrorDismissed,
        }
    }
}
