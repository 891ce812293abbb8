// lib.rs - Caregiver emergency alerts core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod app;
pub mod capabilities;
pub mod error;
pub mod event;
pub mod model;
pub mod presentation;
pub mod view;

pub use app::App;
pub use capabilities::Capabilities;
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, AppResult, ErrorKind, ErrorSeverity, UserFacingError};
pub use event::{ButtonAction, Event};
pub use model::{
    AlertsConfig, Emergency, EmergencyId, EmergencyLocation, EmergencyType, Model, Patient,
    PatientId, UnixTimeMs,
};
pub use view::{ButtonStyle, ButtonVariant, ButtonView, EmergencyCard, ViewModel, ViewState};

// Generated by the Effect derive on `Capabilities`.
pub use capabilities::Effect;

pub const RESOLVED_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_RESOLUTION_RESPONSE: &str = "Resolved by caregiver";
pub const MAX_NOTE_CHARS: usize = 280;
pub const UNKNOWN_PATIENT_NAME: &str = "Unknown Patient";
pub const RESOLVE_BUTTON_TITLE: &str = "Mark as Resolved";
pub const LOADING_MESSAGE: &str = "Loading emergencies...";
pub const EMPTY_TITLE: &str = "No Emergencies";
pub const EMPTY_MESSAGE: &str = "All your patients are safe. Alerts will appear here.";
/// e.g. "Oct 14, 2026 9:05 AM", in the device's local timezone.
pub const ABSOLUTE_TIME_FORMAT: &str = "%b %-d, %Y %-I:%M %p";

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
