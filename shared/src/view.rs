use serde::{Deserialize, Serialize};

use crate::error::UserFacingError;
use crate::event::ButtonAction;
use crate::model::{Emergency, Model, UnixTimeMs};
use crate::presentation::{
    emergency_color, emergency_icon, emergency_title, format_location, format_timestamp,
    patient_name,
};
use crate::{EMPTY_MESSAGE, EMPTY_TITLE, LOADING_MESSAGE, RESOLVE_BUTTON_TITLE};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonVariant {
    Primary,
    Secondary,
}

/// Style override applied on top of the variant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Default,
    CardAction,
}

/// Description of the shell's generic accessible button.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ButtonView {
    pub title: String,
    pub accessibility_label: String,
    pub variant: ButtonVariant,
    pub style: ButtonStyle,
    pub action: ButtonAction,
    pub disabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyCard {
    pub id: String,
    pub patient_name: String,
    pub title: String,
    pub icon: String,
    pub color: String,
    pub time_text: String,
    pub timestamp_ms: u64,
    pub location_text: Option<String>,
    pub is_resolved: bool,
    pub response: Option<String>,
    pub is_resolving: bool,
    pub resolve_button: Option<ButtonView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Loading {
        message: String,
    },
    Empty {
        title: String,
        message: String,
    },
    Populated {
        active: Vec<EmergencyCard>,
        resolved: Vec<EmergencyCard>,
        active_count: usize,
        resolved_total: usize,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub is_refreshing: bool,
    pub error: Option<UserFacingError>,
    pub dismiss_error_button: Option<ButtonView>,
}

/// Splits an already-sorted list by `is_resolved`, keeping order.
#[must_use]
pub fn partition_emergencies(emergencies: &[Emergency]) -> (Vec<&Emergency>, Vec<&Emergency>) {
    emergencies.iter().partition(|e| !e.is_resolved)
}

fn resolve_button_for(
    emergency: &Emergency,
    title: &str,
    patient: &str,
    disabled: bool,
) -> ButtonView {
    ButtonView {
        title: RESOLVE_BUTTON_TITLE.into(),
        accessibility_label: format!("Mark {title} for {patient} as resolved"),
        variant: ButtonVariant::Primary,
        style: ButtonStyle::CardAction,
        action: ButtonAction::ResolveEmergency {
            emergency_id: emergency.id.to_string(),
        },
        disabled,
    }
}

#[must_use]
pub fn build_card(emergency: &Emergency, model: &Model, now: UnixTimeMs) -> EmergencyCard {
    let title = emergency_title(&emergency.kind);
    let patient = patient_name(&model.patients, &emergency.patient_id);
    let is_resolving = model.is_resolving(&emergency.id);

    let resolve_button = (!emergency.is_resolved)
        .then(|| resolve_button_for(emergency, title, patient, is_resolving));

    EmergencyCard {
        id: emergency.id.to_string(),
        patient_name: patient.to_string(),
        title: title.to_string(),
        icon: emergency_icon(&emergency.kind).to_string(),
        color: emergency_color(&emergency.kind).to_string(),
        time_text: format_timestamp(emergency.timestamp, now),
        timestamp_ms: emergency.timestamp.0,
        location_text: emergency.location.as_ref().map(format_location),
        is_resolved: emergency.is_resolved,
        response: emergency.response.clone(),
        is_resolving,
        resolve_button,
    }
}

#[must_use]
pub fn build_view_state(model: &Model) -> ViewState {
    if model.is_loading {
        return ViewState::Loading {
            message: LOADING_MESSAGE.into(),
        };
    }

    if model.emergencies.is_empty() {
        return ViewState::Empty {
            title: EMPTY_TITLE.into(),
            message: EMPTY_MESSAGE.into(),
        };
    }

    let now = UnixTimeMs(model.view_timestamp_ms);
    let (active, resolved) = partition_emergencies(&model.emergencies);
    let resolved_total = resolved.len();

    ViewState::Populated {
        active_count: active.len(),
        active: active.into_iter().map(|e| build_card(e, model, now)).collect(),
        resolved: resolved
            .into_iter()
            .take(model.config.resolved_history_limit)
            .map(|e| build_card(e, model, now))
            .collect(),
        resolved_total,
    }
}

#[must_use]
pub fn build_view_model(model: &Model) -> ViewModel {
    let error = model.active_error.as_ref().map(UserFacingError::from);
    let dismiss_error_button = error.as_ref().map(|_| ButtonView {
        title: "Dismiss".into(),
        accessibility_label: "Dismiss error message".into(),
        variant: ButtonVariant::Secondary,
        style: ButtonStyle::Default,
        action: ButtonAction::DismissError,
        disabled: false,
    });

    ViewModel {
        state: build_view_state(model),
        is_refreshing: model.is_refreshing,
        error,
        dismiss_error_button,
    }
}
