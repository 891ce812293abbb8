use tracing::{debug, error, info, warn};

use crate::capabilities::{Capabilities, StorageError};
use crate::error::AppError;
use crate::event::Event;
use crate::model::{
    Emergency, EmergencyId, LoadId, LoadTrigger, Model, Patient, PendingLoad, Resolution,
};
use crate::view::{build_view_model, ViewModel};

#[derive(Default)]
pub struct App;

impl App {
    /// Issues both reads of a load at once; they are joined in
    /// `complete_load_if_ready`.
    fn start_load(model: &mut Model, caps: &Capabilities, trigger: LoadTrigger) {
        let load_id = model.begin_load(trigger);
        debug!(%load_id, ?trigger, "loading emergencies and patients");

        let storage = caps.storage();
        storage.get_emergencies(move |result| Event::EmergenciesFetched { load_id, result });
        storage.get_patients(move |result| Event::PatientsFetched { load_id, result });
    }

    fn record_emergencies(
        model: &mut Model,
        load_id: LoadId,
        result: Result<Vec<Emergency>, StorageError>,
    ) {
        match result {
            Ok(list) => {
                let Some(pending) = model.pending_loads.get_mut(&load_id) else {
                    debug!(%load_id, "emergencies arrived for a finished load");
                    return;
                };
                pending.emergencies = Some(list);
                Self::complete_load_if_ready(model, load_id);
            }
            Err(e) => Self::fail_load(model, load_id, e),
        }
    }

    fn record_patients(
        model: &mut Model,
        load_id: LoadId,
        result: Result<Vec<Patient>, StorageError>,
    ) {
        match result {
            Ok(list) => {
                let Some(pending) = model.pending_loads.get_mut(&load_id) else {
                    debug!(%load_id, "patients arrived for a finished load");
                    return;
                };
                pending.patients = Some(list);
                Self::complete_load_if_ready(model, load_id);
            }
            Err(e) => Self::fail_load(model, load_id, e),
        }
    }

    fn complete_load_if_ready(model: &mut Model, load_id: LoadId) {
        if !model
            .pending_loads
            .get(&load_id)
            .is_some_and(PendingLoad::is_complete)
        {
            return;
        }

        let Some(PendingLoad {
            trigger,
            emergencies: Some(emergencies),
            patients: Some(patients),
        }) = model.pending_loads.remove(&load_id)
        else {
            return;
        };

        info!(
            %load_id,
            emergencies = emergencies.len(),
            patients = patients.len(),
            "alerts loaded"
        );
        model.replace_data(emergencies, patients);
        model.clear_error();
        model.finish_load(trigger);
    }

    /// The first failing read fails the whole load; prior lists stay.
    fn fail_load(model: &mut Model, load_id: LoadId, e: StorageError) {
        let Some(pending) = model.pending_loads.remove(&load_id) else {
            debug!(%load_id, error = %e, "failure for an already finished load ignored");
            return;
        };

        warn!(%load_id, error = %e, "failed to load alerts");
        model.finish_load(pending.trigger);
        model.set_error(AppError::from(e).with_context("load_id", load_id.to_string()));
    }

    /// Persists the full list with this and every other pending resolution
    /// applied. Local state changes only once a write is confirmed.
    fn resolve_emergency(
        model: &mut Model,
        caps: &Capabilities,
        id: EmergencyId,
        note: Option<&str>,
    ) {
        if !model.emergencies.iter().any(|e| e.id == id) {
            warn!(emergency_id = %id, "resolve requested for an emergency not in the list");
        }

        let response = model.config.response_for(note);
        model.queue_resolution(id.clone(), response);
        let resolutions = model.pending_resolution_set();
        let updated = model.emergencies_with_pending_resolutions();

        let id_for_event = id.clone();
        let carried = resolutions.clone();
        let saved = caps.storage().save_emergencies(&updated, move |result| {
            Event::ResolvePersisted {
                id: id_for_event,
                resolutions: carried,
                result,
            }
        });

        match saved {
            Ok(()) => {
                model.write_requested(&resolutions);
                debug!(
                    emergency_id = %id,
                    count = resolutions.len(),
                    "resolution write requested"
                );
            }
            Err(e) => {
                error!(emergency_id = %id, error = %e, "failed to encode emergencies");
                model.drop_unsent_resolutions();
                model.set_error(AppError::from(e).with_context("emergency_id", id.to_string()));
            }
        }
    }

    /// A confirmed write applies everything it carried, since that is what
    /// storage now holds. A failed write only releases resolutions that no
    /// other in-flight write still carries.
    fn handle_resolve_persisted(
        model: &mut Model,
        id: &EmergencyId,
        resolutions: &[Resolution],
        result: Result<(), StorageError>,
    ) {
        let released = model.write_settled(resolutions);

        match result {
            Ok(()) => {
                for resolution in resolutions {
                    if !model.apply_resolution(&resolution.id, &resolution.response) {
                        warn!(
                            emergency_id = %resolution.id,
                            "resolved emergency no longer in the list"
                        );
                    }
                }
                info!(emergency_id = %id, count = resolutions.len(), "emergencies resolved");
            }
            Err(e) => {
                error!(
                    emergency_id = %id,
                    released = released.len(),
                    error = %e,
                    "failed to persist resolution"
                );
                model.set_error(AppError::from(e).with_context("emergency_id", id.to_string()));
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.update_timestamp();
        debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "update"
        );

        match event {
            Event::Noop => {}

            Event::AppStarted => {
                model.is_loading = true;
                Self::start_load(model, caps, LoadTrigger::Mount);
                caps.render.render();
            }

            Event::RefreshRequested => {
                model.is_refreshing = true;
                Self::start_load(model, caps, LoadTrigger::Refresh);
                caps.render.render();
            }

            Event::ClockTicked => caps.render.render(),

            Event::ConfigUpdated(config) => {
                match config.validate() {
                    Ok(()) => {
                        info!(?config, "alerts config updated");
                        model.config = config;
                    }
                    Err(e) => {
                        warn!(error = %e, "rejected alerts config");
                        model.set_error(e);
                    }
                }
                caps.render.render();
            }

            Event::ResolveEmergency { id, note } => {
                Self::resolve_emergency(model, caps, id, note.as_deref());
                caps.render.render();
            }

            Event::ResolvePersisted {
                id,
                resolutions,
                result,
            } => {
                Self::handle_resolve_persisted(model, &id, &resolutions, result);
                caps.render.render();
            }

            Event::ErrorDismissed => {
                model.clear_error();
                caps.render.render();
            }

            Event::EmergenciesFetched { load_id, result } => {
                Self::record_emergencies(model, load_id, result);
                caps.render.render();
            }

            Event::PatientsFetched { load_id, result } => {
                Self::record_patients(model, load_id, result);
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        build_view_model(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmergencyType, PatientId, UnixTimeMs};
    use crate::Effect;
    use crux_core::testing::AppTester;

    fn emergency(id: &str, ts: u64) -> Emergency {
        Emergency::new(
            EmergencyId::new(id),
            PatientId::new("p-1"),
            EmergencyType::Inactivity,
            UnixTimeMs(ts),
        )
    }

    fn io_error(key: &str) -> StorageError {
        StorageError::Io {
            key: key.into(),
            message: "unavailable".into(),
        }
    }

    fn kv_request_count(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::KeyValue(_)))
            .count()
    }

    #[test]
    fn test_app_started_issues_two_reads() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();

        let update = app.update(Event::AppStarted, &mut model);

        assert!(model.is_loading);
        assert_eq!(kv_request_count(&update.effects), 2);
        assert_eq!(model.pending_loads.len(), 1);
        assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
    }

    #[test]
    fn test_load_applies_only_after_both_reads() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        app.update(Event::AppStarted, &mut model);

        app.update(
            Event::EmergenciesFetched {
                load_id: LoadId(0),
                result: Ok(vec![emergency("a", 1), emergency("b", 2)]),
            },
            &mut model,
        );
        assert!(model.is_loading);
        assert!(model.emergencies.is_empty());

        app.update(
            Event::PatientsFetched {
                load_id: LoadId(0),
                result: Ok(vec![]),
            },
            &mut model,
        );
        assert!(!model.is_loading);
        assert_eq!(model.emergencies[0].id.as_str(), "b");
        assert!(model.pending_loads.is_empty());
    }

    #[test]
    fn test_failed_read_fails_whole_load() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        model.replace_data(vec![emergency("kept", 1)], vec![]);
        app.update(Event::AppStarted, &mut model);

        app.update(
            Event::PatientsFetched {
                load_id: LoadId(0),
                result: Err(io_error("patients")),
            },
            &mut model,
        );
        assert!(!model.is_loading);
        assert!(model.active_error.is_some());

        // the sibling read lands after the load already failed
        app.update(
            Event::EmergenciesFetched {
                load_id: LoadId(0),
                result: Ok(vec![emergency("new", 5)]),
            },
            &mut model,
        );
        assert_eq!(model.emergencies.len(), 1);
        assert_eq!(model.emergencies[0].id.as_str(), "kept");
    }

    #[test]
    fn test_refresh_does_not_reenter_loading() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };

        app.update(Event::RefreshRequested, &mut model);
        assert!(model.is_refreshing);
        assert!(!model.is_loading);

        app.update(
            Event::EmergenciesFetched {
                load_id: LoadId(0),
                result: Ok(vec![]),
            },
            &mut model,
        );
        app.update(
            Event::PatientsFetched {
                load_id: LoadId(0),
                result: Ok(vec![]),
            },
            &mut model,
        );
        assert!(!model.is_refreshing);
        assert!(!model.is_loading);
    }

    #[test]
    fn test_resolve_writes_once_and_waits_for_confirmation() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };
        model.replace_data(vec![emergency("a", 1)], vec![]);

        let update = app.update(
            Event::ResolveEmergency {
                id: EmergencyId::new("a"),
                note: None,
            },
            &mut model,
        );
        assert_eq!(kv_request_count(&update.effects), 1);
        assert!(!model.emergencies[0].is_resolved);
        assert!(model.is_resolving(&EmergencyId::new("a")));

        app.update(
            Event::ResolvePersisted {
                id: EmergencyId::new("a"),
                resolutions: model.pending_resolution_set(),
                result: Ok(()),
            },
            &mut model,
        );
        assert!(model.emergencies[0].is_resolved);
        assert_eq!(
            model.emergencies[0].response.as_deref(),
            Some(crate::DEFAULT_RESOLUTION_RESPONSE)
        );
        assert!(model.pending_resolutions.is_empty());
    }

    #[test]
    fn test_failed_resolve_leaves_local_state_and_reports() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };
        model.replace_data(vec![emergency("a", 1)], vec![]);

        app.update(
            Event::ResolveEmergency {
                id: EmergencyId::new("a"),
                note: Some("Checked in by phone".into()),
            },
            &mut model,
        );
        app.update(
            Event::ResolvePersisted {
                id: EmergencyId::new("a"),
                resolutions: model.pending_resolution_set(),
                result: Err(io_error("emergencies")),
            },
            &mut model,
        );

        assert!(!model.emergencies[0].is_resolved);
        assert!(model.pending_resolutions.is_empty());
        let err = model.active_error.as_ref().expect("error surfaced");
        assert_eq!(err.context.get("emergency_id").map(String::as_str), Some("a"));

        app.update(Event::ErrorDismissed, &mut model);
        assert!(model.active_error.is_none());
    }

    fn press(app: &AppTester<App, Effect>, model: &mut Model, id: &str) -> Event {
        app.update(
            Event::ResolveEmergency {
                id: EmergencyId::new(id),
                note: None,
            },
            model,
        );
        Event::ResolvePersisted {
            id: EmergencyId::new(id),
            resolutions: model.pending_resolution_set(),
            result: Ok(()),
        }
    }

    fn failed(event: Event) -> Event {
        match event {
            Event::ResolvePersisted {
                id, resolutions, ..
            } => Event::ResolvePersisted {
                id,
                resolutions,
                result: Err(io_error("emergencies")),
            },
            other => other,
        }
    }

    #[test]
    fn test_later_write_confirms_resolution_of_failed_earlier_write() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };
        model.replace_data(vec![emergency("a", 2), emergency("b", 1)], vec![]);

        let first = press(&app, &mut model, "a");
        let second = press(&app, &mut model, "b");

        app.update(failed(first), &mut model);
        // the second write still carries "a"
        assert!(model.is_resolving(&EmergencyId::new("a")));
        assert!(!model.emergencies[0].is_resolved);

        app.update(second, &mut model);
        assert!(model.emergencies.iter().all(|e| e.is_resolved));
        assert!(model.pending_resolutions.is_empty());
    }

    #[test]
    fn test_repeat_press_after_failed_write_resolves_locally() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };
        model.replace_data(vec![emergency("a", 1)], vec![]);

        let first = press(&app, &mut model, "a");
        let second = press(&app, &mut model, "a");
        assert_eq!(model.pending_resolutions[&EmergencyId::new("a")].writes_in_flight, 2);

        app.update(failed(first), &mut model);
        assert!(model.active_error.is_some());
        assert!(!model.emergencies[0].is_resolved);

        app.update(second, &mut model);
        assert!(model.emergencies[0].is_resolved);
        assert!(model.pending_resolutions.is_empty());
    }

    #[test]
    fn test_failed_write_after_success_keeps_resolution() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };
        model.replace_data(vec![emergency("a", 2), emergency("b", 1)], vec![]);

        let first = press(&app, &mut model, "a");
        let second = press(&app, &mut model, "b");

        app.update(second, &mut model);
        app.update(failed(first), &mut model);

        assert!(model.emergencies.iter().all(|e| e.is_resolved));
        assert!(model.pending_resolutions.is_empty());
    }

    #[test]
    fn test_oversized_list_is_never_written() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model {
            is_loading: false,
            ..Model::default()
        };
        let mut big = emergency("a", 1);
        big.extra.insert(
            "notes".into(),
            serde_json::Value::String("x".repeat(crate::capabilities::MAX_VALUE_SIZE)),
        );
        model.replace_data(vec![big], vec![]);

        let update = app.update(
            Event::ResolveEmergency {
                id: EmergencyId::new("a"),
                note: None,
            },
            &mut model,
        );

        assert_eq!(kv_request_count(&update.effects), 0);
        assert!(model.pending_resolutions.is_empty());
        assert!(!model.emergencies[0].is_resolved);
        let err = model.active_error.as_ref().expect("error surfaced");
        assert_eq!(err.kind, crate::error::ErrorKind::Serialization);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let app = AppTester::<App, Effect>::default();
        let mut model = Model::default();
        let mut config = model.config.clone();
        config.resolved_history_limit = 0;

        app.update(Event::ConfigUpdated(config), &mut model);

        assert_eq!(model.config.resolved_history_limit, crate::RESOLVED_HISTORY_LIMIT);
        assert!(model.active_error.is_some());
    }
}
