//! Geofence monitor: turns a stream of location samples into workflow runs.
//!
//! Each active region is either `OUTSIDE` (initial) or `INSIDE`. A sample
//! whose membership differs from the recorded one produces exactly one
//! `enter`/`exit` transition; repeated samples on the same side produce
//! nothing. Detected transitions always update the membership, are
//! published on the [`TransitionBus`] and, unless the trigger's debounce
//! window suppresses them, launch the linked workflow without waiting for
//! it.
//!
//! [`GeofenceMonitor`] is the synchronous state machine. [`MonitorHandle`]
//! wraps it in an actor so samples and lifecycle commands are serialized
//! through a single queue.

mod handle;

pub use handle::{MonitorCommand, MonitorHandle};

use std::collections::HashMap;

use serde_json::{Map, Value};

use autoflow_domain::geofence::{
    GeofenceConfig, GeofenceEvent, GeofenceTransition, GeofenceTrigger, LocationSample,
};
use autoflow_domain::id::{GeofenceId, WorkflowId};
use autoflow_domain::time::{Timestamp, elapsed_millis};
use autoflow_domain::trigger::TriggerContext;

use crate::ports::WorkflowLauncher;
use crate::transition_bus::TransitionBus;

/// Coarse state of the monitor as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    /// No active geofence to watch.
    Idle,
    Running,
    /// The location source failed; re-registering a geofence or trigger
    /// resumes monitoring.
    Disabled,
}

/// Membership and debounce bookkeeping for every known geofence.
pub struct GeofenceMonitor<L> {
    launcher: L,
    bus: TransitionBus,
    geofences: HashMap<GeofenceId, GeofenceConfig>,
    triggers: HashMap<GeofenceId, GeofenceTrigger>,
    inside: HashMap<GeofenceId, bool>,
    last_fired: HashMap<(GeofenceId, GeofenceEvent), Timestamp>,
    failure: Option<String>,
}

impl<L: WorkflowLauncher> GeofenceMonitor<L> {
    #[must_use]
    pub fn new(launcher: L, bus: TransitionBus) -> Self {
        Self {
            launcher,
            bus,
            geofences: HashMap::new(),
            triggers: HashMap::new(),
            inside: HashMap::new(),
            last_fired: HashMap::new(),
            failure: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        if self.failure.is_some() {
            MonitorStatus::Disabled
        } else if self.geofences.values().any(|g| g.is_active) {
            MonitorStatus::Running
        } else {
            MonitorStatus::Idle
        }
    }

    /// Cause of the last location-source failure, while disabled.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Add or replace a geofence. Membership of a known region is kept
    /// unless it was deactivated.
    pub fn upsert_geofence(&mut self, config: GeofenceConfig) {
        if !config.is_active {
            self.inside.remove(&config.id);
        }
        tracing::debug!(geofence_id = %config.id, name = %config.name, active = config.is_active, "geofence registered");
        self.geofences.insert(config.id, config);
        self.resume();
    }

    /// Bind a transition of a geofence to a workflow, replacing any
    /// previous binding of that geofence.
    pub fn register_trigger(&mut self, trigger: GeofenceTrigger) {
        tracing::debug!(
            geofence_id = %trigger.geofence_id,
            event = %trigger.event,
            workflow_id = %trigger.workflow_id,
            debounce_ms = trigger.debounce_ms,
            "geofence trigger registered"
        );
        self.triggers.insert(trigger.geofence_id, trigger);
        self.resume();
    }

    /// Forget one geofence and its trigger; other regions are untouched.
    pub fn remove_geofence(&mut self, id: GeofenceId) -> Option<GeofenceConfig> {
        self.triggers.remove(&id);
        self.inside.remove(&id);
        self.last_fired.retain(|(geofence_id, _), _| *geofence_id != id);
        self.geofences.remove(&id)
    }

    /// Disable monitoring after a location-source failure.
    pub fn fail(&mut self, cause: impl Into<String>) {
        let cause = cause.into();
        tracing::warn!(%cause, "location source failed, geofence monitoring disabled");
        self.failure = Some(cause);
    }

    fn resume(&mut self) {
        if let Some(cause) = self.failure.take() {
            tracing::info!(%cause, "geofence monitoring re-enabled");
        }
    }

    /// Evaluate every active geofence against `sample`.
    ///
    /// Returns the detected transitions, each flagged with whether its
    /// workflow invocation was debounced. Samples are ignored while the
    /// monitor is disabled.
    pub fn process(&mut self, sample: &LocationSample) -> Vec<GeofenceTransition> {
        if self.failure.is_some() {
            return Vec::new();
        }

        let mut transitions = Vec::new();
        for geofence in self.geofences.values().filter(|g| g.is_active) {
            let distance = geofence.distance_from(&sample.coordinates);
            let now_inside = distance <= geofence.radius_meters;
            let was_inside = self.inside.insert(geofence.id, now_inside).unwrap_or(false);
            if now_inside == was_inside {
                continue;
            }

            let event = GeofenceEvent::from_membership(now_inside);
            if !geofence.transition_mode.accepts(event) {
                continue;
            }

            let mut transition = GeofenceTransition {
                geofence_id: geofence.id,
                geofence_name: geofence.name.clone(),
                event,
                position: sample.coordinates,
                distance_meters: distance,
                timestamp: sample.timestamp,
                debounced: false,
            };

            if let Some((workflow_id, debounce_ms, alias)) = self.binding(geofence, event) {
                let key = (geofence.id, event);
                let suppressed = self.last_fired.get(&key).is_some_and(|last| {
                    elapsed_millis(*last, sample.timestamp)
                        < i64::try_from(debounce_ms).unwrap_or(i64::MAX)
                });
                if suppressed {
                    tracing::debug!(geofence_id = %geofence.id, %event, debounce_ms, "transition debounced");
                    transition.debounced = true;
                } else {
                    tracing::info!(geofence_id = %geofence.id, %event, %workflow_id, "geofence transition, launching workflow");
                    self.last_fired.insert(key, sample.timestamp);
                    self.launcher
                        .launch(workflow_id, trigger_variables(&transition, alias));
                }
            }

            self.bus.publish(transition.clone());
            transitions.push(transition);
        }
        transitions
    }

    /// Workflow, debounce window and result alias bound to `event`.
    ///
    /// A registered trigger wins; otherwise the geofence's own linked
    /// workflow runs on every accepted transition without debouncing.
    fn binding(
        &self,
        geofence: &GeofenceConfig,
        event: GeofenceEvent,
    ) -> Option<(WorkflowId, u64, Option<String>)> {
        match self.triggers.get(&geofence.id) {
            Some(trigger) if trigger.event == event => Some((
                trigger.workflow_id,
                trigger.debounce_ms,
                trigger.result_variable_name.clone(),
            )),
            Some(_) => None,
            None => geofence.linked_workflow_id.map(|id| (id, 0, None)),
        }
    }
}

fn trigger_variables(transition: &GeofenceTransition, alias: Option<String>) -> Map<String, Value> {
    TriggerContext::geofence(transition)
        .alias(alias)
        .into_variables()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use autoflow_domain::geofence::TransitionMode;
    use autoflow_domain::trigger::{TRIGGER_TYPE, TriggerSource};
    use chrono::{DateTime, Duration, Utc};

    #[derive(Clone, Default)]
    struct RecordingLauncher {
        launched: Arc<Mutex<Vec<(WorkflowId, Map<String, Value>)>>>,
    }

    impl RecordingLauncher {
        fn count(&self) -> usize {
            self.launched.lock().unwrap().len()
        }
    }

    impl WorkflowLauncher for RecordingLauncher {
        fn launch(&self, workflow_id: WorkflowId, variables: Map<String, Value>) {
            self.launched.lock().unwrap().push((workflow_id, variables));
        }
    }

    const INSIDE: (f64, f64) = (41.0, 29.0);
    const OUTSIDE: (f64, f64) = (41.01, 29.0);

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn at(position: (f64, f64), millis: i64) -> LocationSample {
        LocationSample::new(position.0, position.1, t0() + Duration::milliseconds(millis))
    }

    fn home() -> GeofenceConfig {
        GeofenceConfig::builder()
            .name("Home")
            .center(41.0, 29.0)
            .radius_meters(100.0)
            .build()
            .unwrap()
    }

    fn monitor() -> (GeofenceMonitor<RecordingLauncher>, RecordingLauncher) {
        let launcher = RecordingLauncher::default();
        (
            GeofenceMonitor::new(launcher.clone(), TransitionBus::new(16)),
            launcher,
        )
    }

    fn events(transitions: &[GeofenceTransition]) -> Vec<GeofenceEvent> {
        transitions.iter().map(|t| t.event).collect()
    }

    #[test]
    fn should_emit_one_enter_and_one_exit_when_crossing_the_boundary_once() {
        let (mut monitor, _) = monitor();
        monitor.upsert_geofence(home());

        let mut detected = Vec::new();
        for (i, position) in [OUTSIDE, INSIDE, INSIDE, OUTSIDE].into_iter().enumerate() {
            detected.extend(monitor.process(&at(position, i64::try_from(i).unwrap() * 1_000)));
        }

        assert_eq!(
            events(&detected),
            vec![GeofenceEvent::Enter, GeofenceEvent::Exit]
        );
    }

    #[test]
    fn should_treat_boundary_as_inside() {
        let (mut monitor, _) = monitor();
        let config = home();
        let boundary = (41.0005, 29.0003);
        let sample = at(boundary, 0);
        monitor.upsert_geofence(GeofenceConfig {
            radius_meters: config.distance_from(&sample.coordinates),
            ..config
        });

        assert_eq!(events(&monitor.process(&sample)), vec![GeofenceEvent::Enter]);
    }

    #[test]
    fn should_launch_bound_workflow_with_trigger_variables() {
        let (mut monitor, launcher) = monitor();
        let config = home();
        let workflow_id = WorkflowId::new();
        monitor.upsert_geofence(config.clone());
        monitor.register_trigger(
            GeofenceTrigger::new(config.id, GeofenceEvent::Enter, workflow_id)
                .with_result_variable("arrival"),
        );

        monitor.process(&at(INSIDE, 0));

        let launched = launcher.launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        let (id, vars) = &launched[0];
        assert_eq!(*id, workflow_id);
        assert_eq!(vars[TRIGGER_TYPE], TriggerSource::Geofence.tag());
        assert_eq!(vars["geofence"]["name"], "Home");
        assert_eq!(vars["geofence"]["event"], "enter");
        assert_eq!(vars["arrival"], vars["geofence"]);
    }

    #[test]
    fn should_not_launch_when_event_differs_from_trigger() {
        let (mut monitor, launcher) = monitor();
        let config = home();
        monitor.upsert_geofence(config.clone());
        monitor.register_trigger(GeofenceTrigger::new(
            config.id,
            GeofenceEvent::Exit,
            WorkflowId::new(),
        ));

        monitor.process(&at(INSIDE, 0));
        assert_eq!(launcher.count(), 0);

        monitor.process(&at(OUTSIDE, 1_000));
        assert_eq!(launcher.count(), 1);
    }

    #[test]
    fn should_debounce_repeated_enters_within_window() {
        let (mut monitor, launcher) = monitor();
        let config = home();
        monitor.upsert_geofence(config.clone());
        monitor.register_trigger(
            GeofenceTrigger::new(config.id, GeofenceEvent::Enter, WorkflowId::new())
                .with_debounce_ms(5_000),
        );

        monitor.process(&at(INSIDE, 0));
        monitor.process(&at(OUTSIDE, 1_000));
        let second = monitor.process(&at(INSIDE, 2_000));
        assert_eq!(launcher.count(), 1);
        assert!(second[0].debounced);

        monitor.process(&at(OUTSIDE, 5_000));
        let third = monitor.process(&at(INSIDE, 8_000));
        assert_eq!(launcher.count(), 2);
        assert!(!third[0].debounced);
    }

    #[test]
    fn should_still_update_membership_when_debounced() {
        let (mut monitor, launcher) = monitor();
        let config = home();
        monitor.upsert_geofence(config.clone());
        monitor.register_trigger(
            GeofenceTrigger::new(config.id, GeofenceEvent::Enter, WorkflowId::new())
                .with_debounce_ms(60_000),
        );

        monitor.process(&at(INSIDE, 0));
        monitor.process(&at(OUTSIDE, 1_000));
        monitor.process(&at(INSIDE, 2_000));
        // still inside: nothing to replay
        assert!(monitor.process(&at(INSIDE, 70_000)).is_empty());
        assert_eq!(launcher.count(), 1);
    }

    #[test]
    fn should_launch_linked_workflow_without_trigger_record() {
        let (mut monitor, launcher) = monitor();
        let workflow_id = WorkflowId::new();
        monitor.upsert_geofence(GeofenceConfig {
            linked_workflow_id: Some(workflow_id),
            ..home()
        });

        monitor.process(&at(INSIDE, 0));
        monitor.process(&at(OUTSIDE, 1_000));

        assert_eq!(launcher.count(), 2);
    }

    #[test]
    fn should_ignore_transitions_rejected_by_transition_mode() {
        let (mut monitor, _) = monitor();
        monitor.upsert_geofence(GeofenceConfig {
            transition_mode: TransitionMode::Exit,
            ..home()
        });

        assert!(monitor.process(&at(INSIDE, 0)).is_empty());
        assert_eq!(
            events(&monitor.process(&at(OUTSIDE, 1_000))),
            vec![GeofenceEvent::Exit]
        );
    }

    #[test]
    fn should_skip_inactive_geofences() {
        let (mut monitor, _) = monitor();
        monitor.upsert_geofence(GeofenceConfig {
            is_active: false,
            ..home()
        });

        assert!(monitor.process(&at(INSIDE, 0)).is_empty());
        assert_eq!(monitor.status(), MonitorStatus::Idle);
    }

    #[test]
    fn should_keep_other_geofences_when_one_is_removed() {
        let (mut monitor, _) = monitor();
        let home = home();
        let office = GeofenceConfig::builder()
            .name("Office")
            .center(41.0, 29.0)
            .radius_meters(500.0)
            .build()
            .unwrap();
        monitor.upsert_geofence(home.clone());
        monitor.upsert_geofence(office.clone());

        assert!(monitor.remove_geofence(home.id).is_some());
        let detected = monitor.process(&at(INSIDE, 0));

        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].geofence_id, office.id);
        assert_eq!(monitor.status(), MonitorStatus::Running);

        monitor.remove_geofence(office.id);
        assert_eq!(monitor.status(), MonitorStatus::Idle);
    }

    #[test]
    fn should_ignore_samples_while_disabled_until_reregistered() {
        let (mut monitor, _) = monitor();
        let config = home();
        monitor.upsert_geofence(config.clone());

        monitor.fail("location permission revoked");
        assert_eq!(monitor.status(), MonitorStatus::Disabled);
        assert_eq!(monitor.failure(), Some("location permission revoked"));
        assert!(monitor.process(&at(INSIDE, 0)).is_empty());

        monitor.upsert_geofence(config);
        assert_eq!(monitor.status(), MonitorStatus::Running);
        assert_eq!(events(&monitor.process(&at(INSIDE, 1_000))), vec![GeofenceEvent::Enter]);
    }

    #[tokio::test]
    async fn should_publish_every_transition_on_the_bus() {
        let launcher = RecordingLauncher::default();
        let bus = TransitionBus::new(16);
        let mut rx = bus.subscribe();
        let mut monitor = GeofenceMonitor::new(launcher, bus);
        let config = home();
        monitor.upsert_geofence(config.clone());
        monitor.register_trigger(
            GeofenceTrigger::new(config.id, GeofenceEvent::Enter, WorkflowId::new())
                .with_debounce_ms(5_000),
        );

        monitor.process(&at(INSIDE, 0));
        monitor.process(&at(OUTSIDE, 1_000));
        monitor.process(&at(INSIDE, 2_000));

        let published: Vec<(GeofenceEvent, bool)> = (0..3)
            .map(|_| rx.try_recv().unwrap())
            .map(|t| (t.event, t.debounced))
            .collect();
        assert_eq!(
            published,
            vec![
                (GeofenceEvent::Enter, false),
                (GeofenceEvent::Exit, false),
                (GeofenceEvent::Enter, true),
            ]
        );
    }
}
