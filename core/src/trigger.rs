//! Launch handling: glue between the host's launch events and the engine.
//!
//! Every launch (cold start, widget tap, alarm fire) first reconciles,
//! then reacts to the operation. When one of our alarms fired, the
//! display is woken and the vibration pattern played. An alarm launch
//! with no alarm id attached is reconciled but does not ring.

use crate::{
    clock::Clock,
    engine::{ReconcileReport, ReminderEngine},
    error::ReconcileError,
    event::ReminderEvent,
    host::{AlarmSink, FireActuator, KeyValueStore, VibrationPattern},
    rng::RandomSource,
    types::{
        AlarmId, LaunchContext, APP_CONTROL_DATA_ALARM_ID, APP_CONTROL_OPERATION_ALARM_ONTIME,
        APP_CONTROL_OPERATION_DEFAULT, APP_CONTROL_OPERATION_MAIN,
    },
};

/// How long the display stays on after an alarm wakes it.
pub const WAKE_HOLD_MS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOperation {
    /// One of our reminders fired. The id is missing if the host dropped it.
    AlarmOnTime { alarm_id: Option<AlarmId> },
    Main,
    WidgetLaunch,
    Other(String),
}

impl LaunchOperation {
    pub fn classify(launch: &LaunchContext) -> Self {
        match launch.operation.as_str() {
            APP_CONTROL_OPERATION_ALARM_ONTIME => Self::AlarmOnTime {
                alarm_id: launch
                    .extra(APP_CONTROL_DATA_ALARM_ID)
                    .and_then(|id| id.trim().parse().ok()),
            },
            APP_CONTROL_OPERATION_MAIN => Self::Main,
            APP_CONTROL_OPERATION_DEFAULT => Self::WidgetLaunch,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Result of handling one launch event.
#[derive(Debug)]
pub struct TriggerOutcome {
    pub operation: LaunchOperation,
    pub reconcile: Result<ReconcileReport, ReconcileError>,
    /// Set when an alarm fire was handled.
    pub fired:     Option<ReminderEvent>,
}

/// Launch handler. Holds the context new alarms are registered with,
/// which is not the context of the launch being handled.
pub struct TriggerAdapter<A: FireActuator> {
    alarm_launch: LaunchContext,
    actuator:     A,
    vibration:    VibrationPattern,
}

impl<A: FireActuator> TriggerAdapter<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            alarm_launch: LaunchContext::alarm_launch(),
            actuator,
            vibration: VibrationPattern::default(),
        }
    }

    pub fn with_vibration(mut self, vibration: VibrationPattern) -> Self {
        self.vibration = vibration;
        self
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Handle one launch event delivered by the host.
    pub fn on_app_control<S, K, C, R>(
        &mut self,
        engine: &mut ReminderEngine<S, K, C, R>,
        launch: &LaunchContext,
    ) -> TriggerOutcome
    where
        S: AlarmSink,
        K: KeyValueStore,
        C: Clock,
        R: RandomSource,
    {
        log::info!("App control: operation = {}", launch.operation);

        let reconcile = engine.update_alarms(&self.alarm_launch);
        if let Err(e) = &reconcile {
            log::warn!("Reconciliation incomplete: {e}");
        }

        let operation = LaunchOperation::classify(launch);
        let fired = match &operation {
            LaunchOperation::AlarmOnTime { .. } if launch.extra(APP_CONTROL_DATA_ALARM_ID).is_none() => {
                log::error!("Alarm launch carries no alarm id; not ringing");
                None
            }
            LaunchOperation::AlarmOnTime { alarm_id } => {
                if alarm_id.is_none() {
                    log::warn!("Alarm launch with an unreadable alarm id");
                }
                self.ring();
                Some(ReminderEvent::AlarmFired {
                    alarm_id: *alarm_id,
                    at:       engine.clock().now().naive_local(),
                })
            }
            _ => None,
        };

        TriggerOutcome { operation, reconcile, fired }
    }

    fn ring(&mut self) {
        if let Err(e) = self.actuator.wake_display(WAKE_HOLD_MS) {
            log::error!("Failed to turn display on: {e}");
        }
        if let Err(e) = self.actuator.vibrate(&self.vibration) {
            log::error!("Error starting vibration: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_operations() {
        let fired = LaunchContext::alarm_launch().with_extra(APP_CONTROL_DATA_ALARM_ID, "42");
        assert_eq!(
            LaunchOperation::classify(&fired),
            LaunchOperation::AlarmOnTime { alarm_id: Some(42) }
        );
        assert_eq!(
            LaunchOperation::classify(&LaunchContext::alarm_launch()),
            LaunchOperation::AlarmOnTime { alarm_id: None }
        );
        assert_eq!(
            LaunchOperation::classify(&LaunchContext::new(APP_CONTROL_OPERATION_MAIN)),
            LaunchOperation::Main
        );
        assert_eq!(
            LaunchOperation::classify(&LaunchContext::new(APP_CONTROL_OPERATION_DEFAULT)),
            LaunchOperation::WidgetLaunch
        );
        assert_eq!(
            LaunchOperation::classify(&LaunchContext::new("custom")),
            LaunchOperation::Other("custom".into())
        );
    }
}
