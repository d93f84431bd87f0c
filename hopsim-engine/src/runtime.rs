use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use hopsim_wire::Alert;

use crate::{ControlError, Route};

/// The status a packet is stamped with at injection time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Empty when the route has no status steps.
    pub label: String,
    pub alert: Option<Alert>,
    pub index: usize,
    pub total: usize,
}

/// Mutable per-route state that lives as long as the route is active.
///
/// The route itself is immutable and shared with every traversal. Only the status step
/// changes, and it is read once per injection so a packet keeps the status it was born with.
#[derive(Debug)]
pub struct RouteRuntime {
    route: Arc<Route>,
    step: AtomicUsize,
}

impl RouteRuntime {
    pub fn new(route: Route) -> Self {
        Self { route: Arc::new(route), step: AtomicUsize::new(0) }
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Returns the current status step.
    pub fn snapshot(&self) -> StatusSnapshot {
        let steps = self.route.status_steps();
        if steps.is_empty() {
            return StatusSnapshot::default();
        }

        let index = self.step.load(Ordering::Acquire) % steps.len();
        let step = &steps[index];

        StatusSnapshot {
            label: step.label().to_owned(),
            alert: step.alert().cloned(),
            index,
            total: steps.len(),
        }
    }

    /// Moves the route to the first step whose label equals `label` (trimmed, case-sensitive).
    /// On failure the current step is left unchanged.
    pub fn set_status(&self, label: &str) -> Result<StatusSnapshot, ControlError> {
        let steps = self.route.status_steps();
        if steps.is_empty() {
            return Err(ControlError::NoStatusSteps(self.route.id().clone()));
        }

        let label = label.trim();
        let index = steps.iter().position(|s| s.label() == label).ok_or_else(|| {
            ControlError::UnknownStatus {
                route_id: self.route.id().clone(),
                status: label.to_owned(),
            }
        })?;

        self.step.store(index, Ordering::Release);

        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{Hop, Protocol, StatusStep};

    use super::*;

    fn runtime(steps: &[&str]) -> RouteRuntime {
        let hop = Hop::new("a", "b", Protocol::ZigBee, Duration::from_millis(100));
        RouteRuntime::new(
            Route::new("r", vec![hop])
                .with_status_steps(steps.iter().map(|s| StatusStep::new(*s)).collect()),
        )
    }

    #[test]
    fn no_steps() {
        let runtime = runtime(&[]);

        assert_eq!(runtime.snapshot(), StatusSnapshot::default());
        assert_eq!(runtime.set_status("ok"), Err(ControlError::NoStatusSteps("r".into())));
    }

    #[test]
    fn single_step_is_stable() {
        let runtime = runtime(&["only"]);

        for _ in 0..3 {
            let snapshot = runtime.snapshot();
            assert_eq!(snapshot.label, "only");
            assert_eq!((snapshot.index, snapshot.total), (0, 1));
        }
    }

    #[test]
    fn set_status_by_label() {
        let runtime = runtime(&["status", "alarm"]);
        assert_eq!(runtime.snapshot().label, "status");

        let snapshot = runtime.set_status("  alarm ").unwrap();
        assert_eq!((snapshot.label.as_str(), snapshot.index, snapshot.total), ("alarm", 1, 2));

        // Reads without a status change are stable.
        assert_eq!(runtime.snapshot(), snapshot);
        assert_eq!(runtime.snapshot(), snapshot);
    }

    #[test]
    fn unknown_label_keeps_current_step() {
        let runtime = runtime(&["status", "alarm"]);
        runtime.set_status("alarm").unwrap();

        assert_eq!(
            runtime.set_status("Alarm"),
            Err(ControlError::UnknownStatus { route_id: "r".into(), status: "Alarm".to_owned() })
        );
        assert_eq!(runtime.snapshot().label, "alarm");
    }
}
