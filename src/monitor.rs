use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

use crate::notifier::Notifier;
use crate::printer::PrinterClient;

/// Remembers the last job state observed for one printer and reports changes.
///
/// The remembered state is overwritten on every observation that differs from
/// it, whether or not the caller manages to deliver a notification for the
/// change.
#[derive(Debug)]
pub struct StateTracker {
    last_state: String,
}

/// A job state transition detected between two successful polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub from: String,
    pub to: String,
}

impl StateTracker {
    /// Create a tracker seeded with the initially observed state. An empty
    /// string stands for "never successfully fetched".
    pub fn new(initial_state: String) -> Self {
        Self {
            last_state: initial_state,
        }
    }

    /// Record a freshly fetched state, returning the transition when it
    /// differs from the previous observation.
    pub fn observe(&mut self, state: &str) -> Option<StateChange> {
        if state == self.last_state {
            return None;
        }
        let from = std::mem::replace(&mut self.last_state, state.to_string());
        Some(StateChange {
            from,
            to: state.to_string(),
        })
    }

    pub fn last_state(&self) -> &str {
        &self.last_state
    }
}

/// Background polling loop for one printer.
///
/// Fetches the job state every `poll_interval` and sends a chat notification
/// exactly once per observed transition. A failed fetch is logged and the tick
/// skipped: the remembered state is neither read nor updated, so a transition
/// that happens entirely inside a failure window and reverts before the next
/// successful read goes unreported.
///
/// The loop runs until `shutdown_rx` observes a change.
pub async fn run_monitor(
    printer: String,
    client: Arc<PrinterClient>,
    notifier: Arc<Notifier>,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("{}: starting job state monitoring", printer);

    let initial_state = match client.get_job_status(&printer).await {
        Ok(status) => status.state,
        Err(e) => {
            warn!("{}: initial state check failed: {:#}", printer, e);
            String::new()
        }
    };
    info!("{}: initial job state: {:?}", printer, initial_state);

    if let Err(e) = notifier
        .send_message(&format!(
            "Printer monitoring started for {}. Current state: {}",
            printer, initial_state
        ))
        .await
    {
        warn!("{}: failed to send initial notification: {:#}", printer, e);
    }

    let mut tracker = StateTracker::new(initial_state);

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial fetch above already
    // covered it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = match client.get_job_status(&printer).await {
                    Ok(status) => status,
                    Err(e) => {
                        warn!("{}: job state check failed: {:#}", printer, e);
                        continue;
                    }
                };

                if let Some(change) = tracker.observe(&status.state) {
                    info!("{}: job state changed: {} -> {}", printer, change.from, change.to);

                    let message = format!(
                        "🖨️ {} state changed: {} -> {}",
                        printer, change.from, change.to
                    );
                    if let Err(e) = notifier.send_message(&message).await {
                        error!(
                            "{}: failed to send state change notification: {:#}",
                            printer, e
                        );
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                info!("{}: stopping job state monitoring", printer);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_state_reports_nothing() {
        let mut tracker = StateTracker::new("Printing".to_string());
        assert_eq!(tracker.observe("Printing"), None);
        assert_eq!(tracker.observe("Printing"), None);
        assert_eq!(tracker.last_state(), "Printing");
    }

    #[test]
    fn transition_is_reported_exactly_once() {
        let mut tracker = StateTracker::new("Printing".to_string());
        assert_eq!(tracker.observe("Printing"), None);

        let change = tracker.observe("Operational").expect("change expected");
        assert_eq!(change.from, "Printing");
        assert_eq!(change.to, "Operational");

        // Subsequent identical reads stay quiet.
        assert_eq!(tracker.observe("Operational"), None);
    }

    #[test]
    fn state_is_updated_even_when_caller_fails_to_notify() {
        // The tracker has no notion of delivery; observing the change already
        // commits the new state.
        let mut tracker = StateTracker::new("Printing".to_string());
        let _ignored_change = tracker.observe("Paused");
        assert_eq!(tracker.last_state(), "Paused");
        assert_eq!(tracker.observe("Paused"), None);
    }

    #[test]
    fn empty_seed_reports_first_real_state() {
        let mut tracker = StateTracker::new(String::new());
        let change = tracker.observe("Operational").expect("change expected");
        assert_eq!(change.from, "");
        assert_eq!(change.to, "Operational");
    }
}
