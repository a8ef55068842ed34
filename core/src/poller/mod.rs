//! Instance status polling
//!
//! Drives an instance toward a target status by observing the backend,
//! never by re-issuing commands. One bounded session per instance id;
//! sessions for different instances run independently.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::errors::DeckError;
use crate::gateway::DeploymentGateway;
use crate::models::deployment::{DeploymentRecord, InstanceStatus};

/// Status poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum polled attempts per session
    pub max_attempts: u32,

    /// Poll interval after a start command
    pub start_poll_interval: Duration,

    /// Poll interval after a stop command (instances stop slowly)
    pub stop_poll_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            start_poll_interval: Duration::from_millis(2000),
            stop_poll_interval: Duration::from_millis(10000),
        }
    }
}

/// Terminal outcome of a poll session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The instance reached the target status
    Reached,

    /// The attempt cap was exceeded before the target was seen
    TimedOut,

    /// The backend reported the error sentinel status
    Errored,

    /// The instance disappeared from the result set. Terminal but not an
    /// error; the instance simply no longer exists.
    Gone,

    /// A fetch failed. Fetch failures are surfaced, never retried.
    Failed(String),
}

/// Terminal notification for one poll session
#[derive(Debug, Clone)]
pub struct PollEvent {
    pub instance_id: String,

    /// Attempt counter at termination. Incremented before the bound check,
    /// so a timed-out session reports `max_attempts + 1`.
    pub attempts: u32,

    pub outcome: PollOutcome,
}

struct Session {
    seq: u64,
    cancel: watch::Sender<bool>,
}

/// Mutable state shared between sessions and the dashboard-facing accessors.
/// Only the poller mutates it.
#[derive(Default)]
struct PollerState {
    sessions: HashMap<String, Session>,
    loading: HashSet<String>,
}

/// Status poller
pub struct StatusPoller<G> {
    gateway: Arc<G>,
    options: Options,
    state: Arc<Mutex<PollerState>>,
    snapshots: Arc<watch::Sender<Vec<DeploymentRecord>>>,
    events: mpsc::UnboundedSender<PollEvent>,
    next_seq: AtomicU64,
}

impl<G> StatusPoller<G>
where
    G: DeploymentGateway + 'static,
{
    /// Create a new poller with default options.
    ///
    /// Returns the poller and the receiver of terminal poll events.
    pub fn new(gateway: Arc<G>) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        Self::with_options(gateway, Options::default())
    }

    /// Create a new poller with explicit options
    pub fn with_options(
        gateway: Arc<G>,
        options: Options,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, _) = watch::channel(Vec::new());

        let poller = Self {
            gateway,
            options,
            state: Arc::new(Mutex::new(PollerState::default())),
            snapshots: Arc::new(snapshots_tx),
            events: events_tx,
            next_seq: AtomicU64::new(1),
        };
        (poller, events_rx)
    }

    /// Subscribe to full-table snapshots published on every successful fetch
    pub fn subscribe(&self) -> watch::Receiver<Vec<DeploymentRecord>> {
        self.snapshots.subscribe()
    }

    /// True while any session is live
    pub fn is_polling(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !state.sessions.is_empty()
    }

    /// True while an instance has a command or session in flight
    pub fn is_loading(&self, instance_id: &str) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.loading.contains(instance_id)
    }

    /// Issue a start command, then poll toward `Running`
    pub async fn start_instance(&self, instance_id: &str) -> Result<(), DeckError> {
        self.set_loading(instance_id);
        if let Err(e) = self.gateway.start_instance(instance_id).await {
            self.clear_loading(instance_id);
            return Err(e);
        }
        self.start_polling(
            instance_id,
            InstanceStatus::Running,
            self.options.start_poll_interval,
        )
    }

    /// Issue a stop command, then poll toward `Stopped`
    pub async fn stop_instance(&self, instance_id: &str) -> Result<(), DeckError> {
        self.set_loading(instance_id);
        if let Err(e) = self.gateway.stop_instance(instance_id).await {
            self.clear_loading(instance_id);
            return Err(e);
        }
        self.start_polling(
            instance_id,
            InstanceStatus::Stopped,
            self.options.stop_poll_interval,
        )
    }

    /// Start a poll session for an instance.
    ///
    /// An existing session for the same id is cancelled first, so there is
    /// never more than one live timer per instance (last writer wins). The
    /// first fetch is issued immediately; subsequent fetches on a fixed
    /// interval until a terminal outcome.
    pub fn start_polling(
        &self,
        instance_id: &str,
        target: InstanceStatus,
        interval: Duration,
    ) -> Result<(), DeckError> {
        if interval.is_zero() {
            return Err(DeckError::ValidationError(
                "poll interval must be positive".to_string(),
            ));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(prior) = state.sessions.remove(instance_id) {
                warn!("Replacing live poll session for {}", instance_id);
                let _ = prior.cancel.send(true);
            }
            state.sessions.insert(
                instance_id.to_string(),
                Session {
                    seq,
                    cancel: cancel_tx,
                },
            );
            state.loading.insert(instance_id.to_string());
        }

        debug!(
            "Polling {} toward {:?} every {:?}",
            instance_id, target, interval
        );

        let gateway = Arc::clone(&self.gateway);
        let state = Arc::clone(&self.state);
        let snapshots = Arc::clone(&self.snapshots);
        let events = self.events.clone();
        let max_attempts = self.options.max_attempts;
        let instance_id = instance_id.to_string();

        tokio::spawn(async move {
            run_session(
                gateway,
                state,
                snapshots,
                events,
                instance_id,
                target,
                interval,
                max_attempts,
                seq,
                cancel_rx,
            )
            .await;
        });

        Ok(())
    }

    /// Stop polling an instance. Idempotent; a no-op if nothing is active.
    pub fn stop_polling(&self, instance_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = state.sessions.remove(instance_id) {
            let _ = session.cancel.send(true);
            debug!("Stopped polling {}", instance_id);
        }
        state.loading.remove(instance_id);
    }

    fn set_loading(&self, instance_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.loading.insert(instance_id.to_string());
    }

    fn clear_loading(&self, instance_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.loading.remove(instance_id);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_session<G: DeploymentGateway>(
    gateway: Arc<G>,
    state: Arc<Mutex<PollerState>>,
    snapshots: Arc<watch::Sender<Vec<DeploymentRecord>>>,
    events: mpsc::UnboundedSender<PollEvent>,
    instance_id: String,
    target: InstanceStatus,
    interval: Duration,
    max_attempts: u32,
    seq: u64,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut attempts: u32 = 0;

    let outcome = loop {
        attempts += 1;
        if attempts > max_attempts {
            break PollOutcome::TimedOut;
        }

        let fetched = gateway.list_deployments(false).await;

        // A cancel may have landed while the fetch was in flight; the late
        // result, success or failure, must be discarded, not applied.
        if *cancel_rx.borrow() {
            debug!("Discarding late poll result for {}", instance_id);
            return;
        }

        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                error!("Poll fetch failed for {}: {}", instance_id, e);
                break PollOutcome::Failed(e.to_string());
            }
        };

        let found = records.iter().find(|r| r.instance_id == instance_id);
        let decision = match found {
            None => Some(PollOutcome::Gone),
            Some(r) if r.status == target => Some(PollOutcome::Reached),
            Some(r) if r.status == InstanceStatus::Error => Some(PollOutcome::Errored),
            Some(_) => None,
        };

        snapshots.send_replace(records);

        if let Some(outcome) = decision {
            break outcome;
        }

        tokio::select! {
            _ = cancel_rx.changed() => {
                debug!("Poll session for {} cancelled", instance_id);
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    };

    // Only clear state if this session is still the current one for the id;
    // a newer session may have replaced it.
    {
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        if state.sessions.get(&instance_id).map(|s| s.seq) == Some(seq) {
            state.sessions.remove(&instance_id);
            state.loading.remove(&instance_id);
        }
    }

    info!(
        "Poll session for {} finished after attempt {}: {:?}",
        instance_id, attempts, outcome
    );

    let _ = events.send(PollEvent {
        instance_id,
        attempts,
        outcome,
    });
}
