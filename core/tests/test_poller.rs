//! Status poller tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use deploydeck::errors::DeckError;
use deploydeck::gateway::DeploymentGateway;
use deploydeck::models::deployment::{
    DeploymentRecord, DeploymentRequest, InstanceStatus, SnapshotLimitCheck,
};
use deploydeck::poller::{PollOutcome, StatusPoller};

fn record(instance_id: &str, status: InstanceStatus) -> DeploymentRecord {
    DeploymentRecord {
        deployment_id: format!("dep-{}", instance_id),
        instance_id: instance_id.to_string(),
        hostname: "web-01".to_string(),
        snapshot_id: String::new(),
        ami: "ami-0abc1234".to_string(),
        server_size: "t3.medium".to_string(),
        availability_zone: "us-east-1a".to_string(),
        lifecycle: "spot".to_string(),
        status,
        time_to_expire: "0".to_string(),
        user_data: vec![],
    }
}

/// Gateway stub that replays a script of table snapshots, repeating the
/// last one once the script is exhausted.
struct ScriptedGateway {
    script: Mutex<VecDeque<Vec<DeploymentRecord>>>,
    last: Mutex<Vec<DeploymentRecord>>,
    fetches: AtomicU32,
    fail_fetch: AtomicBool,
}

impl ScriptedGateway {
    fn new(script: Vec<Vec<DeploymentRecord>>) -> Self {
        assert!(!script.is_empty());
        let last = script.last().cloned().unwrap_or_default();
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            fetches: AtomicU32::new(0),
            fail_fetch: AtomicBool::new(false),
        }
    }

    fn constant(records: Vec<DeploymentRecord>) -> Self {
        Self::new(vec![records])
    }

    fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeploymentGateway for ScriptedGateway {
    async fn list_deployments(
        &self,
        _force_loading: bool,
    ) -> Result<Vec<DeploymentRecord>, DeckError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(DeckError::GatewayError("502: bad gateway".to_string()));
        }
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(records) => {
                if script.is_empty() {
                    *self.last.lock().unwrap() = records.clone();
                }
                Ok(records)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn get_deployment(&self, id: &str) -> Result<DeploymentRecord, DeckError> {
        Err(DeckError::NotFound(id.to_string()))
    }

    async fn start_instance(&self, _instance_id: &str) -> Result<(), DeckError> {
        Ok(())
    }

    async fn stop_instance(&self, _instance_id: &str) -> Result<(), DeckError> {
        Ok(())
    }

    async fn check_image_limit(
        &self,
        _instance_id: &str,
    ) -> Result<SnapshotLimitCheck, DeckError> {
        unimplemented!("not exercised by poller tests")
    }

    async fn delete_image(&self, _instance_id: &str, _image_id: &str) -> Result<(), DeckError> {
        unimplemented!("not exercised by poller tests")
    }

    async fn capture_image(&self, _request: &DeploymentRequest) -> Result<(), DeckError> {
        unimplemented!("not exercised by poller tests")
    }
}

#[tokio::test(start_paused = true)]
async fn test_poller_times_out_after_attempt_cap() {
    // The instance never leaves pending, so the session must exhaust its
    // attempt budget: 10 polled fetches, terminating on the 11th tick
    // without an 11th fetch.
    let gateway = Arc::new(ScriptedGateway::constant(vec![record(
        "i-0aa",
        InstanceStatus::Pending,
    )]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::TimedOut);
    assert_eq!(event.instance_id, "i-0aa");
    assert_eq!(gateway.fetch_count(), 10);
    assert!(!poller.is_polling());
    assert!(!poller.is_loading("i-0aa"));
}

#[tokio::test(start_paused = true)]
async fn test_poller_early_success() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        vec![record("i-0aa", InstanceStatus::Pending)],
        vec![record("i-0aa", InstanceStatus::Running)],
    ]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::Reached);
    assert_eq!(event.attempts, 2);
    // Reached on the 2nd fetch; no 3rd fetch may be issued.
    assert_eq!(gateway.fetch_count(), 2);
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_poller_error_sentinel_terminates() {
    let gateway = Arc::new(ScriptedGateway::constant(vec![record(
        "i-0aa",
        InstanceStatus::Error,
    )]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::Errored);
    assert_eq!(gateway.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poller_vanished_instance_terminates() {
    // The polled instance is absent from the table: terminal, not an error.
    let gateway = Arc::new(ScriptedGateway::constant(vec![record(
        "i-other",
        InstanceStatus::Running,
    )]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::Gone);
    assert_eq!(gateway.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poller_fetch_failure_is_not_retried() {
    let gateway = Arc::new(ScriptedGateway::constant(vec![record(
        "i-0aa",
        InstanceStatus::Pending,
    )]));
    gateway.fail_fetch.store(true, Ordering::SeqCst);
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    let event = events.recv().await.expect("terminal event");
    assert!(matches!(event.outcome, PollOutcome::Failed(_)));
    assert_eq!(gateway.fetch_count(), 1);
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_stop_polling_discards_in_flight_fetch_failure() {
    // A session cancelled while its fetch is in flight must stay silent
    // even when that fetch fails: no terminal event after the user cancels.
    let gateway = Arc::new(ScriptedGateway::constant(vec![record(
        "i-0aa",
        InstanceStatus::Pending,
    )]));
    gateway.fail_fetch.store(true, Ordering::SeqCst);
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();
    poller.stop_polling("i-0aa");

    // Let the session task run its doomed fetch.
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(gateway.fetch_count(), 1);
    assert!(events.try_recv().is_err());
    assert!(!poller.is_polling());
    assert!(!poller.is_loading("i-0aa"));
}

#[tokio::test(start_paused = true)]
async fn test_poller_sessions_are_isolated() {
    // Cancelling instance A's session must leave B's timer running, and a
    // cancelled session must emit no terminal event.
    let gateway = Arc::new(ScriptedGateway::constant(vec![
        record("i-aaa", InstanceStatus::Pending),
        record("i-bbb", InstanceStatus::Stopping),
    ]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-aaa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();
    poller
        .start_polling("i-bbb", InstanceStatus::Stopped, Duration::from_millis(10000))
        .unwrap();

    poller.stop_polling("i-aaa");
    assert!(!poller.is_loading("i-aaa"));
    assert!(poller.is_loading("i-bbb"));
    assert!(poller.is_polling());

    // B runs its budget out on its own timer.
    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.instance_id, "i-bbb");
    assert_eq!(event.outcome, PollOutcome::TimedOut);

    // A was cancelled, so no second event arrives.
    assert!(events.try_recv().is_err());
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_poller_restart_replaces_session() {
    // Last writer wins: restarting a session for the same id must not leave
    // two live timers, and only the new session reports an outcome.
    let gateway = Arc::new(ScriptedGateway::constant(vec![record(
        "i-0aa",
        InstanceStatus::Pending,
    )]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();
    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::TimedOut);
    assert!(events.try_recv().is_err());
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_poller_rejects_zero_interval() {
    let gateway = Arc::new(ScriptedGateway::constant(vec![]));
    let (poller, _events) = StatusPoller::new(gateway);

    let result = poller.start_polling("i-0aa", InstanceStatus::Running, Duration::ZERO);
    assert!(matches!(result, Err(DeckError::ValidationError(_))));
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_poller_publishes_table_snapshots() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        vec![record("i-0aa", InstanceStatus::Pending)],
        vec![record("i-0aa", InstanceStatus::Running)],
    ]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));
    let snapshots = poller.subscribe();

    poller
        .start_polling("i-0aa", InstanceStatus::Running, Duration::from_millis(2000))
        .unwrap();

    events.recv().await.expect("terminal event");

    let table = snapshots.borrow();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].status, InstanceStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_start_instance_polls_toward_running() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        vec![record("i-0aa", InstanceStatus::Pending)],
        vec![record("i-0aa", InstanceStatus::Running)],
    ]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller.start_instance("i-0aa").await.unwrap();
    assert!(poller.is_loading("i-0aa"));

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::Reached);
    assert!(!poller.is_loading("i-0aa"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_instance_polls_toward_stopped() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        vec![record("i-0aa", InstanceStatus::Stopping)],
        vec![record("i-0aa", InstanceStatus::Stopped)],
    ]));
    let (poller, mut events) = StatusPoller::new(Arc::clone(&gateway));

    poller.stop_instance("i-0aa").await.unwrap();

    let event = events.recv().await.expect("terminal event");
    assert_eq!(event.outcome, PollOutcome::Reached);
    assert_eq!(gateway.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_polling_is_idempotent() {
    let gateway = Arc::new(ScriptedGateway::constant(vec![]));
    let (poller, _events) = StatusPoller::new(gateway);

    // Nothing active; both calls are no-ops.
    poller.stop_polling("i-0aa");
    poller.stop_polling("i-0aa");
    assert!(!poller.is_polling());
}
