//! Buffered event stream
//!
//! Decouples event and log production from network delivery latency.
//! Recording only appends to in-memory buffers; a background task drains
//! them on a fixed interval and posts one batch per buffer kind to every
//! configured target in parallel.
//!
//! Delivery is at-most-once: items leave the buffer before the send
//! outcome is known, and failed batches are logged and dropped, never
//! re-buffered.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use demeter_core::{
    Error, Event, EventBus, EventName, EventSelector, LogBus, LogEntry, Orchestrator,
    SubscriptionHandle, WorkflowRunRegistration,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batch::{BatchInfo, EventBatch, LogEntryBatch};
use crate::target::StreamTarget;

// ============================================================================
// Constants
// ============================================================================

/// Default interval between periodic flushes
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Default maximum items drained from each buffer per periodic flush
const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// HTTP request timeout for one batch delivery
const HTTP_TIMEOUT_SECS: u64 = 10;

/// Header carrying the target credential
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Path events batches are posted to, relative to the target host
const EVENTS_PATH: &str = "events";

/// Path log-entry batches are posted to, relative to the target host
const LOG_ENTRIES_PATH: &str = "log-entries";

// ============================================================================
// Configuration
// ============================================================================

/// Flush tuning for the buffered stream.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Milliseconds between periodic flushes (default: 1000)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Maximum items drained from each buffer per flush (default: 100)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl StreamConfig {
    fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

// ============================================================================
// Stream
// ============================================================================

/// Correlation fields captured from the orchestrator at connect time.
#[derive(Debug, Clone, Default)]
struct StreamContext {
    project_id: Option<String>,
    environment: String,
    namespace: String,
}

/// Wiring to the currently attached orchestrator.
struct Connection {
    event_bus: Arc<EventBus>,
    log_bus: Arc<LogBus>,
    event_sub: SubscriptionHandle,
    log_sub: SubscriptionHandle,
    cancel: CancellationToken,
    flush_task: JoinHandle<()>,
}

impl Connection {
    /// Stop the flush task and remove the bus listeners.
    ///
    /// The task is joined before returning so no flush started by the old
    /// timer can race whatever the caller does next.
    async fn detach(self) {
        self.cancel.cancel();
        if let Err(e) = self.flush_task.await {
            warn!(error = %e, "flush task ended abnormally");
        }
        self.event_bus.unsubscribe(self.event_sub);
        self.log_bus.unsubscribe(self.log_sub);
    }
}

/// Buffers orchestrator events and log entries and forwards them to
/// remote targets in batches.
///
/// `connect` attaches an orchestrator and replaces the target list
/// wholesale; `close` stops the timer, flushes everything left, and is
/// idempotent.
pub struct BufferedEventStream {
    inner: Arc<Inner>,
    connection: tokio::sync::Mutex<Option<Connection>>,
}

struct Inner {
    session_id: Uuid,
    config: StreamConfig,
    client: reqwest::Client,
    events: Mutex<VecDeque<Event>>,
    log_entries: Mutex<VecDeque<LogEntry>>,
    workflow_run_id: Mutex<Option<String>>,
    targets: Mutex<Arc<Vec<StreamTarget>>>,
    context: Mutex<Option<StreamContext>>,
}

impl BufferedEventStream {
    /// Create a stream for one server session.
    pub fn new(session_id: Uuid, config: StreamConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                session_id,
                config,
                client: reqwest::Client::new(),
                events: Mutex::new(VecDeque::new()),
                log_entries: Mutex::new(VecDeque::new()),
                workflow_run_id: Mutex::new(None),
                targets: Mutex::new(Arc::new(Vec::new())),
                context: Mutex::new(None),
            }),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    /// Attach an orchestrator and replace the target list wholesale.
    ///
    /// Any previous orchestrator's listeners are removed and its flush
    /// timer stopped first, so reconnecting never leaks a timer or
    /// duplicates registrations. Items already buffered stay buffered and
    /// go out to the new targets.
    pub async fn connect(&self, orchestrator: Arc<dyn Orchestrator>, targets: Vec<StreamTarget>) {
        let mut connection = self.connection.lock().await;
        if let Some(previous) = connection.take() {
            previous.detach().await;
        }

        let target_count = targets.len();
        *self.inner.lock_targets() = Arc::new(targets);
        *self.inner.lock_context() = Some(StreamContext {
            project_id: orchestrator.project_id(),
            environment: orchestrator.environment(),
            namespace: orchestrator.namespace(),
        });

        let event_bus = orchestrator.event_bus().clone();
        let log_bus = orchestrator.log_bus().clone();

        let event_sub = event_bus.subscribe(EventSelector::Any, {
            let inner = self.inner.clone();
            move |event: &Event| {
                inner.record(event);
                Ok(())
            }
        });
        let log_sub = log_bus.subscribe({
            let inner = self.inner.clone();
            move |entry: &LogEntry| {
                inner.record_log(entry.clone());
                Ok(())
            }
        });

        let cancel = CancellationToken::new();
        let flush_task = tokio::spawn({
            let inner = self.inner.clone();
            let cancel = cancel.clone();
            let interval = self.inner.config.flush_interval();
            async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            inner.flush_batch().await;
                        }
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        });

        *connection = Some(Connection {
            event_bus,
            log_bus,
            event_sub,
            log_sub,
            cancel,
            flush_task,
        });
        info!(
            targets = target_count,
            flush_interval_ms = self.inner.config.flush_interval_ms,
            "event stream connected"
        );
    }

    /// Append an event to the buffer without touching the network.
    ///
    /// Control events update correlation state instead of being buffered.
    pub fn record_event(&self, name: EventName, payload: Value) {
        self.inner.record(&Event::new(name, payload));
    }

    /// Append a log entry to the buffer without touching the network.
    pub fn record_log_entry(&self, entry: LogEntry) {
        self.inner.record_log(entry);
    }

    /// Stop the flush timer, then deliver everything still buffered.
    ///
    /// The timer task is joined before the final flush starts, so the two
    /// can never run concurrently. Safe to call more than once; later
    /// calls find nothing to do.
    pub async fn close(&self) {
        let mut connection = self.connection.lock().await;
        if let Some(previous) = connection.take() {
            previous.detach().await;
        }
        self.inner.flush_all().await;
    }
}

impl Drop for BufferedEventStream {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            connection.cancel.cancel();
            connection.event_bus.unsubscribe(connection.event_sub);
            connection.log_bus.unsubscribe(connection.log_sub);
        }
    }
}

impl Inner {
    fn record(&self, event: &Event) {
        if event.name.is_control() {
            self.apply_control(event);
            return;
        }
        self.lock_events().push_back(event.clone());
    }

    fn record_log(&self, entry: LogEntry) {
        self.lock_log_entries().push_back(entry);
    }

    fn apply_control(&self, event: &Event) {
        match event.name {
            EventName::WorkflowRunRegistered => {
                match serde_json::from_value::<WorkflowRunRegistration>(event.payload.clone()) {
                    Ok(registration) => {
                        debug!(
                            workflow_run_id = %registration.workflow_run_id,
                            "workflow run registered"
                        );
                        *self.lock_workflow_run_id() = Some(registration.workflow_run_id);
                    }
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed workflow run registration");
                    }
                }
            }
            _ => {}
        }
    }

    /// Periodic flush: up to `max_batch_size` per buffer, oldest first.
    ///
    /// With no targets configured, items keep accumulating.
    async fn flush_batch(&self) {
        let targets = self.lock_targets().clone();
        if targets.is_empty() {
            return;
        }

        let (events, entries) = self.drain(self.config.max_batch_size);
        if events.is_empty() && entries.is_empty() {
            return;
        }
        self.deliver(&targets, events, entries).await;
    }

    /// Final flush: drains both buffers completely.
    ///
    /// With no targets configured the remaining items are discarded.
    async fn flush_all(&self) {
        let (events, entries) = self.drain(usize::MAX);
        if events.is_empty() && entries.is_empty() {
            return;
        }

        let targets = self.lock_targets().clone();
        if targets.is_empty() {
            debug!(
                events = events.len(),
                log_entries = entries.len(),
                "discarding buffered items, no targets configured"
            );
            return;
        }
        self.deliver(&targets, events, entries).await;
    }

    /// Remove up to `limit` items from the front of each buffer.
    fn drain(&self, limit: usize) -> (Vec<Event>, Vec<LogEntry>) {
        let events = {
            let mut buffer = self.lock_events();
            let take = limit.min(buffer.len());
            buffer.drain(..take).collect()
        };
        let entries = {
            let mut buffer = self.lock_log_entries();
            let take = limit.min(buffer.len());
            buffer.drain(..take).collect()
        };
        (events, entries)
    }

    /// Send one batch per non-empty buffer kind to every target in
    /// parallel. A failing target never blocks the others, and failed
    /// batches are not re-buffered.
    async fn deliver(&self, targets: &[StreamTarget], events: Vec<Event>, entries: Vec<LogEntry>) {
        let info = self.batch_info();

        let event_body = if events.is_empty() {
            None
        } else {
            let items = events.len();
            let batch = EventBatch {
                events,
                info: info.clone(),
            };
            serialize_batch(&batch).map(|body| (body, items))
        };
        let entry_body = if entries.is_empty() {
            None
        } else {
            let items = entries.len();
            let batch = LogEntryBatch { entries, info };
            serialize_batch(&batch).map(|body| (body, items))
        };

        let mut sends = Vec::new();
        for target in targets {
            if let Some((body, items)) = &event_body {
                sends.push(self.send(target, EVENTS_PATH, body.clone(), *items));
            }
            if let Some((body, items)) = &entry_body {
                sends.push(self.send(target, LOG_ENTRIES_PATH, body.clone(), *items));
            }
        }
        join_all(sends).await;
    }

    async fn send(&self, target: &StreamTarget, path: &'static str, body: Value, items: usize) {
        let url = format!("{}/{}", target.host.trim_end_matches('/'), path);
        let result = self
            .client
            .post(&url)
            .header(AUTH_TOKEN_HEADER, &target.auth_token)
            .json(&body)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(target = %target.host, path, items, "batch delivered");
            }
            Ok(response) => {
                let error = Error::Delivery {
                    target: target.host.clone(),
                    reason: format!("HTTP {}", response.status()),
                };
                warn!(error = %error, path, items, "batch delivery failed, items dropped");
            }
            Err(e) => {
                let error = Error::Delivery {
                    target: target.host.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %error, path, items, "batch delivery failed, items dropped");
            }
        }
    }

    fn batch_info(&self) -> BatchInfo {
        let context = self.lock_context().clone().unwrap_or_default();
        BatchInfo {
            session_id: self.session_id,
            workflow_run_id: self.lock_workflow_run_id().clone(),
            project_id: context.project_id,
            environment: context.environment,
            namespace: context.namespace,
        }
    }

    fn lock_events(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_log_entries(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.log_entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workflow_run_id(&self) -> MutexGuard<'_, Option<String>> {
        self.workflow_run_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_targets(&self) -> MutexGuard<'_, Arc<Vec<StreamTarget>>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_context(&self) -> MutexGuard<'_, Option<StreamContext>> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn serialize_batch<T: serde::Serialize>(batch: &T) -> Option<Value> {
    match serde_json::to_value(batch) {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(error = %e, "failed to serialize batch, items dropped");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
