//! Shared server state
//!
//! One [`ServerState`] lives for the whole process. It owns the inbound
//! event bus, the currently attached orchestrator, the registry of socket
//! connections, and the outbound event stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use demeter_core::{
    CommandOutput, CommandSpec, Error, Event, EventBus, EventSelector, Orchestrator,
    SubscriptionHandle,
};
use demeter_stream::{BufferedEventStream, StreamConfig, StreamTarget};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-socket forwarding registration.
///
/// `inbound_sub` always exists; `orchestrator_sub` only while an
/// orchestrator is attached, and moves to the new bus on re-attach.
struct ConnectionEntry {
    tx: mpsc::UnboundedSender<Event>,
    inbound_sub: SubscriptionHandle,
    orchestrator_sub: Option<SubscriptionHandle>,
}

/// Process-wide server state shared across handlers.
pub struct ServerState {
    session_id: Uuid,
    auth_secret: String,
    inbound_bus: Arc<EventBus>,
    orchestrator: RwLock<Option<Arc<dyn Orchestrator>>>,
    connections: Mutex<HashMap<Uuid, ConnectionEntry>>,
    stream: BufferedEventStream,
    stream_targets: Vec<StreamTarget>,
}

impl ServerState {
    /// Create state for a new session with a fresh credential.
    pub fn new(stream_config: StreamConfig, stream_targets: Vec<StreamTarget>) -> Self {
        let session_id = Uuid::new_v4();
        Self {
            session_id,
            auth_secret: Uuid::new_v4().to_string(),
            inbound_bus: Arc::new(EventBus::new()),
            orchestrator: RwLock::new(None),
            connections: Mutex::new(HashMap::new()),
            stream: BufferedEventStream::new(session_id, stream_config),
            stream_targets,
        }
    }

    /// Identifier of this server session.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Credential expected on inbound event batches.
    pub fn auth_secret(&self) -> &str {
        &self.auth_secret
    }

    /// Whether an orchestrator is attached and commands can run.
    pub fn is_ready(&self) -> bool {
        self.read_orchestrator().is_some()
    }

    /// The currently attached orchestrator, if any.
    pub fn orchestrator(&self) -> Option<Arc<dyn Orchestrator>> {
        self.read_orchestrator().clone()
    }

    /// Attach an orchestrator, replacing any previous one.
    ///
    /// Every registered socket connection is moved from the old
    /// orchestrator's event bus to the new one before the slot is
    /// published, so no connection observes a half-switched state. The
    /// outbound stream reconnects afterwards.
    pub async fn attach(&self, orchestrator: Arc<dyn Orchestrator>) {
        {
            let mut slot = self.write_orchestrator();
            let mut connections = self.lock_connections();

            if let Some(previous) = slot.take() {
                for entry in connections.values_mut() {
                    if let Some(handle) = entry.orchestrator_sub.take() {
                        previous.event_bus().unsubscribe(handle);
                    }
                }
            }

            let event_bus = orchestrator.event_bus();
            for entry in connections.values_mut() {
                entry.orchestrator_sub = Some(subscribe_forwarder(event_bus, &entry.tx));
            }

            *slot = Some(orchestrator.clone());
        }

        self.stream
            .connect(orchestrator, self.stream_targets.clone())
            .await;
        info!("Orchestrator attached, server is ready");
    }

    /// Execute a command against the attached orchestrator.
    pub async fn execute_command(&self, spec: CommandSpec) -> demeter_core::Result<CommandOutput> {
        let orchestrator = self.orchestrator().ok_or(Error::NotReady)?;
        orchestrator.execute(spec).await
    }

    /// Publish an externally received event on the inbound bus.
    pub fn publish_inbound(&self, event: Event) {
        self.inbound_bus.publish_event(event);
    }

    /// Register a socket connection and return its event feed.
    ///
    /// The connection hears the inbound bus immediately and the
    /// orchestrator bus while one is attached.
    pub fn register_connection(&self, conn_id: Uuid) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();

        let slot = self.read_orchestrator();
        let mut connections = self.lock_connections();

        let inbound_sub = subscribe_forwarder(&self.inbound_bus, &tx);
        let orchestrator_sub = slot
            .as_ref()
            .map(|orchestrator| subscribe_forwarder(orchestrator.event_bus(), &tx));

        connections.insert(
            conn_id,
            ConnectionEntry {
                tx,
                inbound_sub,
                orchestrator_sub,
            },
        );
        debug!(connection = %conn_id, total = connections.len(), "Socket connection registered");
        rx
    }

    /// Remove a socket connection and its bus listeners.
    pub fn remove_connection(&self, conn_id: Uuid) {
        let slot = self.read_orchestrator();
        let mut connections = self.lock_connections();

        if let Some(entry) = connections.remove(&conn_id) {
            self.inbound_bus.unsubscribe(entry.inbound_sub);
            if let (Some(orchestrator), Some(handle)) = (slot.as_ref(), entry.orchestrator_sub) {
                orchestrator.event_bus().unsubscribe(handle);
            }
            debug!(connection = %conn_id, total = connections.len(), "Socket connection removed");
        }
    }

    /// Stop the outbound stream and deliver anything still buffered.
    pub async fn close(&self) {
        self.stream.close().await;
    }

    // Lock order is always orchestrator slot first, connections second.

    fn read_orchestrator(&self) -> RwLockReadGuard<'_, Option<Arc<dyn Orchestrator>>> {
        self.orchestrator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_orchestrator(&self) -> RwLockWriteGuard<'_, Option<Arc<dyn Orchestrator>>> {
        self.orchestrator
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<Uuid, ConnectionEntry>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn subscribe_forwarder(
    bus: &Arc<EventBus>,
    tx: &mpsc::UnboundedSender<Event>,
) -> SubscriptionHandle {
    let tx = tx.clone();
    bus.subscribe(EventSelector::Any, move |event: &Event| {
        // Receiver may already be gone mid-disconnect; nothing to do then.
        let _ = tx.send(event.clone());
        Ok(())
    })
}
