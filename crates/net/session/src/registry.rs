//! Registry of live sessions.

use crate::{
    SessionError, SessionEvent, SessionId, SessionInfo, metrics::SessionMetrics, session,
};
use futures::{AsyncRead, AsyncWrite, Stream, StreamExt};
use libp2p::PeerId;
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::info;
use tryst_net_discovery::{Direction, StreamHandler};
use tryst_tasks::{Shutdown, TaskExecutor};

/// Lines buffered per session before the console waits.
const INPUT_BUFFER: usize = 64;

/// Receiver of the registry's [`SessionEvent`]s.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

struct SessionEntry {
    info: SessionInfo,
    /// Dropped to half-close the session's write side.
    input: Option<mpsc::Sender<String>>,
    supervisor: Option<JoinHandle<()>>,
}

struct Inner {
    executor: TaskExecutor,
    sessions: Mutex<BTreeMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
    events: mpsc::UnboundedSender<SessionEvent>,
    metrics: SessionMetrics,
}

/// Tracks every live session and spawns new ones.
///
/// Cloning is cheap; all clones share the same sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

impl SessionRegistry {
    /// Creates an empty registry spawning onto `executor`.
    pub fn new(executor: TaskExecutor) -> (Self, SessionEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            executor,
            sessions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            events,
            metrics: SessionMetrics::default(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Starts a session over `stream`.
    pub fn open<S>(&self, peer: PeerId, direction: Direction, stream: S) -> SessionId
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = SessionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let info = SessionInfo {
            id,
            peer,
            direction,
        };
        let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);

        self.inner.sessions.lock().insert(
            id,
            SessionEntry {
                info: info.clone(),
                input: Some(input_tx),
                supervisor: None,
            },
        );
        self.inner.metrics.opened_total.increment(1);
        self.inner.metrics.active.increment(1.0);
        info!(session = %id, %peer, %direction, "Session opened");
        let _ = self.inner.events.send(SessionEvent::Opened(info.clone()));

        let registry = self.clone();
        let supervisor = session::spawn(
            &self.inner.executor,
            info,
            stream,
            input_rx,
            self.inner.events.clone(),
            self.inner.metrics.clone(),
            move || registry.remove(id),
        );

        // The session may already be gone, in which case the handle is not needed.
        if let Some(entry) = self.inner.sessions.lock().get_mut(&id) {
            entry.supervisor = Some(supervisor);
        }
        id
    }

    /// Queues `line` for the peer of session `id`.
    pub async fn send(&self, id: SessionId, line: String) -> Result<(), SessionError> {
        let input = self
            .inner
            .sessions
            .lock()
            .get(&id)
            .and_then(|entry| entry.input.clone())
            .ok_or(SessionError::Closed(id))?;
        input
            .send(line)
            .await
            .map_err(|_| SessionError::Closed(id))
    }

    /// Stops accepting input for session `id`, half-closing its stream once queued
    /// lines are written. Returns `false` if the session is unknown or already finished.
    pub fn finish_input(&self, id: SessionId) -> bool {
        self.inner
            .sessions
            .lock()
            .get_mut(&id)
            .and_then(|entry| entry.input.take())
            .is_some()
    }

    /// Stops input for every session with `peer`. Returns how many were still taking input.
    pub fn finish_peer(&self, peer: &PeerId) -> usize {
        self.inner
            .sessions
            .lock()
            .values_mut()
            .filter(|entry| entry.info.peer == *peer)
            .filter_map(|entry| entry.input.take())
            .count()
    }

    /// Ends the sessions of every peer reported by `departed` until `shutdown` resolves.
    ///
    /// A peer whose connection is gone cannot read anything we write, so its
    /// sessions are wound down instead of waiting for the next local line.
    pub async fn close_departed<D>(self, mut departed: D, mut shutdown: Shutdown)
    where
        D: Stream<Item = PeerId> + Unpin,
    {
        loop {
            let peer = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                peer = departed.next() => peer,
            };
            let Some(peer) = peer else { break };

            let finished = self.finish_peer(&peer);
            if finished > 0 {
                info!(%peer, sessions = finished, "Peer disconnected, closing its sessions");
            }
        }
    }

    /// Live sessions, oldest first.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner
            .sessions
            .lock()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// The most recently opened live session that still accepts input.
    pub fn newest(&self) -> Option<SessionInfo> {
        self.inner
            .sessions
            .lock()
            .values()
            .rev()
            .find(|entry| entry.input.is_some())
            .map(|entry| entry.info.clone())
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        self.inner
            .sessions
            .lock()
            .get(&id)
            .map(|entry| entry.info.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for every current session supervisor to finish.
    ///
    /// Sessions stop on their own when the node-wide shutdown fires.
    pub async fn join_all(&self) {
        let supervisors: Vec<JoinHandle<()>> = self
            .inner
            .sessions
            .lock()
            .values_mut()
            .filter_map(|entry| entry.supervisor.take())
            .collect();

        for supervisor in supervisors {
            let _ = supervisor.await;
        }
    }

    fn remove(&self, id: SessionId) {
        let Some(entry) = self.inner.sessions.lock().remove(&id) else {
            return;
        };
        self.inner.metrics.closed_total.increment(1);
        self.inner.metrics.active.decrement(1.0);
        info!(session = %id, peer = %entry.info.peer, "Session closed");
        let _ = self.inner.events.send(SessionEvent::Closed(entry.info));
    }
}

impl<S> StreamHandler<S> for SessionRegistry
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn handle_stream(&self, peer: PeerId, direction: Direction, stream: S) {
        self.open(peer, direction, stream);
    }
}
