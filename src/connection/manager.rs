//! The link manager and its arbiter: role state, worker slots, and the
//! serialized transitions between listening, dialing, and a live session.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

use super::dialer::DialerWorker;
use super::listener::ListenerWorker;
use super::session::SessionWorker;
use crate::transport::{Transport, TransportListener, TransportStream};

/// Connection role of the link at one instant. Single source of truth
/// for arbitration; mutated only under the arbiter lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No workers running
    Inactive,
    /// Waiting for an inbound connection
    Listening,
    /// One outbound dial attempt in flight
    Connecting,
    /// Exactly one live session
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Inactive => write!(f, "inactive"),
            LinkState::Listening => write!(f, "listening"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Connected => write!(f, "connected"),
        }
    }
}

/// Events emitted by the link manager
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A session is up; bytes can flow in both directions
    Connected {
        /// Remote endpoint in display form, if the transport knows it
        peer: Option<String>,
    },
    /// The live session broke while reading; the link fell back to
    /// listening
    ConnectionLost { reason: String },
    /// A dial attempt failed; the link fell back to listening
    ConnectionFailed { reason: String },
    /// The listening endpoint could not be bound
    ListenFailed { reason: String },
    /// One chunk of inbound bytes, exactly as read off the stream
    Received(Bytes),
}

/// Configuration for the link manager
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Fixed buffer size for the session read loop
    pub read_buffer_size: usize,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            event_capacity: 100,
        }
    }
}

/// Worker slots and the transition epoch, guarded by the arbiter lock.
pub(crate) struct Arbiter<T: Transport> {
    listener: Option<ListenerWorker>,
    dialer: Option<DialerWorker>,
    session: Option<SessionWorker<T::Stream>>,
    /// Where peers can reach the live listener; None when no endpoint is
    /// bound
    listener_addr: Option<T::PeerAddr>,
    /// Bumped by every transition that starts or invalidates a bind.
    /// Guards the one piece of I/O that runs outside the lock: the bind
    /// of a fresh listening endpoint.
    epoch: u64,
    /// True while a bind is in flight. At most one bind runs at a time;
    /// transitions that want a listener defer to it instead of binding
    /// the same endpoint concurrently.
    binding: bool,
}

/// State shared between the manager handle and the worker tasks.
pub(crate) struct Shared<T: Transport> {
    pub(crate) transport: T,
    pub(crate) config: LinkConfig,
    pub(crate) event_tx: mpsc::Sender<LinkEvent>,
    arbiter: Mutex<Arbiter<T>>,
    state_tx: watch::Sender<LinkState>,
}

impl<T: Transport> Shared<T> {
    /// Snapshot of the current role, readable without the arbiter lock.
    pub(crate) fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: LinkState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            debug!("Link state {} -> {}", prev, next);
        }
    }

    /// Transition to Listening under the lock: cancel any dialer and
    /// session, keep an already-running listener. Returns the epoch to
    /// hand to [`Shared::bind_and_install`] when this transition must
    /// bind; an in-flight bind is left valid and deferred to instead,
    /// so at most one bind runs at a time.
    fn listening_transition_locked(&self, arb: &mut Arbiter<T>) -> Option<u64> {
        if let Some(d) = arb.dialer.take() {
            d.cancel();
        }
        if let Some(s) = arb.session.take() {
            s.cancel();
        }
        self.set_state(LinkState::Listening);
        if arb.listener.is_some() || arb.binding {
            None
        } else {
            arb.epoch += 1;
            arb.binding = true;
            Some(arb.epoch)
        }
    }

    /// Bind a listening endpoint outside the lock and install it, unless
    /// another transition superseded `epoch` while the bind was in
    /// flight. Transitions that still want a listener defer to this task
    /// (the `binding` marker), so a superseded bind redoes the bind at
    /// the current epoch rather than leaving the link endpoint-less. A
    /// bind failure is reported and leaves the listener slot empty; a
    /// later `start()` may bind again.
    async fn bind_and_install(shared: &Arc<Self>, mut epoch: u64) {
        loop {
            let bound = shared.transport.bind().await;
            let mut arb = shared.arbiter.lock().await;
            match bound {
                Ok(endpoint) => {
                    if arb.epoch == epoch {
                        arb.binding = false;
                        arb.listener_addr = endpoint.local_addr();
                        arb.listener = Some(ListenerWorker::spawn(shared.clone(), endpoint));
                        return;
                    }
                    debug!("Discarding listener bound during a superseded transition");
                    if shared.state() == LinkState::Listening && arb.listener.is_none() {
                        // A newer transition deferred to this bind. Close
                        // the stale endpoint first so a fixed port is free
                        // again, then bind at the current epoch.
                        epoch = arb.epoch;
                        drop(endpoint);
                        drop(arb);
                        continue;
                    }
                    arb.binding = false;
                    return;
                }
                Err(e) => {
                    arb.binding = false;
                    let superseded = arb.epoch != epoch;
                    drop(arb);
                    if superseded && shared.state() != LinkState::Listening {
                        debug!("Ignoring bind failure from a superseded transition: {}", e);
                        return;
                    }
                    warn!("{}", e);
                    let _ = shared
                        .event_tx
                        .send(LinkEvent::ListenFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    return;
                }
            }
        }
    }

    /// The `start()` transition: any state -> Listening, exactly one
    /// listener running.
    pub(crate) async fn ensure_listening(shared: &Arc<Self>) {
        let needs_bind = {
            let mut arb = shared.arbiter.lock().await;
            shared.listening_transition_locked(&mut arb)
        };
        if let Some(epoch) = needs_bind {
            Self::bind_and_install(shared, epoch).await;
        }
    }

    /// Listening fallback taken by the dialer's own failure path. The
    /// worker clears its own slot first (without aborting) so the task
    /// performing the transition survives long enough to finish it.
    pub(crate) async fn fall_back_from_dialer(shared: &Arc<Self>) {
        let needs_bind = {
            let mut arb = shared.arbiter.lock().await;
            arb.dialer = None;
            shared.listening_transition_locked(&mut arb)
        };
        if let Some(epoch) = needs_bind {
            Self::bind_and_install(shared, epoch).await;
        }
    }

    /// Listening fallback taken by the session's own read loop when the
    /// stream breaks. Same self-slot discipline as the dialer fallback.
    pub(crate) async fn fall_back_from_session(shared: &Arc<Self>) {
        let needs_bind = {
            let mut arb = shared.arbiter.lock().await;
            arb.session = None;
            shared.listening_transition_locked(&mut arb)
        };
        if let Some(epoch) = needs_bind {
            Self::bind_and_install(shared, epoch).await;
        }
    }

    /// The `connect_to` transition: cancel any previous dial attempt and
    /// any live session, then spawn one dialer for `peer`.
    pub(crate) async fn spawn_dialer(shared: &Arc<Self>, peer: T::PeerAddr) {
        let mut arb = shared.arbiter.lock().await;
        arb.epoch += 1;
        if let Some(d) = arb.dialer.take() {
            d.cancel();
        }
        if let Some(s) = arb.session.take() {
            s.cancel();
        }
        arb.dialer = Some(DialerWorker::spawn(shared.clone(), peer));
        shared.set_state(LinkState::Connecting);
    }

    /// Commit `stream` as the current session, superseding every other
    /// role. Sole path to the Connected state; last caller to acquire
    /// the lock wins, and any prior session's stream is closed.
    pub(crate) async fn promote(shared: &Arc<Self>, stream: T::Stream) {
        let mut arb = shared.arbiter.lock().await;
        Self::promote_locked(shared, &mut arb, stream);
    }

    fn promote_locked(shared: &Arc<Self>, arb: &mut Arbiter<T>, stream: T::Stream) {
        arb.epoch += 1;
        if let Some(d) = arb.dialer.take() {
            d.cancel();
        }
        if let Some(l) = arb.listener.take() {
            l.cancel();
        }
        arb.listener_addr = None;
        if let Some(s) = arb.session.take() {
            s.cancel();
        }
        arb.session = Some(SessionWorker::spawn(shared.clone(), stream));
        shared.set_state(LinkState::Connected);
    }

    /// Arbitrate an accepted inbound stream: promote while Listening or
    /// Connecting, otherwise close it. Rejected streams are never queued.
    pub(crate) async fn offer_inbound(shared: &Arc<Self>, stream: T::Stream) {
        let mut arb = shared.arbiter.lock().await;
        match shared.state() {
            LinkState::Listening | LinkState::Connecting => {
                Self::promote_locked(shared, &mut arb, stream);
            }
            state @ (LinkState::Inactive | LinkState::Connected) => {
                debug!(
                    "Rejecting inbound stream from {:?}: link is {}",
                    stream.peer_addr(),
                    state
                );
                drop(stream);
            }
        }
    }

    /// The `stop()` transition: cancel every worker, go Inactive.
    pub(crate) async fn stop_all(&self) {
        let mut arb = self.arbiter.lock().await;
        arb.epoch += 1;
        if let Some(d) = arb.dialer.take() {
            d.cancel();
        }
        if let Some(s) = arb.session.take() {
            s.cancel();
        }
        if let Some(l) = arb.listener.take() {
            l.cancel();
        }
        arb.listener_addr = None;
        self.set_state(LinkState::Inactive);
    }
}

/// Manages one peer link: at most one listener, one dial attempt, and
/// one live session at a time, with deterministic handover between the
/// three roles.
///
/// All transitions are serialized by a single internal lock that is held
/// only for the transition itself, never across blocking I/O. Workers
/// run as independent tasks and are cancelled by aborting them, which
/// drops (closes) the endpoint or stream they own.
pub struct LinkManager<T: Transport> {
    shared: Arc<Shared<T>>,
    event_rx: mpsc::Receiver<LinkEvent>,
    state_rx: watch::Receiver<LinkState>,
}

impl<T: Transport> LinkManager<T> {
    /// Create an inactive manager over `transport`.
    pub fn new(transport: T, config: LinkConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (state_tx, state_rx) = watch::channel(LinkState::Inactive);
        let shared = Arc::new(Shared {
            transport,
            config,
            event_tx,
            arbiter: Mutex::new(Arbiter {
                listener: None,
                dialer: None,
                session: None,
                listener_addr: None,
                epoch: 0,
                binding: false,
            }),
            state_tx,
        });
        Self {
            shared,
            event_rx,
            state_rx,
        }
    }

    /// Begin (or keep) listening for one inbound connection. Cancels any
    /// dial attempt and any live session; idempotent with respect to an
    /// already-running listener.
    pub async fn start(&self) {
        debug!("start");
        Shared::ensure_listening(&self.shared).await;
    }

    /// Dial `peer`, cancelling any previous dial attempt and any live
    /// session. A dial failure is reported via
    /// [`LinkEvent::ConnectionFailed`] and falls back to listening; the
    /// peer is not redialed automatically.
    pub async fn connect_to(&self, peer: T::PeerAddr) {
        debug!("Attempting to connect to {:?}", peer);
        Shared::spawn_dialer(&self.shared, peer).await;
    }

    /// Transmit `bytes` on the live session. Silently dropped unless the
    /// link is Connected. Only a snapshot of the session is taken under
    /// the arbiter lock; the write itself runs outside it, serialized
    /// per session so concurrent senders cannot interleave bytes.
    pub async fn send(&self, bytes: Bytes) {
        let handle = {
            let arb = self.shared.arbiter.lock().await;
            if self.shared.state() != LinkState::Connected {
                return;
            }
            arb.session.as_ref().map(|s| s.handle())
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.write(bytes).await {
                // Non-fatal: the read loop notices a broken stream.
                warn!("{}", e);
            }
        }
    }

    /// Cancel every worker and go Inactive.
    pub async fn stop(&self) {
        debug!("stop");
        self.shared.stop_all().await;
    }

    /// Current connection role; safe to call from any task.
    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Receive the next link event. Returns None once the manager's
    /// workers are all gone and every event has been drained.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.event_rx.recv().await
    }

    /// Address peers can currently reach the listener on, if an endpoint
    /// is bound. Reflects OS-assigned addresses (e.g. a `:0` TCP bind).
    pub async fn listener_addr(&self) -> Option<T::PeerAddr> {
        self.shared.arbiter.lock().await.listener_addr.clone()
    }
}

impl<T: Transport> Drop for LinkManager<T> {
    fn drop(&mut self) {
        // Best effort; stop() is the reliable teardown.
        if let Ok(mut arb) = self.shared.arbiter.try_lock() {
            if let Some(d) = arb.dialer.take() {
                d.cancel();
            }
            if let Some(s) = arb.session.take() {
                s.cancel();
            }
            if let Some(l) = arb.listener.take() {
                l.cancel();
            }
        }
    }
}
