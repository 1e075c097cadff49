//! Peer Session - one negotiated transport plus its observers.
//!
//! Transport callbacks never touch controller state directly. They push
//! `TransportEvent`s into a channel; a pump task owned by this session drains
//! it, checks the epoch guard, and then forwards ICE candidates, starts the
//! playback monitor, or republishes status changes.

use crate::epoch::EpochGuard;
use crate::error::SessionResult;
use crate::events::SessionEvents;
use crate::playback::{MonitorConfig, PlaybackMonitor, PlaybackState};
use crate::signaling::SignalingApi;
use crate::transport::{PeerConnector, PeerLink, TransportEvent, TransportEventReceiver};
use crate::types::{IceServer, SessionDescription, StatusChannel, StreamHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collaborators a peer session needs for its lifetime.
#[derive(Clone)]
pub struct PeerContext {
    pub connector: Arc<dyn PeerConnector>,
    pub signaling: Arc<dyn SignalingApi>,
    pub stream: StreamHandle,
    pub guard: EpochGuard,
    pub events: SessionEvents,
    pub monitor: MonitorConfig,
}

pub struct PeerSession {
    epoch: u64,
    link: Arc<dyn PeerLink>,
    pump: JoinHandle<()>,
    monitor: Arc<Mutex<Option<PlaybackMonitor>>>,
    /// Last peer-connection state the transport reported.
    connection_state: Arc<RwLock<Option<String>>>,
    closed: AtomicBool,
}

impl PeerSession {
    /// Open a transport, start observing it, and answer `offer`.
    ///
    /// On failure the half-built transport is closed before the error is returned.
    pub async fn negotiate(
        ctx: PeerContext,
        offer: &SessionDescription,
        ice_servers: &[IceServer],
    ) -> SessionResult<(Self, SessionDescription)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = ctx.connector.connect(ice_servers, tx).await?;

        let monitor = Arc::new(Mutex::new(None));
        let connection_state = Arc::new(RwLock::new(None));
        let pump = tokio::spawn(pump_events(
            rx,
            Arc::clone(&link),
            Arc::clone(&monitor),
            Arc::clone(&connection_state),
            ctx.clone(),
        ));

        let session = PeerSession {
            epoch: ctx.guard.epoch(),
            link,
            pump,
            monitor,
            connection_state,
            closed: AtomicBool::new(false),
        };

        match session.link.accept_offer(offer).await {
            Ok(answer) => {
                info!(epoch = session.epoch, stream_id = %ctx.stream.stream_id, "local answer created");
                Ok((session, answer))
            }
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Last reported peer-connection state (`"connected"`, `"failed"`, ...), if any.
    pub async fn connection_state(&self) -> Option<String> {
        self.connection_state.read().await.clone()
    }

    /// True once the transport has reported `connected` and nothing worse since.
    pub async fn is_connected(&self) -> bool {
        !self.is_closed() && self.connection_state().await.as_deref() == Some("connected")
    }

    /// Playback state, once an inbound video track has started the monitor.
    pub async fn playback(&self) -> Option<PlaybackState> {
        let monitor = self.monitor.lock().await;
        match monitor.as_ref() {
            Some(m) => Some(m.state().await),
            None => None,
        }
    }

    /// Stop observers and the monitor, then close the transport. Safe to call twice.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pump.abort();
        if let Some(monitor) = self.monitor.lock().await.take() {
            monitor.stop();
        }
        if let Err(e) = self.link.close().await {
            warn!(epoch = self.epoch, error = %e, "transport close failed");
        }
        info!(epoch = self.epoch, "peer session closed");
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_events(
    mut rx: TransportEventReceiver,
    link: Arc<dyn PeerLink>,
    monitor: Arc<Mutex<Option<PlaybackMonitor>>>,
    connection_state: Arc<RwLock<Option<String>>>,
    ctx: PeerContext,
) {
    while let Some(event) = rx.recv().await {
        if !ctx.guard.is_live() {
            debug!(epoch = ctx.guard.epoch(), ?event, "dropping transport event from stale epoch");
            continue;
        }

        match event {
            TransportEvent::IceCandidate(candidate) => {
                let signaling = Arc::clone(&ctx.signaling);
                let stream = ctx.stream.clone();
                tokio::spawn(async move {
                    if let Err(e) = signaling.submit_ice_candidate(&stream, &candidate).await {
                        warn!(stream_id = %stream.stream_id, error = %e, "ICE candidate not delivered");
                    }
                });
            }
            TransportEvent::VideoTrack { track_id } => {
                let mut slot = monitor.lock().await;
                if slot.is_none() {
                    info!(epoch = ctx.guard.epoch(), %track_id, "inbound video track; starting playback monitor");
                    *slot = Some(PlaybackMonitor::spawn(
                        Arc::clone(&link),
                        ctx.guard.clone(),
                        ctx.events.clone(),
                        ctx.monitor,
                    ));
                }
            }
            TransportEvent::Status { channel, state } => {
                debug!(%channel, %state, "transport status");
                if channel == StatusChannel::Peer {
                    *connection_state.write().await = Some(state.clone());
                }
                ctx.events.status(channel, state);
            }
        }
    }
}
