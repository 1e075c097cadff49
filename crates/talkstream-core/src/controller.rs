//! Session Controller - the connect / speak / destroy state machine.
//!
//! ```text
//!   Idle --connect--> Connecting --ok--> Connected --destroy--> Destroying --> Idle
//!                         |                  |
//!                         +--failure--> Idle +--speak--> Connected
//! ```
//!
//! The controller lock is never held across a network call. Each `connect()`
//! and `destroy()` advances the epoch clock, and every continuation of an
//! earlier call checks its guard before touching shared state, so a later
//! call always wins.

use crate::config::SessionConfig;
use crate::epoch::{EpochClock, EpochGuard};
use crate::error::{SessionError, SessionResult};
use crate::events::SessionEvents;
use crate::peer::{PeerContext, PeerSession};
use crate::playback::{MonitorConfig, PlaybackState};
use crate::rtc::WebRtcConnector;
use crate::signaling::{DidSignalingClient, SignalingApi};
use crate::text::{OpenAiTextClient, TextService};
use crate::transport::PeerConnector;
use crate::types::{SessionEvent, SessionState, StreamHandle};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

struct Inner {
    state: SessionState,
    stream: Option<StreamHandle>,
    peer: Option<PeerSession>,
}

impl Inner {
    fn take_resources(&mut self) -> (Option<StreamHandle>, Option<PeerSession>) {
        (self.stream.take(), self.peer.take())
    }
}

pub struct SessionController {
    config: Arc<SessionConfig>,
    signaling: Arc<dyn SignalingApi>,
    text: Arc<dyn TextService>,
    connector: Arc<dyn PeerConnector>,
    monitor: MonitorConfig,
    events: SessionEvents,
    epochs: EpochClock,
    inner: Mutex<Inner>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        signaling: Arc<dyn SignalingApi>,
        text: Arc<dyn TextService>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        let monitor = config.monitor_config();
        Self {
            config: Arc::new(config),
            signaling,
            text,
            connector,
            monitor,
            events: SessionEvents::default(),
            epochs: EpochClock::new(),
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                stream: None,
                peer: None,
            }),
        }
    }

    /// Wire the production collaborators: D-ID signaling, OpenAI text, WebRTC transport.
    pub fn from_config(config: SessionConfig) -> SessionResult<Self> {
        let signaling = Arc::new(DidSignalingClient::from_config(&config));
        let text = Arc::new(OpenAiTextClient::from_config(&config));
        let connector = Arc::new(WebRtcConnector::new()?);
        Ok(Self::new(config, signaling, text, connector))
    }

    pub fn with_monitor_config(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn stream(&self) -> Option<StreamHandle> {
        self.inner.lock().await.stream.clone()
    }

    pub async fn playback(&self) -> Option<PlaybackState> {
        let inner = self.inner.lock().await;
        match inner.peer.as_ref() {
            Some(peer) => peer.playback().await,
            None => None,
        }
    }

    /// Last peer-connection state reported by the current transport.
    pub async fn connection_state(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        match inner.peer.as_ref() {
            Some(peer) => peer.connection_state().await,
            None => None,
        }
    }

    fn set_state(&self, inner: &mut Inner, state: SessionState) {
        if inner.state != state {
            info!(from = %inner.state, to = %state, epoch = self.epochs.current(), "session state");
            inner.state = state;
            self.events.state(state);
        }
    }

    async fn close_peer(&self, peer: Option<PeerSession>) {
        if let Some(peer) = peer {
            debug!(epoch = peer.epoch(), "closing peer session");
            peer.close().await;
        }
    }

    /// Establish a session. No-op while the current transport reports `connected`;
    /// a session whose transport failed or closed is rebuilt.
    pub async fn connect(&self) -> SessionResult<()> {
        let (guard, stale_stream, stale_peer) = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Connected {
                let transport_up = match inner.peer.as_ref() {
                    Some(peer) => peer.is_connected().await,
                    None => false,
                };
                if transport_up {
                    debug!("connect ignored: already connected");
                    return Ok(());
                }
                info!("transport is not connected; rebuilding session");
            }
            let (stream, peer) = inner.take_resources();
            let guard = self.epochs.advance();
            self.set_state(&mut inner, SessionState::Connecting);
            (guard, stream, peer)
        };

        if let Some(stream) = stale_stream.as_ref() {
            debug!(stream_id = %stream.stream_id, "stream handle from earlier epoch discarded");
        }
        if stale_stream.is_some() || stale_peer.is_some() {
            self.close_peer(stale_peer).await;
            self.events.reset();
        }

        match self.establish(&guard).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut inner = self.inner.lock().await;
                if guard.is_live() {
                    warn!(epoch = guard.epoch(), error = %e, "connect failed; cleaning up");
                    let (stream, peer) = inner.take_resources();
                    self.set_state(&mut inner, SessionState::Idle);
                    drop(inner);
                    if let Some(stream) = stream {
                        debug!(stream_id = %stream.stream_id, "stream handle discarded");
                    }
                    self.close_peer(peer).await;
                    self.events.reset();
                } else {
                    debug!(epoch = guard.epoch(), error = %e, "superseded connect unwound");
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, guard: &EpochGuard) -> SessionResult<()> {
        let offer = self.signaling.create_stream().await?;
        let handle = offer.handle();
        info!(stream_id = %handle.stream_id, session_id = %handle.session_id, "stream created");

        {
            let mut inner = self.inner.lock().await;
            if !guard.is_live() {
                drop(inner);
                self.delete_orphan(&handle).await;
                return Err(SessionError::Superseded { epoch: guard.epoch() });
            }
            inner.stream = Some(handle.clone());
        }

        let ctx = PeerContext {
            connector: Arc::clone(&self.connector),
            signaling: Arc::clone(&self.signaling),
            stream: handle.clone(),
            guard: guard.clone(),
            events: self.events.clone(),
            monitor: self.monitor,
        };
        let (peer, answer) = PeerSession::negotiate(ctx, &offer.offer, &offer.ice_servers).await?;

        {
            let mut inner = self.inner.lock().await;
            if !guard.is_live() {
                drop(inner);
                peer.close().await;
                return Err(SessionError::Superseded { epoch: guard.epoch() });
            }
            inner.peer = Some(peer);
        }

        self.signaling.submit_answer(&handle, &answer).await?;

        let mut inner = self.inner.lock().await;
        if !guard.is_live() {
            return Err(SessionError::Superseded { epoch: guard.epoch() });
        }
        self.set_state(&mut inner, SessionState::Connected);
        Ok(())
    }

    /// A stream created for a connect that lost its epoch before anyone else saw it.
    async fn delete_orphan(&self, handle: &StreamHandle) {
        if let Err(e) = self.signaling.delete_stream(handle).await {
            warn!(stream_id = %handle.stream_id, error = %e, "orphaned stream not deleted");
        }
    }

    /// Have the avatar speak a reply to `message`. Returns the text that was spoken.
    pub async fn speak(&self, message: &str) -> SessionResult<String> {
        let (guard, handle) = {
            let inner = self.inner.lock().await;
            let handle = match (inner.state, inner.stream.as_ref()) {
                (SessionState::Connected, Some(handle)) => handle.clone(),
                (state, _) => {
                    return Err(SessionError::InvalidState {
                        operation: "speak",
                        state,
                    })
                }
            };
            (self.epochs.guard(), handle)
        };

        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::InputValidation("Please enter a message".to_string()));
        }

        let reply = self.text.complete(message).await;

        if !guard.is_live() {
            let state = self.state().await;
            return Err(SessionError::InvalidState {
                operation: "speak",
                state,
            });
        }

        self.signaling
            .submit_talk(&handle, &reply, &self.config.voice_id)
            .await?;
        info!(stream_id = %handle.stream_id, chars = reply.len(), "talk submitted");
        Ok(reply)
    }

    /// Tear the session down. Remote failures are logged; local cleanup always completes.
    pub async fn destroy(&self) {
        let (guard, stream, peer) = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Idle && inner.stream.is_none() && inner.peer.is_none() {
                debug!("destroy ignored: no active session");
                return;
            }
            let guard = self.epochs.advance();
            self.set_state(&mut inner, SessionState::Destroying);
            let (stream, peer) = inner.take_resources();
            (guard, stream, peer)
        };

        if let Some(handle) = stream.as_ref() {
            match self.signaling.delete_stream(handle).await {
                Ok(()) => info!(stream_id = %handle.stream_id, "stream deleted"),
                Err(e) => warn!(stream_id = %handle.stream_id, error = %e, "stream delete failed; continuing teardown"),
            }
        }
        self.close_peer(peer).await;

        let mut inner = self.inner.lock().await;
        if guard.is_live() {
            self.events.reset();
            self.set_state(&mut inner, SessionState::Idle);
        } else {
            debug!(epoch = guard.epoch(), "destroy superseded; leaving newer session untouched");
        }
    }
}
