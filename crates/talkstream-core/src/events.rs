//! Status-event stream consumed by the presentation layer.
//!
//! The core never renders anything; it publishes `SessionEvent`s on a broadcast
//! channel and lets a thin UI (the CLI, a web page, a test) decide what to show.

use crate::types::{SessionEvent, SessionState, StatusChannel, StatusUpdate, VideoView};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscriber is not an error.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("session event dropped: no subscribers");
        }
    }

    pub fn state(&self, state: SessionState) {
        self.emit(SessionEvent::State { state });
    }

    pub fn status(&self, channel: StatusChannel, state: impl Into<String>) {
        self.emit(SessionEvent::Status(StatusUpdate {
            channel,
            state: state.into(),
            timestamp: Utc::now(),
        }));
    }

    pub fn video(&self, view: VideoView) {
        self.emit(SessionEvent::Video { view });
    }

    /// Put every status channel back to its resting label and show the idle loop.
    pub fn reset(&self) {
        for channel in StatusChannel::ALL {
            self.status(channel, channel.resting_state());
        }
        self.video(VideoView::Idle);
    }
}
