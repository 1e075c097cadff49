//! Playback Monitor - derives "the avatar is talking" from inbound video byte counters.
//!
//! The avatar service keeps the video track open between talk turns but stops
//! sending media, so a growing `bytes_received` counter is the only reliable
//! signal that a clip is playing. The monitor samples it on a fixed tick.
//!
//! Start is declared on the first growing sample. Stop needs `stall_ticks`
//! consecutive flat samples so a single late packet batch does not flicker the
//! view; `stall_ticks = 1` gives the plain single-sample rule.

use crate::epoch::EpochGuard;
use crate::events::SessionEvents;
use crate::transport::PeerLink;
use crate::types::{StatusChannel, VideoView};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Poll period (default 500ms)
    pub poll_interval: Duration,
    /// Flat samples required before declaring idle (default 3)
    pub stall_ticks: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            stall_ticks: 3,
        }
    }
}

/// Last observed counter and the derived playing flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub last_byte_count: u64,
    pub is_playing: bool,
    stalled_ticks: u32,
}

impl PlaybackState {
    /// Feed one counter sample. Returns the new `is_playing` value when it flips.
    pub fn observe(&mut self, current_bytes: u64, stall_ticks: u32) -> Option<bool> {
        let is_growing = current_bytes > self.last_byte_count;
        self.last_byte_count = current_bytes;

        if is_growing {
            self.stalled_ticks = 0;
            if !self.is_playing {
                self.is_playing = true;
                return Some(true);
            }
        } else if self.is_playing {
            self.stalled_ticks += 1;
            if self.stalled_ticks >= stall_ticks.max(1) {
                self.stalled_ticks = 0;
                self.is_playing = false;
                return Some(false);
            }
        }
        None
    }
}

/// A running monitor task bound to one peer session.
pub struct PlaybackMonitor {
    state: Arc<RwLock<PlaybackState>>,
    task: JoinHandle<()>,
}

impl PlaybackMonitor {
    /// Start polling `link` every `config.poll_interval`; the first sample is taken one period in.
    pub fn spawn(
        link: Arc<dyn PeerLink>,
        guard: EpochGuard,
        events: SessionEvents,
        config: MonitorConfig,
    ) -> Self {
        let state = Arc::new(RwLock::new(PlaybackState::default()));
        let task_state = Arc::clone(&state);

        let task = tokio::spawn(async move {
            let start = time::Instant::now() + config.poll_interval;
            let mut ticker = time::interval_at(start, config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(epoch = guard.epoch(), interval_ms = config.poll_interval.as_millis() as u64, "playback monitor started");

            loop {
                ticker.tick().await;
                if !guard.is_live() {
                    debug!(epoch = guard.epoch(), "playback monitor stopping: epoch is stale");
                    break;
                }
                let Some(bytes) = link.inbound_video_bytes().await else {
                    continue;
                };
                if !guard.is_live() {
                    break;
                }

                let flipped = task_state.write().await.observe(bytes, config.stall_ticks);
                if let Some(playing) = flipped {
                    debug!(epoch = guard.epoch(), bytes, playing, "playback state flipped");
                    if playing {
                        events.status(StatusChannel::Streaming, "streaming");
                        events.video(VideoView::Talk);
                    } else {
                        events.status(StatusChannel::Streaming, "idle");
                        events.video(VideoView::Idle);
                    }
                }
            }
        });

        Self { state, task }
    }

    pub async fn state(&self) -> PlaybackState {
        *self.state.read().await
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PlaybackMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
