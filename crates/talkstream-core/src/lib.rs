//! # Talkstream - Talking-Avatar Session Core
//!
//! Drives one live session with a remote talking-head video service: create a
//! stream, negotiate WebRTC against the service's offer, trickle ICE, turn user
//! text into a reply through a language model, have the avatar speak it, and
//! tell the presentation layer whether the avatar is talking or idle.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Session Controller                        │
//! │   connect / speak / destroy        EpochClock (last wins)    │
//! │         │                │                    │              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
//! │  │  Signaling   │  │ Text Service │  │ Peer Session │        │
//! │  │ (D-ID HTTP)  │  │  (OpenAI)    │  │  (webrtc)    │        │
//! │  └──────────────┘  └──────────────┘  └──────────────┘        │
//! │         ↑ ICE candidates                    │                │
//! │         └───────────────────────────────────┤                │
//! │                                      ┌──────────────┐        │
//! │   SessionEvents (broadcast) ←────────│  Playback    │        │
//! │   state / status / video view        │  Monitor     │        │
//! │                                      └──────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod epoch;
pub mod error;
pub mod events;
pub mod peer;
pub mod playback;
pub mod rtc;
pub mod signaling;
pub mod text;
pub mod transport;
pub mod types;

pub use config::{MonitorSettings, SessionConfig};
pub use controller::SessionController;
pub use epoch::{EpochClock, EpochGuard};
pub use error::{SessionError, SessionResult};
pub use events::SessionEvents;
pub use peer::{PeerContext, PeerSession};
pub use playback::{MonitorConfig, PlaybackMonitor, PlaybackState};
pub use rtc::{WebRtcConnector, WebRtcLink};
pub use signaling::{DidSignalingClient, SignalingApi};
pub use text::{OpenAiTextClient, TextService, FALLBACK_REPLY};
pub use transport::{PeerConnector, PeerLink, TransportEvent, TransportEventReceiver, TransportEventSender};
pub use types::{
    Credits, IceCandidate, IceServer, SessionDescription, SessionEvent, SessionState, StatusChannel,
    StatusUpdate, StreamHandle, StreamOffer, VideoView,
};
