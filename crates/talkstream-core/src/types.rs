//! Wire and lifecycle types shared by the signaling client, the peer session and the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifies one remote stream. Every signaling call after create-stream carries both ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub stream_id: String,
    pub session_id: String,
}

/// SDP payload in the `{ "type": ..., "sdp": ... }` shape used by browsers and the avatar service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "offer".to_string(),
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "answer".to_string(),
            sdp: sdp.into(),
        }
    }
}

/// A locally gathered ICE candidate waiting to be sent to the avatar service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

/// STUN/TURN server handed out by the avatar service. `urls` may arrive as a string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IceServer {
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Urls {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Urls::deserialize(deserializer)? {
        Urls::One(url) => vec![url],
        Urls::Many(urls) => urls,
    })
}

/// Response of the create-stream call.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamOffer {
    pub id: String,
    pub offer: SessionDescription,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    pub session_id: String,
}

impl StreamOffer {
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            stream_id: self.id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Account credit balance reported by the avatar service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

/// Lifecycle of the controller. `Connecting -> Idle` is the only failure edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Destroying,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Destroying => "destroying",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status label a presentation layer can render next to each transport facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusChannel {
    Peer,
    Ice,
    IceGathering,
    Signaling,
    Streaming,
}

impl StatusChannel {
    pub const ALL: [StatusChannel; 5] = [
        StatusChannel::Peer,
        StatusChannel::Ice,
        StatusChannel::IceGathering,
        StatusChannel::Signaling,
        StatusChannel::Streaming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusChannel::Peer => "peer",
            StatusChannel::Ice => "ice",
            StatusChannel::IceGathering => "iceGathering",
            StatusChannel::Signaling => "signaling",
            StatusChannel::Streaming => "streaming",
        }
    }

    /// Label shown after teardown: signaling rests at `stable`, everything else is `disconnected`.
    pub fn resting_state(&self) -> &'static str {
        match self {
            StatusChannel::Signaling => "stable",
            _ => "disconnected",
        }
    }
}

impl fmt::Display for StatusChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub channel: StatusChannel,
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

/// Which video surface should be visible: the idle loop or the live talk track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoView {
    Idle,
    Talk,
}

/// Everything the core tells its presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SessionEvent {
    State { state: SessionState },
    Status(StatusUpdate),
    Video { view: VideoView },
}
