//! Transport seam between the peer session and a concrete peer-to-peer stack.
//!
//! A `PeerConnector` builds one transport per epoch and wires all of its
//! observers into a `TransportEventSender` *before* returning, so the caller
//! never misses an ICE candidate or a track that arrives while the offer is
//! being applied. The WebRTC binding lives in [`crate::rtc`].

use crate::error::SessionResult;
use crate::types::{IceCandidate, IceServer, SessionDescription, StatusChannel};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Locally gathered candidate to forward to the remote side.
    IceCandidate(IceCandidate),
    /// An inbound video track started.
    VideoTrack { track_id: String },
    /// Connection, ICE, gathering or signaling state change.
    Status { channel: StatusChannel, state: String },
}

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Builds peer transports.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a transport using `ice_servers`, with every observer already forwarding into `events`.
    async fn connect(
        &self,
        ice_servers: &[IceServer],
        events: TransportEventSender,
    ) -> SessionResult<Arc<dyn PeerLink>>;
}

/// One live peer-to-peer transport.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Apply the remote offer, create the local answer, apply it, return it.
    async fn accept_offer(&self, offer: &SessionDescription) -> SessionResult<SessionDescription>;

    /// Cumulative bytes received on inbound video, if the transport has reported any.
    async fn inbound_video_bytes(&self) -> Option<u64>;

    /// Close the transport and release inbound media.
    async fn close(&self) -> SessionResult<()>;
}
