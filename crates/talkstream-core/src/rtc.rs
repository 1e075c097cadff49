//! WebRTC binding for the transport seam, built on the `webrtc` crate.

use crate::error::{SessionError, SessionResult};
use crate::transport::{PeerConnector, PeerLink, TransportEvent, TransportEventSender};
use crate::types::{IceCandidate, IceServer, SessionDescription, StatusChannel};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::stats::StatsReportType;
use webrtc::track::track_remote::TrackRemote;

/// Opens `RTCPeerConnection`s with the default codecs and interceptors.
pub struct WebRtcConnector {
    api: API,
}

impl WebRtcConnector {
    pub fn new() -> SessionResult<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

fn rtc_ice_servers(servers: &[IceServer]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect()
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        ice_servers: &[IceServer],
        events: TransportEventSender,
    ) -> SessionResult<Arc<dyn PeerLink>> {
        let config = RTCConfiguration {
            ice_servers: rtc_ice_servers(ice_servers),
            ..Default::default()
        };
        let pc = Arc::new(self.api.new_peer_connection(config).await?);
        install_observers(&pc, events);
        info!(ice_servers = ice_servers.len(), "peer connection created");
        Ok(Arc::new(WebRtcLink { pc }))
    }
}

fn install_observers(pc: &RTCPeerConnection, events: TransportEventSender) {
    let tx = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate| {
        let tx = tx.clone();
        Box::pin(async move {
            // `None` marks the end of gathering; there is nothing to forward.
            let Some(candidate) = candidate else {
                return;
            };
            match candidate.to_json() {
                Ok(init) => {
                    let _ = tx.send(TransportEvent::IceCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    }));
                }
                Err(e) => warn!(error = %e, "could not serialize local ICE candidate"),
            }
        })
    }));

    let tx = events.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let tx = tx.clone();
        Box::pin(async move {
            if track.kind() == RTPCodecType::Video {
                let _ = tx.send(TransportEvent::VideoTrack { track_id: track.id() });
            }
            tokio::spawn(drain_track(track));
        })
    }));

    let tx = events.clone();
    pc.on_peer_connection_state_change(Box::new(move |state| {
        let _ = tx.send(TransportEvent::Status {
            channel: StatusChannel::Peer,
            state: state.to_string(),
        });
        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_ice_connection_state_change(Box::new(move |state| {
        let _ = tx.send(TransportEvent::Status {
            channel: StatusChannel::Ice,
            state: state.to_string(),
        });
        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_ice_gathering_state_change(Box::new(move |state| {
        let _ = tx.send(TransportEvent::Status {
            channel: StatusChannel::IceGathering,
            state: state.to_string(),
        });
        Box::pin(async {})
    }));

    let tx = events;
    pc.on_signaling_state_change(Box::new(move |state| {
        let _ = tx.send(TransportEvent::Status {
            channel: StatusChannel::Signaling,
            state: state.to_string(),
        });
        Box::pin(async {})
    }));
}

/// Keep reading RTP so the receive pipeline and its byte counters advance. Ends when the track closes.
async fn drain_track(track: Arc<TrackRemote>) {
    let mut packets: u64 = 0;
    while track.read_rtp().await.is_ok() {
        packets += 1;
    }
    debug!(track_id = %track.id(), packets, "inbound track ended");
}

pub struct WebRtcLink {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerLink for WebRtcLink {
    async fn accept_offer(&self, offer: &SessionDescription) -> SessionResult<SessionDescription> {
        if offer.sdp_type != "offer" {
            return Err(SessionError::Negotiation(format!(
                "expected an SDP offer, got `{}`",
                offer.sdp_type
            )));
        }
        let remote = RTCSessionDescription::offer(offer.sdp.clone())?;
        self.pc.set_remote_description(remote).await?;

        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;

        Ok(SessionDescription {
            sdp_type: answer.sdp_type.to_string(),
            sdp: answer.sdp,
        })
    }

    async fn inbound_video_bytes(&self) -> Option<u64> {
        let report = self.pc.get_stats().await;
        report.reports.values().find_map(|stat| match stat {
            StatsReportType::InboundRTP(rtp) if rtp.kind == "video" => Some(rtp.bytes_received),
            _ => None,
        })
    }

    async fn close(&self) -> SessionResult<()> {
        self.pc.close().await?;
        Ok(())
    }
}
