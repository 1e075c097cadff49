//! Signaling client for the avatar streaming service (`/talks/streams`).
//!
//! Every call is a single HTTP round trip authenticated with Basic auth built
//! from the API key and an empty password. Status handling policy (fatal,
//! surfaced, or log-only) belongs to the caller; this module only reports.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::types::{Credits, IceCandidate, SessionDescription, StreamHandle, StreamOffer};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

const SERVICE: &str = "avatar";
const DRIVER_URL: &str = "bank://lively/";
const VIDEO_QUALITY: &str = "hd";
const TTS_PROVIDER: &str = "microsoft";

/// The signaling operations a session needs from the avatar service.
#[async_trait]
pub trait SignalingApi: Send + Sync {
    /// Create a stream bound to the configured portrait; returns the remote offer.
    async fn create_stream(&self) -> SessionResult<StreamOffer>;

    async fn submit_answer(&self, stream: &StreamHandle, answer: &SessionDescription) -> SessionResult<()>;

    async fn submit_ice_candidate(&self, stream: &StreamHandle, candidate: &IceCandidate) -> SessionResult<()>;

    /// Ask the avatar to speak `text` with `voice_id`.
    async fn submit_talk(&self, stream: &StreamHandle, text: &str, voice_id: &str) -> SessionResult<()>;

    async fn delete_stream(&self, stream: &StreamHandle) -> SessionResult<()>;
}

#[derive(Serialize)]
struct CreateStreamRequest<'a> {
    source_url: &'a str,
    stream_warmup: bool,
    config: StreamConfig,
}

#[derive(Serialize)]
struct StreamConfig {
    video_quality: &'static str,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    answer: &'a SessionDescription,
    session_id: &'a str,
}

#[derive(Serialize)]
struct IceRequest<'a> {
    candidate: &'a str,
    #[serde(rename = "sdpMid")]
    sdp_mid: Option<&'a str>,
    #[serde(rename = "sdpMLineIndex")]
    sdp_mline_index: Option<u16>,
    session_id: &'a str,
}

#[derive(Serialize)]
struct TalkRequest<'a> {
    script: TalkScript<'a>,
    config: TalkConfig,
    driver_url: &'static str,
    session_id: &'a str,
}

#[derive(Serialize)]
struct TalkScript<'a> {
    #[serde(rename = "type")]
    script_type: &'static str,
    input: &'a str,
    provider: TalkProvider<'a>,
}

#[derive(Serialize)]
struct TalkProvider<'a> {
    #[serde(rename = "type")]
    provider_type: &'static str,
    voice_id: &'a str,
}

#[derive(Serialize)]
struct TalkConfig {
    fluent: bool,
    stitch: bool,
}

#[derive(Serialize)]
struct SessionRef<'a> {
    session_id: &'a str,
}

/// reqwest-backed client for the D-ID streaming API.
#[derive(Debug, Clone)]
pub struct DidSignalingClient {
    base_url: String,
    api_key: String,
    source_url: String,
    client: reqwest::Client,
}

impl DidSignalingClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            source_url: source_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(&config.url, &config.key, &config.source_url)
    }

    fn streams_url(&self, stream_id: Option<&str>, suffix: Option<&str>) -> String {
        let mut url = format!("{}/talks/streams", self.base_url);
        if let Some(id) = stream_id {
            url.push('/');
            url.push_str(id);
        }
        if let Some(suffix) = suffix {
            url.push('/');
            url.push_str(suffix);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.api_key, Some(""))
            .header("Accept", "application/json")
    }

    async fn send(&self, operation: &str, builder: reqwest::RequestBuilder) -> SessionResult<reqwest::Response> {
        let res = builder
            .send()
            .await
            .map_err(|e| SessionError::remote(SERVICE, None, format!("{} request failed: {}", operation, e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SessionError::remote(
                SERVICE,
                Some(status.as_u16()),
                format!("{} rejected: {}", operation, body.trim()),
            ));
        }
        debug!(operation, status = status.as_u16(), "avatar service call succeeded");
        Ok(res)
    }

    /// Remaining and total account credits (`GET /credits`).
    pub async fn credits(&self) -> SessionResult<Credits> {
        let url = format!("{}/credits", self.base_url);
        let res = self.send("credits", self.request(reqwest::Method::GET, url)).await?;
        res.json()
            .await
            .map_err(|e| SessionError::remote(SERVICE, None, format!("credits response parse failed: {}", e)))
    }
}

#[async_trait]
impl SignalingApi for DidSignalingClient {
    async fn create_stream(&self) -> SessionResult<StreamOffer> {
        let body = CreateStreamRequest {
            source_url: &self.source_url,
            stream_warmup: true,
            config: StreamConfig {
                video_quality: VIDEO_QUALITY,
            },
        };
        let res = self
            .send(
                "create stream",
                self.request(reqwest::Method::POST, self.streams_url(None, None)).json(&body),
            )
            .await?;
        res.json()
            .await
            .map_err(|e| SessionError::remote(SERVICE, None, format!("create stream response parse failed: {}", e)))
    }

    async fn submit_answer(&self, stream: &StreamHandle, answer: &SessionDescription) -> SessionResult<()> {
        let body = AnswerRequest {
            answer,
            session_id: &stream.session_id,
        };
        let url = self.streams_url(Some(&stream.stream_id), Some("sdp"));
        self.send("submit answer", self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn submit_ice_candidate(&self, stream: &StreamHandle, candidate: &IceCandidate) -> SessionResult<()> {
        let body = IceRequest {
            candidate: &candidate.candidate,
            sdp_mid: candidate.sdp_mid.as_deref(),
            sdp_mline_index: candidate.sdp_mline_index,
            session_id: &stream.session_id,
        };
        let url = self.streams_url(Some(&stream.stream_id), Some("ice"));
        self.send("submit ICE candidate", self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn submit_talk(&self, stream: &StreamHandle, text: &str, voice_id: &str) -> SessionResult<()> {
        let body = TalkRequest {
            script: TalkScript {
                script_type: "text",
                input: text,
                provider: TalkProvider {
                    provider_type: TTS_PROVIDER,
                    voice_id,
                },
            },
            config: TalkConfig {
                fluent: true,
                stitch: true,
            },
            driver_url: DRIVER_URL,
            session_id: &stream.session_id,
        };
        let url = self.streams_url(Some(&stream.stream_id), None);
        self.send("submit talk", self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_stream(&self, stream: &StreamHandle) -> SessionResult<()> {
        let body = SessionRef {
            session_id: &stream.session_id,
        };
        let url = self.streams_url(Some(&stream.stream_id), None);
        self.send("delete stream", self.request(reqwest::Method::DELETE, url).json(&body))
            .await?;
        Ok(())
    }
}
