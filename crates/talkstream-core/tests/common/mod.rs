//! Scripted collaborators for driving `SessionController` without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use talkstream_core::{
    IceCandidate, IceServer, PeerConnector, PeerLink, SessionConfig, SessionController, SessionDescription,
    SessionError, SessionResult, SignalingApi, StreamHandle, StreamOffer, TextService, TransportEvent,
    TransportEventSender,
};
use tokio::sync::{oneshot, Notify};

pub const REMOTE_OFFER_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\n";
pub const LOCAL_ANSWER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=answer\r\n";

#[derive(Debug, Clone, PartialEq)]
pub enum SignalCall {
    Create,
    Answer { stream: StreamHandle, answer: SessionDescription },
    Ice { stream: StreamHandle, candidate: IceCandidate },
    Talk { stream: StreamHandle, text: String, voice_id: String },
    Delete { stream: StreamHandle },
}

fn rejected(operation: &str) -> SessionError {
    SessionError::RemoteService {
        service: "avatar",
        status: Some(500),
        message: format!("{} rejected: mock failure", operation),
    }
}

/// Records every signaling call; individual calls can be told to fail or to block.
#[derive(Default)]
pub struct MockSignaling {
    calls: Mutex<Vec<SignalCall>>,
    streams_created: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_answer: AtomicBool,
    pub fail_ice: AtomicBool,
    pub fail_talk: AtomicBool,
    pub fail_delete: AtomicBool,
    answer_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub answer_entered: Notify,
    delete_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub delete_entered: Notify,
}

impl MockSignaling {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `submit_answer` wait until the returned sender fires (or is dropped).
    pub fn hold_next_answer(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.answer_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Make the next `delete_stream` wait until the returned sender fires (or is dropped).
    pub fn hold_next_delete(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.delete_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<SignalCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&SignalCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, SignalCall::Create))
    }

    pub fn answers(&self) -> Vec<(StreamHandle, SessionDescription)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SignalCall::Answer { stream, answer } => Some((stream, answer)),
                _ => None,
            })
            .collect()
    }

    pub fn ice(&self) -> Vec<(StreamHandle, IceCandidate)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SignalCall::Ice { stream, candidate } => Some((stream, candidate)),
                _ => None,
            })
            .collect()
    }

    pub fn talks(&self) -> Vec<(StreamHandle, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SignalCall::Talk { stream, text, voice_id } => Some((stream, text, voice_id)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<StreamHandle> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SignalCall::Delete { stream } => Some(stream),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SignalCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SignalingApi for MockSignaling {
    async fn create_stream(&self) -> SessionResult<StreamOffer> {
        self.record(SignalCall::Create);
        tokio::task::yield_now().await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(rejected("create stream"));
        }
        let n = self.streams_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StreamOffer {
            id: format!("s{}", n),
            offer: SessionDescription::offer(REMOTE_OFFER_SDP),
            ice_servers: vec![IceServer {
                urls: vec!["stun:stun.example.org:3478".to_string()],
                username: None,
                credential: None,
            }],
            session_id: format!("sess{}", n),
        })
    }

    async fn submit_answer(&self, stream: &StreamHandle, answer: &SessionDescription) -> SessionResult<()> {
        self.record(SignalCall::Answer {
            stream: stream.clone(),
            answer: answer.clone(),
        });
        let gate = self.answer_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.answer_entered.notify_one();
            let _ = gate.await;
        }
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(rejected("submit answer"));
        }
        Ok(())
    }

    async fn submit_ice_candidate(&self, stream: &StreamHandle, candidate: &IceCandidate) -> SessionResult<()> {
        self.record(SignalCall::Ice {
            stream: stream.clone(),
            candidate: candidate.clone(),
        });
        if self.fail_ice.load(Ordering::SeqCst) {
            return Err(rejected("submit ICE candidate"));
        }
        Ok(())
    }

    async fn submit_talk(&self, stream: &StreamHandle, text: &str, voice_id: &str) -> SessionResult<()> {
        self.record(SignalCall::Talk {
            stream: stream.clone(),
            text: text.to_string(),
            voice_id: voice_id.to_string(),
        });
        if self.fail_talk.load(Ordering::SeqCst) {
            return Err(rejected("submit talk"));
        }
        Ok(())
    }

    async fn delete_stream(&self, stream: &StreamHandle) -> SessionResult<()> {
        self.record(SignalCall::Delete { stream: stream.clone() });
        let gate = self.delete_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.delete_entered.notify_one();
            let _ = gate.await;
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(rejected("delete stream"));
        }
        Ok(())
    }
}

/// Echoes prompts back so tests can see exactly what was spoken.
#[derive(Default)]
pub struct MockText {
    pub prompts: Mutex<Vec<String>>,
}

impl MockText {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_for(prompt: &str) -> String {
        format!("You said: {}", prompt)
    }
}

#[async_trait]
impl TextService for MockText {
    async fn complete(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Self::reply_for(prompt)
    }
}

#[derive(Default)]
pub struct LinkStats {
    pub opened: AtomicUsize,
    pub open_now: AtomicUsize,
    pub max_open: AtomicUsize,
    pub closed: AtomicUsize,
}

/// Hands out `MockLink`s and keeps each link's event sender so tests can play the transport.
#[derive(Default)]
pub struct MockConnector {
    pub stats: Arc<LinkStats>,
    pub fail_accept: AtomicBool,
    senders: Mutex<Vec<TransportEventSender>>,
    ice_servers_seen: Mutex<Vec<Vec<IceServer>>>,
    bytes: Arc<Mutex<VecDeque<u64>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inbound video byte counters the links report, one per poll. The last value repeats.
    pub fn set_byte_samples(&self, samples: &[u64]) {
        *self.bytes.lock().unwrap() = samples.iter().copied().collect();
    }

    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.stats.max_open.load(Ordering::SeqCst)
    }

    pub fn open_now(&self) -> usize {
        self.stats.open_now.load(Ordering::SeqCst)
    }

    pub fn ice_servers_seen(&self) -> Vec<Vec<IceServer>> {
        self.ice_servers_seen.lock().unwrap().clone()
    }

    /// Event sender of the link opened `index`-th (0-based).
    pub fn sender(&self, index: usize) -> TransportEventSender {
        self.senders.lock().unwrap()[index].clone()
    }

    /// Push an event through the most recently opened link.
    pub fn emit(&self, event: TransportEvent) {
        let senders = self.senders.lock().unwrap();
        let sender = senders.last().expect("no link opened yet");
        let _ = sender.send(event);
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn connect(&self, ice_servers: &[IceServer], events: TransportEventSender) -> SessionResult<Arc<dyn PeerLink>> {
        self.ice_servers_seen.lock().unwrap().push(ice_servers.to_vec());
        self.senders.lock().unwrap().push(events);
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(now, Ordering::SeqCst);
        Ok(Arc::new(MockLink {
            stats: Arc::clone(&self.stats),
            fail_accept: self.fail_accept.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
            bytes: Arc::clone(&self.bytes),
        }))
    }
}

pub struct MockLink {
    stats: Arc<LinkStats>,
    fail_accept: bool,
    closed: AtomicBool,
    bytes: Arc<Mutex<VecDeque<u64>>>,
}

#[async_trait]
impl PeerLink for MockLink {
    async fn accept_offer(&self, offer: &SessionDescription) -> SessionResult<SessionDescription> {
        if self.fail_accept || offer.sdp_type != "offer" {
            return Err(SessionError::Negotiation("remote description rejected".to_string()));
        }
        Ok(SessionDescription::answer(LOCAL_ANSWER_SDP))
    }

    async fn inbound_video_bytes(&self) -> Option<u64> {
        let mut bytes = self.bytes.lock().unwrap();
        if bytes.len() > 1 {
            bytes.pop_front()
        } else {
            bytes.front().copied()
        }
    }

    async fn close(&self) -> SessionResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
            self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig::new("did-test-key", "sk-test")
}

pub fn controller(
    signaling: &Arc<MockSignaling>,
    text: &Arc<MockText>,
    connector: &Arc<MockConnector>,
) -> SessionController {
    SessionController::new(test_config(), signaling.clone(), text.clone(), connector.clone())
}

pub fn candidate(n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{} 1 udp 2122260223 10.0.0.{} 5400{} typ host", n, n, n),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
    }
}

/// Poll `check` with real sleeps until it holds or a second passes.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
