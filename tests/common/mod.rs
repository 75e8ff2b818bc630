#![allow(dead_code)]

use async_trait::async_trait;
use hamon_lib::capture::{LandmarkFrame, Prediction, Recognizer};
use hamon_lib::compose::TextGenerator;
use hamon_lib::error::{ComposeError, InferenceError, SignalingError, TransportError};
use hamon_lib::peer::{IceCandidate, PeerTransport, SessionDescription};
use hamon_lib::signaling::{OutboundSignal, SignalSink};
use hamon_lib::AppEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Шаг транспорта, который можно заставить упасть
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateOffer,
    CreateAnswer,
    SetLocal,
    SetRemote,
}

#[derive(Debug, Default)]
pub struct TransportLog {
    pub local: Option<SessionDescription>,
    pub remote: Option<SessionDescription>,
    pub candidates: Vec<IceCandidate>,
    pub closed: bool,
    pub fail_at: Option<Step>,
}

/// Транспорт в памяти; клоны делят один журнал
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    pub log: Arc<Mutex<TransportLog>>,
    name: &'static str,
}

impl FakeTransport {
    pub fn new(name: &'static str) -> Self {
        Self {
            log: Arc::default(),
            name,
        }
    }

    pub fn failing_at(name: &'static str, step: Step) -> Self {
        let t = Self::new(name);
        t.log.lock().unwrap().fail_at = Some(step);
        t
    }

    pub fn applied(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.candidates.iter().map(|c| c.candidate.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.log.lock().unwrap().closed
    }

    pub fn remote(&self) -> Option<SessionDescription> {
        self.log.lock().unwrap().remote.clone()
    }

    fn check(&self, step: Step) -> Result<(), TransportError> {
        if self.log.lock().unwrap().fail_at == Some(step) {
            return Err(TransportError::Setup(format!("{step:?} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.check(Step::CreateOffer)?;
        Ok(SessionDescription::offer(format!("v=0 offer from {}", self.name)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.check(Step::CreateAnswer)?;
        Ok(SessionDescription::answer(format!("v=0 answer from {}", self.name)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.check(Step::SetLocal)?;
        self.log.lock().unwrap().local = Some(desc);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.check(Step::SetRemote)?;
        self.log.lock().unwrap().remote = Some(desc);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        if log.remote.is_none() {
            return Err(TransportError::Candidate("no remote description".into()));
        }
        log.candidates.push(candidate);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Сигнальный канал, который только записывает отправленное
#[derive(Debug, Clone, Default)]
pub struct FakeSink {
    pub sent: Arc<Mutex<Vec<OutboundSignal>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl FakeSink {
    pub fn sent(&self) -> Vec<OutboundSignal> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(OutboundSignal::kind).collect()
    }

    pub fn take(&self) -> Vec<OutboundSignal> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl SignalSink for FakeSink {
    async fn send(&self, msg: OutboundSignal) -> Result<(), SignalingError> {
        if self.is_closed() {
            return Err(SignalingError::Closed);
        }
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }

    async fn close(&self) -> Result<(), SignalingError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Распознаватель, который запоминает каждое окно и отвечает по очереди
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    pub windows: Arc<Mutex<Vec<Vec<LandmarkFrame>>>>,
    labels: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRecognizer {
    pub fn answering(labels: &[&str]) -> Self {
        Self {
            windows: Arc::default(),
            labels: Arc::new(Mutex::new(labels.iter().rev().map(|l| l.to_string()).collect())),
        }
    }

    pub fn calls(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, window: &[LandmarkFrame]) -> Result<Prediction, InferenceError> {
        self.windows.lock().unwrap().push(window.to_vec());
        match self.labels.lock().unwrap().pop() {
            Some(label) => Ok(Prediction {
                label,
                confidence: Some(0.9),
            }),
            None => Err(InferenceError::Status { status: 503 }),
        }
    }
}

/// Генератор текста: склеивает слова или всегда падает
#[derive(Clone, Default)]
pub struct JoiningGenerator {
    pub fail: bool,
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl TextGenerator for JoiningGenerator {
    async fn generate(&self, words: &[String]) -> Result<String, ComposeError> {
        self.calls.lock().unwrap().push(words.to_vec());
        if self.fail {
            return Err(ComposeError::Status {
                status: 500,
                body: "model unavailable".into(),
            });
        }
        Ok(words.join(" "))
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

pub fn candidate(line: &str) -> IceCandidate {
    IceCandidate::new(line)
}

/// Собирает события, уже лежащие в канале
pub fn drain(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Ждёт первое событие, подходящее под условие
pub async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<AppEvent>, mut pred: F) -> AppEvent
where
    F: FnMut(&AppEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(ev) if pred(&ev) => return ev,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Запущенная сессия на фейках вместе со всеми концами каналов
pub struct Harness {
    pub handle: hamon_lib::CallHandle,
    pub events: mpsc::UnboundedReceiver<AppEvent>,
    pub inbound: mpsc::UnboundedSender<Result<hamon_lib::signaling::InboundSignal, SignalingError>>,
    pub transport_events: mpsc::UnboundedSender<hamon_lib::peer::TransportEvent>,
    pub transport: FakeTransport,
    pub sink: FakeSink,
}

pub async fn start_call(
    user: &'static str,
    recognizer: ScriptedRecognizer,
    generator: JoiningGenerator,
) -> Harness {
    start_call_with(user, FakeTransport::new(user), recognizer, generator).await
}

pub async fn start_call_with(
    user: &'static str,
    transport: FakeTransport,
    recognizer: ScriptedRecognizer,
    generator: JoiningGenerator,
) -> Harness {
    let sink = FakeSink::default();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();

    let (handle, events) = hamon_lib::CallSession::start(
        hamon_lib::Session::new("room-1", user),
        transport.clone(),
        sink.clone(),
        inbound_rx,
        transport_rx,
        Arc::new(recognizer),
        Arc::new(generator),
    )
    .await
    .expect("session start");

    Harness {
        handle,
        events,
        inbound: inbound_tx,
        transport_events: transport_tx,
        transport,
        sink,
    }
}
