//! Сессия звонка: один цикл событий на участника.
//!
//! Сигнальные сообщения, события транспорта, кадры детектора и команды
//! пользователя обрабатываются по одному, до конца, в порядке прихода.
//! Запросы распознавания и генерации текста уходят в отдельные задачи;
//! их результаты возвращаются в цикл как обычные события.

use crate::capture::{
    CapturePipeline, CaptureState, HandDetection, HttpRecognizer, InferenceOutcome, Prediction,
    Recognizer,
};
use crate::compose::{HttpTextGenerator, TextGenerator};
use crate::config::Config;
use crate::error::{CallError, ComposeError, InferenceError, SignalingError};
use crate::events::{AppEvent, EventEmitter};
use crate::peer::{
    MediaState, NegotiationCoordinator, PeerTransport, RtcTransport, TransportEvent, GRACE_PERIOD,
};
use crate::signaling::{InboundSignal, InboundStream, SignalSink, WsSignaling};
use crate::utils::random_id;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, info_span, warn, Instrument};

/// Одна попытка звонка: комната и имя участника
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub room_id: String,
    pub user: String,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(room_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: random_id(),
            room_id: room_id.into(),
            user: user.into(),
            started_at: Utc::now(),
        }
    }
}

enum Command {
    StartCapture,
    Frame(HandDetection),
    CaptureState(oneshot::Sender<CaptureState>),
    ConsumeLabels(oneshot::Sender<Vec<String>>),
    GenerateText(oneshot::Sender<Result<String, CallError>>),
    Leave,
}

enum Completion {
    Inference {
        ticket: u64,
        result: Result<Prediction, InferenceError>,
    },
    Text {
        labels: Vec<String>,
        result: Result<String, ComposeError>,
        reply: oneshot::Sender<Result<String, CallError>>,
    },
}

/// Ручка приложения к запущенной сессии.
///
/// Если ручку уронить без `leave()`, цикл сам выполнит выход.
pub struct CallHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl CallHandle {
    fn send(&self, cmd: Command) -> Result<(), CallError> {
        self.commands.send(cmd).map_err(|_| CallError::SessionEnded)
    }

    pub fn start_capture(&self) -> Result<(), CallError> {
        self.send(Command::StartCapture)
    }

    /// Точка входа колбэка детектора, один вызов на видеокадр
    pub fn frame(&self, detection: HandDetection) -> Result<(), CallError> {
        self.send(Command::Frame(detection))
    }

    /// Состояние захвата после обработки всех ранее отправленных кадров
    pub async fn capture_state(&self) -> Result<CaptureState, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::CaptureState(tx))?;
        rx.await.map_err(|_| CallError::SessionEnded)
    }

    pub async fn consume_labels(&self) -> Result<Vec<String>, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ConsumeLabels(tx))?;
        rx.await.map_err(|_| CallError::SessionEnded)
    }

    /// Забирает слова и генерирует по ним текст. При ошибке слова остаются.
    pub async fn generate_text(&self) -> Result<String, CallError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::GenerateText(tx))?;
        rx.await.map_err(|_| CallError::SessionEnded)?
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Выход из звонка; ждёт, пока цикл освободит ресурсы
    pub async fn leave(self) {
        let _ = self.commands.send(Command::Leave);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Session task ended abnormally");
        }
    }
}

pub struct CallSession<T: PeerTransport, S: SignalSink> {
    session: Session,
    coordinator: NegotiationCoordinator<T, S>,
    pipeline: CapturePipeline,
    recognizer: Arc<dyn Recognizer>,
    generator: Arc<dyn TextGenerator>,
    events: EventEmitter,
}

impl CallSession<RtcTransport, WsSignaling> {
    /// Открывает сигнальный канал комнаты, создаёт peer connection,
    /// объявляет участника и запускает цикл событий
    pub async fn connect(
        config: &Config,
        session: Session,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<AppEvent>), CallError> {
        let url = config.room_url(&session.room_id)?;
        let (signaling, inbound) = WsSignaling::connect(&url).await?;

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let transport = match RtcTransport::new(&config.ice_servers, transport_tx).await {
            Ok(t) => t,
            Err(e) => {
                let _ = signaling.close().await;
                return Err(e.into());
            }
        };

        let recognizer = Arc::new(HttpRecognizer::new(
            config.recognition_url.clone(),
            config.http_timeout,
        )?);
        let generator = Arc::new(HttpTextGenerator::new(
            &config.textgen_url,
            config.http_timeout,
        )?);

        Self::start(
            session,
            transport,
            signaling,
            inbound,
            transport_rx,
            recognizer,
            generator,
        )
        .await
    }
}

impl<T, S> CallSession<T, S>
where
    T: PeerTransport + 'static,
    S: SignalSink + 'static,
{
    /// Запуск сессии на готовых транспорте и канале
    pub async fn start(
        session: Session,
        transport: T,
        signaling: S,
        inbound: InboundStream,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        recognizer: Arc<dyn Recognizer>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<AppEvent>), CallError> {
        let (events, events_rx) = EventEmitter::channel();
        let coordinator =
            NegotiationCoordinator::new(session.user.clone(), transport, signaling, events.clone());

        let mut call = Self {
            session,
            coordinator,
            pipeline: CapturePipeline::new(),
            recognizer,
            generator,
            events,
        };

        if let Err(e) = call.coordinator.join().await {
            call.coordinator.leave().await;
            return Err(e);
        }

        let span = info_span!(
            "session",
            id = %call.session.id,
            room = %call.session.room_id,
            user = %call.session.user
        );
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(call.run(cmd_rx, inbound, transport_events).instrument(span));

        Ok((
            CallHandle {
                commands: cmd_tx,
                task,
            },
            events_rx,
        ))
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inbound: InboundStream,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut grace: Option<Pin<Box<Sleep>>> = None;
        let mut signaling_open = true;

        info!("Session loop started");
        while !self.coordinator.is_closed() {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Leave) | None => break,
                    Some(cmd) => self.on_command(cmd, &done_tx),
                },
                msg = inbound.recv(), if signaling_open => match msg {
                    Some(Ok(signal)) => self.on_signal(signal).await,
                    Some(Err(e @ (SignalingError::Decode(_) | SignalingError::Unrecognized(_)))) => {
                        warn!(error = %e, "Skipping signaling message");
                    }
                    Some(Err(e)) => {
                        signaling_open = false;
                        self.coordinator.on_signaling_lost(&e.to_string());
                    }
                    None => {
                        signaling_open = false;
                        self.coordinator.on_signaling_lost("channel closed");
                    }
                },
                Some(ev) = transport_events.recv() => self.on_transport_event(ev, &mut grace).await,
                Some(done) = done_rx.recv() => self.on_completion(done),
                () = grace_elapsed(&mut grace) => {
                    grace = None;
                    warn!(grace_secs = GRACE_PERIOD.as_secs(), "Media did not recover during grace period");
                    self.events.emit(AppEvent::ConnectionFailed);
                }
            }
        }

        self.shutdown().await;
        let duration = Utc::now() - self.session.started_at;
        info!(duration_secs = duration.num_seconds(), "Session loop finished");
    }

    async fn on_signal(&mut self, signal: InboundSignal) {
        match self.coordinator.handle_signal(signal).await {
            Ok(handled) => debug!(?handled, "Signal handled"),
            Err(e) => warn!(error = %e, "Signal handling failed"),
        }
    }

    fn on_command(&mut self, cmd: Command, done: &mpsc::UnboundedSender<Completion>) {
        match cmd {
            Command::StartCapture => {
                if self.pipeline.start_capture() {
                    self.events
                        .emit(AppEvent::CaptureStateChanged(CaptureState::Collecting));
                }
            }
            Command::Frame(detection) => {
                let Some(request) = self.pipeline.on_frame(&detection) else {
                    return;
                };
                self.events
                    .emit(AppEvent::CaptureStateChanged(CaptureState::Awaiting));

                let recognizer = self.recognizer.clone();
                let done = done.clone();
                tokio::spawn(async move {
                    let result = recognizer.recognize(&request.window).await;
                    let _ = done.send(Completion::Inference {
                        ticket: request.ticket,
                        result,
                    });
                });
            }
            Command::CaptureState(reply) => {
                let _ = reply.send(self.pipeline.state());
            }
            Command::ConsumeLabels(reply) => {
                let _ = reply.send(self.pipeline.consume_labels());
            }
            Command::GenerateText(reply) => {
                let labels = self.pipeline.consume_labels();
                if labels.is_empty() {
                    let _ = reply.send(Err(ComposeError::NoLabels.into()));
                    return;
                }

                let generator = self.generator.clone();
                let done = done.clone();
                tokio::spawn(async move {
                    let result = generator.generate(&labels).await;
                    let _ = done.send(Completion::Text {
                        labels,
                        result,
                        reply,
                    });
                });
            }
            Command::Leave => {}
        }
    }

    fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Inference { ticket, result } => {
                match self.pipeline.complete_inference(ticket, result) {
                    InferenceOutcome::Recognized { label, .. } => {
                        self.events.emit(AppEvent::LabelRecognized(label));
                        self.events
                            .emit(AppEvent::CaptureStateChanged(CaptureState::Idle));
                    }
                    InferenceOutcome::Failed => {
                        self.events
                            .emit(AppEvent::CaptureStateChanged(CaptureState::Idle));
                    }
                    InferenceOutcome::Stale => {}
                }
            }
            Completion::Text {
                labels,
                result,
                reply,
            } => {
                if result.is_err() {
                    self.pipeline.restore_labels(labels);
                }
                let _ = reply.send(result.map_err(CallError::from));
            }
        }
    }

    async fn on_transport_event(&mut self, ev: TransportEvent, grace: &mut Option<Pin<Box<Sleep>>>) {
        match ev {
            TransportEvent::LocalCandidate(candidate) => {
                if let Err(e) = self.coordinator.on_local_candidate(candidate).await {
                    warn!(error = %e, "Failed to send local candidate");
                }
            }
            TransportEvent::GatheringComplete => debug!("Local candidate gathering complete"),
            TransportEvent::RemoteTrack { id, kind } => {
                self.events
                    .emit(AppEvent::RemoteStreamAvailable { id, kind });
            }
            TransportEvent::StateChanged(MediaState::Connected) => {
                if grace.take().is_some() {
                    info!("Connection recovered during grace period");
                    self.events.emit(AppEvent::ConnectionRecovered);
                }
                self.events.emit(AppEvent::MediaConnected);
            }
            TransportEvent::StateChanged(MediaState::Disconnected | MediaState::Failed) => {
                // таймер уже идёт
                if grace.is_none() {
                    warn!("Media connection degraded, starting grace period");
                    self.events.emit(AppEvent::ConnectionProblem);
                    *grace = Some(Box::pin(sleep(GRACE_PERIOD)));
                }
            }
            TransportEvent::StateChanged(MediaState::Closed) => {
                *grace = None;
            }
            TransportEvent::StateChanged(state) => debug!(?state, "Media state"),
        }
    }

    async fn shutdown(&mut self) {
        // незавершённое окно не распознаётся
        if self.pipeline.state() != CaptureState::Idle {
            self.pipeline.discard();
            self.events
                .emit(AppEvent::CaptureStateChanged(CaptureState::Idle));
        }
        self.coordinator.leave().await;
    }
}

async fn grace_elapsed(grace: &mut Option<Pin<Box<Sleep>>>) {
    match grace.as_mut() {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
