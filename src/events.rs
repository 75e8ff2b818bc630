use crate::capture::CaptureState;
use tokio::sync::mpsc;
use tracing::debug;

/// События для UI-слоя. Подписчику не нужны детали транспорта.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    RosterChanged(Vec<String>),
    RemoteStreamAvailable { id: String, kind: String },
    RemoteStreamRemoved,
    PeerLeft(String),
    LabelRecognized(String),
    CaptureStateChanged(CaptureState),
    /// Согласование завершено с нашей стороны
    NegotiationComplete,
    NegotiationFailed(String),
    MediaConnected,
    ConnectionProblem,
    ConnectionRecovered,
    ConnectionFailed,
    SignalingLost(String),
    Left,
}

/// Отправитель событий приложения.
///
/// Закрытый приёмник не ошибка: UI мог уже уйти со страницы.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: AppEvent) {
        debug!(?event, "emit");
        let _ = self.tx.send(event);
    }
}
