use crate::error::TransportError;
use crate::peer::types::{IceCandidate, SessionDescription};
use async_trait::async_trait;

/// Состояние медиа-соединения, как его видит транспорт
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// События, которые транспорт поднимает в цикл сессии
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Новый локальный кандидат (Trickle-ICE)
    LocalCandidate(IceCandidate),
    /// Сбор кандидатов завершён
    GatheringComplete,
    /// Пришёл удалённый медиа-трек
    RemoteTrack { id: String, kind: String },
    StateChanged(MediaState),
}

/// Peer connection, которым владеет одна сессия.
///
/// Реализации не хранят состояние согласования: роль и фазу ведёт
/// координатор.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// Освобождает соединение; повторный вызов ничего не делает
    async fn close(&self) -> Result<(), TransportError>;
}
