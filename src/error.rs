//! Типы ошибок клиента звонка.
//!
//! У каждой подсистемы свой enum; наружу сессия отдаёт [`CallError`].

/// Ошибки медиа-транспорта (создание/установка описаний, кандидаты)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Не удалось создать offer или answer
    #[error("failed to create {kind}: {reason}")]
    Create {
        /// "offer" или "answer"
        kind: &'static str,
        /// Сообщение транспорта
        reason: String,
    },

    /// Не удалось установить local/remote description
    #[error("failed to set {side} description: {reason}")]
    Describe {
        /// "local" или "remote"
        side: &'static str,
        /// Сообщение транспорта
        reason: String,
    },

    /// Транспорт отклонил ICE кандидат
    #[error("candidate rejected: {0}")]
    Candidate(String),

    /// Не удалось собрать peer connection
    #[error("peer connection setup failed: {0}")]
    Setup(String),

    /// Транспорт уже освобождён
    #[error("transport closed")]
    Closed,
}

impl From<webrtc::Error> for TransportError {
    fn from(err: webrtc::Error) -> Self {
        TransportError::Setup(err.to_string())
    }
}

/// Ошибки сигнального канала
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("invalid signaling url: {0}")]
    Url(#[from] url::ParseError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed signaling message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Корректный JSON, но неизвестной формы
    #[error("unrecognized signaling message: {0}")]
    Unrecognized(String),

    #[error("signaling channel closed")]
    Closed,
}

/// Ошибки сервиса распознавания
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("recognition request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("recognition endpoint returned {status}")]
    Status {
        /// HTTP статус
        status: u16,
    },

    /// В распознавание попало окно неверной длины
    #[error("window has {0} frames, expected 30")]
    WindowLength(usize),
}

/// Ошибки генерации текста
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("no recognized labels to compose")]
    NoLabels,

    #[error("text generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text generation endpoint returned {status}: {body}")]
    Status {
        /// HTTP статус
        status: u16,
        /// Тело ответа для диагностики
        body: String,
    },
}

/// Некорректная конфигурация
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid url for {name}: {source}")]
    Url {
        /// Имя параметра
        name: &'static str,
        /// Ошибка разбора
        source: url::ParseError,
    },

    #[error("TURN server {0} requires username and credential")]
    TurnCredentials(String),

    #[error("invalid value for {name}: {value}")]
    Value {
        /// Имя параметра
        name: &'static str,
        /// Значение
        value: String,
    },
}

/// Ошибка верхнего уровня, которую видит приложение
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("signaling error: {0}")]
    Signaling(#[from] SignalingError),

    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("compose error: {0}")]
    Compose(#[from] ComposeError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Цикл событий сессии уже остановлен
    #[error("session has ended")]
    SessionEnded,
}
