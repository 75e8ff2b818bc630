// Конфигурация приложения
// Логирование можно отключить только в режиме разработки

use crate::error::ConfigError;
use crate::peer::types::ServerConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене логирование отключено

// Дополнительные настройки для режима разработки
#[cfg(debug_assertions)]
pub mod dev {
    // Для полного отключения логирования в режиме разработки
    // измените эту константу на false
    pub const ENABLE_LOGGING: bool = true;
    pub const DEFAULT_FILTER: &str = "hamon=debug,hamon_lib=debug,webrtc=warn";
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
    pub const DEFAULT_FILTER: &str = "hamon=info,hamon_lib=info,webrtc=error";
}

/// Публичные STUN серверы, если пользователь не задал свои
pub static DEFAULT_ICE_SERVERS: Lazy<Vec<ServerConfig>> = Lazy::new(|| {
    vec![
        ServerConfig {
            id: "default-stun".into(),
            r#type: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-1".into(),
            r#type: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
});

pub const DEFAULT_SIGNALING_URL: &str = "ws://localhost:8000";
pub const DEFAULT_RECOGNITION_URL: &str = "http://localhost:8000/predict";
pub const DEFAULT_TEXTGEN_URL: &str = "http://localhost:11434";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Адреса внешних сервисов и ICE серверы
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// База сигнального сервера; комната добавляется как `ws/<room>`
    pub signaling_url: Url,
    /// POST сюда уходит окно из 30 кадров
    pub recognition_url: Url,
    /// База сервиса генерации текста (`<base>/chat`)
    pub textgen_url: Url,
    pub ice_servers: Vec<ServerConfig>,
    #[serde(with = "secs")]
    pub http_timeout: Duration,
}

impl Config {
    /// Конфигурация без переменных окружения
    pub fn defaults() -> Result<Self, ConfigError> {
        Ok(Self {
            signaling_url: parse_url("signaling url", DEFAULT_SIGNALING_URL)?,
            recognition_url: parse_url("recognition url", DEFAULT_RECOGNITION_URL)?,
            textgen_url: parse_url("textgen url", DEFAULT_TEXTGEN_URL)?,
            ice_servers: DEFAULT_ICE_SERVERS.clone(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// Читает конфигурацию из переменных окружения `HAMON_*`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// То же, что `from_env`, но с произвольным источником значений
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::defaults()?;

        if let Some(v) = lookup("HAMON_SIGNALING_URL") {
            config.signaling_url = parse_url("HAMON_SIGNALING_URL", &v)?;
        }
        if let Some(v) = lookup("HAMON_RECOGNITION_URL") {
            config.recognition_url = parse_url("HAMON_RECOGNITION_URL", &v)?;
        }
        if let Some(v) = lookup("HAMON_TEXTGEN_URL") {
            config.textgen_url = parse_url("HAMON_TEXTGEN_URL", &v)?;
        }
        if let Some(v) = lookup("HAMON_HTTP_TIMEOUT_SECS") {
            let secs: u64 = v.parse().map_err(|_| ConfigError::Value {
                name: "HAMON_HTTP_TIMEOUT_SECS",
                value: v.clone(),
            })?;
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(url) = lookup("HAMON_TURN_URL") {
            config.ice_servers.push(ServerConfig {
                id: "turn".into(),
                r#type: "turn".into(),
                url,
                username: lookup("HAMON_TURN_USERNAME"),
                credential: lookup("HAMON_TURN_CREDENTIAL"),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Валидация серверов
    pub fn validate(&self) -> Result<(), ConfigError> {
        for server in &self.ice_servers {
            if server.url.is_empty() {
                return Err(ConfigError::Value {
                    name: "ice server url",
                    value: server.id.clone(),
                });
            }
            if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none())
            {
                return Err(ConfigError::TurnCredentials(server.url.clone()));
            }
        }
        Ok(())
    }

    /// URL комнаты на сигнальном сервере: `<base>/ws/<room>`
    pub fn room_url(&self, room_id: &str) -> Result<Url, ConfigError> {
        let mut url = self.signaling_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::Value {
                name: "HAMON_SIGNALING_URL",
                value: self.signaling_url.to_string(),
            })?
            .pop_if_empty()
            .push("ws")
            .push(room_id);
        Ok(url)
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::Url { name, source })
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::defaults().unwrap());
        assert_eq!(config.ice_servers.len(), 2);
    }

    #[test]
    fn built_in_urls_parse() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.signaling_url.as_str(), "ws://localhost:8000/");
        assert_eq!(config.recognition_url.path(), "/predict");
        assert_eq!(config.textgen_url.port(), Some(11434));
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn turn_requires_credentials() {
        let err = Config::from_lookup(lookup(&[("HAMON_TURN_URL", "turn:relay.example.org")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TurnCredentials(_)));

        let config = Config::from_lookup(lookup(&[
            ("HAMON_TURN_URL", "turn:relay.example.org"),
            ("HAMON_TURN_USERNAME", "user"),
            ("HAMON_TURN_CREDENTIAL", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.ice_servers.len(), 3);
    }

    #[test]
    fn room_url_appends_path() {
        let config = Config::from_lookup(lookup(&[(
            "HAMON_SIGNALING_URL",
            "wss://relay.example.org/",
        )]))
        .unwrap();
        assert_eq!(
            config.room_url("lobby").unwrap().as_str(),
            "wss://relay.example.org/ws/lobby"
        );
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = Config::from_lookup(lookup(&[("HAMON_HTTP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }
}
