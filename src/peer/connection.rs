use crate::config::DEFAULT_ICE_SERVERS;
use crate::error::TransportError;
use crate::logger::{dump_candidate, dump_selected_pair};
use crate::peer::ice::analyze_candidates;
use crate::peer::transport::{MediaState, PeerTransport, TransportEvent};
use crate::peer::types::{IceCandidate, SdpKind, ServerConfig, SessionDescription};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;
use webrtc::{
    api::APIBuilder,
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
};

/// Peer connection на webrtc-rs.
///
/// Колбэки соединения не трогают состояние сессии напрямую: всё уходит
/// в канал `TransportEvent`, который читает цикл сессии.
pub struct RtcTransport {
    pc: Arc<RTCPeerConnection>,
    closed: AtomicBool,
}

impl RtcTransport {
    /// создаём Peer с аудио и видео трансиверами
    pub async fn new(
        ice_servers: &[ServerConfig],
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(ice_servers)).await?);

        // Локальные кандидаты уходят в сигнальный канал сразу, без буфера;
        // копию держим только для итоговой сводки
        let gathered: Arc<Mutex<Vec<IceCandidate>>> = Arc::default();
        let cand_tx = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let tx = cand_tx.clone();
            let gathered = gathered.clone();
            Box::pin(async move {
                let Some(c) = cand else {
                    // cand == None означает конец сбора
                    debug!("ICE candidate gathering completed (null candidate received)");
                    let all = std::mem::take(&mut *gathered.lock().await);
                    analyze_candidates(&all);
                    let _ = tx.send(TransportEvent::GatheringComplete);
                    return;
                };

                dump_candidate("LOCAL", &c);
                match c.to_json() {
                    Ok(init) => {
                        let candidate = IceCandidate::from(init);
                        gathered.lock().await.push(candidate.clone());
                        let _ = tx.send(TransportEvent::LocalCandidate(candidate));
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize local candidate"),
                }
            })
        }));

        pc.on_ice_gathering_state_change(Box::new(move |state| {
            debug!(?state, "ICE gathering state changed");
            Box::pin(async {})
        }));

        let track_tx = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let id = track.id();
                let kind = track.kind().to_string();
                info!(%id, %kind, "Remote track arrived");
                let _ = track_tx.send(TransportEvent::RemoteTrack { id, kind });
                Box::pin(async {})
            },
        ));

        // делаем копию для обработчика состояний
        let pc_state = Arc::downgrade(&pc);
        let state_tx = events;
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            debug!(state = ?st, "Peer connection state changed");

            if st == RTCPeerConnectionState::Failed {
                if let Some(pc) = pc_state.upgrade() {
                    tokio::spawn(async move {
                        dump_selected_pair(&pc, "BEFORE-FAIL").await;
                    });
                }
            }

            if let Some(state) = media_state(st) {
                let _ = state_tx.send(TransportEvent::StateChanged(state));
            }
            Box::pin(async {})
        }));

        pc.add_transceiver_from_kind(RTPCodecType::Audio, None).await?;
        pc.add_transceiver_from_kind(RTPCodecType::Video, None).await?;

        Ok(Self {
            pc,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.ensure_open()?;
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| TransportError::Create {
                kind: "offer",
                reason: e.to_string(),
            })?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.ensure_open()?;
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| TransportError::Create {
                kind: "answer",
                reason: e.to_string(),
            })?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.ensure_open()?;
        let rtc = to_rtc(desc, "local")?;
        self.pc
            .set_local_description(rtc)
            .await
            .map_err(|e| TransportError::Describe {
                side: "local",
                reason: e.to_string(),
            })
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let rtc = to_rtc(desc, "remote")?;
        self.pc
            .set_remote_description(rtc)
            .await
            .map_err(|e| TransportError::Describe {
                side: "remote",
                reason: e.to_string(),
            })
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| TransportError::Candidate(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing peer connection");
        self.pc.close().await?;
        Ok(())
    }
}

impl Drop for RtcTransport {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // выход без leave(): закрываем соединение в фоне, если рантайм ещё жив
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let pc = self.pc.clone();
            handle.spawn(async move {
                if let Err(e) = pc.close().await {
                    warn!(error = %e, "Failed to close dropped peer connection");
                }
            });
        }
    }
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(c: IceCandidate) -> Self {
        RTCIceCandidateInit {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_mline_index,
            username_fragment: c.username_fragment,
        }
    }
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        other => {
            return Err(TransportError::Create {
                kind: "description",
                reason: format!("unsupported sdp type {other}"),
            })
        }
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

fn to_rtc(desc: SessionDescription, side: &'static str) -> Result<RTCSessionDescription, TransportError> {
    let parsed = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| TransportError::Describe {
        side,
        reason: e.to_string(),
    })
}

fn media_state(st: RTCPeerConnectionState) -> Option<MediaState> {
    match st {
        RTCPeerConnectionState::New => Some(MediaState::New),
        RTCPeerConnectionState::Connecting => Some(MediaState::Connecting),
        RTCPeerConnectionState::Connected => Some(MediaState::Connected),
        RTCPeerConnectionState::Disconnected => Some(MediaState::Disconnected),
        RTCPeerConnectionState::Failed => Some(MediaState::Failed),
        RTCPeerConnectionState::Closed => Some(MediaState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}

/// Создает конфигурацию для peer connection
fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    let ice_servers = if servers.is_empty() {
        get_user_ice_servers(&DEFAULT_ICE_SERVERS)
    } else {
        get_user_ice_servers(servers)
    };

    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

/// Перевод конфигурации серверов в формат webrtc-rs
pub fn get_user_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_credentials_are_carried_over() {
        let servers = vec![ServerConfig {
            id: "turn".into(),
            r#type: "turn".into(),
            url: "turn.example.org:3478".into(),
            username: Some("u".into()),
            credential: Some("p".into()),
        }];
        let rtc = get_user_ice_servers(&servers);
        assert_eq!(rtc[0].urls, vec!["turn:turn.example.org:3478".to_string()]);
        assert_eq!(rtc[0].username, "u");
        assert_eq!(rtc[0].credential, "p");
    }

    #[test]
    fn empty_server_list_falls_back_to_defaults() {
        let config = rtc_config(&[]);
        assert_eq!(config.ice_servers.len(), DEFAULT_ICE_SERVERS.len());
    }

    #[test]
    fn candidate_conversion_keeps_fields() {
        let c = IceCandidate {
            candidate: "candidate:1 1 udp 1 10.0.0.1 5000 typ host".into(),
            sdp_mid: Some("1".into()),
            sdp_mline_index: Some(1),
            username_fragment: Some("frag".into()),
        };
        let init: RTCIceCandidateInit = c.clone().into();
        assert_eq!(IceCandidate::from(init), c);
    }
}
