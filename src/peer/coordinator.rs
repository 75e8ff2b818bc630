//! Согласование одного peer connection через сигнальный сервер.
//!
//! Роль offerer получает первый по алфавиту участник пары; входящий offer
//! у offerer игнорируется (glare без rollback). Кандидаты, пришедшие до
//! remote description, копятся в очереди и применяются один раз сразу
//! после его установки.

use crate::error::{CallError, SignalingError, TransportError};
use crate::events::{AppEvent, EventEmitter};
use crate::peer::ice::CandidateQueue;
use crate::peer::state::{Handled, IgnoreReason, NegotiationState, Phase, Role};
use crate::peer::transport::PeerTransport;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::signaling::{InboundSignal, OutboundSignal, SignalSink};
use tracing::{debug, error, info, warn};

pub struct NegotiationCoordinator<T: PeerTransport, S: SignalSink> {
    local: String,
    transport: Option<T>,
    signaling: Option<S>,
    state: NegotiationState,
    pending: CandidateQueue,
    roster: Vec<String>,
    events: EventEmitter,
}

impl<T: PeerTransport, S: SignalSink> NegotiationCoordinator<T, S> {
    /// Координатор забирает транспорт и канал во владение до `leave()`
    pub fn new(local: impl Into<String>, transport: T, signaling: S, events: EventEmitter) -> Self {
        Self {
            local: local.into(),
            transport: Some(transport),
            signaling: Some(signaling),
            state: NegotiationState::default(),
            pending: CandidateQueue::new(),
            roster: Vec::new(),
            events,
        }
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Объявляет участника в комнате: `{type: join, user}`
    pub async fn join(&mut self) -> Result<(), CallError> {
        info!(user = %self.local, "Joining room");
        self.transmit(OutboundSignal::Join {
            user: self.local.clone(),
        })
        .await
    }

    /// Разбор входящего сообщения по обработчикам
    pub async fn handle_signal(&mut self, signal: InboundSignal) -> Result<Handled, CallError> {
        match signal {
            InboundSignal::UserList(users) => self.on_roster_update(users).await,
            InboundSignal::Offer(desc) => self.on_offer(desc).await,
            InboundSignal::Answer(desc) => self.on_answer(desc).await,
            InboundSignal::Candidate(c) => Ok(self.on_remote_candidate(c).await),
            InboundSignal::Left(user) => Ok(self.on_peer_left(&user)),
        }
    }

    /// Полный ростер комнаты. Offer создаёт только первый по алфавиту из двух.
    pub async fn on_roster_update(&mut self, names: Vec<String>) -> Result<Handled, CallError> {
        if self.is_closed() {
            return Ok(Handled::Ignored(IgnoreReason::SessionClosed));
        }

        debug!(roster = ?names, "Roster update");
        self.roster = names.clone();
        self.events.emit(AppEvent::RosterChanged(names));

        if let Err(reason) = self.state.should_offer(&self.local, &self.roster) {
            debug!(?reason, "No offer for this roster");
            return Ok(Handled::Ignored(reason));
        }

        // роль фиксируется до первого await: повторный ростер уже не пройдёт
        self.state.role = Role::Offerer;
        info!("Creating offer...");

        let offer = match self.transport()?.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return self.fail(e).await,
        };
        if let Err(e) = self.transport()?.set_local_description(offer.clone()).await {
            return self.fail(e).await;
        }
        self.state.has_local_description = true;
        self.state.phase = Phase::HaveLocalOffer;

        self.transmit(OutboundSignal::Description(offer)).await?;
        Ok(Handled::Applied)
    }

    pub async fn on_offer(&mut self, offer: SessionDescription) -> Result<Handled, CallError> {
        if let Err(reason) = self.state.accepts_offer() {
            warn!(?reason, role = ?self.state.role, "Ignoring incoming offer");
            return Ok(Handled::Ignored(reason));
        }

        self.state.role = Role::Answerer;
        info!("Setting remote description (offer)...");
        if let Err(e) = self.transport()?.set_remote_description(offer).await {
            return self.fail(e).await;
        }
        self.state.has_remote_description = true;
        self.state.phase = Phase::HaveRemoteOffer;
        self.apply_pending_candidates().await;

        info!("Creating answer...");
        let answer = match self.transport()?.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return self.fail(e).await,
        };
        if let Err(e) = self.transport()?.set_local_description(answer.clone()).await {
            return self.fail(e).await;
        }
        self.state.has_local_description = true;
        self.state.phase = Phase::Connected;

        self.transmit(OutboundSignal::Description(answer)).await?;
        self.events.emit(AppEvent::NegotiationComplete);
        Ok(Handled::Applied)
    }

    pub async fn on_answer(&mut self, answer: SessionDescription) -> Result<Handled, CallError> {
        if let Err(reason) = self.state.accepts_answer() {
            warn!(?reason, phase = ?self.state.phase, "Ignoring incoming answer");
            return Ok(Handled::Ignored(reason));
        }

        info!("Setting remote description (answer)...");
        if let Err(e) = self.transport()?.set_remote_description(answer).await {
            return self.fail(e).await;
        }
        self.state.has_remote_description = true;
        self.state.phase = Phase::HaveRemoteAnswer;
        self.apply_pending_candidates().await;

        self.state.phase = Phase::Connected;
        self.events.emit(AppEvent::NegotiationComplete);
        Ok(Handled::Applied)
    }

    /// Если remote description уже установлен, применяем кандидат сразу,
    /// иначе кладём в очередь
    pub async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Handled {
        if self.is_closed() {
            return Handled::Ignored(IgnoreReason::SessionClosed);
        }
        if !self.state.has_remote_description {
            self.pending.push(candidate);
            return Handled::Queued;
        }
        self.apply_candidate(candidate).await;
        Handled::Applied
    }

    /// Локальный кандидат уходит в сигнальный канал сразу
    pub async fn on_local_candidate(&mut self, candidate: IceCandidate) -> Result<Handled, CallError> {
        if self.is_closed() {
            return Ok(Handled::Ignored(IgnoreReason::SessionClosed));
        }
        self.transmit(OutboundSignal::Candidate(candidate)).await?;
        Ok(Handled::Applied)
    }

    /// Собеседник вышел. Локальный транспорт не закрываем: это решает человек.
    pub fn on_peer_left(&mut self, name: &str) -> Handled {
        if name == self.local {
            return Handled::Ignored(IgnoreReason::SelfEvent);
        }
        info!(user = %name, "Peer left the room");
        self.roster.retain(|n| n != name);
        self.events.emit(AppEvent::RemoteStreamRemoved);
        self.events.emit(AppEvent::PeerLeft(name.to_string()));
        Handled::Applied
    }

    /// Сигнальный канал потерян. Уже установленное медиа продолжает работать.
    pub fn on_signaling_lost(&mut self, reason: &str) {
        warn!(%reason, phase = ?self.state.phase, "Signaling channel lost");
        self.events.emit(AppEvent::SignalingLost(reason.to_string()));
    }

    /// Объявляет уход и освобождает peer connection и канал
    pub async fn leave(&mut self) {
        if self.transport.is_none() && self.signaling.is_none() {
            return;
        }
        info!(user = %self.local, "Leaving call");

        if let Some(sig) = &self.signaling {
            let msg = OutboundSignal::Leave {
                user: self.local.clone(),
            };
            if let Err(e) = sig.send(msg).await {
                debug!(error = %e, "Leave announcement not delivered");
            }
        }

        self.state.close();
        self.pending.clear();
        self.release().await;
        self.events.emit(AppEvent::Left);
    }

    fn transport(&self) -> Result<&T, TransportError> {
        self.transport.as_ref().ok_or(TransportError::Closed)
    }

    async fn transmit(&self, msg: OutboundSignal) -> Result<(), CallError> {
        let sig = self.signaling.as_ref().ok_or(SignalingError::Closed)?;
        sig.send(msg).await?;
        Ok(())
    }

    /// Применяет все отложенные кандидаты после установки remote description
    async fn apply_pending_candidates(&mut self) {
        let candidates = self.pending.drain();
        if !candidates.is_empty() {
            info!(count = candidates.len(), "Applying pending candidates");
        }
        for candidate in candidates {
            self.apply_candidate(candidate).await;
        }
    }

    // Отказ транспорта на кандидате не фатален: дубликаты отклоняются молча
    async fn apply_candidate(&self, candidate: IceCandidate) {
        let Some(transport) = self.transport.as_ref() else {
            return;
        };
        debug!(candidate = %candidate.candidate, "Applying remote candidate");
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            debug!(error = %e, "Candidate rejected by transport");
        }
    }

    async fn fail(&mut self, err: TransportError) -> Result<Handled, CallError> {
        error!(error = %err, "Negotiation failed, closing session");
        self.state.close();
        self.pending.clear();
        self.release().await;
        self.events.emit(AppEvent::NegotiationFailed(err.to_string()));
        Err(err.into())
    }

    async fn release(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!(error = %e, "Failed to close peer connection");
            }
        }
        if let Some(sig) = self.signaling.take() {
            if let Err(e) = sig.close().await {
                warn!(error = %e, "Failed to close signaling channel");
            }
        }
    }
}
