use std::time::Duration;

/// Роль участника в паре
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unassigned,
    Offerer,
    Answerer,
}

/// Фаза согласования одного peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveRemoteAnswer,
    Connected,
    Closed,
}

/// Почему событие было проигнорировано
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Сессия уже закрыта
    SessionClosed,
    /// Ростер не из двух участников
    RosterSize,
    /// Оффер делает другой участник
    NotFirst,
    /// Local description уже установлен
    AlreadyNegotiating,
    /// Мы сами offerer (glare)
    Glare,
    /// Answer пришёл вне HaveLocalOffer
    UnexpectedAnswer,
    /// Событие о нас самих
    SelfEvent,
}

/// Результат обработки входящего события
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    Queued,
    Ignored(IgnoreReason),
}

/// Состояние согласования: роль, фаза и флаги описаний
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiationState {
    pub role: Role,
    pub phase: Phase,
    pub has_local_description: bool,
    pub has_remote_description: bool,
}

impl NegotiationState {
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Должны ли мы создать offer для данного ростера.
    ///
    /// Только ростер ровно из двух имён, только первый по лексикографическому
    /// порядку, и только пока local description не установлен.
    pub fn should_offer(&self, local: &str, roster: &[String]) -> Result<(), IgnoreReason> {
        if self.is_closed() {
            return Err(IgnoreReason::SessionClosed);
        }
        if roster.len() != 2 {
            return Err(IgnoreReason::RosterSize);
        }
        let first = roster.iter().min().map(String::as_str);
        if first != Some(local) {
            return Err(IgnoreReason::NotFirst);
        }
        if self.has_local_description || self.role != Role::Unassigned {
            return Err(IgnoreReason::AlreadyNegotiating);
        }
        Ok(())
    }

    pub fn accepts_offer(&self) -> Result<(), IgnoreReason> {
        match (self.role, self.phase) {
            (_, Phase::Closed) => Err(IgnoreReason::SessionClosed),
            (Role::Offerer, _) => Err(IgnoreReason::Glare),
            (_, Phase::Idle) if !self.has_local_description => Ok(()),
            _ => Err(IgnoreReason::AlreadyNegotiating),
        }
    }

    pub fn accepts_answer(&self) -> Result<(), IgnoreReason> {
        match self.phase {
            Phase::HaveLocalOffer => Ok(()),
            Phase::Closed => Err(IgnoreReason::SessionClosed),
            _ => Err(IgnoreReason::UnexpectedAnswer),
        }
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }
}

// ========== CONSTANTS ==========

/// Период ожидания перед тем, как считать медиа-соединение потерянным
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);
