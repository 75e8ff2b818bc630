//! Воспроизведение записанных кадров детектора через запущенную сессию.
//!
//! Захват включается локально: один раз в начале и снова после каждого
//! возврата в `Idle`. Сами кадры захват не включают.

use crate::capture::{CaptureState, HandDetection};
use crate::error::CallError;
use crate::events::AppEvent;
use crate::session::CallHandle;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Чем закончилось воспроизведение
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayEnd {
    /// Кадры кончились, последнее распознавание завершено
    Finished,
    /// Сессия закрылась раньше
    SessionEnded,
}

/// Читает JSON-lines файл и отдаёт кадры с паузой `interval`
pub async fn read_frames(
    path: &Path,
    interval: Duration,
    frames: mpsc::UnboundedSender<HandDetection>,
) -> std::io::Result<()> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut count = 0usize;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HandDetection>(&line) {
            Ok(detection) => {
                if frames.send(detection).is_err() {
                    break;
                }
                count += 1;
            }
            Err(e) => warn!(error = %e, "Skipping malformed replay line"),
        }
        tokio::time::sleep(interval).await;
    }
    info!(frames = count, path = %path.display(), "Replay file exhausted");
    Ok(())
}

/// Прогоняет кадры через сессию, пока они не кончатся.
///
/// Окно, отправленное на распознавание до конца кадров, дожидается
/// ответа; незавершённое окно остаётся и сбросится при выходе.
pub async fn drive<F>(
    call: &CallHandle,
    events: &mut mpsc::UnboundedReceiver<AppEvent>,
    frames: &mut mpsc::UnboundedReceiver<HandDetection>,
    on_event: F,
) -> Result<ReplayEnd, CallError>
where
    F: FnMut(&AppEvent),
{
    match pump(call, events, frames, on_event).await {
        Err(CallError::SessionEnded) => Ok(ReplayEnd::SessionEnded),
        other => other,
    }
}

async fn pump<F>(
    call: &CallHandle,
    events: &mut mpsc::UnboundedReceiver<AppEvent>,
    frames: &mut mpsc::UnboundedReceiver<HandDetection>,
    mut on_event: F,
) -> Result<ReplayEnd, CallError>
where
    F: FnMut(&AppEvent),
{
    call.start_capture()?;
    let mut draining = false;

    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(AppEvent::Left) | None => return Ok(ReplayEnd::SessionEnded),
                Some(ev) => {
                    on_event(&ev);
                    if ev == AppEvent::CaptureStateChanged(CaptureState::Idle) {
                        if draining {
                            return Ok(ReplayEnd::Finished);
                        }
                        call.start_capture()?;
                    }
                }
            },
            frame = frames.recv(), if !draining => match frame {
                Some(detection) => call.frame(detection)?,
                None => {
                    // команды сессии упорядочены: состояние учитывает все кадры
                    if call.capture_state().await? != CaptureState::Awaiting {
                        return Ok(ReplayEnd::Finished);
                    }
                    debug!("Replay finished, waiting for the last recognition");
                    draining = true;
                }
            },
        }
    }
}

/// Пересылает события подписчику, пока сессия не закроется
pub async fn watch<F>(events: &mut mpsc::UnboundedReceiver<AppEvent>, mut on_event: F)
where
    F: FnMut(&AppEvent),
{
    while let Some(ev) = events.recv().await {
        if ev == AppEvent::Left {
            break;
        }
        on_event(&ev);
    }
}
