use crate::capture::frame::{HandDetection, LandmarkFrame};
use crate::capture::labels::LabelSet;
use crate::capture::recognizer::Prediction;
use crate::capture::window::CaptureWindow;
use crate::error::InferenceError;
use tracing::{debug, info, warn};

/// Состояние захвата
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Окно открыто, кадры добавляются
    Collecting,
    /// Окно отправлено, ждём ответа распознавания
    Awaiting,
}

/// Полное окно, готовое к отправке. `ticket` связывает ответ с запросом.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub ticket: u64,
    pub window: Vec<LandmarkFrame>,
}

/// Чем закончилась обработка ответа распознавания
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceOutcome {
    /// `fresh == false`, если слово уже было в наборе
    Recognized { label: String, fresh: bool },
    Failed,
    /// Ответ на запрос, который уже не актуален (leave или сброс)
    Stale,
}

/// Захват жестов: окно из 30 кадров, один запрос распознавания на окно.
///
/// Активация только по `start_capture`; кадры сами по себе окно не открывают.
/// Тридцатый кадр переводит захват в `Awaiting` ещё до отправки запроса,
/// поэтому кадры, пришедшие до ответа, повторно его не запустят.
#[derive(Debug, Default)]
pub struct CapturePipeline {
    state: CaptureState,
    window: CaptureWindow,
    labels: LabelSet,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Открывает новое окно. `false`, если захват уже идёт.
    pub fn start_capture(&mut self) -> bool {
        if self.state != CaptureState::Idle {
            debug!(state = ?self.state, "start_capture ignored, capture already active");
            return false;
        }
        self.window.clear();
        self.state = CaptureState::Collecting;
        info!("Capture started");
        true
    }

    /// Один вызов на кадр детектора.
    ///
    /// Возвращает запрос ровно тогда, когда кадр заполнил окно.
    pub fn on_frame(&mut self, detection: &HandDetection) -> Option<InferenceRequest> {
        if self.state != CaptureState::Collecting {
            return None;
        }

        self.window.push(LandmarkFrame::from_detection(detection));
        if !self.window.is_full() {
            return None;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight = Some(ticket);
        self.state = CaptureState::Awaiting;
        info!(ticket, "Capture window complete, dispatching inference");

        Some(InferenceRequest {
            ticket,
            window: self.window.take(),
        })
    }

    /// Принимает ответ распознавания. Любой исход возвращает захват в `Idle`.
    pub fn complete_inference(
        &mut self,
        ticket: u64,
        result: Result<Prediction, InferenceError>,
    ) -> InferenceOutcome {
        if self.in_flight != Some(ticket) {
            debug!(ticket, "Dropping stale inference result");
            return InferenceOutcome::Stale;
        }

        self.in_flight = None;
        self.window.clear();
        self.state = CaptureState::Idle;

        match result {
            Ok(prediction) => {
                let fresh = self.labels.insert(prediction.label.clone());
                info!(
                    label = %prediction.label,
                    confidence = ?prediction.confidence,
                    fresh,
                    "Label recognized"
                );
                InferenceOutcome::Recognized {
                    label: prediction.label,
                    fresh,
                }
            }
            Err(e) => {
                warn!(error = %e, ticket, "Prediction request failed");
                InferenceOutcome::Failed
            }
        }
    }

    /// Отдаёт накопленные слова в порядке появления и очищает набор
    pub fn consume_labels(&mut self) -> Vec<String> {
        self.labels.consume()
    }

    /// Возвращает слова, которые не удалось использовать
    pub fn restore_labels(&mut self, labels: Vec<String>) {
        self.labels.restore(labels);
    }

    /// Сбрасывает незавершённое окно без распознавания.
    ///
    /// Ответ на уже отправленный запрос после этого будет отброшен.
    pub fn discard(&mut self) {
        if !self.window.is_empty() {
            debug!(frames = self.window.len(), "Discarding partial capture window");
        }
        self.window.clear();
        self.in_flight = None;
        self.state = CaptureState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Landmark;
    use crate::capture::window::WINDOW_LEN;

    fn detection() -> HandDetection {
        HandDetection::right_only(vec![Landmark::default(); 21])
    }

    fn ok(label: &str) -> Result<Prediction, InferenceError> {
        Ok(Prediction {
            label: label.into(),
            confidence: None,
        })
    }

    fn fill(p: &mut CapturePipeline, n: usize) -> Option<InferenceRequest> {
        let mut req = None;
        for _ in 0..n {
            if let Some(r) = p.on_frame(&detection()) {
                assert!(req.is_none(), "second request from one window");
                req = Some(r);
            }
        }
        req
    }

    #[test]
    fn frames_are_ignored_until_started() {
        let mut p = CapturePipeline::new();
        assert!(fill(&mut p, 40).is_none());
        assert_eq!(p.window_len(), 0);
    }

    #[test]
    fn thirtieth_frame_triggers_exactly_once() {
        let mut p = CapturePipeline::new();
        assert!(p.start_capture());
        assert!(fill(&mut p, WINDOW_LEN - 1).is_none());
        let req = p.on_frame(&detection()).unwrap();
        assert_eq!(req.window.len(), WINDOW_LEN);
        assert_eq!(p.state(), CaptureState::Awaiting);

        // кадры до ответа не запускают второй запрос
        assert!(fill(&mut p, 10).is_none());
        assert_eq!(p.window_len(), 0);
    }

    #[test]
    fn start_is_noop_while_active() {
        let mut p = CapturePipeline::new();
        assert!(p.start_capture());
        fill(&mut p, 5);
        assert!(!p.start_capture());
        assert_eq!(p.window_len(), 5);
    }

    #[test]
    fn failure_resets_capture() {
        let mut p = CapturePipeline::new();
        p.start_capture();
        let req = fill(&mut p, WINDOW_LEN).unwrap();
        let outcome = p.complete_inference(req.ticket, Err(InferenceError::Status { status: 500 }));
        assert_eq!(outcome, InferenceOutcome::Failed);
        assert_eq!(p.state(), CaptureState::Idle);
        assert!(p.labels().is_empty());
        assert!(p.start_capture());
    }

    #[test]
    fn repeated_labels_are_deduplicated() {
        let mut p = CapturePipeline::new();
        for label in ["hello", "thanks", "hello"] {
            p.start_capture();
            let req = fill(&mut p, WINDOW_LEN).unwrap();
            p.complete_inference(req.ticket, ok(label));
        }
        assert_eq!(p.consume_labels(), vec!["hello", "thanks"]);
        assert!(p.consume_labels().is_empty());
    }

    #[test]
    fn results_after_discard_are_dropped() {
        let mut p = CapturePipeline::new();
        p.start_capture();
        let req = fill(&mut p, WINDOW_LEN).unwrap();
        p.discard();
        assert_eq!(p.complete_inference(req.ticket, ok("late")), InferenceOutcome::Stale);
        assert!(p.labels().is_empty());
    }
}
