use crate::capture::frame::LandmarkFrame;

/// Кадров в одном окне распознавания
pub const WINDOW_LEN: usize = 30;

/// Ограниченный буфер кадров для одной попытки распознавания
#[derive(Debug, Default)]
pub struct CaptureWindow {
    frames: Vec<LandmarkFrame>,
}

impl CaptureWindow {
    pub fn new() -> Self {
        Self {
            frames: Vec::with_capacity(WINDOW_LEN),
        }
    }

    /// Добавляет кадр, если есть место. `false`, если окно уже полное.
    pub fn push(&mut self, frame: LandmarkFrame) -> bool {
        if self.is_full() {
            return false;
        }
        self.frames.push(frame);
        true
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= WINDOW_LEN
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Забирает кадры, окно остаётся пустым
    pub fn take(&mut self) -> Vec<LandmarkFrame> {
        std::mem::replace(&mut self.frames, Vec::with_capacity(WINDOW_LEN))
    }
}
