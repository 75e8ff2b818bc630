use serde::{Deserialize, Serialize};

/// Точек на одну руку
pub const HAND_POINTS: usize = 21;
/// Координат на точку
pub const POINT_DIMS: usize = 3;
/// Длина вектора кадра: правая рука, затем левая
pub const FRAME_LEN: usize = 2 * HAND_POINTS * POINT_DIMS;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Результат детектора для одного видеокадра.
///
/// Нет руки в кадре: нет и поля, а не пустой массив.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HandDetection {
    #[serde(default)]
    pub right_hand_landmarks: Option<Vec<Landmark>>,
    #[serde(default)]
    pub left_hand_landmarks: Option<Vec<Landmark>>,
}

impl HandDetection {
    pub fn right_only(points: Vec<Landmark>) -> Self {
        Self {
            right_hand_landmarks: Some(points),
            left_hand_landmarks: None,
        }
    }

    pub fn both(right: Vec<Landmark>, left: Vec<Landmark>) -> Self {
        Self {
            right_hand_landmarks: Some(right),
            left_hand_landmarks: Some(left),
        }
    }
}

/// Вектор из 126 чисел для одного кадра.
///
/// Длина фиксирована: отсутствующая рука заполняется нулями, лишние
/// точки отбрасываются, недостающие дополняются нулями.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct LandmarkFrame(Vec<f32>);

impl LandmarkFrame {
    pub fn zeroed() -> Self {
        Self(vec![0.0; FRAME_LEN])
    }

    pub fn from_detection(detection: &HandDetection) -> Self {
        let mut values = Vec::with_capacity(FRAME_LEN);
        push_hand(&mut values, detection.right_hand_landmarks.as_deref());
        push_hand(&mut values, detection.left_hand_landmarks.as_deref());
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn push_hand(out: &mut Vec<f32>, hand: Option<&[Landmark]>) {
    let points = hand.unwrap_or(&[]);
    for i in 0..HAND_POINTS {
        let p = points.get(i).copied().unwrap_or_default();
        out.extend_from_slice(&[p.x, p.y, p.z]);
    }
}
