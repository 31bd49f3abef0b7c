/// 2-D landmark in image pixels.
pub type Point2 = [f32; 2];

/// MediaPipe Face Mesh indices, p1..p6 order for the aspect-ratio formula.
pub const LEFT_EYE_EAR: [usize; 6] = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE_EAR: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Eye contour landmarks used to locate eye centres.
pub const LEFT_EYE_CONTOUR: [usize; 16] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];
pub const RIGHT_EYE_CONTOUR: [usize; 16] = [
    362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];

pub const LEFT_EYE_OUTER: usize = 33;
pub const LEFT_EYE_INNER: usize = 133;
pub const RIGHT_EYE_OUTER: usize = 362;
pub const RIGHT_EYE_INNER: usize = 263;

/// Per-frame face data handed over by the landmark tracker.
#[derive(Debug, Clone, Default)]
pub struct FaceFrame {
    pub landmarks: Vec<Point2>,
    pub left_iris: Point2,
    pub right_iris: Point2,
    pub confidence: f32,
}

impl FaceFrame {
    pub fn landmark(&self, index: usize) -> Option<Point2> {
        self.landmarks.get(index).copied()
    }

    /// Mean of the given landmarks, or `None` if any index is missing.
    pub fn centroid(&self, indices: &[usize]) -> Option<Point2> {
        if indices.is_empty() {
            return None;
        }
        let mut sum = [0.0f32; 2];
        for &i in indices {
            let p = self.landmark(i)?;
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = indices.len() as f32;
        Some([sum[0] / n, sum[1] / n])
    }
}

pub fn distance(a: Point2, b: Point2) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Eye aspect ratio: (|p2-p6| + |p3-p5|) / (2 |p1-p4|).
///
/// Roughly 0.25-0.3 for an open eye, below 0.2 when closed.
/// A degenerate eye width yields 0.0; missing landmarks yield `None`.
pub fn eye_aspect_ratio(frame: &FaceFrame, indices: &[usize; 6]) -> Option<f32> {
    let p = |k: usize| frame.landmark(indices[k]);
    let v1 = distance(p(1)?, p(5)?);
    let v2 = distance(p(2)?, p(4)?);
    let h = distance(p(0)?, p(3)?);
    if h < 1e-6 {
        return Some(0.0);
    }
    Some((v1 + v2) / (2.0 * h))
}
