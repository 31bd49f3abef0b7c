use voicereach::vision::face::{eye_aspect_ratio, LEFT_EYE_CONTOUR, LEFT_EYE_EAR, RIGHT_EYE_CONTOUR, RIGHT_EYE_EAR};
use voicereach::vision::{FaceFrame, GazeEstimator, GazeMethod, GazeModel, GazeSource};

/// Both eyes 40px wide, lids `open` px from the eye line, irises centred.
fn face(open: f32) -> FaceFrame {
    let mut landmarks = vec![[0.0f32, 0.0]; 478];
    for (contour, ear, x0) in [(&LEFT_EYE_CONTOUR, &LEFT_EYE_EAR, 100.0f32), (&RIGHT_EYE_CONTOUR, &RIGHT_EYE_EAR, 300.0)] {
        for &i in contour.iter() {
            landmarks[i] = [x0 + 20.0, 100.0];
        }
        let [p1, p2, p3, p4, p5, p6] = *ear;
        landmarks[p1] = [x0, 100.0];
        landmarks[p4] = [x0 + 40.0, 100.0];
        landmarks[p2] = [x0 + 10.0, 100.0 - open];
        landmarks[p6] = [x0 + 10.0, 100.0 + open];
        landmarks[p3] = [x0 + 30.0, 100.0 - open];
        landmarks[p5] = [x0 + 30.0, 100.0 + open];
    }
    FaceFrame {
        landmarks,
        left_iris: [120.0, 100.0],
        right_iris: [320.0, 100.0],
        confidence: 1.0,
    }
}

#[test]
fn test_eye_aspect_ratio() {
    let open = face(6.0);
    let ear = eye_aspect_ratio(&open, &LEFT_EYE_EAR).unwrap();
    assert!((ear - 0.3).abs() < 1e-5);

    let closed = face(1.0);
    assert!(eye_aspect_ratio(&closed, &RIGHT_EYE_EAR).unwrap() < 0.21);

    assert_eq!(eye_aspect_ratio(&FaceFrame::default(), &LEFT_EYE_EAR), None);
}

#[test]
fn test_heuristic_follows_iris() {
    let mut estimator = GazeEstimator::initialize(None);
    assert_eq!(estimator.method(), GazeMethod::Heuristic);

    let centred = estimator.estimate(&face(6.0));
    assert!(centred.pitch.abs() < 1e-4 && centred.yaw.abs() < 1e-4);
    assert_eq!(centred.confidence, 0.5);

    let mut frame = face(6.0);
    frame.left_iris = [124.0, 96.0];
    frame.right_iris = [324.0, 96.0];
    let result = estimator.estimate(&frame);
    assert!(result.yaw > 0.0, "iris right of centre looks right");
    assert!(result.pitch > 0.0, "iris above centre looks up");
}

#[test]
fn test_heuristic_without_landmarks_is_low_confidence() {
    let mut estimator = GazeEstimator::initialize(None);
    let result = estimator.estimate(&FaceFrame::default());
    assert_eq!((result.pitch, result.yaw), (0.0, 0.0));
    assert_eq!(result.confidence, 0.1);
}

struct FixedModel(Option<(f32, f32)>);

impl GazeModel for FixedModel {
    fn infer(&mut self, _frame: &FaceFrame) -> anyhow::Result<(f32, f32)> {
        self.0.ok_or_else(|| anyhow::anyhow!("inference failed"))
    }
}

#[test]
fn test_model_backed_and_per_frame_fallback() {
    let mut model = GazeEstimator::initialize(Some(Box::new(FixedModel(Some((3.0, -7.0))))));
    assert_eq!(model.method(), GazeMethod::Model);
    let result = model.estimate(&face(6.0));
    assert_eq!((result.pitch, result.yaw), (3.0, -7.0));
    assert_eq!(result.method, GazeMethod::Model);
    assert_eq!(result.confidence, 0.9);

    let mut broken = GazeEstimator::initialize(Some(Box::new(FixedModel(None))));
    let result = broken.estimate(&face(6.0));
    assert_eq!(result.method, GazeMethod::Heuristic);
    assert_eq!(broken.method(), GazeMethod::Model);
}
