use voicereach::gaze::{DualAxisSmoother, GazeCalibrator, GazeSmoother, SmootherConfig, ZoneMapper, NO_ZONE};
use voicereach::kernel::config::GazeSettings;
use voicereach::kernel::error::CoreError;
use voicereach::kernel::pipeline::normalize_angles;

const TOP: i32 = 0;
const RIGHT: i32 = 1;
const BOTTOM: i32 = 2;
const LEFT: i32 = 3;

#[test]
fn test_smoother_converges_to_constant_input() {
    for v in [-25.0f32, 0.0, 5.0, 30.0] {
        let mut smoother = GazeSmoother::default();
        smoother.update(0.0);
        let mut out = 0.0;
        for _ in 0..50 {
            out = smoother.update(v);
        }
        assert!((out - v).abs() < 0.1, "input {} settled at {}", v, out);
    }
}

#[test]
fn test_smoother_first_update_passes_through() {
    let mut smoother = GazeSmoother::default();
    assert_eq!(smoother.estimate(), None);
    assert_eq!(smoother.update(12.5), 12.5);
    assert_eq!(smoother.estimate(), Some(12.5));

    smoother.reset();
    assert_eq!(smoother.estimate(), None);
    assert_eq!(smoother.update(-3.0), -3.0);
}

fn settled(config: SmootherConfig) -> GazeSmoother {
    let mut smoother = GazeSmoother::new(config);
    for _ in 0..50 {
        smoother.update(0.0);
    }
    smoother
}

#[test]
fn test_saccade_tracks_fast_and_tremor_is_damped() {
    let config = SmootherConfig {
        process_noise: 0.01,
        measurement_noise: 1.0,
        saccade_threshold: 5.0,
        saccade_noise_multiplier: 100.0,
    };

    let mut tremor = settled(config);
    let damped = tremor.update(4.0);
    assert!(damped / 4.0 < 0.2, "sub-threshold jump moved {}", damped / 4.0);

    let mut saccade = settled(config);
    let tracked = saccade.update(20.0);
    assert!(tracked / 20.0 >= 0.5, "saccade moved only {}", tracked / 20.0);
}

#[test]
fn test_saccade_boost_lasts_one_update() {
    let config = SmootherConfig {
        saccade_threshold: 5.0,
        ..SmootherConfig::default()
    };
    let mut smoother = settled(config);

    let first = smoother.update(20.0);
    assert!(first > 10.0, "jump should be tracked past halfway, got {}", first);

    // Same value again: no jump, so back to the normal (lower) gain.
    let remaining = 20.0 - first;
    let second = smoother.update(20.0) - first;
    assert!(second / remaining < 0.5, "gain stayed boosted: {}", second / remaining);
}

#[test]
fn test_dual_axis_is_independent() {
    let mut dual = DualAxisSmoother::default();
    assert_eq!(dual.update(5.0, -5.0), (5.0, -5.0));
    let (pitch, yaw) = dual.update(5.0, 25.0);
    assert_eq!(pitch, 5.0);
    assert!(yaw > -5.0 && yaw < 25.0);
}

#[test]
fn test_four_zone_layout_is_deterministic() {
    let mut mapper = ZoneMapper::new(4, 0.05).unwrap();
    assert_eq!(mapper.current_zone(), NO_ZONE);

    for _ in 0..3 {
        assert_eq!(mapper.map(0.5, 0.1).zone_id, TOP);
        assert_eq!(mapper.map(0.9, 0.5).zone_id, RIGHT);
        assert_eq!(mapper.map(0.5, 0.9).zone_id, BOTTOM);
        assert_eq!(mapper.map(0.1, 0.5).zone_id, LEFT);
    }
}

#[test]
fn test_zone_confidence_peaks_at_centre() {
    let mut mapper = ZoneMapper::new(4, 0.05).unwrap();
    let centre = mapper.map(0.5, 0.2);
    assert_eq!(centre.zone_id, TOP);
    assert_eq!(centre.confidence, 1.0);
    assert_eq!((centre.center_x, centre.center_y), (0.5, 0.2));

    let off = mapper.map(0.6, 0.3);
    assert!(off.confidence < 1.0 && off.confidence > 0.0);
}

#[test]
fn test_hysteresis_holds_current_zone_near_boundary() {
    // Without a current zone this point goes to TOP (nearest centre).
    let mut fresh = ZoneMapper::new(4, 0.05).unwrap();
    assert_eq!(fresh.map(0.66, 0.32).zone_id, TOP);

    let mut mapper = ZoneMapper::new(4, 0.05).unwrap();
    assert_eq!(mapper.map(0.9, 0.5).zone_id, RIGHT);
    assert_eq!(mapper.map(0.66, 0.32).zone_id, RIGHT);
    assert_eq!(mapper.map(0.66, 0.32).zone_id, RIGHT);

    // Clearly inside TOP: the selection moves.
    assert_eq!(mapper.map(0.5, 0.1).zone_id, TOP);
}

#[test]
fn test_grid_layout_and_hysteresis() {
    let mut mapper = ZoneMapper::new(9, 0.05).unwrap();
    assert_eq!(mapper.num_zones(), 9);
    assert_eq!(mapper.map(0.1, 0.1).zone_id, 0);
    assert_eq!(mapper.map(0.9, 0.9).zone_id, 8);

    assert_eq!(mapper.map(0.5, 0.5).zone_id, 4);
    assert_eq!(mapper.map(0.5, 0.69).zone_id, 4, "just past the lower edge stays put");
    assert_eq!(mapper.map(0.5, 0.85).zone_id, 7);
}

#[test]
fn test_zone_layout_rebuild() {
    let mut mapper = ZoneMapper::new(4, 0.05).unwrap();
    mapper.map(0.9, 0.5);
    mapper.set_num_zones(6).unwrap();
    assert_eq!(mapper.current_zone(), NO_ZONE);
    assert_eq!(mapper.num_zones(), 6);
    assert_eq!(ZoneMapper::new(0, 0.05).unwrap_err(), CoreError::EmptyZoneLayout);
}

fn screen_for(yaw: f64, pitch: f64) -> (f64, f64) {
    (0.5 + yaw / 60.0, 0.5 - pitch / 40.0)
}

#[test]
fn test_calibration_round_trip() {
    let gaze = vec![(-15.0, -10.0), (15.0, -10.0), (0.0, 0.0), (-15.0, 10.0), (15.0, 10.0)];
    let screen: Vec<(f64, f64)> = gaze.iter().map(|&(y, p)| screen_for(y, p)).collect();

    let mut calibrator = GazeCalibrator::new();
    let result = calibrator.calibrate(&gaze, &screen).unwrap();
    assert!(result.success);
    assert_eq!(result.points_used, 5);
    assert!(result.error_degrees < 0.01);

    let (x, y) = calibrator.apply_one((15.0, 10.0));
    assert!((x - 0.75).abs() < 1e-6);
    assert!((y - 0.25).abs() < 1e-6);

    // Far outside the calibrated range clamps into the screen.
    let (x, y) = calibrator.apply_one((90.0, -90.0));
    assert_eq!((x, y), (1.0, 1.0));
}

#[test]
fn test_calibration_failures() {
    let mut calibrator = GazeCalibrator::new();

    let two = calibrator.calibrate(&[(0.0, 0.0), (1.0, 1.0)], &[(0.1, 0.1), (0.9, 0.9)]).unwrap();
    assert!(!two.success);

    let collinear = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
    let result = calibrator.calibrate(&collinear, &[(0.1, 0.1), (0.5, 0.5), (0.9, 0.9)]).unwrap();
    assert!(!result.success);
    assert!(!calibrator.is_calibrated());

    let err = calibrator.calibrate(&collinear, &[(0.1, 0.1)]).unwrap_err();
    assert_eq!(err, CoreError::CalibrationMismatch { gaze: 3, targets: 1 });

    // Uncalibrated: identity.
    assert_eq!(calibrator.apply(&[(3.0, -4.0)]), vec![(3.0, -4.0)]);
}

#[test]
fn test_angle_normalization() {
    let gaze = GazeSettings::default();
    assert_eq!(normalize_angles(0.0, 0.0, &gaze), (0.5, 0.5));
    let (x, y) = normalize_angles(15.0, 0.0, &gaze);
    assert_eq!(x, 0.5);
    assert!(y < 0.2, "looking up lands near the top");
    assert_eq!(normalize_angles(-90.0, 90.0, &gaze), (1.0, 1.0));
}
