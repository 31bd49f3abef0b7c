use serde::{Deserialize, Serialize};

use crate::kernel::error::CoreError;

const MIN_POINTS: usize = 3;
const SINGULAR_EPS: f64 = 1e-12;

/// Rows map `[angle_x, angle_y, 1]` onto screen x and screen y.
pub type AffineTransform = [[f64; 3]; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub success: bool,
    /// Mean reprojection error, scaled x100. A relative quality score, not true degrees.
    pub error_degrees: f64,
    pub transform: Option<AffineTransform>,
    pub points_used: usize,
}

impl CalibrationResult {
    fn failed() -> Self {
        Self {
            success: false,
            error_degrees: 0.0,
            transform: None,
            points_used: 0,
        }
    }
}

/// Least-squares affine calibration from raw gaze angles to normalised screen space.
#[derive(Debug, Clone, Default)]
pub struct GazeCalibrator {
    transform: Option<AffineTransform>,
}

impl GazeCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_calibrated(&self) -> bool {
        self.transform.is_some()
    }

    pub fn transform(&self) -> Option<&AffineTransform> {
        self.transform.as_ref()
    }

    /// Fits a fresh transform. On success the old one is replaced wholesale;
    /// on failure the previous calibration is left untouched.
    pub fn calibrate(
        &mut self,
        gaze_points: &[(f64, f64)],
        screen_targets: &[(f64, f64)],
    ) -> Result<CalibrationResult, CoreError> {
        if gaze_points.len() != screen_targets.len() {
            return Err(CoreError::CalibrationMismatch {
                gaze: gaze_points.len(),
                targets: screen_targets.len(),
            });
        }
        if gaze_points.len() < MIN_POINTS {
            return Ok(CalibrationResult::failed());
        }

        let xs: Vec<f64> = screen_targets.iter().map(|t| t.0).collect();
        let ys: Vec<f64> = screen_targets.iter().map(|t| t.1).collect();

        let (Some(row_x), Some(row_y)) = (fit_axis(gaze_points, &xs), fit_axis(gaze_points, &ys)) else {
            tracing::warn!("Calibration system is singular ({} points)", gaze_points.len());
            return Ok(CalibrationResult::failed());
        };

        let transform = [row_x, row_y];
        self.transform = Some(transform);

        let predicted = self.apply(gaze_points);
        let total: f64 = predicted
            .iter()
            .zip(screen_targets)
            .map(|(p, t)| ((p.0 - t.0).powi(2) + (p.1 - t.1).powi(2)).sqrt())
            .sum();
        let mean_error = total / gaze_points.len() as f64;

        Ok(CalibrationResult {
            success: true,
            error_degrees: (mean_error * 100.0 * 100.0).round() / 100.0,
            transform: Some(transform),
            points_used: gaze_points.len(),
        })
    }

    /// Maps raw angles through the transform, clamped to [0, 1].
    /// Uncalibrated: points come back unchanged.
    pub fn apply(&self, gaze_points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let Some(t) = &self.transform else {
            return gaze_points.to_vec();
        };
        gaze_points
            .iter()
            .map(|&(gx, gy)| {
                let x = t[0][0] * gx + t[0][1] * gy + t[0][2];
                let y = t[1][0] * gx + t[1][1] * gy + t[1][2];
                (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
            })
            .collect()
    }

    pub fn apply_one(&self, gaze: (f64, f64)) -> (f64, f64) {
        self.apply(&[gaze])[0]
    }

    pub fn reset(&mut self) {
        self.transform = None;
    }
}

/// Solves min |A c - b| with A rows `[gx, gy, 1]` via the normal equations.
fn fit_axis(gaze: &[(f64, f64)], target: &[f64]) -> Option<[f64; 3]> {
    let mut ata = [[0.0f64; 3]; 3];
    let mut atb = [0.0f64; 3];
    for (&(gx, gy), &b) in gaze.iter().zip(target) {
        let row = [gx, gy, 1.0];
        for i in 0..3 {
            for j in 0..3 {
                ata[i][j] += row[i] * row[j];
            }
            atb[i] += row[i] * b;
        }
    }
    solve3(ata, atb)
}

/// Gaussian elimination with partial pivoting.
fn solve3(mut m: [[f64; 3]; 3], mut v: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < SINGULAR_EPS {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (v[row] - tail) / m[row][row];
    }
    Some(x)
}
