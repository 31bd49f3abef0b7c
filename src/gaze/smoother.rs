use crate::kernel::config::GazeSettings;

/// Filter tuning. Defaults track the gaze defaults in `GazeSettings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherConfig {
    pub process_noise: f32,
    pub measurement_noise: f32,
    /// Per-update jump (raw units) above which the sample counts as a saccade.
    pub saccade_threshold: f32,
    pub saccade_noise_multiplier: f32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.1,
            measurement_noise: 1.0,
            saccade_threshold: 15.0,
            saccade_noise_multiplier: 10.0,
        }
    }
}

impl From<&GazeSettings> for SmootherConfig {
    fn from(s: &GazeSettings) -> Self {
        Self {
            process_noise: s.process_noise,
            measurement_noise: s.measurement_noise,
            saccade_threshold: s.saccade_threshold,
            saccade_noise_multiplier: s.saccade_noise_multiplier,
        }
    }
}

/// Single-axis Kalman filter with saccade-adaptive process noise.
///
/// Small jitter is damped hard; a jump above the saccade threshold inflates
/// process noise for that one update only, so the gain spikes and the
/// estimate follows the eye with little lag.
#[derive(Debug, Clone)]
pub struct GazeSmoother {
    config: SmootherConfig,
    estimate: f32,
    variance: f32,
    prev_measurement: f32,
    initialized: bool,
}

impl GazeSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            estimate: 0.0,
            variance: 1.0,
            prev_measurement: 0.0,
            initialized: false,
        }
    }

    pub fn update(&mut self, measurement: f32) -> f32 {
        if !self.initialized {
            self.estimate = measurement;
            self.prev_measurement = measurement;
            self.initialized = true;
            return measurement;
        }

        let velocity = (measurement - self.prev_measurement).abs();
        let q = if velocity > self.config.saccade_threshold {
            self.config.process_noise * self.config.saccade_noise_multiplier
        } else {
            self.config.process_noise
        };

        // Predict
        let p_pred = self.variance + q;

        // Update
        let gain = p_pred / (p_pred + self.config.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.variance = (1.0 - gain) * p_pred;

        self.prev_measurement = measurement;
        self.estimate
    }

    pub fn estimate(&self) -> Option<f32> {
        self.initialized.then_some(self.estimate)
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.estimate = 0.0;
        self.variance = 1.0;
        self.prev_measurement = 0.0;
    }
}

impl Default for GazeSmoother {
    fn default() -> Self {
        Self::new(SmootherConfig::default())
    }
}

/// Independent filters for pitch and yaw.
#[derive(Debug, Clone, Default)]
pub struct DualAxisSmoother {
    pitch: GazeSmoother,
    yaw: GazeSmoother,
}

impl DualAxisSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            pitch: GazeSmoother::new(config),
            yaw: GazeSmoother::new(config),
        }
    }

    /// Returns smoothed (pitch, yaw).
    pub fn update(&mut self, pitch: f32, yaw: f32) -> (f32, f32) {
        (self.pitch.update(pitch), self.yaw.update(yaw))
    }

    pub fn reset(&mut self) {
        self.pitch.reset();
        self.yaw.reset();
    }
}
