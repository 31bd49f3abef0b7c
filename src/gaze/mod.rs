pub mod calibration;
pub mod smoother;
pub mod zone_mapper;

pub use calibration::{CalibrationResult, GazeCalibrator};
pub use smoother::{DualAxisSmoother, GazeSmoother, SmootherConfig};
pub use zone_mapper::{ZoneMapper, ZoneResult, NO_ZONE};
