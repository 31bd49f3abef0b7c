use serde::{Deserialize, Serialize};

use crate::kernel::error::CoreError;

/// Zone id before the first mapping (and after a layout change).
pub const NO_ZONE: i32 = -1;

/// Distance from a corner of the unit square to its centre.
const MAX_DISTANCE: f32 = std::f32::consts::FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneResult {
    pub zone_id: i32,
    pub confidence: f32,
    pub center_x: f32,
    pub center_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub id: i32,
    pub center: (f32, f32),
    /// (x1, y1, x2, y2) in normalised screen space, y growing downward.
    pub bounds: (f32, f32, f32, f32),
}

impl Zone {
    /// Bounds test with the box grown by `margin` on every side (negative shrinks).
    fn contains(&self, x: f32, y: f32, margin: f32) -> bool {
        let (x1, y1, x2, y2) = self.bounds;
        x1 - margin <= x && x <= x2 + margin && y1 - margin <= y && y <= y2 + margin
    }

    fn distance(&self, x: f32, y: f32) -> f32 {
        ((x - self.center.0).powi(2) + (y - self.center.1).powi(2)).sqrt()
    }
}

/// Maps normalised gaze points onto discrete zones with hysteresis.
///
/// The selected zone is tested with its box grown by the margin, all others
/// shrunk by it, so a point must cross clearly into a neighbour before the
/// selection moves.
#[derive(Debug, Clone)]
pub struct ZoneMapper {
    zones: Vec<Zone>,
    margin: f32,
    current: i32,
}

impl ZoneMapper {
    pub fn new(num_zones: usize, hysteresis_margin: f32) -> Result<Self, CoreError> {
        Ok(Self {
            zones: build_zones(num_zones)?,
            margin: hysteresis_margin,
            current: NO_ZONE,
        })
    }

    pub fn map(&mut self, x: f32, y: f32) -> ZoneResult {
        let mut best: Option<(&Zone, f32)> = None;

        for zone in &self.zones {
            let margin = if zone.id == self.current { self.margin } else { -self.margin };
            if !zone.contains(x, y, margin) {
                continue;
            }
            let d = zone.distance(x, y);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((zone, d));
            }
        }

        if best.is_none() {
            // outside every adjusted box: nearest centre wins
            for zone in &self.zones {
                let d = zone.distance(x, y);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((zone, d));
                }
            }
        }

        let Some((zone, dist)) = best else {
            return ZoneResult {
                zone_id: NO_ZONE,
                confidence: 0.0,
                center_x: 0.5,
                center_y: 0.5,
            };
        };

        self.current = zone.id;
        let confidence = (1.0 - dist / MAX_DISTANCE).max(0.0);

        ZoneResult {
            zone_id: zone.id,
            confidence: (confidence * 1000.0).round() / 1000.0,
            center_x: zone.center.0,
            center_y: zone.center.1,
        }
    }

    /// Rebuilds the layout. Hysteresis state is cleared.
    pub fn set_num_zones(&mut self, num_zones: usize) -> Result<(), CoreError> {
        self.zones = build_zones(num_zones)?;
        self.current = NO_ZONE;
        Ok(())
    }

    pub fn current_zone(&self) -> i32 {
        self.current
    }

    pub fn num_zones(&self) -> usize {
        self.zones.len()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }
}

/// 4 zones: top/right/bottom/left wedges. Anything else: row-major grid.
fn build_zones(n: usize) -> Result<Vec<Zone>, CoreError> {
    if n == 0 {
        return Err(CoreError::EmptyZoneLayout);
    }

    if n == 4 {
        return Ok(vec![
            Zone { id: 0, center: (0.5, 0.2), bounds: (0.2, 0.0, 0.8, 0.35) },  // top
            Zone { id: 1, center: (0.8, 0.5), bounds: (0.65, 0.2, 1.0, 0.8) },  // right
            Zone { id: 2, center: (0.5, 0.8), bounds: (0.2, 0.65, 0.8, 1.0) },  // bottom
            Zone { id: 3, center: (0.2, 0.5), bounds: (0.0, 0.2, 0.35, 0.8) },  // left
        ]);
    }

    let cols = ((n as f64).sqrt().floor() as usize).max(1);
    let rows = (n + cols - 1) / cols;
    let mut zones = Vec::with_capacity(n);

    'grid: for r in 0..rows {
        for c in 0..cols {
            if zones.len() >= n {
                break 'grid;
            }
            let x1 = c as f32 / cols as f32;
            let y1 = r as f32 / rows as f32;
            let x2 = (c + 1) as f32 / cols as f32;
            let y2 = (r + 1) as f32 / rows as f32;
            zones.push(Zone {
                id: zones.len() as i32,
                center: ((x1 + x2) / 2.0, (y1 + y2) / 2.0),
                bounds: (x1, y1, x2, y2),
            });
        }
    }

    Ok(zones)
}
