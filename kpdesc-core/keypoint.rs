#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected image location with scale and orientation.
///
/// Coordinates are in pixels of the image handed to the detector, with
/// `(0, 0)` at the center of the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood.
    pub size: f32,
    /// Orientation in degrees in `[0, 360)`, or `-1.0` if not assigned.
    pub angle: f32,
    pub response: f32,
    /// Pyramid level or packed octave/layer, detector specific.
    pub octave: i32,
    pub class_id: i32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: -1.0,
            response: 0.0,
            octave: 0,
            class_id: -1,
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_response(mut self, response: f32) -> Self {
        self.response = response;
        self
    }

    pub fn with_octave(mut self, octave: i32) -> Self {
        self.octave = octave;
        self
    }

    /// Nearest pixel, as signed coordinates so callers can bounds check.
    pub fn pixel(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}
