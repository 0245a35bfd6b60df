//! Initial camera placement for a loaded model

use crate::geometry::Aabb;

/// Camera distance multiplier along each axis, relative to the largest extent
pub const FRAME_DISTANCE_FACTOR: f32 = 2.0;

/// Camera placement computed once per loaded model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub eye: [f32; 3],
    pub target: [f32; 3],
}

impl CameraFrame {
    /// Frame a centered model: eye at `(2m, 2m, 2m)` looking at the origin,
    /// where `m` is the largest bounding box dimension
    ///
    /// Degenerate boxes (a single point) use `m = 1` so the camera never
    /// sits on the target.
    pub fn from_bounds(bounds: &Aabb) -> Self {
        let mut max_dim = bounds.max_dimension();
        if !max_dim.is_finite() || max_dim <= f32::EPSILON {
            max_dim = 1.0;
        }
        let d = max_dim * FRAME_DISTANCE_FACTOR;
        Self {
            eye: [d, d, d],
            target: [0.0, 0.0, 0.0],
        }
    }

    /// Distance from eye to target
    pub fn distance(&self) -> f32 {
        let v = [
            self.eye[0] - self.target[0],
            self.eye[1] - self.target[1],
            self.eye[2] - self.target[2],
        ];
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
    }

    /// Orbit angles of the eye around the target for a Y-up camera:
    /// (azimuth around +Y measured from +Z toward +X, elevation above the XZ plane)
    pub fn orbit_angles(&self) -> (f32, f32) {
        let v = [
            self.eye[0] - self.target[0],
            self.eye[1] - self.target[1],
            self.eye[2] - self.target[2],
        ];
        let horizontal = (v[0] * v[0] + v[2] * v[2]).sqrt();
        (v[0].atan2(v[2]), v[1].atan2(horizontal))
    }
}

impl Default for CameraFrame {
    fn default() -> Self {
        Self {
            eye: [10.0, 10.0, 10.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_uses_largest_dimension() {
        let bounds = Aabb {
            min: [-0.5, -1.0, -2.0],
            max: [0.5, 1.0, 2.0],
        };
        let frame = CameraFrame::from_bounds(&bounds);
        assert_eq!(frame.eye, [8.0, 8.0, 8.0]);
        assert_eq!(frame.target, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_frame_scales_with_model() {
        let small = Aabb {
            min: [0.0; 3],
            max: [0.001, 0.0005, 0.0],
        };
        assert_eq!(CameraFrame::from_bounds(&small).eye, [0.002, 0.002, 0.002]);
    }

    #[test]
    fn test_degenerate_bounds() {
        let point = Aabb {
            min: [3.0; 3],
            max: [3.0; 3],
        };
        assert_eq!(CameraFrame::from_bounds(&point).eye, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_orbit_angles() {
        let frame = CameraFrame {
            eye: [2.0, 2.0, 2.0],
            target: [0.0; 3],
        };
        let (azimuth, elevation) = frame.orbit_angles();
        assert!((azimuth - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert!((elevation - (1.0f32 / 2.0f32.sqrt()).atan()).abs() < 1e-6);
        assert!((frame.distance() - 12.0f32.sqrt()).abs() < 1e-6);
    }
}
