//! Calibration geometry captured by the setup wizard.
//!
//! The geometry is produced once, persisted by the host store, and read-only
//! for every session afterwards. Targets are placed on the face of the
//! target surface that looks back toward the trigger.

use serde::{Deserialize, Serialize};

use crate::geometry::{Axis, Point3, Vec3, Volume};

/// Trigger, target surface and finish positions for one installation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationGeometry {
    /// Where the start trigger brick sits.
    pub trigger_position: Point3,
    /// The flat volume targets appear on.
    pub target_surface: Volume,
    /// Where the player is teleported when a session ends.
    pub finish_position: Point3,
}

/// The face of the target surface that targets are spawned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFace {
    /// Normal axis of the face.
    pub axis: Axis,
    /// `true` when the face points toward +axis.
    pub toward_positive: bool,
}

impl CalibrationGeometry {
    /// Returns the surface face that points back at the trigger.
    ///
    /// The normal axis is the dominant component of the trigger-to-surface
    /// offset.
    #[must_use]
    pub fn target_face(&self) -> TargetFace {
        let difference = self.target_surface.position - self.trigger_position;
        let axis = difference.dominant_axis();
        TargetFace {
            axis,
            toward_positive: difference.get(axis) < 0.0,
        }
    }

    /// Builds a target volume lying flat on the target face.
    ///
    /// `half_size` is the target's half-extent in the plane of the face and
    /// `thickness` its half-extent along the face normal. `u` and `v` are
    /// placement fractions in `[0, 1)` for the two in-plane axes (in index
    /// order); in-plane coordinates are truncated to whole units and keep the
    /// whole target on the surface.
    #[must_use]
    pub fn target_volume(&self, half_size: f64, thickness: f64, u: f64, v: f64) -> Volume {
        let face = self.target_face();
        let surface = &self.target_surface;

        let offset = surface.size.get(face.axis) + thickness;
        let normal_position = if face.toward_positive {
            surface.position.get(face.axis) + offset
        } else {
            surface.position.get(face.axis) - offset
        };

        let [first, second] = face.axis.others();
        let position = Vec3::ZERO
            .with(face.axis, normal_position)
            .with(first, in_plane(surface, first, half_size, u))
            .with(second, in_plane(surface, second, half_size, v));

        let size = Vec3::new(half_size, half_size, half_size).with(face.axis, thickness);

        Volume::new(position, size)
    }
}

fn in_plane(surface: &Volume, axis: Axis, half_size: f64, fraction: f64) -> f64 {
    let slack = (surface.size.get(axis) - half_size).max(0.0);
    surface.position.get(axis) - slack + (fraction.clamp(0.0, 1.0) * slack * 2.0).trunc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_calibration() -> CalibrationGeometry {
        // Trigger stands 200 units in front of a wall whose face points to -x.
        CalibrationGeometry {
            trigger_position: Vec3::new(0.0, 0.0, 10.0),
            target_surface: Volume::new(Vec3::new(200.0, 0.0, 60.0), Vec3::new(5.0, 80.0, 50.0)),
            finish_position: Vec3::new(-40.0, 0.0, 10.0),
        }
    }

    #[test]
    fn test_target_face_points_at_trigger() {
        let face = wall_calibration().target_face();
        assert_eq!(face.axis, Axis::X);
        assert!(!face.toward_positive);
    }

    #[test]
    fn test_target_face_positive_side() {
        let mut calibration = wall_calibration();
        calibration.trigger_position = Vec3::new(400.0, 10.0, 10.0);
        let face = calibration.target_face();
        assert_eq!(face.axis, Axis::X);
        assert!(face.toward_positive);
    }

    #[test]
    fn test_target_volume_sits_on_face() {
        let target = wall_calibration().target_volume(12.0, 2.0, 0.0, 0.0);
        // Surface min-x face is at 195; target centre 2 units further out.
        assert_eq!(target.position.x, 193.0);
        assert_eq!(target.size, Vec3::new(2.0, 12.0, 12.0));
        // Fraction 0 puts the target in the lowest corner that keeps it on the surface.
        assert_eq!(target.position.y, -68.0);
        assert_eq!(target.position.z, 22.0);
    }

    #[test]
    fn test_target_volume_stays_on_surface() {
        let calibration = wall_calibration();
        for (u, v) in [(0.0, 0.0), (0.5, 0.25), (0.999, 0.999)] {
            let target = calibration.target_volume(12.0, 2.0, u, v);
            let surface = calibration.target_surface;
            assert!(target.min().y >= surface.min().y);
            assert!(target.max().y <= surface.max().y);
            assert!(target.min().z >= surface.min().z);
            assert!(target.max().z <= surface.max().z);
        }
    }

    #[test]
    fn test_oversized_target_is_centred() {
        let target = wall_calibration().target_volume(500.0, 2.0, 0.7, 0.2);
        assert_eq!(target.position.y, 0.0);
        assert_eq!(target.position.z, 60.0);
    }
}
