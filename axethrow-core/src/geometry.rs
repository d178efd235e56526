//! Axis-aligned volumes and segment intersection.
//!
//! Volumes are stored the way the host describes bricks: a centre position
//! plus half-extents. All comparisons are exact `f64` comparisons with strict
//! inequalities, so a segment that only grazes a face, edge or corner of a
//! volume never counts as a hit.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// One of the three world axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The X axis.
    X,
    /// The Y axis.
    Y,
    /// The Z axis.
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Returns the two axes that are not `self`, in index order.
    #[must_use]
    pub const fn others(self) -> [Self; 2] {
        match self {
            Self::X => [Self::Y, Self::Z],
            Self::Y => [Self::X, Self::Z],
            Self::Z => [Self::X, Self::Y],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
            Self::Z => write!(f, "z"),
        }
    }
}

/// A triple of `f64` coordinates.
///
/// Serialized as a `[x, y, z]` array, matching how the host reports
/// positions and brick sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A position in world space.
pub type Point3 = Vec3;

/// A size (half-extents) or a direction delta.
pub type Vector3 = Vec3;

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the component along `axis`.
    #[must_use]
    pub const fn get(self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Returns a copy with the component along `axis` replaced.
    #[must_use]
    pub const fn with(mut self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
        self
    }

    /// Component-wise absolute value.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Returns the axis with the largest absolute component.
    ///
    /// Ties resolve to the lower axis index (X before Y before Z).
    #[must_use]
    pub fn dominant_axis(self) -> Axis {
        let abs = self.abs();
        Axis::ALL
            .into_iter()
            .fold(Axis::X, |best, axis| {
                if abs.get(axis) > abs.get(best) {
                    axis
                } else {
                    best
                }
            })
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An axis-aligned volume centred at `position` with half-extents `size`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Centre of the volume.
    pub position: Point3,
    /// Half-extents along each axis.
    pub size: Vector3,
}

impl Volume {
    #[must_use]
    pub const fn new(position: Point3, size: Vector3) -> Self {
        Self { position, size }
    }

    /// Lower corner.
    #[must_use]
    pub fn min(&self) -> Point3 {
        self.position - self.size
    }

    /// Upper corner.
    #[must_use]
    pub fn max(&self) -> Point3 {
        self.position + self.size
    }

    /// Returns `true` if `point` lies strictly inside the volume on every axis.
    #[must_use]
    pub fn contains_strict(&self, point: Point3) -> bool {
        let (min, max) = (self.min(), self.max());
        Axis::ALL
            .into_iter()
            .all(|axis| point.get(axis) > min.get(axis) && point.get(axis) < max.get(axis))
    }

    /// Returns `true` if the interiors of the two volumes intersect.
    ///
    /// Volumes that only share a face, edge or corner do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let (min, max) = (self.min(), self.max());
        let (other_min, other_max) = (other.min(), other.max());
        Axis::ALL.into_iter().all(|axis| {
            min.get(axis) < other_max.get(axis) && other_min.get(axis) < max.get(axis)
        })
    }
}

/// Finds where the segment `start → end` enters `volume`.
///
/// Returns `start` itself when the segment begins strictly inside the
/// volume. Otherwise each of the six bounding planes is tested in the order
/// min-x, min-y, min-z, max-x, max-y, max-z and the first crossing that lies
/// strictly within the other two extents is returned.
///
/// Touching a face, edge or corner exactly is not a hit.
#[must_use]
pub fn intersect_segment_box(volume: &Volume, start: Point3, end: Point3) -> Option<Point3> {
    let (min, max) = (volume.min(), volume.max());

    let outside_on_any_axis = Axis::ALL.into_iter().any(|axis| {
        let (s, e) = (start.get(axis), end.get(axis));
        (s < min.get(axis) && e < min.get(axis)) || (s > max.get(axis) && e > max.get(axis))
    });
    if outside_on_any_axis {
        return None;
    }

    if volume.contains_strict(start) {
        return Some(start);
    }

    [min, max]
        .into_iter()
        .flat_map(|bound| Axis::ALL.into_iter().map(move |axis| (axis, bound.get(axis))))
        .find_map(|(axis, plane)| {
            let hit = plane_crossing(start.get(axis) - plane, end.get(axis) - plane, start, end)?;
            within_other_axes(hit, axis, min, max).then_some(hit)
        })
}

/// Point where the segment crosses a plane, given both endpoints' signed
/// distances to it. The distances must have strictly opposite signs.
#[allow(clippy::float_cmp)]
fn plane_crossing(d1: f64, d2: f64, start: Point3, end: Point3) -> Option<Point3> {
    if d1 * d2 >= 0.0 || d1 == d2 {
        return None;
    }
    Some(start + (end - start) * (-d1 / (d2 - d1)))
}

fn within_other_axes(point: Point3, axis: Axis, min: Point3, max: Point3) -> bool {
    axis.others()
        .into_iter()
        .all(|other| point.get(other) > min.get(other) && point.get(other) < max.get(other))
}
