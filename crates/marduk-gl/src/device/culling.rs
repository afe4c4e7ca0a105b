//! View-frustum sphere test.
//!
//! Planes come straight from the rows of the combined matrix (Gribb/Hartmann):
//! left/right from row 3 +/- row 0, bottom/top from row 3 +/- row 1,
//! front/back from row 3 +/- row 2. Each normal is normalized and its offset
//! divided by the same length.

use crate::math::{Mat4, Vec3};
use crate::types::FrustumPlanes;

/// Plane `dot(normal, p) + offset = 0`, normal pointing into the frustum.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    fn from_row_combination(a: [f32; 4], b: [f32; 4], sign: f32) -> Self {
        let n = Vec3::new(a[0] + sign * b[0], a[1] + sign * b[1], a[2] + sign * b[2]);
        let len = n.length();
        Plane { normal: n.normalized(), offset: (a[3] + sign * b[3]) / len }
    }

    /// Signed distance of `p` from the plane.
    #[inline]
    pub fn distance(&self, p: Vec3) -> f32 {
        self.offset + self.normal.dot(p)
    }
}

/// Six planes, in [`FrustumPlanes`] bit order.
pub fn extract_planes(m: &Mat4) -> [(FrustumPlanes, Plane); 6] {
    let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
    [
        (FrustumPlanes::LEFT, Plane::from_row_combination(r3, r0, 1.0)),
        (FrustumPlanes::RIGHT, Plane::from_row_combination(r3, r0, -1.0)),
        (FrustumPlanes::TOP, Plane::from_row_combination(r3, r1, -1.0)),
        (FrustumPlanes::BOTTOM, Plane::from_row_combination(r3, r1, 1.0)),
        (FrustumPlanes::FRONT, Plane::from_row_combination(r3, r2, 1.0)),
        (FrustumPlanes::BACK, Plane::from_row_combination(r3, r2, -1.0)),
    ]
}

/// Planes the sphere lies entirely outside of.
///
/// Outside means `offset + dot(normal, center) < -radius`, strictly: a sphere
/// exactly touching a plane from outside still counts as inside.
pub fn sphere_visibility(m: &Mat4, center: Vec3, radius: f32) -> FrustumPlanes {
    extract_planes(m)
        .iter()
        .filter(|(_, plane)| plane.distance(center) < -radius)
        .fold(FrustumPlanes::empty(), |acc, (bit, _)| acc | *bit)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Right-handed perspective looking down -Z, near 1, far 100.
    fn perspective() -> Mat4 {
        let (n, f) = (1.0f32, 100.0f32);
        let t = (core::f32::consts::FRAC_PI_4 * 0.5).tan() * n;
        Mat4::from_rows([
            [n / t, 0.0, 0.0, 0.0],
            [0.0, n / t, 0.0, 0.0],
            [0.0, 0.0, -(f + n) / (f - n), -2.0 * f * n / (f - n)],
            [0.0, 0.0, -1.0, 0.0],
        ])
    }

    #[test]
    fn sphere_in_front_of_camera_is_inside() {
        let m = perspective();
        assert!(sphere_visibility(&m, Vec3::new(0.0, 0.0, -10.0), 1.0).is_empty());
    }

    #[test]
    fn sphere_behind_camera_is_outside_front() {
        let m = perspective();
        let mask = sphere_visibility(&m, Vec3::new(0.0, 0.0, 10.0), 1.0);
        assert!(mask.contains(FrustumPlanes::FRONT));
        assert!(!mask.contains(FrustumPlanes::BACK));
    }

    #[test]
    fn sphere_far_right_is_outside_right() {
        let m = perspective();
        let mask = sphere_visibility(&m, Vec3::new(100.0, 0.0, -10.0), 1.0);
        assert_eq!(mask, FrustumPlanes::RIGHT);
    }

    #[test]
    fn sphere_above_is_outside_top_only() {
        let m = perspective();
        let mask = sphere_visibility(&m, Vec3::new(0.0, 100.0, -10.0), 1.0);
        assert_eq!(mask, FrustumPlanes::TOP);
    }

    #[test]
    fn beyond_far_plane_is_outside_back() {
        let m = perspective();
        let mask = sphere_visibility(&m, Vec3::new(0.0, 0.0, -500.0), 1.0);
        assert!(mask.contains(FrustumPlanes::BACK));
    }

    #[test]
    fn touching_a_plane_is_not_outside() {
        // identity clip space: left plane is x = -1
        let m = Mat4::IDENTITY;
        let touching = sphere_visibility(&m, Vec3::new(-2.0, 0.0, 0.0), 1.0);
        assert!(!touching.contains(FrustumPlanes::LEFT));
        let beyond = sphere_visibility(&m, Vec3::new(-2.5, 0.0, 0.0), 1.0);
        assert!(beyond.contains(FrustumPlanes::LEFT));
    }

    #[test]
    fn repeated_queries_are_identical() {
        let m = perspective();
        let c = Vec3::new(3.0, -2.0, -40.0);
        assert_eq!(sphere_visibility(&m, c, 2.5), sphere_visibility(&m, c, 2.5));
    }
}
