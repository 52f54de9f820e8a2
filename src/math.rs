//! Plain-old-data math types used by the binary codec's parallel arrays.
//!
//! These mirror `cgmath`'s vector/quaternion/matrix shapes byte-for-byte
//! (`#[repr(C)]`, `Pod`) so that codec sections can be read as zero-copy
//! slices straight out of an asset block, while still converting
//! cheaply to `cgmath` types wherever the runtime wants to do real math.

use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, Quaternion as CgQuaternion, Vector3 as CgVector3};

#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
        CgVector3::from(a).lerp(CgVector3::from(b), t).into()
    }
}

impl From<Vec3> for CgVector3<f32> {
    fn from(v: Vec3) -> Self {
        CgVector3::new(v.x, v.y, v.z)
    }
}

impl From<CgVector3<f32>> for Vec3 {
    fn from(v: CgVector3<f32>) -> Self {
        Vec3 { x: v.x, y: v.y, z: v.z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Spherical-linear interpolation between two rotation keys.
    pub fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
        use cgmath::InnerSpace;
        let a: CgQuaternion<f32> = a.into();
        let b: CgQuaternion<f32> = b.into();
        a.normalize().slerp(b.normalize(), t).into()
    }
}

impl From<Quat> for CgQuaternion<f32> {
    fn from(q: Quat) -> Self {
        CgQuaternion::new(q.w, q.x, q.y, q.z)
    }
}

impl From<CgQuaternion<f32>> for Quat {
    fn from(q: CgQuaternion<f32>) -> Self {
        Quat { x: q.v.x, y: q.v.y, z: q.v.z, w: q.s }
    }
}

/// Column-major 4x4 matrix, laid out identically to `cgmath::Matrix4<f32>`.
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    pub fn compose(translation: Vec3, rotation: Quat, scale: Vec3) -> Mat4 {
        let t = Matrix4::from_translation(translation.into());
        let r: Matrix4<f32> = CgQuaternion::from(rotation).into();
        let s = Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z);
        (t * r * s).into()
    }

    /// `self * rhs`, matching the renderer's fixed right-to-left
    /// multiplication convention from the skeleton evaluator (§4.6).
    pub fn mul(self, rhs: Mat4) -> Mat4 {
        let a: Matrix4<f32> = self.into();
        let b: Matrix4<f32> = rhs.into();
        (a * b).into()
    }
}

impl From<Mat4> for Matrix4<f32> {
    fn from(m: Mat4) -> Self {
        Matrix4::from(m.0)
    }
}

impl From<Matrix4<f32>> for Mat4 {
    fn from(m: Matrix4<f32>) -> Self {
        Mat4(m.into())
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Mat4::IDENTITY
    }
}

/// Locate the interpolation window for time `t` in an ascending,
/// time-sorted key stream, per §4.6's key-interpolation rule.
///
/// Returns `None` for an empty stream, `Some((i, None))` when `t` lands
/// on or past the last key (or there is only one key), and
/// `Some((i, Some(factor)))` when interpolating between `times[i]` and
/// `times[i + 1]`.
pub fn key_window(times: &[f32], t: f32) -> Option<(usize, Option<f32>)> {
    if times.is_empty() {
        return None;
    }
    if times.len() == 1 {
        return Some((0, None));
    }
    // Largest index i with times[i] <= t, clamped to the last key.
    let i = match times.binary_search_by(|probe| probe.partial_cmp(&t).unwrap()) {
        Ok(i) => i,
        Err(0) => 0,
        Err(i) => i - 1,
    };
    if i >= times.len() - 1 {
        return Some((times.len() - 1, None));
    }
    let span = times[i + 1] - times[i];
    let factor = if span > 0.0 { (t - times[i]) / span } else { 0.0 };
    Some((i, Some(factor)))
}
