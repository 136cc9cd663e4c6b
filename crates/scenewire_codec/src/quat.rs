//! # Rotation and Position Compression
//!
//! ## Smallest-three quaternions
//!
//! A unit quaternion is stored in 32 bits by dropping its largest-magnitude
//! component and quantizing the other three to 9 bits each. The dropped
//! component is rebuilt from `x² + y² + z² + w² = 1`.
//!
//! ```text
//!  31 30 29        21 20        12 11         3 2  0
//! ┌─────┬────────────┬────────────┬────────────┬────┐
//! │ idx │    c0      │    c1      │    c2      │ 0  │
//! └─────┴────────────┴────────────┴────────────┴────┘
//! ```
//!
//! The largest component is made non-negative before packing, so `q` and
//! `-q` compress to the same bits.
//!
//! ## Quantized positions
//!
//! [`CompressedVec3`] stores each axis as 16 bits inside a min/max box.

use bytemuck::{Pod, Zeroable};
use scenewire_shared::{UnitQuat, Vec3};

const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;
const COMPONENT_LO: f32 = -INV_SQRT2;
const COMPONENT_HI: f32 = INV_SQRT2;
const COMPONENT_RANGE: f32 = COMPONENT_HI - COMPONENT_LO;

const COMPONENT_BITS: u32 = 9;
const COMPONENT_MAX: u32 = (1 << COMPONENT_BITS) - 1;
const COMPONENT_SHIFTS: [u32; 3] = [21, 12, 3];
const INDEX_SHIFT: u32 = 30;

const ENCODE_DRIFT: f32 = 1e-6;
const DECODE_DRIFT: f32 = 1e-5;

/// A smallest-three packed quaternion.
///
/// Wire layout: one `u32`.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct CompressedQuat(pub u32);

impl CompressedQuat {
    /// Size in bytes.
    pub const SIZE: usize = 4;

    /// Index (0 = x ... 3 = w) of the dropped component.
    #[must_use]
    pub const fn dropped_index(self) -> usize {
        (self.0 >> INDEX_SHIFT) as usize & 0x3
    }

    /// The three quantized components, in `x, y, z, w` order minus the
    /// dropped one.
    #[must_use]
    pub const fn quantized(self) -> [u32; 3] {
        [
            (self.0 >> COMPONENT_SHIFTS[0]) & COMPONENT_MAX,
            (self.0 >> COMPONENT_SHIFTS[1]) & COMPONENT_MAX,
            (self.0 >> COMPONENT_SHIFTS[2]) & COMPONENT_MAX,
        ]
    }

    /// The low reserved bits. Zero for anything [`compress_quat`] produced.
    #[must_use]
    pub const fn reserved_bits(self) -> u32 {
        self.0 & 0x7
    }
}

fn renormalize(mut c: [f32; 4], drift: f32) -> [f32; 4] {
    let n2: f32 = c.iter().map(|v| v * v).sum();
    if n2 > 0.0 && (n2 - 1.0).abs() > drift {
        let inv = n2.sqrt().recip();
        c.iter_mut().for_each(|v| *v *= inv);
    }
    c
}

fn quantize9(v: f32) -> u32 {
    let t = (v.clamp(COMPONENT_LO, COMPONENT_HI) - COMPONENT_LO) / COMPONENT_RANGE;
    // `round` is half away from zero; NaN saturates to 0.
    ((t * COMPONENT_MAX as f32).round() as u32).min(COMPONENT_MAX)
}

fn dequantize9(q: u32) -> f32 {
    q as f32 / COMPONENT_MAX as f32 * COMPONENT_RANGE + COMPONENT_LO
}

/// Packs a quaternion with the smallest-three scheme.
///
/// Inputs that are only approximately unit-norm are renormalized first.
/// Never fails: out-of-range components are clamped.
#[must_use]
pub fn compress_quat(q: UnitQuat) -> CompressedQuat {
    let mut c = renormalize(q.to_array(), ENCODE_DRIFT);

    // Strict comparison keeps the first index on ties.
    let mut idx = 0;
    for i in 1..4 {
        if c[i].abs() > c[idx].abs() {
            idx = i;
        }
    }

    if c[idx] < 0.0 {
        c.iter_mut().for_each(|v| *v = -*v);
    }

    let mut packed = (idx as u32) << INDEX_SHIFT;
    let kept = (0..4).filter(|&i| i != idx);
    for (shift, i) in COMPONENT_SHIFTS.iter().zip(kept) {
        packed |= quantize9(c[i]) << shift;
    }
    CompressedQuat(packed)
}

/// Unpacks a smallest-three quaternion.
///
/// The result is unit-norm to within `1e-5` in squared norm. Reserved bits
/// are ignored.
#[must_use]
pub fn decompress_quat(packed: CompressedQuat) -> UnitQuat {
    let idx = packed.dropped_index();
    let mut c = [0.0f32; 4];
    let slots = (0..4).filter(|&i| i != idx);
    for (q, i) in packed.quantized().into_iter().zip(slots) {
        c[i] = dequantize9(q);
    }

    let three_sum: f32 = c.iter().map(|v| v * v).sum();
    c[idx] = (1.0 - three_sum).max(0.0).sqrt();

    UnitQuat::from_array(renormalize(c, DECODE_DRIFT))
}

/// A position quantized to 16 bits per axis inside a min/max box.
///
/// Wire layout: 3 × `u16` (6 bytes).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct CompressedVec3(pub [u16; 3]);

impl CompressedVec3 {
    /// Size in bytes.
    pub const SIZE: usize = 6;
}

fn quantize16(v: f32, min: f32, max: f32) -> u16 {
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return 0;
    }
    let t = ((v - min) / range).clamp(0.0, 1.0);
    (t * f32::from(u16::MAX)).round() as u16
}

fn dequantize16(q: u16, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return min;
    }
    min + f32::from(q) / f32::from(u16::MAX) * range
}

/// Quantizes `v` into the box `[min, max]`. Points outside are clamped.
///
/// Axes with `max <= min` encode as 0.
#[must_use]
pub fn compress_vec3(v: Vec3, min: Vec3, max: Vec3) -> CompressedVec3 {
    CompressedVec3([
        quantize16(v.x, min.x, max.x),
        quantize16(v.y, min.y, max.y),
        quantize16(v.z, min.z, max.z),
    ])
}

/// Restores a position from the box it was quantized in.
///
/// Axes with `max <= min` decode to `min`.
#[must_use]
pub fn decompress_vec3(packed: CompressedVec3, min: Vec3, max: Vec3) -> Vec3 {
    let [x, y, z] = packed.0;
    Vec3::new(
        dequantize16(x, min.x, max.x),
        dequantize16(y, min.y, max.y),
        dequantize16(z, min.z, max.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_DEGREE: f32 = 0.5 * std::f32::consts::PI / 180.0;

    #[test]
    fn test_identity_round_trip() {
        let packed = compress_quat(UnitQuat::IDENTITY);
        assert_eq!(packed.dropped_index(), 3);
        // 0.0 sits exactly between levels 255 and 256; rounding goes up.
        assert_eq!(packed.quantized(), [256, 256, 256]);
        assert_eq!(packed.reserved_bits(), 0);

        let restored = decompress_quat(packed);
        assert!(restored.angle_to(UnitQuat::IDENTITY) < HALF_DEGREE);
    }

    #[test]
    fn test_double_cover_collapses() {
        let q = UnitQuat::from_axis_angle(Vec3::new(0.0, 0.6, 0.8), 2.5);
        assert_eq!(compress_quat(q), compress_quat(-q));
    }

    #[test]
    fn test_ties_keep_first_index() {
        let q = UnitQuat::new(0.5, -0.5, 0.5, -0.5);
        assert_eq!(compress_quat(q).dropped_index(), 0);
    }

    #[test]
    fn test_unnormalized_input_is_renormalized() {
        let q = UnitQuat::new(0.0, 0.0, 3.0, 4.0);
        let restored = decompress_quat(compress_quat(q));
        assert!(restored.angle_to(q.normalized()) < HALF_DEGREE);
        assert!((restored.norm_squared() - 1.0).abs() <= DECODE_DRIFT);
    }

    #[test]
    fn test_reserved_bits_ignored_on_decode() {
        let packed = compress_quat(UnitQuat::IDENTITY);
        let dirty = CompressedQuat(packed.0 | 0x7);
        assert_eq!(decompress_quat(dirty), decompress_quat(packed));
    }

    #[test]
    fn test_vec3_quantization() {
        let min = Vec3::new(-10.0, 0.0, 5.0);
        let max = Vec3::new(10.0, 100.0, 5.0);

        let packed = compress_vec3(Vec3::new(0.0, 100.0, 7.0), min, max);
        assert_eq!(packed.0[1], u16::MAX);
        assert_eq!(packed.0[2], 0);

        let restored = decompress_vec3(packed, min, max);
        assert!(restored.x.abs() < 20.0 / 65535.0);
        assert_eq!(restored.y, 100.0);
        assert_eq!(restored.z, 5.0);
    }

    #[test]
    fn test_vec3_clamps_outside_box() {
        let min = Vec3::ZERO;
        let max = Vec3::ONE;
        let packed = compress_vec3(Vec3::new(-5.0, 5.0, 0.5), min, max);
        assert_eq!(packed.0[0], 0);
        assert_eq!(packed.0[1], u16::MAX);
    }
}
