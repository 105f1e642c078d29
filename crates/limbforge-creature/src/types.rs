//! Common types and capacity constants for creatures

use serde::{Deserialize, Serialize};

/// Number of joint slots carried by every creature (4 limbs x 3 segments)
pub const JOINT_CAPACITY: usize = 12;

/// Maximum number of limbs a body plan may request
pub const MAX_LIMBS: usize = 4;

/// Maximum number of segments in one limb chain
pub const MAX_CHAIN_LENGTH: usize = 3;

/// Fixed-length action: one motor command per joint slot, nominally in [-1, 1]
pub type ActionVector = [f32; JOINT_CAPACITY];

/// RGBA color tag attached to limbs
pub type Rgba = [u8; 4];

/// Handle to a rigid body owned by a physics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(u32);

impl BodyId {
    /// Create a body id from a raw value (backends allocate these)
    pub fn from_raw(id: u32) -> Self {
        BodyId(id)
    }

    /// Get the raw u32 value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Handle to a motorized joint owned by a physics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JointId(u32);

impl JointId {
    /// Create a joint id from a raw value (backends allocate these)
    pub fn from_raw(id: u32) -> Self {
        JointId(id)
    }

    /// Get the raw u32 value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Joint({})", self.0)
    }
}

/// Inclusive range of reals sampled uniformly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f32,
    pub max: f32,
}

impl Bounds {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Degenerate range that always samples `value`
    pub const fn fixed(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Draw a value uniformly from `[min, max]`
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Convert an HSV triple (each in 0..=1) to an opaque RGBA color
pub fn hsv_to_rgba(hue: f32, saturation: f32, value: f32) -> Rgba {
    let h = (hue.rem_euclid(1.0)) * 6.0;
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);

    let c = v * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
        255,
    ]
}
