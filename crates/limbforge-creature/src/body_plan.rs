//! Procedural body-plan generation
//!
//! A body plan is pure data: torso dimensions plus a list of limb chains.
//! Two policies produce plans behind the same [`BodyPlanPolicy`] trait:
//!
//! - [`FreeRangingPlan`]: 1-4 limbs attached at random edge points of the
//!   torso, each a chain of 2-3 randomly sized segments with random hinge axes
//! - [`BipedalPlan`]: a symmetric two-leg, two-arm layout hanging along -Y
//!
//! Generation draws every random value up front, so a [`CreatureSpec`]
//! fully determines the rig built from it.

use glam::Vec3;
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::error::{CreatureError, Result};
use crate::types::{hsv_to_rgba, Bounds, Rgba, JOINT_CAPACITY, MAX_CHAIN_LENGTH, MAX_LIMBS};

/// Edge midpoints of a unit box centered on the origin.
///
/// Scaled component-wise by the torso dimensions to get attachment points.
pub const ATTACHMENT_CATALOG: [Vec3; 12] = [
    Vec3::new(-0.5, 0.5, 0.0),
    Vec3::new(0.5, 0.5, 0.0),
    Vec3::new(0.0, 0.5, -0.5),
    Vec3::new(0.0, 0.5, 0.5),
    Vec3::new(-0.5, 0.0, -0.5),
    Vec3::new(0.5, 0.0, -0.5),
    Vec3::new(-0.5, 0.0, 0.5),
    Vec3::new(0.5, 0.0, 0.5),
    Vec3::new(-0.5, -0.5, 0.0),
    Vec3::new(0.5, -0.5, 0.0),
    Vec3::new(0.0, -0.5, -0.5),
    Vec3::new(0.0, -0.5, 0.5),
];

pub const RED: Rgba = [255, 0, 0, 255];
pub const GREEN: Rgba = [0, 255, 0, 255];
pub const BLUE: Rgba = [0, 0, 255, 255];
pub const YELLOW: Rgba = [255, 255, 0, 255];

/// Full torso dimensions (world units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TorsoDims {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl TorsoDims {
    pub fn new(width: f32, height: f32, depth: f32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn extents(&self) -> Vec3 {
        Vec3::new(self.width, self.height, self.depth)
    }

    pub fn half_extents(&self) -> Vec3 {
        self.extents() * 0.5
    }
}

/// One rigid segment of a limb chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    /// Full extents: x = width, y = length along the chain, z = depth
    pub extents: Vec3,
    pub mass: f32,
    /// Hinge axis in torso-local coordinates (unit length)
    pub axis: Vec3,
}

impl SegmentSpec {
    pub fn length(&self) -> f32 {
        self.extents.y
    }

    pub fn half_extents(&self) -> Vec3 {
        self.extents * 0.5
    }
}

/// One limb: an ordered chain of segments grown from an attachment point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimbSpec {
    /// Attachment point on the torso (torso-local, world units)
    pub attachment: Vec3,
    /// Unit direction the chain grows in (torso-local)
    pub direction: Vec3,
    pub segments: Vec<SegmentSpec>,
    pub color: Rgba,
    /// First joint slot used by this limb (`limb_index * 3`)
    pub joint_base: usize,
}

impl LimbSpec {
    /// Number of segments (and joints) in the chain
    pub fn chain_length(&self) -> usize {
        self.segments.len()
    }
}

/// Complete description of one creature, produced once per episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSpec {
    pub torso: TorsoDims,
    pub limbs: Vec<LimbSpec>,
}

impl CreatureSpec {
    /// Total number of joints the rig will carry
    pub fn joint_count(&self) -> usize {
        self.limbs.iter().map(LimbSpec::chain_length).sum()
    }

    /// Check dimensions and masses are usable for a physics body
    pub fn validate(&self) -> Result<()> {
        let dims = self.torso.extents();
        if !dims.is_finite() || dims.min_element() <= 0.0 {
            return Err(CreatureError::InvalidPlan(format!(
                "torso dimensions must be positive, got {:?}",
                dims
            )));
        }

        for (i, limb) in self.limbs.iter().enumerate() {
            if limb.segments.is_empty() {
                return Err(CreatureError::InvalidPlan(format!(
                    "limb {} has no segments",
                    i
                )));
            }
            for (j, seg) in limb.segments.iter().enumerate() {
                if !seg.extents.is_finite() || seg.extents.min_element() <= 0.0 {
                    return Err(CreatureError::InvalidPlan(format!(
                        "limb {} segment {} has non-positive extents {:?}",
                        i, j, seg.extents
                    )));
                }
                if seg.mass <= 0.0 || !seg.mass.is_finite() {
                    return Err(CreatureError::InvalidPlan(format!(
                        "limb {} segment {} has invalid mass {}",
                        i, j, seg.mass
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A source of body plans
pub trait BodyPlanPolicy {
    /// Human-readable policy name
    fn name(&self) -> &'static str;

    /// Draw a new creature plan from `rng`
    fn generate(&self, rng: &mut dyn RngCore) -> CreatureSpec;

    /// Check the policy cannot produce a plan that overruns the joint capacity
    fn validate(&self) -> Result<()>;

    /// Reproducible generation from a seed
    fn generate_seeded(&self, seed: u64) -> CreatureSpec {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        self.generate(&mut rng)
    }
}

fn check_bounds(label: &str, bounds: &Bounds) -> Result<()> {
    if !bounds.is_valid() || bounds.min <= 0.0 {
        return Err(CreatureError::InvalidPlan(format!(
            "{} bounds must be positive and ordered, got [{}, {}]",
            label, bounds.min, bounds.max
        )));
    }
    Ok(())
}

fn check_counts(max_limbs: usize, min_chain: usize, max_chain: usize) -> Result<()> {
    if min_chain == 0 || min_chain > max_chain || max_chain > MAX_CHAIN_LENGTH {
        return Err(CreatureError::InvalidPlan(format!(
            "chain length range {}..={} must lie within 1..={}",
            min_chain, max_chain, MAX_CHAIN_LENGTH
        )));
    }
    if max_limbs > MAX_LIMBS || max_limbs * max_chain > JOINT_CAPACITY {
        return Err(CreatureError::InvalidPlan(format!(
            "{} limbs x {} segments exceeds {} joint slots",
            max_limbs, max_chain, JOINT_CAPACITY
        )));
    }
    Ok(())
}

/// Uniform direction on the unit sphere
fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    let z: f32 = rng.gen_range(-1.0..=1.0);
    let theta: f32 = rng.gen_range(0.0..TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

/// Random limbs at random torso edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeRangingPlan {
    pub torso_width: Bounds,
    pub torso_height: Bounds,
    pub torso_depth: Bounds,
    pub min_limbs: usize,
    pub max_limbs: usize,
    pub min_chain_length: usize,
    pub max_chain_length: usize,
    pub segment_width: Bounds,
    pub segment_length: Bounds,
    pub segment_depth: Bounds,
    pub segment_mass: Bounds,
}

impl Default for FreeRangingPlan {
    fn default() -> Self {
        Self {
            torso_width: Bounds::new(1.0, 1.5),
            torso_height: Bounds::new(1.5, 2.0),
            torso_depth: Bounds::new(1.0, 1.5),
            min_limbs: 1,
            max_limbs: 4,
            min_chain_length: 2,
            max_chain_length: 3,
            segment_width: Bounds::new(0.3, 0.7),
            segment_length: Bounds::new(0.5, 1.0),
            segment_depth: Bounds::new(0.3, 0.7),
            segment_mass: Bounds::new(0.5, 2.0),
        }
    }
}

impl BodyPlanPolicy for FreeRangingPlan {
    fn name(&self) -> &'static str {
        "FreeRanging"
    }

    fn generate(&self, rng: &mut dyn RngCore) -> CreatureSpec {
        let torso = TorsoDims::new(
            self.torso_width.sample(rng),
            self.torso_height.sample(rng),
            self.torso_depth.sample(rng),
        );

        let limb_count = rng.gen_range(self.min_limbs..=self.max_limbs);
        let mut limbs = Vec::with_capacity(limb_count);

        for limb_index in 0..limb_count {
            let point = ATTACHMENT_CATALOG[rng.gen_range(0..ATTACHMENT_CATALOG.len())];
            let color = hsv_to_rgba(rng.gen(), rng.gen(), rng.gen());
            let chain_length = rng.gen_range(self.min_chain_length..=self.max_chain_length);

            let segments = (0..chain_length)
                .map(|_| SegmentSpec {
                    extents: Vec3::new(
                        self.segment_width.sample(rng),
                        self.segment_length.sample(rng),
                        self.segment_depth.sample(rng),
                    ),
                    mass: self.segment_mass.sample(rng),
                    axis: random_unit_vector(rng),
                })
                .collect();

            limbs.push(LimbSpec {
                attachment: point * torso.extents(),
                direction: point.normalize(),
                segments,
                color,
                joint_base: limb_index * MAX_CHAIN_LENGTH,
            });
        }

        CreatureSpec { torso, limbs }
    }

    fn validate(&self) -> Result<()> {
        for (label, bounds) in [
            ("torso width", &self.torso_width),
            ("torso height", &self.torso_height),
            ("torso depth", &self.torso_depth),
            ("segment width", &self.segment_width),
            ("segment length", &self.segment_length),
            ("segment depth", &self.segment_depth),
            ("segment mass", &self.segment_mass),
        ] {
            check_bounds(label, bounds)?;
        }
        if self.min_limbs == 0 || self.min_limbs > self.max_limbs {
            return Err(CreatureError::InvalidPlan(format!(
                "limb count range {}..={} is empty",
                self.min_limbs, self.max_limbs
            )));
        }
        check_counts(self.max_limbs, self.min_chain_length, self.max_chain_length)
    }
}

/// Symmetric two legs and two arms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BipedalPlan {
    pub torso_width: Bounds,
    pub torso_height: Bounds,
    pub torso_depth: Bounds,
    /// Lower limit applied to each torso draw
    pub torso_floor: Vec3,
    pub min_chain_length: usize,
    pub max_chain_length: usize,
    pub segment_width: Bounds,
    pub segment_length: Bounds,
    pub segment_depth: Bounds,
    pub segment_mass: Bounds,
}

impl Default for BipedalPlan {
    fn default() -> Self {
        Self {
            torso_width: Bounds::new(0.5, 2.0),
            torso_height: Bounds::new(1.0, 3.0),
            torso_depth: Bounds::new(0.5, 2.0),
            torso_floor: Vec3::new(1.0, 1.2, 1.0),
            min_chain_length: 3,
            max_chain_length: 3,
            segment_width: Bounds::new(0.3, 0.6),
            segment_length: Bounds::new(1.0, 2.0),
            segment_depth: Bounds::new(0.3, 0.6),
            segment_mass: Bounds::fixed(1.0),
        }
    }
}

impl BipedalPlan {
    fn chain(&self, rng: &mut dyn RngCore, chain_length: usize) -> Vec<SegmentSpec> {
        (0..chain_length)
            .map(|_| SegmentSpec {
                extents: Vec3::new(
                    self.segment_width.sample(rng),
                    self.segment_length.sample(rng),
                    self.segment_depth.sample(rng),
                ),
                mass: self.segment_mass.sample(rng),
                axis: Vec3::X,
            })
            .collect()
    }
}

impl BodyPlanPolicy for BipedalPlan {
    fn name(&self) -> &'static str {
        "Bipedal"
    }

    fn generate(&self, rng: &mut dyn RngCore) -> CreatureSpec {
        let torso = TorsoDims::new(
            self.torso_width.sample(rng).max(self.torso_floor.x),
            self.torso_height.sample(rng).max(self.torso_floor.y),
            self.torso_depth.sample(rng).max(self.torso_floor.z),
        );

        let mut limbs = Vec::with_capacity(4);

        // Legs first (left, right), then arms (left, right)
        for (side, color) in [(-1.0f32, RED), (1.0, GREEN)] {
            let chain_length = rng.gen_range(self.min_chain_length..=self.max_chain_length);
            let segments = self.chain(rng, chain_length);
            limbs.push(LimbSpec {
                attachment: Vec3::new(side * torso.width / 4.0, -torso.height / 2.0, 0.0),
                direction: Vec3::NEG_Y,
                segments,
                color,
                joint_base: limbs.len() * MAX_CHAIN_LENGTH,
            });
        }

        for (side, color) in [(-1.0f32, BLUE), (1.0, YELLOW)] {
            let chain_length = rng.gen_range(self.min_chain_length..=self.max_chain_length);
            let segments = self.chain(rng, chain_length);
            let arm_width = segments[0].extents.x;
            limbs.push(LimbSpec {
                attachment: Vec3::new(
                    side * (torso.width / 2.0 + arm_width / 2.0),
                    torso.height / 2.0,
                    0.0,
                ),
                direction: Vec3::NEG_Y,
                segments,
                color,
                joint_base: limbs.len() * MAX_CHAIN_LENGTH,
            });
        }

        CreatureSpec { torso, limbs }
    }

    fn validate(&self) -> Result<()> {
        for (label, bounds) in [
            ("torso width", &self.torso_width),
            ("torso height", &self.torso_height),
            ("torso depth", &self.torso_depth),
            ("segment width", &self.segment_width),
            ("segment length", &self.segment_length),
            ("segment depth", &self.segment_depth),
            ("segment mass", &self.segment_mass),
        ] {
            check_bounds(label, bounds)?;
        }
        if self.torso_floor.min_element() <= 0.0 {
            return Err(CreatureError::InvalidPlan(format!(
                "torso floor must be positive, got {:?}",
                self.torso_floor
            )));
        }
        check_counts(4, self.min_chain_length, self.max_chain_length)
    }
}

/// Which body plan family to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlanVariant {
    /// Random limbs at random torso edges (learning setup)
    #[default]
    FreeRanging,
    /// Two legs and two arms (static rig setup)
    Bipedal,
}

impl PlanVariant {
    pub fn all() -> &'static [PlanVariant] {
        &[PlanVariant::FreeRanging, PlanVariant::Bipedal]
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            PlanVariant::FreeRanging => "FreeRanging",
            PlanVariant::Bipedal => "Bipedal",
        }
    }
}

impl std::fmt::Display for PlanVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PlanVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "freeranging" | "free" | "random" => Ok(PlanVariant::FreeRanging),
            "bipedal" | "biped" => Ok(PlanVariant::Bipedal),
            _ => Err(format!(
                "Unknown plan variant: {}. Valid: free-ranging, bipedal",
                s
            )),
        }
    }
}

/// Serializable choice of generation policy with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenerationPolicy {
    FreeRanging(FreeRangingPlan),
    Bipedal(BipedalPlan),
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        GenerationPolicy::FreeRanging(FreeRangingPlan::default())
    }
}

impl GenerationPolicy {
    /// Default parameters for a variant
    pub fn from_variant(variant: PlanVariant) -> Self {
        match variant {
            PlanVariant::FreeRanging => GenerationPolicy::FreeRanging(FreeRangingPlan::default()),
            PlanVariant::Bipedal => GenerationPolicy::Bipedal(BipedalPlan::default()),
        }
    }

    pub fn variant(&self) -> PlanVariant {
        match self {
            GenerationPolicy::FreeRanging(_) => PlanVariant::FreeRanging,
            GenerationPolicy::Bipedal(_) => PlanVariant::Bipedal,
        }
    }
}

impl BodyPlanPolicy for GenerationPolicy {
    fn name(&self) -> &'static str {
        match self {
            GenerationPolicy::FreeRanging(plan) => plan.name(),
            GenerationPolicy::Bipedal(plan) => plan.name(),
        }
    }

    fn generate(&self, rng: &mut dyn RngCore) -> CreatureSpec {
        match self {
            GenerationPolicy::FreeRanging(plan) => plan.generate(rng),
            GenerationPolicy::Bipedal(plan) => plan.generate(rng),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            GenerationPolicy::FreeRanging(plan) => plan.validate(),
            GenerationPolicy::Bipedal(plan) => plan.validate(),
        }
    }
}
