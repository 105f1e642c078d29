//! Rig construction from a body plan
//!
//! [`build_rig`] consumes a [`CreatureSpec`], re-dimensions the persistent
//! torso body and grows every limb chain out of it: one box segment and one
//! motorized hinge per chain position. Joints land in fixed slots
//! (`limb_index * 3 + chain_position`) so the observation layout never
//! depends on the body plan.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::body_plan::{CreatureSpec, TorsoDims};
use crate::error::{CreatureError, Result};
use crate::motor::MotorBank;
use crate::physics::{BodyDesc, BodyRole, JointDesc, PhysicsBackend, SurfaceMaterial};
use crate::types::{BodyId, JointId, Rgba, JOINT_CAPACITY, MAX_CHAIN_LENGTH};
use crate::{BoxRenderData, CreatureRenderData};

const TORSO_COLOR: Rgba = [200, 200, 200, 255];

/// Placement and material settings shared by every build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Height of the torso's bottom face above the environment origin
    pub spawn_height: f32,
    pub torso_mass: f32,
    pub material: SurfaceMaterial,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            spawn_height: 5.0,
            torso_mass: 1.0,
            material: SurfaceMaterial::default(),
        }
    }
}

impl RigConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.torso_mass.is_finite() && self.torso_mass > 0.0) {
            return Err(CreatureError::InvalidConfig(format!(
                "torso mass must be positive (got {})",
                self.torso_mass
            )));
        }
        if !self.spawn_height.is_finite() {
            return Err(CreatureError::InvalidConfig(format!(
                "spawn height must be finite (got {})",
                self.spawn_height
            )));
        }
        Ok(())
    }
}

/// One limb segment as built
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub body: BodyId,
    pub joint: JointId,
    pub slot: usize,
    pub limb: usize,
    pub chain_position: usize,
    pub half_extents: Vec3,
    pub color: Rgba,
}

/// A built creature: torso handle, joint slots and owned segments
#[derive(Debug, Clone)]
pub struct Rig {
    torso: BodyId,
    torso_dims: TorsoDims,
    slots: [Option<JointId>; JOINT_CAPACITY],
    segments: Vec<Segment>,
    limb_count: usize,
}

impl Rig {
    pub fn torso(&self) -> BodyId {
        self.torso
    }

    pub fn torso_dims(&self) -> TorsoDims {
        self.torso_dims
    }

    /// Joint in `slot`, or `None` for an empty or out-of-range slot
    pub fn slot(&self, slot: usize) -> Option<JointId> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<JointId>; JOINT_CAPACITY] {
        &self.slots
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn limb_count(&self) -> usize {
        self.limb_count
    }

    /// Number of populated joint slots
    pub fn joint_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Current poses of the torso and every segment
    pub fn render_data<P: PhysicsBackend + ?Sized>(&self, physics: &P) -> CreatureRenderData {
        let mut data = CreatureRenderData::default();

        if let Some(state) = physics.body_state(self.torso) {
            data.boxes.push(BoxRenderData {
                position: state.position,
                rotation: state.rotation,
                half_extents: self.torso_dims.half_extents(),
                color: TORSO_COLOR,
            });
        }

        for segment in &self.segments {
            if let Some(state) = physics.body_state(segment.body) {
                data.boxes.push(BoxRenderData {
                    position: state.position,
                    rotation: state.rotation,
                    half_extents: segment.half_extents,
                    color: segment.color,
                });
            }
        }

        data
    }

    /// Destroy every segment body (and with them, every joint).
    ///
    /// The torso is left in place.
    pub fn teardown<P: PhysicsBackend + ?Sized>(self, physics: &mut P) {
        log::debug!(
            "Tearing down rig: {} segments, {} joints",
            self.segments.len(),
            self.joint_count()
        );
        destroy_segments(physics, &self.segments);
    }
}

fn destroy_segments<P: PhysicsBackend + ?Sized>(physics: &mut P, segments: &[Segment]) {
    for segment in segments {
        physics.destroy_body(segment.body);
    }
}

/// Body description of the torso for a given plan
pub fn torso_desc(dims: &TorsoDims, origin: Vec3, config: &RigConfig) -> BodyDesc {
    let mut desc = BodyDesc::new(BodyRole::Torso, dims.half_extents(), config.torso_mass).at(
        origin + Vec3::new(0.0, config.spawn_height + dims.height / 2.0, 0.0),
        Quat::IDENTITY,
    );
    desc.lock_rotation = true;
    desc.material = config.material;
    desc
}

/// Build a creature rig around the persistent `torso` body.
///
/// On a capacity or slot error every segment created so far is destroyed
/// before the error is returned.
pub fn build_rig<P: PhysicsBackend + ?Sized>(
    spec: CreatureSpec,
    torso: BodyId,
    origin: Vec3,
    config: &RigConfig,
    motors: &MotorBank,
    physics: &mut P,
) -> Result<Rig> {
    spec.validate()?;

    let torso_body = torso_desc(&spec.torso, origin, config);
    physics.reset_body(torso, &torso_body)?;
    let torso_pos = torso_body.position;

    let mut slots = [None; JOINT_CAPACITY];
    let mut segments: Vec<Segment> = Vec::with_capacity(spec.joint_count());

    for (limb_index, limb) in spec.limbs.iter().enumerate() {
        let direction = limb.direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let rotation = Quat::from_rotation_arc(Vec3::Y, direction);

        let mut parent = torso;
        let mut parent_anchor = limb.attachment;
        let mut near_end = limb.attachment;

        for (j, seg) in limb.segments.iter().enumerate() {
            let slot = limb.joint_base + j;

            if j >= MAX_CHAIN_LENGTH || slot >= JOINT_CAPACITY {
                log::error!(
                    "Limb {} chain position {} maps to slot {} beyond capacity {}",
                    limb_index,
                    j,
                    slot,
                    JOINT_CAPACITY
                );
                destroy_segments(physics, &segments);
                return Err(CreatureError::CapacityOverrun {
                    limb: limb_index,
                    chain_position: j,
                    slot,
                    capacity: JOINT_CAPACITY,
                });
            }
            if slots[slot].is_some() {
                log::error!("Limb {} reuses occupied joint slot {}", limb_index, slot);
                destroy_segments(physics, &segments);
                return Err(CreatureError::SlotConflict { slot });
            }

            let half_length = seg.length() / 2.0;
            let center = near_end + direction * half_length;

            let mut desc = BodyDesc::new(BodyRole::Segment, seg.half_extents(), seg.mass)
                .at(torso_pos + center, rotation);
            desc.material = config.material;
            let body = physics.create_body(&desc);

            let motor = motors.get(slot).copied().unwrap_or_default();
            let joint = match physics.create_joint(&JointDesc {
                parent,
                child: body,
                parent_anchor,
                child_anchor: Vec3::new(0.0, -half_length, 0.0),
                axis: (rotation.inverse() * seg.axis).normalize_or_zero(),
                motor,
            }) {
                Ok(joint) => joint,
                Err(e) => {
                    log::error!("Failed to create joint for slot {}: {}", slot, e);
                    physics.destroy_body(body);
                    destroy_segments(physics, &segments);
                    return Err(e);
                }
            };

            slots[slot] = Some(joint);
            segments.push(Segment {
                body,
                joint,
                slot,
                limb: limb_index,
                chain_position: j,
                half_extents: seg.half_extents(),
                color: limb.color,
            });

            parent = body;
            parent_anchor = Vec3::new(0.0, half_length, 0.0);
            near_end += direction * seg.length();
        }

        log::debug!(
            "Limb {}: {} segments at {:?} growing {:?}",
            limb_index,
            limb.chain_length(),
            limb.attachment,
            direction
        );
    }

    log::info!(
        "Built rig: torso {:.2}x{:.2}x{:.2}, {} limbs, {} joints",
        spec.torso.width,
        spec.torso.height,
        spec.torso.depth,
        spec.limbs.len(),
        segments.len()
    );

    Ok(Rig {
        torso,
        torso_dims: spec.torso,
        slots,
        segments,
        limb_count: spec.limbs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body_plan::{
        BodyPlanPolicy, FreeRangingPlan, GenerationPolicy, LimbSpec, PlanVariant, SegmentSpec,
    };
    use crate::physics::KinematicWorld;

    fn segment(length: f32) -> SegmentSpec {
        SegmentSpec {
            extents: Vec3::new(0.4, length, 0.4),
            mass: 1.0,
            axis: Vec3::X,
        }
    }

    fn limb(joint_base: usize, chain: usize) -> LimbSpec {
        LimbSpec {
            attachment: Vec3::new(0.5, 0.0, 0.5),
            direction: Vec3::new(0.5, 0.0, 0.5).normalize(),
            segments: (0..chain).map(|_| segment(0.8)).collect(),
            color: [10, 20, 30, 255],
            joint_base,
        }
    }

    fn spec(limbs: Vec<LimbSpec>) -> CreatureSpec {
        CreatureSpec {
            torso: TorsoDims::new(1.0, 1.0, 1.0),
            limbs,
        }
    }

    fn torso(world: &mut KinematicWorld) -> BodyId {
        world.create_body(&BodyDesc::new(BodyRole::Torso, Vec3::splat(0.5), 1.0))
    }

    #[test]
    fn test_build_single_limb() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let rig = build_rig(
            spec(vec![limb(0, 2)]),
            torso,
            Vec3::ZERO,
            &RigConfig::default(),
            &MotorBank::new(),
            &mut world,
        )
        .unwrap();

        assert_eq!(rig.joint_count(), 2);
        assert!(rig.slot(0).is_some());
        assert!(rig.slot(1).is_some());
        assert!((2..JOINT_CAPACITY).all(|i| rig.slot(i).is_none()));
        assert_eq!(world.body_count(), 3);
        assert_eq!(world.joint_count(), 2);

        let state = world.body_state(torso).unwrap();
        assert!((state.position - Vec3::new(0.0, 5.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_segments_chain_along_direction() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let rig = build_rig(
            spec(vec![limb(0, 2)]),
            torso,
            Vec3::new(10.0, 0.0, 0.0),
            &RigConfig::default(),
            &MotorBank::new(),
            &mut world,
        )
        .unwrap();

        let torso_pos = world.body_state(torso).unwrap().position;
        let dir = Vec3::new(0.5, 0.0, 0.5).normalize();
        let attachment = Vec3::new(0.5, 0.0, 0.5);

        let first = world.body_state(rig.segments()[0].body).unwrap();
        let second = world.body_state(rig.segments()[1].body).unwrap();
        assert!((first.position - (torso_pos + attachment + dir * 0.4)).length() < 1e-5);
        assert!((second.position - (torso_pos + attachment + dir * 1.2)).length() < 1e-5);

        // Segment local +Y follows the growth direction
        assert!((first.rotation * Vec3::Y - dir).length() < 1e-5);
    }

    #[test]
    fn test_chain_stays_connected_while_driven() {
        use rand::SeedableRng;
        use rand_xoshiro::Xoshiro256StarStar;

        let mut rng = Xoshiro256StarStar::seed_from_u64(77);
        let mut motors = MotorBank::new();
        motors.regenerate(&crate::motor::MotorRanges::scaled_drive(), &mut rng);

        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let rig = build_rig(
            FreeRangingPlan::default().generate_seeded(77),
            torso,
            Vec3::ZERO,
            &RigConfig::default(),
            &motors,
            &mut world,
        )
        .unwrap();

        for _ in 0..25 {
            world.step(0.02);
        }

        for pair in rig.segments().windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if prev.limb != next.limb {
                continue;
            }
            let a = world.body_state(prev.body).unwrap();
            let b = world.body_state(next.body).unwrap();
            let far_end = a.position + a.rotation * Vec3::new(0.0, prev.half_extents.y, 0.0);
            let near_end = b.position + b.rotation * Vec3::new(0.0, -next.half_extents.y, 0.0);
            assert!((far_end - near_end).length() < 1e-3);
        }
    }

    #[test]
    fn test_capacity_overrun_cleans_up() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let limbs = (0..5).map(|i| limb(i * 3, 3)).collect();

        let result = build_rig(
            spec(limbs),
            torso,
            Vec3::ZERO,
            &RigConfig::default(),
            &MotorBank::new(),
            &mut world,
        );

        match result {
            Err(CreatureError::CapacityOverrun { limb, slot, .. }) => {
                assert_eq!(limb, 4);
                assert_eq!(slot, 12);
            }
            other => panic!("expected capacity overrun, got {:?}", other),
        }
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_chain_too_long() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let result = build_rig(
            spec(vec![limb(0, 4)]),
            torso,
            Vec3::ZERO,
            &RigConfig::default(),
            &MotorBank::new(),
            &mut world,
        );

        assert!(matches!(
            result,
            Err(CreatureError::CapacityOverrun {
                chain_position: 3,
                ..
            })
        ));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_slot_conflict() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let result = build_rig(
            spec(vec![limb(0, 2), limb(1, 2)]),
            torso,
            Vec3::ZERO,
            &RigConfig::default(),
            &MotorBank::new(),
            &mut world,
        );

        assert!(matches!(result, Err(CreatureError::SlotConflict { slot: 1 })));
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_teardown_keeps_torso() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);
        let rig = build_rig(
            spec(vec![limb(0, 3), limb(3, 2)]),
            torso,
            Vec3::ZERO,
            &RigConfig::default(),
            &MotorBank::new(),
            &mut world,
        )
        .unwrap();
        assert_eq!(world.body_count(), 6);

        let render = rig.render_data(&world);
        assert_eq!(render.boxes.len(), 6);
        assert_eq!(render.boxes[0].color, TORSO_COLOR);
        assert_eq!(render.boxes[1].color, [10, 20, 30, 255]);

        rig.teardown(&mut world);
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.joint_count(), 0);
        assert!(world.body_state(torso).is_some());
    }

    #[test]
    fn test_populated_slots_match_plan_across_seeds() {
        let mut world = KinematicWorld::new();
        let torso = torso(&mut world);

        for variant in PlanVariant::all() {
            let policy = GenerationPolicy::from_variant(*variant);
            for seed in 0..300 {
                let spec = policy.generate_seeded(seed);
                let expected = spec.joint_count();
                let mut slots = [false; JOINT_CAPACITY];
                for limb in &spec.limbs {
                    for j in 0..limb.chain_length() {
                        slots[limb.joint_base + j] = true;
                    }
                }

                let rig = build_rig(
                    spec,
                    torso,
                    Vec3::ZERO,
                    &RigConfig::default(),
                    &MotorBank::new(),
                    &mut world,
                )
                .unwrap();

                assert_eq!(rig.joint_count(), expected, "{} seed {}", variant, seed);
                for (slot, filled) in slots.iter().enumerate() {
                    assert_eq!(
                        rig.slot(slot).is_some(),
                        *filled,
                        "{} seed {} slot {}",
                        variant,
                        seed,
                        slot
                    );
                }
                assert_eq!(world.joint_count(), expected);

                rig.teardown(&mut world);
            }
        }
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_rig_config_validate() {
        assert!(RigConfig::default().validate().is_ok());

        let massless = RigConfig {
            torso_mass: 0.0,
            ..Default::default()
        };
        assert!(matches!(massless.validate(), Err(CreatureError::InvalidConfig(_))));

        let nowhere = RigConfig {
            spawn_height: f32::INFINITY,
            ..Default::default()
        };
        assert!(nowhere.validate().is_err());
    }
}
