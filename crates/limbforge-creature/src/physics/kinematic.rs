//! Kinematic creature physics - no external physics engine
//!
//! Free bodies (torso, target) fall under gravity onto a flat ground plane.
//! Joints integrate their motor velocity directly and jointed bodies are
//! placed by forward kinematics from their parent. Limb segments do not
//! collide with anything. Deterministic and cheap, so tests and quick
//! headless runs use it.

use glam::{Mat3, Quat, Vec3};
use std::collections::BTreeMap;

use super::{
    hinge_angle, BodyDesc, BodyState, GroundQuery, JointDesc, JointReading, PhysicsBackend,
    GRAVITY,
};
use crate::error::{CreatureError, Result};
use crate::motor::MotorConfig;
use crate::types::{BodyId, JointId};

#[derive(Debug, Clone)]
struct KinematicBody {
    desc: BodyDesc,
    position: Vec3,
    rotation: Quat,
    linvel: Vec3,
    angvel: Vec3,
    /// Joint driving this body, if any
    driver: Option<JointId>,
}

#[derive(Debug, Clone)]
struct KinematicJoint {
    desc: JointDesc,
    /// Child rotation relative to the parent at zero angle
    rest: Quat,
    /// Radians
    angle: f32,
    /// Radians/second
    velocity: f32,
}

/// Position-based stand-in for a rigid-body engine
#[derive(Debug, Clone)]
pub struct KinematicWorld {
    bodies: BTreeMap<BodyId, KinematicBody>,
    /// Ordered by id; joints are always created parent-first
    joints: BTreeMap<JointId, KinematicJoint>,
    next_body: u32,
    next_joint: u32,
    gravity: f32,
    ground_height: Option<f32>,
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicWorld {
    /// World with standard gravity and a ground plane at y = 0
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            joints: BTreeMap::new(),
            next_body: 0,
            next_joint: 0,
            gravity: GRAVITY,
            ground_height: Some(0.0),
        }
    }

    /// World with no ground at all (ground probes never hit)
    pub fn without_ground() -> Self {
        Self {
            ground_height: None,
            ..Self::new()
        }
    }

    /// Vertical acceleration for free bodies (negative is down)
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn ground_height(&self) -> Option<f32> {
        self.ground_height
    }

    /// Half-height of a rotated box along world Y
    fn vertical_extent(half_extents: Vec3, rotation: Quat) -> f32 {
        let m = Mat3::from_quat(rotation);
        m.x_axis.y.abs() * half_extents.x
            + m.y_axis.y.abs() * half_extents.y
            + m.z_axis.y.abs() * half_extents.z
    }

    fn integrate_free_bodies(&mut self, dt: f32) {
        let gravity = self.gravity;
        let ground = self.ground_height;

        for body in self.bodies.values_mut().filter(|b| b.driver.is_none()) {
            if body.desc.gravity {
                body.linvel.y += gravity * dt;
            }
            body.position += body.linvel * dt;

            if !body.desc.lock_rotation && body.angvel.length_squared() > 0.0 {
                body.rotation = (Quat::from_scaled_axis(body.angvel * dt) * body.rotation).normalize();
            }

            if let Some(ground) = ground {
                let extent = Self::vertical_extent(body.desc.half_extents, body.rotation);
                if body.position.y - extent < ground {
                    body.position.y = ground + extent;
                    body.linvel.y = body.linvel.y.max(0.0);
                    let keep = (1.0 - body.desc.material.friction).clamp(0.0, 1.0);
                    body.linvel.x *= keep;
                    body.linvel.z *= keep;
                }
            }
        }
    }

    fn drive_joints(&mut self, dt: f32) {
        for joint in self.joints.values_mut() {
            let motor = joint.desc.motor;
            let target = motor.target_velocity.to_radians();

            if motor.free_spin && motor.target_velocity == 0.0 {
                // Coast
            } else {
                let mass = self
                    .bodies
                    .get(&joint.desc.child)
                    .map(|b| b.desc.mass)
                    .unwrap_or(1.0)
                    .max(1e-3);
                let max_change = motor.force / mass * dt;
                joint.velocity += (target - joint.velocity).clamp(-max_change, max_change);
            }

            joint.angle += joint.velocity * dt;
        }
    }

    /// Place every jointed body from its parent, in joint creation order
    fn forward_kinematics(&mut self, dt: f32) {
        let ids: Vec<JointId> = self.joints.keys().copied().collect();

        for id in ids {
            let Some(joint) = self.joints.get(&id) else {
                continue;
            };
            let Some(parent) = self.bodies.get(&joint.desc.parent) else {
                continue;
            };

            let rotation = (parent.rotation
                * joint.rest
                * Quat::from_axis_angle(joint.desc.axis, joint.angle))
            .normalize();
            let position = parent.position + parent.rotation * joint.desc.parent_anchor
                - rotation * joint.desc.child_anchor;
            let angvel = parent.angvel + rotation * joint.desc.axis * joint.velocity;

            if let Some(child) = self.bodies.get_mut(&joint.desc.child) {
                child.linvel = if dt > 0.0 {
                    (position - child.position) / dt
                } else {
                    Vec3::ZERO
                };
                child.position = position;
                child.rotation = rotation;
                child.angvel = angvel;
            }
        }
    }
}

impl GroundQuery for KinematicWorld {
    fn ground_distance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        let ground = self.ground_height?;
        let dir = direction.normalize_or_zero();
        if dir.y >= 0.0 {
            return None;
        }

        let t = (ground - origin.y) / dir.y;
        (t >= 0.0 && t <= max_distance).then_some(t)
    }
}

impl PhysicsBackend for KinematicWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId {
        let id = BodyId::from_raw(self.next_body);
        self.next_body += 1;

        self.bodies.insert(
            id,
            KinematicBody {
                desc: *desc,
                position: desc.position,
                rotation: desc.rotation,
                linvel: Vec3::ZERO,
                angvel: Vec3::ZERO,
                driver: None,
            },
        );
        id
    }

    fn reset_body(&mut self, id: BodyId, desc: &BodyDesc) -> Result<()> {
        let body = self
            .bodies
            .get_mut(&id)
            .ok_or(CreatureError::MissingBody(id))?;
        body.desc = *desc;
        body.position = desc.position;
        body.rotation = desc.rotation;
        body.linvel = Vec3::ZERO;
        body.angvel = Vec3::ZERO;
        Ok(())
    }

    fn destroy_body(&mut self, id: BodyId) {
        if self.bodies.remove(&id).is_none() {
            return;
        }

        let attached: Vec<JointId> = self
            .joints
            .iter()
            .filter(|(_, j)| j.desc.parent == id || j.desc.child == id)
            .map(|(jid, _)| *jid)
            .collect();

        for jid in attached {
            if let Some(joint) = self.joints.remove(&jid) {
                if let Some(child) = self.bodies.get_mut(&joint.desc.child) {
                    child.driver = None;
                }
            }
        }
    }

    fn create_joint(&mut self, desc: &JointDesc) -> Result<JointId> {
        let parent_rot = self
            .bodies
            .get(&desc.parent)
            .ok_or(CreatureError::MissingBody(desc.parent))?
            .rotation;
        let child = self
            .bodies
            .get_mut(&desc.child)
            .ok_or(CreatureError::MissingBody(desc.child))?;

        let id = JointId::from_raw(self.next_joint);
        self.next_joint += 1;
        child.driver = Some(id);

        self.joints.insert(
            id,
            KinematicJoint {
                desc: *desc,
                rest: parent_rot.inverse() * child.rotation,
                angle: 0.0,
                velocity: 0.0,
            },
        );
        Ok(id)
    }

    fn set_motor(&mut self, id: JointId, motor: &MotorConfig) -> Result<()> {
        let joint = self
            .joints
            .get_mut(&id)
            .ok_or(CreatureError::MissingJoint(id))?;
        joint.desc.motor = *motor;
        Ok(())
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        self.bodies.get(&id).map(|b| BodyState {
            position: b.position,
            rotation: b.rotation,
            linvel: b.linvel,
            angvel: b.angvel,
        })
    }

    fn joint_reading(&self, id: JointId) -> Option<JointReading> {
        let joint = self.joints.get(&id)?;
        let parent = self.bodies.get(&joint.desc.parent)?;
        let child = self.bodies.get(&joint.desc.child)?;

        let angle = hinge_angle(parent.rotation, child.rotation, joint.rest, joint.desc.axis);
        Some(JointReading {
            angle: angle.to_degrees(),
            velocity: joint.velocity.to_degrees(),
        })
    }

    fn set_body_pose(&mut self, id: BodyId, position: Vec3, rotation: Quat) -> Result<()> {
        let body = self
            .bodies
            .get_mut(&id)
            .ok_or(CreatureError::MissingBody(id))?;
        body.position = position;
        body.rotation = rotation;
        body.linvel = Vec3::ZERO;
        body.angvel = Vec3::ZERO;
        Ok(())
    }

    fn step(&mut self, dt: f32) {
        self.integrate_free_bodies(dt);
        self.drive_joints(dt);
        self.forward_kinematics(dt);
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn joint_count(&self) -> usize {
        self.joints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BodyRole;

    fn box_desc(role: BodyRole, y: f32) -> BodyDesc {
        BodyDesc::new(role, Vec3::splat(0.5), 1.0).at(Vec3::new(0.0, y, 0.0), Quat::IDENTITY)
    }

    fn hinge(world: &mut KinematicWorld, velocity: f32) -> (BodyId, BodyId, JointId) {
        let mut parent_desc = box_desc(BodyRole::Torso, 5.0);
        parent_desc.gravity = false;
        let parent = world.create_body(&parent_desc);

        let child_desc = BodyDesc::new(BodyRole::Segment, Vec3::new(0.2, 0.5, 0.2), 1.0)
            .at(Vec3::new(0.0, 4.0, 0.0), Quat::IDENTITY);
        let child = world.create_body(&child_desc);

        let joint = world
            .create_joint(&JointDesc {
                parent,
                child,
                parent_anchor: Vec3::new(0.0, -0.5, 0.0),
                child_anchor: Vec3::new(0.0, 0.5, 0.0),
                axis: Vec3::X,
                motor: MotorConfig {
                    target_velocity: velocity,
                    force: 1000.0,
                    free_spin: false,
                },
            })
            .unwrap();
        (parent, child, joint)
    }

    #[test]
    fn test_body_falls_and_rests_on_ground() {
        let mut world = KinematicWorld::new();
        let id = world.create_body(&box_desc(BodyRole::Target, 3.0));

        for _ in 0..200 {
            world.step(0.02);
        }

        let state = world.body_state(id).unwrap();
        assert!((state.position.y - 0.5).abs() < 1e-4, "y = {}", state.position.y);
        assert_eq!(state.linvel.y, 0.0);
    }

    #[test]
    fn test_body_without_gravity_stays_put() {
        let mut world = KinematicWorld::new();
        let mut desc = box_desc(BodyRole::Target, 3.0);
        desc.gravity = false;
        let id = world.create_body(&desc);

        world.step(0.1);
        assert_eq!(world.body_state(id).unwrap().position.y, 3.0);
    }

    #[test]
    fn test_joint_integrates_motor_velocity() {
        let mut world = KinematicWorld::new();
        let (_, _, joint) = hinge(&mut world, 45.0);

        for _ in 0..50 {
            world.step(0.02);
        }

        let reading = world.joint_reading(joint).unwrap();
        assert!((reading.velocity - 45.0).abs() < 1e-2);
        // 50 steps x 0.02 s x 45 deg/s
        assert!((reading.angle - 45.0).abs() < 0.5, "angle {}", reading.angle);
    }

    #[test]
    fn test_child_follows_anchor() {
        let mut world = KinematicWorld::new();
        let (parent, child, _) = hinge(&mut world, 90.0);

        for _ in 0..10 {
            world.step(0.02);
        }

        let p = world.body_state(parent).unwrap();
        let c = world.body_state(child).unwrap();
        let parent_anchor = p.position + p.rotation * Vec3::new(0.0, -0.5, 0.0);
        let child_anchor = c.position + c.rotation * Vec3::new(0.0, 0.5, 0.0);
        assert!((parent_anchor - child_anchor).length() < 1e-4);
        assert!(c.angvel.length() > 0.0);
    }

    #[test]
    fn test_free_spin_coasts() {
        let mut world = KinematicWorld::new();
        let (_, _, joint) = hinge(&mut world, 30.0);
        world.step(0.02);

        world
            .set_motor(
                joint,
                &MotorConfig {
                    target_velocity: 0.0,
                    force: 1000.0,
                    free_spin: true,
                },
            )
            .unwrap();
        world.step(0.02);
        assert!((world.joint_reading(joint).unwrap().velocity - 30.0).abs() < 1e-2);

        world
            .set_motor(
                joint,
                &MotorConfig {
                    target_velocity: 0.0,
                    force: 1000.0,
                    free_spin: false,
                },
            )
            .unwrap();
        world.step(0.02);
        assert!(world.joint_reading(joint).unwrap().velocity.abs() < 1e-3);
    }

    #[test]
    fn test_destroy_body_removes_joints() {
        let mut world = KinematicWorld::new();
        let (parent, child, joint) = hinge(&mut world, 10.0);
        assert_eq!(world.body_count(), 2);
        assert_eq!(world.joint_count(), 1);

        world.destroy_body(child);
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.joint_count(), 0);
        assert!(world.joint_reading(joint).is_none());
        assert!(world.body_state(parent).is_some());
    }

    #[test]
    fn test_create_joint_missing_body() {
        let mut world = KinematicWorld::new();
        let result = world.create_joint(&JointDesc {
            parent: BodyId::from_raw(0),
            child: BodyId::from_raw(1),
            parent_anchor: Vec3::ZERO,
            child_anchor: Vec3::ZERO,
            axis: Vec3::X,
            motor: MotorConfig::default(),
        });
        assert!(matches!(result, Err(CreatureError::MissingBody(_))));
    }

    #[test]
    fn test_ground_distance() {
        let world = KinematicWorld::new();
        let hit = world.ground_distance(Vec3::new(1.0, 4.0, 2.0), Vec3::NEG_Y, 10.0);
        assert_eq!(hit, Some(4.0));

        assert_eq!(world.ground_distance(Vec3::new(0.0, 12.0, 0.0), Vec3::NEG_Y, 10.0), None);
        assert_eq!(world.ground_distance(Vec3::new(0.0, 4.0, 0.0), Vec3::Y, 10.0), None);

        let empty = KinematicWorld::without_ground();
        assert_eq!(empty.ground_distance(Vec3::new(0.0, 4.0, 0.0), Vec3::NEG_Y, 10.0), None);
    }

    #[test]
    fn test_set_body_pose_teleports_and_stops() {
        let mut world = KinematicWorld::new();
        let id = world.create_body(&box_desc(BodyRole::Target, 3.0));
        world.step(0.1);
        assert!(world.body_state(id).unwrap().linvel.y < 0.0);

        let rotation = Quat::from_rotation_y(0.5);
        world
            .set_body_pose(id, Vec3::new(1.0, 8.0, -2.0), rotation)
            .unwrap();
        let state = world.body_state(id).unwrap();
        assert_eq!(state.position, Vec3::new(1.0, 8.0, -2.0));
        assert!(state.rotation.abs_diff_eq(rotation, 1e-6));
        assert_eq!(state.linvel, Vec3::ZERO);

        assert!(matches!(
            world.set_body_pose(BodyId::from_raw(99), Vec3::ZERO, Quat::IDENTITY),
            Err(CreatureError::MissingBody(_))
        ));
    }

    #[test]
    fn test_custom_gravity() {
        let mut light = KinematicWorld::new().with_gravity(-1.0);
        let mut heavy = KinematicWorld::new();
        assert_eq!(light.ground_height(), Some(0.0));
        assert_eq!(KinematicWorld::without_ground().ground_height(), None);

        let a = light.create_body(&box_desc(BodyRole::Target, 5.0));
        let b = heavy.create_body(&box_desc(BodyRole::Target, 5.0));
        light.step(0.1);
        heavy.step(0.1);

        let fall_light = 5.0 - light.body_state(a).unwrap().position.y;
        let fall_heavy = 5.0 - heavy.body_state(b).unwrap().position.y;
        assert!(fall_light > 0.0);
        assert!(fall_heavy > fall_light * 5.0);
    }
}
