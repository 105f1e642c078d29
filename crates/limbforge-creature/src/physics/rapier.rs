//! Rigid-body creature physics on rapier3d
//!
//! Box colliders on dynamic bodies, a fixed ground slab whose top face is
//! y = 0, and revolute generic joints driven by force-based velocity
//! motors. Collision groups keep limbs from colliding with each other and
//! restrict ground probes to the ground slab.

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Unit, UnitQuaternion};
use rapier3d::prelude::*;
use std::collections::HashMap;

use super::{
    hinge_angle, BodyDesc, BodyRole, BodyState, GroundQuery, JointDesc, JointReading,
    PhysicsBackend, GRAVITY,
};
use crate::error::{CreatureError, Result};
use crate::motor::MotorConfig;
use crate::types::{BodyId, JointId};

const GROUND_GROUP: Group = Group::GROUP_1;
const CREATURE_GROUP: Group = Group::GROUP_2;
const TARGET_GROUP: Group = Group::GROUP_3;

/// Velocity motor damping factor
const MOTOR_DAMPING: f32 = 100.0;

/// Half size of the ground slab
const GROUND_HALF_EXTENTS: Vec3 = Vec3::new(500.0, 0.5, 500.0);

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

fn to_rotation(q: Quat) -> Rotation<Real> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn from_rotation(r: &Rotation<Real>) -> Quat {
    Quat::from_xyzw(r.i, r.j, r.k, r.w)
}

fn groups_for(role: BodyRole) -> InteractionGroups {
    match role {
        BodyRole::Torso | BodyRole::Segment => {
            InteractionGroups::new(CREATURE_GROUP, GROUND_GROUP | TARGET_GROUP)
        }
        BodyRole::Target => InteractionGroups::new(TARGET_GROUP, GROUND_GROUP | CREATURE_GROUP),
    }
}

/// Hinge bookkeeping needed to read angles back out
struct RapierJoint {
    handle: ImpulseJointHandle,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    /// Hinge axis in the child frame
    axis: Vec3,
    /// Child rotation relative to the parent at creation
    rest: Quat,
}

/// Manages a rapier3d physics world for creatures
pub struct RapierWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    bodies: HashMap<BodyId, RigidBodyHandle>,
    joints: HashMap<JointId, RapierJoint>,
    next_body: u32,
    next_joint: u32,
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierWorld {
    /// World with standard gravity and a ground slab whose top is y = 0
    pub fn new() -> Self {
        let mut world = Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, GRAVITY, 0.0],
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            bodies: HashMap::new(),
            joints: HashMap::new(),
            next_body: 0,
            next_joint: 0,
        };

        let ground = ColliderBuilder::cuboid(
            GROUND_HALF_EXTENTS.x,
            GROUND_HALF_EXTENTS.y,
            GROUND_HALF_EXTENTS.z,
        )
        .translation(vector![0.0, -GROUND_HALF_EXTENTS.y, 0.0])
        .friction(0.8)
        .collision_groups(InteractionGroups::new(GROUND_GROUP, Group::ALL))
        .build();
        world.collider_set.insert(ground);
        world.query_pipeline.update(&world.collider_set);

        log::debug!("Rapier creature world created (gravity {})", GRAVITY);
        world
    }

    fn handle(&self, id: BodyId) -> Result<RigidBodyHandle> {
        self.bodies
            .get(&id)
            .copied()
            .ok_or(CreatureError::MissingBody(id))
    }

    fn build_collider(desc: &BodyDesc) -> Collider {
        ColliderBuilder::cuboid(desc.half_extents.x, desc.half_extents.y, desc.half_extents.z)
            .mass(desc.mass)
            .friction(desc.material.friction)
            .restitution(desc.material.restitution)
            .collision_groups(groups_for(desc.role))
            .build()
    }

    fn locked_axes(desc: &BodyDesc) -> LockedAxes {
        if desc.lock_rotation {
            LockedAxes::ROTATION_LOCKED
        } else {
            LockedAxes::empty()
        }
    }

    fn gravity_scale(desc: &BodyDesc) -> Real {
        if desc.gravity {
            1.0
        } else {
            0.0
        }
    }
}

impl GroundQuery for RapierWorld {
    fn ground_distance(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        let ray = Ray::new(to_point(origin), to_vector(dir));
        let filter =
            QueryFilter::default().groups(InteractionGroups::new(Group::ALL, GROUND_GROUP));

        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance,
                true,
                filter,
            )
            .map(|(_, toi)| toi)
    }
}

impl PhysicsBackend for RapierWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId {
        let body = RigidBodyBuilder::dynamic()
            .position(Isometry::from_parts(
                to_vector(desc.position).into(),
                to_rotation(desc.rotation),
            ))
            .gravity_scale(Self::gravity_scale(desc))
            .locked_axes(Self::locked_axes(desc))
            .build();
        let handle = self.rigid_body_set.insert(body);
        self.collider_set.insert_with_parent(
            Self::build_collider(desc),
            handle,
            &mut self.rigid_body_set,
        );

        let id = BodyId::from_raw(self.next_body);
        self.next_body += 1;
        self.bodies.insert(id, handle);
        id
    }

    fn reset_body(&mut self, id: BodyId, desc: &BodyDesc) -> Result<()> {
        let handle = self.handle(id)?;

        let old_colliders: Vec<ColliderHandle> = self
            .rigid_body_set
            .get(handle)
            .map(|b| b.colliders().to_vec())
            .unwrap_or_default();
        for collider in old_colliders {
            self.collider_set.remove(
                collider,
                &mut self.island_manager,
                &mut self.rigid_body_set,
                true,
            );
        }
        self.collider_set.insert_with_parent(
            Self::build_collider(desc),
            handle,
            &mut self.rigid_body_set,
        );

        let body = self
            .rigid_body_set
            .get_mut(handle)
            .ok_or(CreatureError::MissingBody(id))?;
        body.set_position(
            Isometry::from_parts(to_vector(desc.position).into(), to_rotation(desc.rotation)),
            true,
        );
        body.set_linvel(vector![0.0, 0.0, 0.0], true);
        body.set_angvel(vector![0.0, 0.0, 0.0], true);
        body.set_gravity_scale(Self::gravity_scale(desc), true);
        body.set_locked_axes(Self::locked_axes(desc), true);
        Ok(())
    }

    fn destroy_body(&mut self, id: BodyId) {
        let Some(handle) = self.bodies.remove(&id) else {
            return;
        };

        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );

        // Joints attached to the removed body are gone from rapier too
        let impulse_joints = &self.impulse_joint_set;
        self.joints
            .retain(|_, joint| impulse_joints.get(joint.handle).is_some());
    }

    fn create_joint(&mut self, desc: &JointDesc) -> Result<JointId> {
        let parent = self.handle(desc.parent)?;
        let child = self.handle(desc.child)?;

        let parent_rot = self
            .rigid_body_set
            .get(parent)
            .map(|b| from_rotation(b.rotation()))
            .ok_or(CreatureError::MissingBody(desc.parent))?;
        let child_rot = self
            .rigid_body_set
            .get(child)
            .map(|b| from_rotation(b.rotation()))
            .ok_or(CreatureError::MissingBody(desc.child))?;

        let rest = parent_rot.inverse() * child_rot;
        let axis = desc.axis.normalize_or_zero();
        let parent_axis = rest * axis;

        let data = GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
            .local_anchor1(to_point(desc.parent_anchor))
            .local_anchor2(to_point(desc.child_anchor))
            .local_axis1(Unit::new_normalize(to_vector(parent_axis)))
            .local_axis2(Unit::new_normalize(to_vector(axis)))
            .contacts_enabled(false)
            .motor_model(JointAxis::AngX, MotorModel::ForceBased)
            .motor_velocity(
                JointAxis::AngX,
                desc.motor.target_velocity.to_radians(),
                MOTOR_DAMPING,
            )
            .motor_max_force(JointAxis::AngX, desc.motor.force)
            .build();

        let handle = self.impulse_joint_set.insert(parent, child, data, true);

        let id = JointId::from_raw(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(
            id,
            RapierJoint {
                handle,
                parent,
                child,
                axis,
                rest,
            },
        );
        Ok(id)
    }

    fn set_motor(&mut self, id: JointId, motor: &MotorConfig) -> Result<()> {
        let handle = self
            .joints
            .get(&id)
            .map(|j| j.handle)
            .ok_or(CreatureError::MissingJoint(id))?;
        let joint = self
            .impulse_joint_set
            .get_mut(handle, true)
            .ok_or(CreatureError::MissingJoint(id))?;

        let coast = motor.free_spin && motor.target_velocity == 0.0;
        joint.data.set_motor_velocity(
            JointAxis::AngX,
            motor.target_velocity.to_radians(),
            MOTOR_DAMPING,
        );
        joint
            .data
            .set_motor_max_force(JointAxis::AngX, if coast { 0.0 } else { motor.force });
        Ok(())
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        let body = self.rigid_body_set.get(*self.bodies.get(&id)?)?;
        Some(BodyState {
            position: from_vector(body.translation()),
            rotation: from_rotation(body.rotation()),
            linvel: from_vector(body.linvel()),
            angvel: from_vector(body.angvel()),
        })
    }

    fn joint_reading(&self, id: JointId) -> Option<JointReading> {
        let joint = self.joints.get(&id)?;
        let parent = self.rigid_body_set.get(joint.parent)?;
        let child = self.rigid_body_set.get(joint.child)?;

        let parent_rot = from_rotation(parent.rotation());
        let child_rot = from_rotation(child.rotation());
        let angle = hinge_angle(parent_rot, child_rot, joint.rest, joint.axis);

        let world_axis = child_rot * joint.axis;
        let relative = from_vector(child.angvel()) - from_vector(parent.angvel());

        Some(JointReading {
            angle: angle.to_degrees(),
            velocity: relative.dot(world_axis).to_degrees(),
        })
    }

    fn set_body_pose(&mut self, id: BodyId, position: Vec3, rotation: Quat) -> Result<()> {
        let handle = self.handle(id)?;
        let body = self
            .rigid_body_set
            .get_mut(handle)
            .ok_or(CreatureError::MissingBody(id))?;
        body.set_position(
            Isometry::from_parts(to_vector(position).into(), to_rotation(rotation)),
            true,
        );
        body.set_linvel(vector![0.0, 0.0, 0.0], true);
        body.set_angvel(vector![0.0, 0.0, 0.0], true);
        Ok(())
    }

    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn joint_count(&self) -> usize {
        self.joints.len()
    }
}
