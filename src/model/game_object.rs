use std::fmt;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};

use crate::controller::behavior::{AvatarBehavior, Behavior, GenericBehavior, StaticBehavior};
use crate::model::resources::MeshId;

/// Stable handle of an object inside a scene. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// Id carried by objects that have not been added to a scene yet.
    pub const UNASSIGNED: ObjectId = ObjectId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Keyboard-driven, followed by the camera. One per scene.
    Avatar,
    /// Never moves (the background).
    Static,
    /// Integrates its own force and torque, takes no input (asteroids).
    Generic,
}

impl ObjectKind {
    pub fn behavior(self) -> Rc<dyn Behavior> {
        match self {
            ObjectKind::Avatar => Rc::new(AvatarBehavior),
            ObjectKind::Static => Rc::new(StaticBehavior),
            ObjectKind::Generic => Rc::new(GenericBehavior),
        }
    }
}

/// What a controller asks of its object for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actuation {
    pub thrust: f32,
    pub force: Vec3,
    pub torque: f32,
}

#[derive(Clone)]
pub struct GameObject {
    pub(crate) id: ObjectId,
    pub kind: ObjectKind,
    pub mesh: MeshId,

    pub position: Vec3,
    pub orientation: f32,
    pub scale: Vec3,

    pub velocity: Vec3,
    pub angular_velocity: f32,

    pub force: Vec3,
    pub torque: f32,
    pub thrust: f32,

    pub inv_mass: f32,
    pub inv_angular_mass: f32,

    /// Fraction of speed along the heading kept per second.
    pub back_drag: f32,
    /// Fraction of speed across the heading kept per second.
    pub side_drag: f32,
    pub angular_drag: f32,

    behavior: Rc<dyn Behavior>,
}

impl GameObject {
    pub fn new(kind: ObjectKind, mesh: MeshId) -> Self {
        Self {
            id: ObjectId::UNASSIGNED,
            kind,
            mesh,
            position: Vec3::ZERO,
            orientation: 0.0,
            scale: Vec3::ONE,
            velocity: Vec3::ZERO,
            angular_velocity: 0.0,
            force: Vec3::ZERO,
            torque: 0.0,
            thrust: 0.0,
            inv_mass: 1.0,
            inv_angular_mass: 1.0,
            back_drag: 1.0,
            side_drag: 1.0,
            angular_drag: 1.0,
            behavior: kind.behavior(),
        }
    }

    /// Replace the kind's default behavior.
    pub fn with_behavior(mut self, behavior: Rc<dyn Behavior>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn behavior(&self) -> Rc<dyn Behavior> {
        self.behavior.clone()
    }

    /// Unit vector along the current orientation.
    pub fn ahead(&self) -> Vec3 {
        Vec3::new(self.orientation.cos(), self.orientation.sin(), 0.0)
    }

    pub fn apply(&mut self, actuation: Actuation) {
        self.thrust = actuation.thrust;
        self.force = actuation.force;
        self.torque = actuation.torque;
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            Quat::from_rotation_z(self.orientation),
            self.position,
        )
    }
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mesh", &self.mesh)
            .field("position", &self.position)
            .field("orientation", &self.orientation)
            .field("velocity", &self.velocity)
            .field("angular_velocity", &self.angular_velocity)
            .finish_non_exhaustive()
    }
}
