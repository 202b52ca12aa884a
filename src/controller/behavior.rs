//! Per-kind object behavior.
//!
//! Every object runs four hooks per frame, each in its own pass over the
//! whole scene: `control`, `advance` (the move step), `update`, `draw`.

use crate::controller::frame_clock::FrameTime;
use crate::controller::input::{Direction, KeysPressed};
use crate::controller::physics::PhysicsSystem;
use crate::error::Result;
use crate::model::{
    Actuation, DrawCall, FrameCommands, GameObject, OrthoCamera, RenderTarget, ResourceRegistry,
};

/// Read-only view handed to `control`.
pub struct FrameInput<'a> {
    pub time: FrameTime,
    pub keys: &'a KeysPressed,
    /// Every object in the scene, the controlled one included.
    pub colliders: &'a [GameObject],
}

pub trait Behavior {
    /// Decide this frame's thrust, force and torque. `None` keeps the
    /// current values.
    fn control(&self, _object: &GameObject, _input: &FrameInput<'_>) -> Option<Actuation> {
        None
    }

    fn advance(&self, _object: &mut GameObject, _time: FrameTime, _physics: &PhysicsSystem) {}

    /// Post-move hook. Spawns and despawns requested here land after the
    /// frame has been drawn.
    fn update(&self, _object: &mut GameObject, _commands: &mut FrameCommands) {}

    fn draw(
        &self,
        object: &GameObject,
        registry: &ResourceRegistry,
        camera: &OrthoCamera,
        target: &mut dyn RenderTarget,
    ) -> Result<()> {
        target.draw(&DrawCall::for_object(object, registry, camera)?)
    }
}

/// Background and other scenery.
pub struct StaticBehavior;

impl Behavior for StaticBehavior {}

/// Free body: integrates whatever force and torque it was given.
pub struct GenericBehavior;

impl Behavior for GenericBehavior {
    fn advance(&self, object: &mut GameObject, time: FrameTime, physics: &PhysicsSystem) {
        physics.step(object, time.dt);
    }
}

/// Arrow keys / WASD drive thrust and torque.
pub struct AvatarBehavior;

impl Behavior for AvatarBehavior {
    fn control(&self, object: &GameObject, input: &FrameInput<'_>) -> Option<Actuation> {
        Some(avatar_actuation(object, input.keys))
    }

    fn advance(&self, object: &mut GameObject, time: FrameTime, physics: &PhysicsSystem) {
        physics.step(object, time.dt);
    }
}

pub fn avatar_actuation(object: &GameObject, keys: &KeysPressed) -> Actuation {
    let mut thrust = 0.0;
    if keys.is_pressed(Direction::Up) {
        thrust += 1.0;
    }
    if keys.is_pressed(Direction::Down) {
        thrust -= 1.0;
    }

    let mut torque = 0.0;
    if keys.is_pressed(Direction::Left) {
        torque += 1.0;
    }
    if keys.is_pressed(Direction::Right) {
        torque -= 1.0;
    }

    Actuation {
        thrust,
        force: object.ahead() * thrust,
        torque,
    }
}
