use crate::config::SideVelocity;
use crate::model::GameObject;

/// Semi-implicit Euler integrator with exponential, frame-rate independent
/// drag split along and across each object's heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhysicsSystem {
    pub side_velocity: SideVelocity,
}

impl PhysicsSystem {
    pub fn new(side_velocity: SideVelocity) -> Self {
        Self { side_velocity }
    }

    /// Advance one object by `dt` seconds. Non-finite inputs propagate.
    pub fn step(&self, object: &mut GameObject, dt: f32) {
        let acceleration = object.force * object.inv_mass;
        object.velocity += acceleration * dt;

        let ahead = object.ahead();
        let ahead_velocity = ahead * ahead.dot(object.velocity);
        let side_velocity = match self.side_velocity {
            SideVelocity::Projected => object.velocity - ahead_velocity,
            SideVelocity::HeadingOffset => object.velocity - ahead,
        };

        object.velocity = ahead_velocity * object.back_drag.powf(dt)
            + side_velocity * object.side_drag.powf(dt);
        object.position += object.velocity * dt;

        let angular_acceleration = object.torque * object.inv_angular_mass;
        object.angular_velocity += angular_acceleration * dt;
        object.angular_velocity *= object.angular_drag.powf(dt);
        object.orientation += object.angular_velocity * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resources::MeshId;
    use crate::model::{GameObject, ObjectKind, Scene};
    use crate::config::SceneConfig;
    use crate::controller::frame_clock::ManualTime;
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn mesh() -> MeshId {
        let scene = Scene::new(SceneConfig::default(), Box::new(ManualTime::new(0.0))).unwrap();
        scene.meshes().asteroid
    }

    fn body() -> GameObject {
        GameObject::new(ObjectKind::Generic, mesh())
    }

    #[test]
    fn no_drag_no_force_is_pure_drift() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.velocity = Vec3::new(3.0, -2.0, 0.0);
        object.orientation = 0.7;
        object.angular_velocity = 0.4;
        object.position = Vec3::new(1.0, 1.0, 0.0);

        physics.step(&mut object, 0.5);

        assert!(object.velocity.abs_diff_eq(Vec3::new(3.0, -2.0, 0.0), 1e-5));
        assert!(object.position.abs_diff_eq(Vec3::new(2.5, 0.0, 0.0), 1e-5));
        assert_relative_eq!(object.angular_velocity, 0.4);
        assert_relative_eq!(object.orientation, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn zero_dt_changes_nothing() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.velocity = Vec3::new(1.0, 2.0, 0.0);
        object.force = Vec3::new(5.0, 5.0, 0.0);
        object.torque = 3.0;
        object.back_drag = 0.1;
        object.side_drag = 0.1;

        physics.step(&mut object, 0.0);

        assert!(object.velocity.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        assert_eq!(object.position, Vec3::ZERO);
        assert_eq!(object.orientation, 0.0);
    }

    #[test]
    fn velocity_is_updated_before_position() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.force = Vec3::new(2.0, 0.0, 0.0);
        object.inv_mass = 0.5;

        physics.step(&mut object, 1.0);

        assert!(object.velocity.abs_diff_eq(Vec3::X, 1e-6));
        assert!(object.position.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn zero_inverse_mass_is_immovable() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.force = Vec3::new(100.0, -40.0, 0.0);
        object.torque = 10.0;
        object.inv_mass = 0.0;
        object.inv_angular_mass = 0.0;

        physics.step(&mut object, 0.25);

        assert_eq!(object.velocity, Vec3::ZERO);
        assert_eq!(object.position, Vec3::ZERO);
        assert_eq!(object.orientation, 0.0);
    }

    #[test]
    fn drag_is_frame_rate_independent() {
        let physics = PhysicsSystem::default();
        let total = 2.0_f32;
        let drag = 0.5_f32;

        let mut coarse = body();
        coarse.velocity = Vec3::new(4.0, 0.0, 0.0);
        coarse.back_drag = drag;
        physics.step(&mut coarse, total);

        let mut fine = body();
        fine.velocity = Vec3::new(4.0, 0.0, 0.0);
        fine.back_drag = drag;
        let steps = 240;
        for _ in 0..steps {
            physics.step(&mut fine, total / steps as f32);
        }

        let expected = 4.0 * drag.powf(total);
        assert_relative_eq!(coarse.velocity.x, expected, epsilon = 1e-5);
        assert_relative_eq!(fine.velocity.x, expected, epsilon = 1e-4);
    }

    #[test]
    fn angular_motion_decays_with_angular_drag() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.torque = 1.0;
        object.inv_angular_mass = 2.0;
        object.angular_drag = 0.25;

        physics.step(&mut object, 0.5);

        // (0 + 1 * 2 * 0.5) * 0.25^0.5
        assert_relative_eq!(object.angular_velocity, 0.5, epsilon = 1e-6);
        assert_relative_eq!(object.orientation, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn side_drag_only_touches_sideways_motion() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.velocity = Vec3::new(2.0, 2.0, 0.0);
        object.back_drag = 1.0;
        object.side_drag = 0.25;

        physics.step(&mut object, 1.0);

        assert!(object.velocity.abs_diff_eq(Vec3::new(2.0, 0.5, 0.0), 1e-5));
    }

    // The first version of the demo subtracted the unit heading instead of
    // the projected ahead velocity. Both decompositions are kept; these two
    // tests pin down where they disagree.
    #[test]
    fn heading_offset_subtracts_unit_heading() {
        let physics = PhysicsSystem::new(SideVelocity::HeadingOffset);
        let mut object = body();
        object.velocity = Vec3::new(0.0, 2.0, 0.0);
        object.side_drag = 0.25;

        physics.step(&mut object, 1.0);

        // side = (0, 2, 0) - (1, 0, 0), ahead velocity is zero
        assert!(object.velocity.abs_diff_eq(Vec3::new(-0.25, 0.5, 0.0), 1e-5));

        let mut projected = body();
        projected.velocity = Vec3::new(0.0, 2.0, 0.0);
        projected.side_drag = 0.25;
        PhysicsSystem::default().step(&mut projected, 1.0);
        assert!(projected.velocity.abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-5));
    }

    #[test]
    fn heading_offset_does_not_preserve_drift() {
        let physics = PhysicsSystem::new(SideVelocity::HeadingOffset);
        let mut object = body();
        object.velocity = Vec3::new(3.0, 1.0, 0.0);

        physics.step(&mut object, 0.5);

        // ahead velocity (3, 0) + side (3, 1) - (1, 0)
        assert!(object.velocity.abs_diff_eq(Vec3::new(5.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn non_finite_values_propagate() {
        let physics = PhysicsSystem::default();
        let mut object = body();
        object.force = Vec3::X;
        object.inv_mass = f32::NAN;

        physics.step(&mut object, 0.1);

        assert!(object.velocity.x.is_nan());
        assert!(object.position.x.is_nan());
    }
}
