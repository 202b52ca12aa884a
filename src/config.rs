//! Scene configuration.
//!
//! Everything has a `Default` matching the demo as shipped; the native
//! binary can override a few values from the environment.

use glam::Vec3;

/// How the integrator splits velocity into the part along the heading
/// and the part across it before applying drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideVelocity {
    /// `side = velocity - ahead * dot(ahead, velocity)`.
    #[default]
    Projected,
    /// `side = velocity - ahead`, subtracting the unit heading itself.
    /// Reproduces the first version of the demo frame for frame.
    HeadingOffset,
}

#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub start_position: Vec3,
    pub back_drag: f32,
    pub side_drag: f32,
    pub angular_drag: f32,
    pub inv_mass: f32,
    pub inv_angular_mass: f32,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            start_position: Vec3::new(-13.0, -13.0, 0.0),
            back_drag: 0.9,
            side_drag: 0.5,
            angular_drag: 0.5,
            inv_mass: 1.0,
            inv_angular_mass: 1.0,
        }
    }
}

/// Ranges used to scatter asteroids at scene construction.
#[derive(Debug, Clone)]
pub struct AsteroidConfig {
    pub count: usize,
    pub seed: u64,
    pub position_min: Vec3,
    pub position_max: Vec3,
    pub velocity_min: Vec3,
    pub velocity_max: Vec3,
    pub force_min: Vec3,
    pub force_max: Vec3,
    /// Half-open ranges `(low, high)`.
    pub angular_velocity: (f32, f32),
    pub torque: (f32, f32),
    pub inv_mass: (f32, f32),
    pub inv_angular_mass: (f32, f32),
}

impl Default for AsteroidConfig {
    fn default() -> Self {
        Self {
            count: 0,
            seed: 0x5eed,
            position_min: Vec3::new(-12.0, -12.0, 0.0),
            position_max: Vec3::new(12.0, 12.0, 0.0),
            velocity_min: Vec3::new(-2.0, -2.0, 0.0),
            velocity_max: Vec3::new(2.0, 2.0, 0.0),
            force_min: Vec3::new(-1.0, -1.0, 0.0),
            force_max: Vec3::new(1.0, 1.0, 0.0),
            angular_velocity: (-2.0, 2.0),
            torque: (-1.0, 1.0),
            inv_mass: (0.0, 1.0),
            inv_angular_mass: (0.0, 1.0),
        }
    }
}

/// Asset locations, relative to the page (wasm) or the working directory.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub background: String,
    pub raider: String,
    pub asteroid: String,
}

impl AssetPaths {
    pub fn in_dir(dir: &str) -> Self {
        let dir = dir.trim_end_matches('/');
        Self {
            background: format!("{dir}/background.jpg"),
            raider: format!("{dir}/raider.png"),
            asteroid: format!("{dir}/asteroid.png"),
        }
    }
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self::in_dir("media")
    }
}

#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub avatar: AvatarConfig,
    pub asteroids: AsteroidConfig,
    pub assets: AssetPaths,
    pub clear_color: [f32; 4],
    /// Longest frame the simulation will integrate in one step, seconds.
    pub max_frame_dt: f64,
    pub side_velocity: SideVelocity,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            avatar: AvatarConfig::default(),
            asteroids: AsteroidConfig::default(),
            assets: AssetPaths::default(),
            clear_color: [0.3, 0.0, 0.3, 1.0],
            max_frame_dt: 0.25,
            side_velocity: SideVelocity::default(),
            canvas_width: 800,
            canvas_height: 600,
        }
    }
}

impl SceneConfig {
    /// Apply `RAIDER_ASTEROIDS`, `RAIDER_SEED` and `RAIDER_MEDIA_DIR`.
    /// Unparsable values are logged and skipped.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("RAIDER_ASTEROIDS") {
            match raw.trim().parse() {
                Ok(count) => self.asteroids.count = count,
                Err(e) => tracing::warn!("ignoring RAIDER_ASTEROIDS={raw:?}: {e}"),
            }
        }
        if let Some(raw) = lookup("RAIDER_SEED") {
            match raw.trim().parse() {
                Ok(seed) => self.asteroids.seed = seed,
                Err(e) => tracing::warn!("ignoring RAIDER_SEED={raw:?}: {e}"),
            }
        }
        if let Some(dir) = lookup("RAIDER_MEDIA_DIR") {
            self.assets = AssetPaths::in_dir(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_shipped_demo() {
        let config = SceneConfig::default();
        assert_eq!(config.avatar.start_position, Vec3::new(-13.0, -13.0, 0.0));
        assert_eq!(config.avatar.back_drag, 0.9);
        assert_eq!(config.asteroids.count, 0);
        assert_eq!(config.assets.raider, "media/raider.png");
        assert_eq!(config.side_velocity, SideVelocity::Projected);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("RAIDER_ASTEROIDS", "12"),
            ("RAIDER_SEED", "not-a-number"),
            ("RAIDER_MEDIA_DIR", "assets/"),
        ]
        .into_iter()
        .collect();

        let mut config = SceneConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.asteroids.count, 12);
        assert_eq!(config.asteroids.seed, AsteroidConfig::default().seed);
        assert_eq!(config.assets.background, "assets/background.jpg");
    }
}
