use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use glam::Vec3;

use crate::config::{AsteroidConfig, SceneConfig};
use crate::controller::behavior::FrameInput;
use crate::controller::frame_clock::{FrameClock, FrameTime, TimeSource};
use crate::controller::input::KeysPressed;
use crate::controller::physics::PhysicsSystem;
use crate::error::{Result, SceneError};
use crate::model::camera::OrthoCamera;
use crate::model::game_object::{GameObject, ObjectId, ObjectKind};
use crate::model::render_target::{BlendFunc, ClearFlags, RenderTarget, Viewport};
use crate::model::resources::{Geometry, MeshId, ResourceRegistry, ShaderStage};

/// Spawn and despawn requests raised while a frame is running.
#[derive(Debug, Default)]
pub struct FrameCommands {
    spawns: Vec<GameObject>,
    despawns: Vec<ObjectId>,
}

impl FrameCommands {
    pub fn spawn(&mut self, object: GameObject) {
        self.spawns.push(object);
    }

    pub fn despawn(&mut self, id: ObjectId) {
        self.despawns.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.despawns.is_empty()
    }
}

/// Handles of the meshes the demo ships with.
#[derive(Debug, Clone, Copy)]
pub struct DemoMeshes {
    pub background: MeshId,
    pub raider: MeshId,
    pub asteroid: MeshId,
}

pub struct Scene {
    config: SceneConfig,
    registry: ResourceRegistry,
    meshes: DemoMeshes,

    /// Draw order. Index 0 is the background.
    objects: Vec<GameObject>,
    avatar: ObjectId,
    avatar_index: usize,
    next_id: u32,
    pending: FrameCommands,

    camera: OrthoCamera,
    clock: FrameClock,
    physics: PhysicsSystem,
}

impl Scene {
    pub fn new(config: SceneConfig, time: Box<dyn TimeSource>) -> Result<Self> {
        let (registry, meshes) = build_registry(&config)?;

        let background = GameObject::new(ObjectKind::Static, meshes.background);

        let avatar_config = &config.avatar;
        let mut avatar = GameObject::new(ObjectKind::Avatar, meshes.raider)
            .with_position(avatar_config.start_position);
        avatar.back_drag = avatar_config.back_drag;
        avatar.side_drag = avatar_config.side_drag;
        avatar.angular_drag = avatar_config.angular_drag;
        avatar.inv_mass = avatar_config.inv_mass;
        avatar.inv_angular_mass = avatar_config.inv_angular_mass;

        let mut scene = Self {
            clock: FrameClock::new(time, config.max_frame_dt),
            physics: PhysicsSystem::new(config.side_velocity),
            camera: OrthoCamera::new(),
            registry,
            meshes,
            objects: Vec::new(),
            avatar: ObjectId::UNASSIGNED,
            avatar_index: 0,
            next_id: 1,
            pending: FrameCommands::default(),
            config,
        };

        scene.insert(background);
        scene.avatar = scene.insert(avatar);
        scene.avatar_index = scene.objects.len() - 1;

        let asteroids = scatter_asteroids(&scene.config.asteroids, meshes.asteroid);
        for asteroid in asteroids {
            scene.insert(asteroid);
        }

        info!(
            "scene ready: {} objects, {} programs",
            scene.objects.len(),
            scene.registry.programs().count()
        );
        Ok(scene)
    }

    fn insert(&mut self, mut object: GameObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        object.id = id;
        self.objects.push(object);
        id
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn meshes(&self) -> DemoMeshes {
        self.meshes
    }

    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn camera(&self) -> &OrthoCamera {
        &self.camera
    }

    pub fn avatar(&self) -> &GameObject {
        &self.objects[self.avatar_index]
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Append an object; it is drawn on top of everything already present.
    pub fn spawn(&mut self, object: GameObject) -> Result<ObjectId> {
        if object.kind == ObjectKind::Avatar {
            return Err(SceneError::DuplicateAvatar);
        }
        let id = self.insert(object);
        debug!("spawned {id:?}");
        Ok(id)
    }

    /// Remove an object, keeping the draw order of the rest.
    pub fn despawn(&mut self, id: ObjectId) -> Result<GameObject> {
        if id == self.avatar {
            return Err(SceneError::AvatarRemoval);
        }
        let index = self
            .objects
            .iter()
            .position(|o| o.id == id)
            .ok_or(SceneError::UnknownObject(id))?;
        let removed = self.objects.remove(index);
        if index < self.avatar_index {
            self.avatar_index -= 1;
        }
        debug!("despawned {id:?}");
        Ok(removed)
    }

    /// Spawn a fresh asteroid with the configured random ranges.
    pub fn spawn_asteroid(&mut self, rng: &mut impl Rng) -> Result<ObjectId> {
        let asteroid = random_asteroid(&self.config.asteroids, self.meshes.asteroid, rng);
        self.spawn(asteroid)
    }

    /// One-time setup of a freshly created target: alpha blending and a
    /// viewport covering the configured canvas. The clock starts here, so
    /// asset loading does not count as the first frame.
    pub fn attach(&mut self, target: &mut dyn RenderTarget) -> Result<()> {
        self.clock.restart();
        target.enable_blending(BlendFunc::ALPHA);
        let (width, height) = (self.config.canvas_width, self.config.canvas_height);
        self.resize(target, width, height)
    }

    pub fn resize(&mut self, target: &mut dyn RenderTarget, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(SceneError::InvalidViewport { width, height });
        }
        target.set_viewport(Viewport::new(0, 0, width, height));
        self.camera.set_aspect_ratio(width as f32 / height as f32);
        info!("resized to {width}x{height}");
        Ok(())
    }

    /// Run one frame: control, move, update and draw, each over every
    /// object before the next begins.
    pub fn update(&mut self, target: &mut dyn RenderTarget, keys: &KeysPressed) -> Result<FrameTime> {
        let time = self.clock.tick()?;

        self.camera.position = self.avatar().position;
        self.camera.update();

        target.clear(
            ClearFlags::COLOR_BUFFER | ClearFlags::DEPTH_BUFFER,
            self.config.clear_color,
            1.0,
        );

        for i in 0..self.objects.len() {
            let behavior = self.objects[i].behavior();
            let input = FrameInput {
                time,
                keys,
                colliders: &self.objects,
            };
            if let Some(actuation) = behavior.control(&self.objects[i], &input) {
                self.objects[i].apply(actuation);
            }
        }

        for object in &mut self.objects {
            object.behavior().advance(object, time, &self.physics);
        }

        let mut commands = std::mem::take(&mut self.pending);
        for object in &mut self.objects {
            object.behavior().update(object, &mut commands);
        }
        self.pending = commands;

        for object in &self.objects {
            object
                .behavior()
                .draw(object, &self.registry, &self.camera, target)?;
        }

        self.apply_pending();
        Ok(time)
    }

    fn apply_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let FrameCommands { spawns, despawns } = std::mem::take(&mut self.pending);
        for id in despawns {
            if let Err(e) = self.despawn(id) {
                warn!("dropping despawn request: {e}");
            }
        }
        for object in spawns {
            if let Err(e) = self.spawn(object) {
                warn!("dropping spawn request: {e}");
            }
        }
    }
}

fn build_registry(config: &SceneConfig) -> Result<(ResourceRegistry, DemoMeshes)> {
    let mut registry = ResourceRegistry::new();

    let vs_textured = registry.add_shader(ShaderStage::Vertex, "textured_vs.wgsl");
    let fs_textured = registry.add_shader(ShaderStage::Fragment, "textured_fs.wgsl");
    let vs_background = registry.add_shader(ShaderStage::Vertex, "background_vs.wgsl");

    let textured = registry.add_program("textured", vs_textured, fs_textured, BlendFunc::ALPHA)?;
    let background =
        registry.add_program("background", vs_background, fs_textured, BlendFunc::ALPHA)?;

    let assets = &config.assets;
    let background_material = registry.add_material("background", background, &assets.background);
    let raider_material = registry.add_material("raider", textured, &assets.raider);
    let asteroid_material = registry.add_material("asteroid", textured, &assets.asteroid);

    let meshes = DemoMeshes {
        background: registry.add_mesh("background", background_material, Geometry::TexturedQuad),
        raider: registry.add_mesh("raider", raider_material, Geometry::TexturedQuad),
        asteroid: registry.add_mesh("asteroid", asteroid_material, Geometry::TexturedQuad),
    };
    Ok((registry, meshes))
}

fn scatter_asteroids(config: &AsteroidConfig, mesh: MeshId) -> Vec<GameObject> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.count)
        .map(|_| random_asteroid(config, mesh, &mut rng))
        .collect()
}

fn random_asteroid(config: &AsteroidConfig, mesh: MeshId, rng: &mut impl Rng) -> GameObject {
    let mut asteroid = GameObject::new(ObjectKind::Generic, mesh);
    asteroid.position = random_vec3(rng, config.position_min, config.position_max);
    asteroid.velocity = random_vec3(rng, config.velocity_min, config.velocity_max);
    asteroid.angular_velocity = random_in(rng, config.angular_velocity);
    asteroid.force = random_vec3(rng, config.force_min, config.force_max);
    asteroid.inv_mass = random_in(rng, config.inv_mass);
    asteroid.torque = random_in(rng, config.torque);
    asteroid.inv_angular_mass = random_in(rng, config.inv_angular_mass);
    asteroid
}

fn random_in(rng: &mut impl Rng, (low, high): (f32, f32)) -> f32 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

fn random_vec3(rng: &mut impl Rng, min: Vec3, max: Vec3) -> Vec3 {
    Vec3::new(
        random_in(rng, (min.x, max.x)),
        random_in(rng, (min.y, max.y)),
        random_in(rng, (min.z, max.z)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::behavior::Behavior;
    use crate::controller::frame_clock::ManualTime;
    use crate::controller::input::Direction;
    use crate::model::render_target::{DrawCall, RecordingTarget, TargetCommand};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scene_with(config: SceneConfig) -> (Scene, ManualTime) {
        let time = ManualTime::new(0.0);
        (Scene::new(config, Box::new(time.clone())).unwrap(), time)
    }

    fn scene() -> (Scene, ManualTime) {
        scene_with(SceneConfig::default())
    }

    #[test]
    fn background_is_first_and_avatar_second() {
        let (scene, _) = scene();
        let kinds: Vec<_> = scene.objects().iter().map(|o| o.kind).collect();
        assert_eq!(kinds, vec![ObjectKind::Static, ObjectKind::Avatar]);

        let avatar = scene.avatar();
        assert_eq!(avatar.position, Vec3::new(-13.0, -13.0, 0.0));
        assert_eq!(avatar.back_drag, 0.9);
        assert_eq!(avatar.side_drag, 0.5);
        assert_eq!(avatar.angular_drag, 0.5);
    }

    #[test]
    fn registry_mirrors_demo_resources() {
        let (scene, _) = scene();
        let registry = scene.registry();

        let programs: Vec<_> = registry.programs().map(|(_, p)| p.label.as_str()).collect();
        assert_eq!(programs, vec!["textured", "background"]);
        assert!(registry.programs().all(|(_, p)| p.blend == BlendFunc::ALPHA));

        assert_eq!(
            registry.texture_paths(),
            vec!["media/background.jpg", "media/raider.png", "media/asteroid.png"]
        );
        assert_eq!(registry.meshes().count(), 3);
    }

    #[test]
    fn asteroids_are_seeded_and_within_range() {
        let mut config = SceneConfig::default();
        config.asteroids.count = 16;
        let (a, _) = scene_with(config.clone());
        let (b, _) = scene_with(config);

        let asteroids: Vec<_> = a
            .objects()
            .iter()
            .filter(|o| o.kind == ObjectKind::Generic)
            .collect();
        assert_eq!(asteroids.len(), 16);
        for asteroid in &asteroids {
            assert!(asteroid.position.x >= -12.0 && asteroid.position.x < 12.0);
            assert!(asteroid.velocity.y >= -2.0 && asteroid.velocity.y < 2.0);
            assert!(asteroid.inv_mass >= 0.0 && asteroid.inv_mass < 1.0);
            assert_eq!(asteroid.position.z, 0.0);
        }

        let positions_a: Vec<_> = a.objects().iter().map(|o| o.position).collect();
        let positions_b: Vec<_> = b.objects().iter().map(|o| o.position).collect();
        assert_eq!(positions_a, positions_b);
    }

    #[test]
    fn frame_clears_then_draws_in_insertion_order() {
        let (mut scene, time) = scene();
        let mut target = RecordingTarget::new();
        time.advance(16.0);
        scene.update(&mut target, &KeysPressed::default()).unwrap();

        match &target.commands[0] {
            TargetCommand::Clear { flags, color, depth } => {
                assert_eq!(*flags, ClearFlags::COLOR_BUFFER | ClearFlags::DEPTH_BUFFER);
                assert_eq!(*color, [0.3, 0.0, 0.3, 1.0]);
                assert_eq!(*depth, 1.0);
            }
            other => panic!("expected a clear first, got {other:?}"),
        }

        let drawn: Vec<MeshId> = target.draws().map(|d| d.mesh).collect();
        assert_eq!(drawn, vec![scene.meshes().background, scene.meshes().raider]);
    }

    #[test]
    fn camera_follows_avatar() {
        let (mut scene, time) = scene();
        let mut target = RecordingTarget::new();
        time.advance(16.0);
        scene.update(&mut target, &KeysPressed::default()).unwrap();

        assert_eq!(scene.camera().position, Vec3::new(-13.0, -13.0, 0.0));
        let draw = target.draws().next().unwrap();
        assert_eq!(draw.view_proj, scene.camera().view_proj());
    }

    #[test]
    fn holding_up_accelerates_avatar_forward() {
        let (mut scene, time) = scene();
        let mut target = RecordingTarget::new();
        let mut keys = KeysPressed::default();
        keys.set(Direction::Up, true);

        scene.update(&mut target, &keys).unwrap();
        for _ in 0..30 {
            time.advance(16.0);
            scene.update(&mut target, &keys).unwrap();
        }

        let avatar = scene.avatar();
        assert_eq!(avatar.thrust, 1.0);
        assert!(avatar.velocity.x > 0.0);
        assert!(avatar.position.x > -13.0);
        assert!((avatar.position.y + 13.0).abs() < 1e-4);
    }

    #[test]
    fn resize_sets_viewport_and_aspect() {
        let (mut scene, _) = scene();
        let mut target = RecordingTarget::new();
        scene.resize(&mut target, 800, 600).unwrap();

        assert_eq!(target.last_viewport(), Some(Viewport::new(0, 0, 800, 600)));
        assert_eq!(scene.camera().aspect, 800.0 / 600.0);
    }

    #[test]
    fn attach_enables_alpha_blending_before_viewport() {
        let (mut scene, _) = scene();
        let mut target = RecordingTarget::new();
        scene.attach(&mut target).unwrap();

        assert_eq!(
            target.commands,
            vec![
                TargetCommand::Blend(BlendFunc::ALPHA),
                TargetCommand::Viewport(Viewport::new(0, 0, 800, 600)),
            ]
        );
    }

    #[test]
    fn resize_rejects_empty_canvas() {
        let (mut scene, _) = scene();
        let mut target = RecordingTarget::new();
        let err = scene.resize(&mut target, 800, 0).unwrap_err();
        assert_eq!(err, SceneError::InvalidViewport { width: 800, height: 0 });
        assert!(target.commands.is_empty());
        assert_eq!(scene.camera().aspect, 1.0);
    }

    #[test]
    fn backwards_clock_aborts_frame_before_drawing() {
        let (mut scene, time) = scene();
        let mut target = RecordingTarget::new();
        time.set(-100.0);
        assert!(scene.update(&mut target, &KeysPressed::default()).is_err());
        assert!(target.commands.is_empty());
    }

    #[test]
    fn despawn_keeps_order_and_protects_avatar() {
        let mut config = SceneConfig::default();
        config.asteroids.count = 3;
        let (mut scene, _) = scene_with(config);
        let ids: Vec<_> = scene.objects().iter().map(|o| o.id()).collect();

        scene.despawn(ids[3]).unwrap();
        let remaining: Vec<_> = scene.objects().iter().map(|o| o.id()).collect();
        assert_eq!(remaining, vec![ids[0], ids[1], ids[2], ids[4]]);

        assert_eq!(scene.despawn(ids[1]).unwrap_err(), SceneError::AvatarRemoval);
        assert_eq!(
            scene.despawn(ids[3]).unwrap_err(),
            SceneError::UnknownObject(ids[3])
        );

        scene.despawn(ids[0]).unwrap();
        assert_eq!(scene.avatar().id(), ids[1]);
    }

    #[test]
    fn second_avatar_is_rejected() {
        let (mut scene, _) = scene();
        let extra = GameObject::new(ObjectKind::Avatar, scene.meshes().raider);
        assert_eq!(scene.spawn(extra).unwrap_err(), SceneError::DuplicateAvatar);
    }

    #[test]
    fn spawned_asteroid_is_drawn_last() {
        let (mut scene, time) = scene();
        let mut rng = StdRng::seed_from_u64(7);
        let id = scene.spawn_asteroid(&mut rng).unwrap();

        let mut target = RecordingTarget::new();
        time.advance(16.0);
        scene.update(&mut target, &KeysPressed::default()).unwrap();

        let last = target.draws().last().unwrap();
        assert_eq!(last.mesh, scene.meshes().asteroid);
        assert_eq!(scene.objects().last().unwrap().id(), id);
    }

    /// Spawns one asteroid the first time it updates.
    struct Spawner {
        mesh: MeshId,
        fired: RefCell<bool>,
    }

    impl Behavior for Spawner {
        fn update(&self, _object: &mut GameObject, commands: &mut FrameCommands) {
            if !self.fired.replace(true) {
                commands.spawn(GameObject::new(ObjectKind::Generic, self.mesh));
            }
        }
    }

    #[test]
    fn mid_frame_spawn_appears_next_frame() {
        let (mut scene, time) = scene();
        let spawner = GameObject::new(ObjectKind::Static, scene.meshes().background).with_behavior(
            Rc::new(Spawner {
                mesh: scene.meshes().asteroid,
                fired: RefCell::new(false),
            }),
        );
        scene.spawn(spawner).unwrap();

        let mut target = RecordingTarget::new();
        scene.update(&mut target, &KeysPressed::default()).unwrap();
        assert_eq!(target.draws().count(), 3);
        assert_eq!(scene.objects().len(), 4);

        target.clear_commands();
        time.advance(16.0);
        scene.update(&mut target, &KeysPressed::default()).unwrap();
        assert_eq!(target.draws().count(), 4);
    }

    /// Queues one despawn on its first update: of `victim`, or of itself.
    struct Despawner {
        victim: Option<ObjectId>,
        fired: RefCell<bool>,
    }

    impl Behavior for Despawner {
        fn update(&self, object: &mut GameObject, commands: &mut FrameCommands) {
            if !self.fired.replace(true) {
                commands.despawn(self.victim.unwrap_or(object.id()));
            }
        }
    }

    fn despawner(scene: &Scene, victim: Option<ObjectId>) -> GameObject {
        GameObject::new(ObjectKind::Generic, scene.meshes().asteroid).with_behavior(Rc::new(
            Despawner {
                victim,
                fired: RefCell::new(false),
            },
        ))
    }

    #[test]
    fn mid_frame_despawn_is_drawn_once_more_then_gone() {
        let (mut scene, time) = scene();
        let asteroid = scene.meshes().asteroid;
        let id = scene.spawn(despawner(&scene, None)).unwrap();

        let mut target = RecordingTarget::new();
        scene.update(&mut target, &KeysPressed::default()).unwrap();
        assert_eq!(target.draws().count(), 3);
        assert_eq!(target.draws().last().map(|d| d.mesh), Some(asteroid));
        assert!(scene.get(id).is_none());
        assert_eq!(scene.objects().len(), 2);

        target.clear_commands();
        time.advance(16.0);
        scene.update(&mut target, &KeysPressed::default()).unwrap();
        assert_eq!(target.draws().count(), 2);
        assert!(target.draws().all(|d| d.mesh != asteroid));
    }

    #[test]
    fn queued_avatar_despawn_is_dropped() {
        let (mut scene, time) = scene();
        let avatar = scene.avatar().id();
        scene.spawn(despawner(&scene, Some(avatar))).unwrap();

        let mut target = RecordingTarget::new();
        scene.update(&mut target, &KeysPressed::default()).unwrap();
        assert_eq!(scene.avatar().id(), avatar);
        assert_eq!(scene.avatar().kind, ObjectKind::Avatar);
        assert_eq!(scene.objects().len(), 3);

        target.clear_commands();
        time.advance(16.0);
        scene.update(&mut target, &KeysPressed::default()).unwrap();
        assert_eq!(target.draws().count(), 3);
    }

    /// Appends `phase:id` to a shared log from every hook.
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Behavior for Recorder {
        fn control(
            &self,
            object: &GameObject,
            input: &FrameInput<'_>,
        ) -> Option<crate::model::Actuation> {
            assert!(!input.colliders.is_empty());
            self.log.borrow_mut().push(format!("control:{}", object.id().0));
            None
        }

        fn advance(&self, object: &mut GameObject, _time: FrameTime, _physics: &PhysicsSystem) {
            self.log.borrow_mut().push(format!("move:{}", object.id().0));
        }

        fn update(&self, object: &mut GameObject, _commands: &mut FrameCommands) {
            self.log.borrow_mut().push(format!("update:{}", object.id().0));
        }

        fn draw(
            &self,
            object: &GameObject,
            registry: &ResourceRegistry,
            camera: &OrthoCamera,
            target: &mut dyn RenderTarget,
        ) -> Result<()> {
            self.log.borrow_mut().push(format!("draw:{}", object.id().0));
            target.draw(&DrawCall::for_object(object, registry, camera)?)
        }
    }

    #[test]
    fn phases_run_strictly_one_after_another() {
        let (mut scene, _) = scene();
        let log = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..3 {
            let object = GameObject::new(ObjectKind::Generic, scene.meshes().asteroid)
                .with_behavior(Rc::new(Recorder { log: log.clone() }));
            scene.spawn(object).unwrap();
        }

        let mut target = RecordingTarget::new();
        scene.update(&mut target, &KeysPressed::default()).unwrap();

        let phases: Vec<String> = log
            .borrow()
            .iter()
            .map(|entry| entry.split(':').next().unwrap_or_default().to_string())
            .collect();
        let expected: Vec<String> = ["control", "move", "update", "draw"]
            .iter()
            .flat_map(|p| std::iter::repeat(p.to_string()).take(3))
            .collect();
        assert_eq!(phases, expected);
    }
}
