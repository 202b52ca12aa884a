use egui::{Context, RichText};
use glam::Vec3;

use crate::model::Scene;

/// What the debug overlay shows for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HudStats {
    pub fps: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: f32,
    pub thrust: f32,
    pub object_count: usize,
}

impl HudStats {
    pub fn from_scene(scene: &Scene, fps: f32) -> Self {
        let avatar = scene.avatar();
        Self {
            fps,
            position: avatar.position,
            velocity: avatar.velocity,
            orientation: avatar.orientation,
            thrust: avatar.thrust,
            object_count: scene.objects().len(),
        }
    }
}

/// Frames per second averaged over roughly half a second.
#[derive(Debug, Default)]
pub struct FpsCounter {
    fps: f32,
    frames: u32,
    elapsed: f32,
}

impl FpsCounter {
    pub fn tick(&mut self, dt: f32) -> f32 {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed >= 0.5 {
            self.fps = self.frames as f32 / self.elapsed;
            self.frames = 0;
            self.elapsed = 0.0;
        }
        self.fps
    }
}

/// Tessellated overlay, ready for the renderer.
pub struct HudFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// Run egui for one frame. The platform output is returned for the native
/// window integration; the browser build drops it.
pub fn run_hud(
    egui_ctx: &Context,
    raw_input: egui::RawInput,
    stats: &HudStats,
) -> (HudFrame, egui::PlatformOutput) {
    let output = egui_ctx.run(raw_input, |ctx| draw_debug_window(ctx, stats));
    let primitives = egui_ctx.tessellate(output.shapes, output.pixels_per_point);
    (
        HudFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        },
        output.platform_output,
    )
}

/// Raw input for a canvas of the given size, `now` in milliseconds.
pub fn canvas_input(width: u32, height: u32, now: f64) -> egui::RawInput {
    egui::RawInput {
        time: Some(now / 1000.0),
        screen_rect: Some(egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(width as f32, height as f32),
        )),
        ..Default::default()
    }
}

fn draw_debug_window(ctx: &Context, stats: &HudStats) {
    egui::Window::new("Debug")
        .default_pos([8.0, 8.0])
        .default_size([160.0, 100.0])
        .show(ctx, |ui| {
            ui.label(RichText::new(format!("FPS: {:.0}", stats.fps)).small());
            ui.label(
                RichText::new(format!(
                    "Pos: x: {:.1} y: {:.1}",
                    stats.position.x, stats.position.y
                ))
                .small(),
            );
            ui.label(
                RichText::new(format!(
                    "Vel: x: {:.2} y: {:.2}",
                    stats.velocity.x, stats.velocity.y
                ))
                .small(),
            );
            ui.label(
                RichText::new(format!(
                    "Heading: {:.0}°  Thrust: {:.0}",
                    stats.orientation.to_degrees(),
                    stats.thrust
                ))
                .small(),
            );
            ui.label(RichText::new(format!("Objects: {}", stats.object_count)).small());
            ui.separator();
            ui.label(RichText::new("Controls:").small());
            ui.label(RichText::new("Up / W - Thrust").small());
            ui.label(RichText::new("Down / S - Reverse").small());
            ui.label(RichText::new("Left / A, Right / D - Turn").small());
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::controller::ManualTime;

    #[test]
    fn fps_settles_after_half_a_second() {
        let mut counter = FpsCounter::default();
        let mut fps = 0.0;
        for _ in 0..40 {
            fps = counter.tick(1.0 / 60.0);
        }
        assert!((fps - 60.0).abs() < 0.5, "fps = {fps}");
    }

    #[test]
    fn fps_is_zero_before_first_window() {
        let mut counter = FpsCounter::default();
        assert_eq!(counter.tick(0.016), 0.0);
    }

    #[test]
    fn stats_follow_the_avatar() {
        let scene = Scene::new(SceneConfig::default(), Box::new(ManualTime::new(0.0))).unwrap();
        let stats = HudStats::from_scene(&scene, 59.0);
        assert_eq!(stats.position, Vec3::new(-13.0, -13.0, 0.0));
        assert_eq!(stats.object_count, 2);
        assert_eq!(stats.fps, 59.0);
    }
}
