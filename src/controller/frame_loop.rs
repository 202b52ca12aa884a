use std::rc::Rc;
use std::cell::RefCell;
use tracing::{error, warn};
use web_sys::{HtmlCanvasElement, Window};

use crate::controller::input::{InputProcessor, InputState};
use crate::model::Scene;
use crate::view::gpu_init::GpuContext;
use crate::view::render::SpriteRenderer;
use crate::view::ui::{self, FpsCounter, HudStats};

/// Browser frame loop: one `update` per animation frame.
pub struct FrameLoopContext {
    pub scene: Scene,
    pub renderer: SpriteRenderer,
    pub gpu: GpuContext,
    pub canvas: HtmlCanvasElement,
    pub input_state: Rc<RefCell<InputState>>,
    pub input_processor: InputProcessor,
    pub egui_ctx: egui::Context,
    pub fps: FpsCounter,
}

impl FrameLoopContext {
    /// Simulate, draw and present one frame
    pub fn update(&mut self, window: &Window) {
        self.handle_resize(window);

        let keys = self
            .input_processor
            .keys_pressed(&self.input_state.borrow());
        let time = match self.scene.update(&mut self.renderer, &keys) {
            Ok(time) => time,
            Err(e) => {
                warn!("frame skipped: {e}");
                self.renderer.discard_frame();
                return;
            }
        };

        // Build egui input for the canvas
        let dpr = window.device_pixel_ratio() as f32;
        self.egui_ctx.set_pixels_per_point(dpr);
        let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
        let raw_input = ui::canvas_input(
            (self.gpu.config.width as f32 / dpr) as u32,
            (self.gpu.config.height as f32 / dpr) as u32,
            now,
        );
        let stats = HudStats::from_scene(&self.scene, self.fps.tick(time.dt));
        let (hud, _) = ui::run_hud(&self.egui_ctx, raw_input, &stats);

        if let Err(e) = self.renderer.present(&self.gpu, Some(hud)) {
            error!("present failed: {e}");
        }
    }

    /// Keep the canvas, surface and scene in step with the window size.
    fn handle_resize(&mut self, window: &Window) {
        let (Ok(w), Ok(h)) = (window.inner_width(), window.inner_height()) else {
            return;
        };
        let width = w.as_f64().unwrap_or(0.0) as u32;
        let height = h.as_f64().unwrap_or(0.0) as u32;
        if (width, height) == (self.canvas.width(), self.canvas.height()) {
            return;
        }

        if let Err(e) = self.scene.resize(&mut self.renderer, width, height) {
            warn!("ignoring resize: {e}");
            return;
        }
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.gpu.resize(width, height);
        self.renderer.resize_surface(width, height);
    }
}
