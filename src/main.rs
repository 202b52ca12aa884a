use std::sync::Arc;

use tracing::{error, info, warn};
use winit::{
    event::*,
    event_loop::EventLoop,
    window::Window,
};

// Import from the library crate
use raider::{
    config::SceneConfig,
    controller::{
        input::native::key_event_to_input, InputEvent, InputProcessor, InputState, WallClock,
    },
    logging,
    model::Scene,
    view::{
        render::{self, SpriteRenderer},
        ui::{self, FpsCounter, HudStats},
        GpuContext,
    },
    Result,
};

struct App {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: SpriteRenderer,
    scene: Scene,

    // Input handling
    input_state: InputState,
    input_processor: InputProcessor,

    // egui
    egui_state: egui_winit::State,
    egui_ctx: egui::Context,
    fps: FpsCounter,
}

impl App {
    async fn new(window: Arc<Window>, config: SceneConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;

        let mut scene = Scene::new(config, Box::new(WallClock::new()))?;
        let images = render::load_textures(scene.registry()).await?;
        let mut renderer = SpriteRenderer::new(&gpu, scene.registry(), &images)?;
        scene.attach(&mut renderer)?;

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        let mut app = Self {
            window,
            gpu,
            renderer,
            scene,
            input_state: InputState::new(),
            input_processor: InputProcessor::default(),
            egui_state,
            egui_ctx,
            fps: FpsCounter::default(),
        };
        // The window may not have the configured size (HiDPI, tiling WMs).
        app.resize(size);
        Ok(app)
    }

    /// Returns true if egui consumed the event
    fn input(&mut self, event: &WindowEvent) -> bool {
        if self.egui_state.on_window_event(self.window.as_ref(), event).consumed {
            return true;
        }

        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(input) = key_event_to_input(event) {
                    self.input_state.process_event(&input);
                }
            }
            WindowEvent::Focused(false) => {
                self.input_state.process_event(&InputEvent::FocusLost);
            }
            WindowEvent::Occluded(occluded) => {
                self.input_state
                    .process_event(&InputEvent::VisibilityChanged { visible: !occluded });
            }
            _ => {}
        }
        false
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if let Err(e) = self.scene.resize(&mut self.renderer, new_size.width, new_size.height) {
            // Minimized windows report 0x0
            warn!("ignoring resize: {e}");
            return;
        }
        self.gpu.resize(new_size.width, new_size.height);
        self.renderer.resize_surface(new_size.width, new_size.height);
    }

    fn render(&mut self) -> Result<()> {
        let keys = self.input_processor.keys_pressed(&self.input_state);
        let time = match self.scene.update(&mut self.renderer, &keys) {
            Ok(time) => time,
            Err(e) => {
                warn!("frame skipped: {e}");
                self.renderer.discard_frame();
                return Ok(());
            }
        };

        let stats = HudStats::from_scene(&self.scene, self.fps.tick(time.dt));
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let (hud, platform_output) = ui::run_hud(&self.egui_ctx, raw_input, &stats);
        self.egui_state.handle_platform_output(&self.window, platform_output);

        self.renderer.present(&self.gpu, Some(hud))
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = SceneConfig::default().with_env_overrides();
    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Raider")
        .with_inner_size(winit::dpi::LogicalSize::new(config.canvas_width, config.canvas_height));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = match pollster::block_on(App::new(window.clone(), config)) {
        Ok(app) => app,
        Err(e) => {
            error!("startup failed: {e}");
            return Err(e.into());
        }
    };
    info!("running");

    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event: key, .. }
                            if key.logical_key == winit::keyboard::Key::Named(winit::keyboard::NamedKey::Escape) =>
                        {
                            elwt.exit()
                        }
                        WindowEvent::Resized(physical_size) => {
                            app.resize(*physical_size);
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(e) = app.render() {
                                error!("{e}");
                                elwt.exit();
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                app.window.request_redraw();
            }
            _ => {}
        }
    })?;
    Ok(())
}
