// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

pub use config::SceneConfig;
pub use error::{Result, SceneError};
pub use model::Scene;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue, prelude::wasm_bindgen};
    use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, Window};

    use crate::config::SceneConfig;
    use crate::controller::frame_clock::WallClock;
    use crate::controller::input::{wasm::keyboard_event_to_input, InputEvent, InputProcessor, InputState};
    use crate::controller::FrameLoopContext;
    use crate::error::SceneError;
    use crate::logging;
    use crate::model::Scene;
    use crate::view::render::{self, SpriteRenderer};
    use crate::view::ui::FpsCounter;
    use crate::view::GpuContext;

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();

        let config = SceneConfig::default();
        let (window, document, canvas) = init_canvas(config.canvas_width, config.canvas_height)?;
        setup_app(config, &window, &document, canvas).await.map_err(|e| {
            tracing::error!("startup failed: {e}");
            js_error(e.to_string())
        })
    }

    /// Main application setup for WASM
    async fn setup_app(
        config: SceneConfig,
        window: &Window,
        document: &Document,
        canvas: HtmlCanvasElement,
    ) -> Result<(), SceneError> {
        let gpu = GpuContext::new(&canvas, config.canvas_width, config.canvas_height).await?;

        let mut scene = Scene::new(config, Box::new(WallClock::new()))?;
        let images = render::load_textures(scene.registry()).await?;
        let mut renderer = SpriteRenderer::new(&gpu, scene.registry(), &images)?;
        scene.attach(&mut renderer)?;

        let input_state = Rc::new(RefCell::new(InputState::new()));
        let input_processor = InputProcessor::default();
        setup_input_listeners(document, window, input_state.clone(), input_processor.clone())
            .map_err(|e| SceneError::Render(format!("failed to register listeners: {e:?}")))?;

        let mut frame_ctx = FrameLoopContext {
            scene,
            renderer,
            gpu,
            canvas,
            input_state,
            input_processor,
            egui_ctx: egui::Context::default(),
            fps: FpsCounter::default(),
        };

        // Continuous redraw using requestAnimationFrame
        let window_for_loop = window.clone();
        RcCellCallback::new(window.clone(), move || frame_ctx.update(&window_for_loop)).start();

        Ok(())
    }

    /// Keyboard and focus listeners feeding the shared input state
    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        input_state: Rc<RefCell<InputState>>,
        input_processor: InputProcessor,
    ) -> Result<(), JsValue> {
        // Keyboard down
        {
            let input_state = input_state.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                // Arrow keys would scroll the page
                if input_processor.is_steering_key(&e.key()) {
                    e.prevent_default();
                }
                input_state
                    .borrow_mut()
                    .process_event(&keyboard_event_to_input(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let input_state = input_state.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                input_state
                    .borrow_mut()
                    .process_event(&keyboard_event_to_input(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let input_state = input_state.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                input_state.borrow_mut().process_event(&InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Visibility change - clear all keys
        {
            let document_for_state = document.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                let visible = !document_for_state.hidden();
                input_state
                    .borrow_mut()
                    .process_event(&InputEvent::VisibilityChanged { visible });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        Ok(())
    }

    fn init_canvas(width: u32, height: u32) -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let body = document.body().ok_or(js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        canvas_el.set_width(width);
        canvas_el.set_height(height);
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }

    /// Self-rescheduling requestAnimationFrame callback
    struct RcCellCallback {
        inner: Rc<RefCell<Box<dyn FnMut()>>>,
        window: Window,
    }

    impl RcCellCallback {
        fn new(window: Window, f: impl FnMut() + 'static) -> Self {
            Self {
                inner: Rc::new(RefCell::new(Box::new(f))),
                window,
            }
        }

        fn start(self) {
            let inner = self.inner.clone();
            let window = self.window.clone();

            let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
            let callback_clone = callback.clone();

            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
                inner.borrow_mut().as_mut()();

                let cb_ref = callback_clone.borrow();
                if let Some(cb) = cb_ref.as_ref() {
                    if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        tracing::error!("requestAnimationFrame failed: {e:?}");
                    }
                }
            }) as Box<dyn FnMut()>));

            if let Some(cb) = callback.borrow().as_ref() {
                if let Err(e) = self.window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    tracing::error!("requestAnimationFrame failed: {e:?}");
                }
            }

            // Leak the closure to keep it alive
            std::mem::forget(callback);
        }
    }
}
