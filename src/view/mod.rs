// VIEW: Rendering and graphics
pub mod gpu_init;
pub mod render;
pub mod texture;
pub mod ui;

pub use gpu_init::GpuContext;
pub use render::SpriteRenderer;
