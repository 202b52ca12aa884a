// MODEL: Scene state and data
pub mod camera;
pub mod game_object;
pub mod render_target;
pub mod resources;
pub mod scene;

pub use camera::OrthoCamera;
pub use game_object::{Actuation, GameObject, ObjectId, ObjectKind};
pub use render_target::{
    BlendFactor, BlendFunc, ClearFlags, DrawCall, RecordingTarget, RenderTarget, TargetCommand,
    Viewport,
};
pub use resources::{MaterialId, MeshId, ProgramId, ResourceRegistry, ShaderId};
pub use scene::{DemoMeshes, FrameCommands, Scene};
