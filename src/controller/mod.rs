// CONTROLLER: Input, simulation, and update loop
pub mod behavior;
pub mod frame_clock;
pub mod input;
pub mod physics;
#[cfg(target_arch = "wasm32")]
pub mod frame_loop;

pub use behavior::{Behavior, FrameInput};
pub use frame_clock::{FrameClock, FrameTime, ManualTime, TimeSource, WallClock};
pub use input::{Direction, InputEvent, InputProcessor, InputState, KeysPressed};
pub use physics::PhysicsSystem;
#[cfg(target_arch = "wasm32")]
pub use frame_loop::FrameLoopContext;
