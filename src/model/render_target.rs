//! The drawing surface a scene renders into.
//!
//! The scene only speaks this trait. The wgpu renderer implements it for
//! the real canvas, [`RecordingTarget`] implements it headlessly.

use bitflags::bitflags;
use glam::Mat4;

use crate::error::Result;
use crate::model::camera::OrthoCamera;
use crate::model::game_object::GameObject;
use crate::model::resources::{MaterialId, MeshId, ProgramId, ResourceRegistry};

bitflags! {
    /// Buffers reset by [`RenderTarget::clear`]. Bit values follow GL.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const DEPTH_BUFFER = 0x0000_0100;
        const COLOR_BUFFER = 0x0000_4000;
    }
}

/// Blend factors, discriminants follow GL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcAlpha = 0x0302,
    OneMinusSrcAlpha = 0x0303,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`
    pub const ALPHA: BlendFunc = BlendFunc {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// One textured quad, fully resolved for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub program: ProgramId,
    pub model: Mat4,
    pub view_proj: Mat4,
    pub view_proj_inverse: Mat4,
}

impl DrawCall {
    pub fn for_object(
        object: &GameObject,
        registry: &ResourceRegistry,
        camera: &OrthoCamera,
    ) -> Result<Self> {
        let (material, program) = registry.resolve(object.mesh)?;
        Ok(Self {
            mesh: object.mesh,
            material,
            program,
            model: object.model_matrix(),
            view_proj: camera.view_proj(),
            view_proj_inverse: camera.view_proj_inverse(),
        })
    }
}

pub trait RenderTarget {
    /// Blend every later draw with `func`.
    fn enable_blending(&mut self, func: BlendFunc);

    fn set_viewport(&mut self, viewport: Viewport);

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32);

    /// Queue a draw. Draws land on screen in the order they were issued.
    fn draw(&mut self, call: &DrawCall) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetCommand {
    Blend(BlendFunc),
    Viewport(Viewport),
    Clear {
        flags: ClearFlags,
        color: [f32; 4],
        depth: f32,
    },
    Draw(DrawCall),
}

/// Render target that only remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub commands: Vec<TargetCommand>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|c| match c {
            TargetCommand::Draw(call) => Some(call),
            _ => None,
        })
    }

    pub fn last_viewport(&self) -> Option<Viewport> {
        self.commands.iter().rev().find_map(|c| match c {
            TargetCommand::Viewport(v) => Some(*v),
            _ => None,
        })
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }
}

impl RenderTarget for RecordingTarget {
    fn enable_blending(&mut self, func: BlendFunc) {
        self.commands.push(TargetCommand::Blend(func));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(TargetCommand::Viewport(viewport));
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32) {
        self.commands.push(TargetCommand::Clear { flags, color, depth });
    }

    fn draw(&mut self, call: &DrawCall) -> Result<()> {
        self.commands.push(TargetCommand::Draw(call.clone()));
        Ok(())
    }
}
