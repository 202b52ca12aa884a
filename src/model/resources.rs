//! Scene-owned description of every GPU resource the demo needs.
//!
//! The registry is plain data: it names shaders, pairs them into programs,
//! binds textures into materials and materials onto geometry. The wgpu
//! renderer realizes it once at startup; game objects only hold handles.

use crate::error::{Result, SceneError};
use crate::model::render_target::BlendFunc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(usize);

macro_rules! impl_index {
    ($($id:ty),*) => {
        $(impl $id {
            pub fn index(self) -> usize {
                self.0
            }
        })*
    };
}

impl_index!(ShaderId, ProgramId, MaterialId, MeshId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDesc {
    pub label: String,
    pub vertex: ShaderId,
    pub fragment: ShaderId,
    pub blend: BlendFunc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    pub label: String,
    pub program: ProgramId,
    pub color_texture: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// Two triangles spanning `[-1, 1]²` with texture coordinates.
    TexturedQuad,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshDesc {
    pub label: String,
    pub material: MaterialId,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    shaders: Vec<ShaderDesc>,
    programs: Vec<ProgramDesc>,
    materials: Vec<MaterialDesc>,
    meshes: Vec<MeshDesc>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shader(&mut self, stage: ShaderStage, file: impl Into<String>) -> ShaderId {
        self.shaders.push(ShaderDesc {
            stage,
            file: file.into(),
        });
        ShaderId(self.shaders.len() - 1)
    }

    pub fn add_program(
        &mut self,
        label: impl Into<String>,
        vertex: ShaderId,
        fragment: ShaderId,
        blend: BlendFunc,
    ) -> Result<ProgramId> {
        let label = label.into();
        self.expect_stage(vertex, ShaderStage::Vertex, &label)?;
        self.expect_stage(fragment, ShaderStage::Fragment, &label)?;
        self.programs.push(ProgramDesc {
            label,
            vertex,
            fragment,
            blend,
        });
        Ok(ProgramId(self.programs.len() - 1))
    }

    pub fn add_material(
        &mut self,
        label: impl Into<String>,
        program: ProgramId,
        color_texture: impl Into<String>,
    ) -> MaterialId {
        self.materials.push(MaterialDesc {
            label: label.into(),
            program,
            color_texture: color_texture.into(),
        });
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_mesh(
        &mut self,
        label: impl Into<String>,
        material: MaterialId,
        geometry: Geometry,
    ) -> MeshId {
        self.meshes.push(MeshDesc {
            label: label.into(),
            material,
            geometry,
        });
        MeshId(self.meshes.len() - 1)
    }

    fn expect_stage(&self, id: ShaderId, stage: ShaderStage, program: &str) -> Result<()> {
        match self.shaders.get(id.0) {
            Some(shader) if shader.stage == stage => Ok(()),
            Some(shader) => Err(SceneError::resource(
                shader.file.clone(),
                format!("program `{program}` expects a {stage:?} shader"),
            )),
            None => Err(SceneError::resource(
                format!("shader #{}", id.0),
                "not registered",
            )),
        }
    }

    pub fn material(&self, id: MaterialId) -> Option<&MaterialDesc> {
        self.materials.get(id.0)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshDesc> {
        self.meshes.get(id.0)
    }

    pub fn shaders(&self) -> impl Iterator<Item = (ShaderId, &ShaderDesc)> {
        self.shaders.iter().enumerate().map(|(i, s)| (ShaderId(i), s))
    }

    pub fn programs(&self) -> impl Iterator<Item = (ProgramId, &ProgramDesc)> {
        self.programs.iter().enumerate().map(|(i, p)| (ProgramId(i), p))
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &MaterialDesc)> {
        self.materials.iter().enumerate().map(|(i, m)| (MaterialId(i), m))
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &MeshDesc)> {
        self.meshes.iter().enumerate().map(|(i, m)| (MeshId(i), m))
    }

    /// Distinct texture paths in first-use order.
    pub fn texture_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for material in &self.materials {
            if !paths.contains(&material.color_texture.as_str()) {
                paths.push(&material.color_texture);
            }
        }
        paths
    }

    /// Resolve a mesh to the material and program it renders with.
    pub fn resolve(&self, mesh: MeshId) -> Result<(MaterialId, ProgramId)> {
        let desc = self
            .mesh(mesh)
            .ok_or_else(|| SceneError::Render(format!("unknown mesh {mesh:?}")))?;
        let material = self
            .material(desc.material)
            .ok_or_else(|| SceneError::Render(format!("unknown material {:?}", desc.material)))?;
        Ok((desc.material, material.program))
    }
}
