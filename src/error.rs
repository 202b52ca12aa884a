use thiserror::Error;

use crate::model::ObjectId;

/// Everything that can go wrong while building or driving a scene.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// A texture or shader could not be read or decoded.
    #[error("failed to load resource `{path}`: {reason}")]
    ResourceLoad { path: String, reason: String },

    /// The wall clock went backwards or produced a non-finite time.
    #[error("invalid frame timing (dt = {dt})")]
    InvalidFrameTiming { dt: f64 },

    /// A key-state entry named something other than UP, DOWN, LEFT or RIGHT.
    #[error("malformed key state: unknown key `{0}`")]
    MalformedKeyState(String),

    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("no object with id {0:?}")]
    UnknownObject(ObjectId),

    /// The avatar is the camera anchor and must outlive the scene.
    #[error("the avatar cannot be despawned")]
    AvatarRemoval,

    /// A scene holds exactly one avatar.
    #[error("the scene already has an avatar")]
    DuplicateAvatar,

    /// Surface or GPU failure reported by the render target.
    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, SceneError>;

impl SceneError {
    pub fn resource(path: impl Into<String>, reason: impl ToString) -> Self {
        SceneError::ResourceLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
