use crate::context::{FramebufferStatus, GlVersion, ShaderStage};

/// Failures a device reports to its immediate caller.
///
/// Missing optional features are not errors; they lower a capability tier
/// instead.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("OpenGL {required} or newer is required, context reports {actual}")]
    UnsupportedVersion { required: GlVersion, actual: GlVersion },

    #[error("{stage:?} shader compilation failed:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("shader program link failed:\n{log}")]
    ProgramLink { log: String },

    #[error("no shader sources supplied for the {backend} backend")]
    MissingShaderSources { backend: &'static str },

    #[error("framebuffer name \"{0}\" is reserved")]
    ReservedFramebuffer(String),

    #[error("framebuffer \"{0}\" already exists")]
    FramebufferExists(String),

    #[error("framebuffer objects are not supported")]
    FramebufferUnsupported,

    #[error("framebuffer is incomplete: {0}")]
    FramebufferIncomplete(FramebufferStatus),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
