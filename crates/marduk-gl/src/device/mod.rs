//! Rendering devices.
//!
//! This module is responsible for:
//! - probing what the current OpenGL context can do
//! - choosing a backend generation and falling back when creation fails
//! - owning textures, static buffers and framebuffers for the device lifetime
//! - mirroring render state so redundant GL calls are skipped

pub mod backends;
mod buffers;
mod caps;
mod combine;
mod contract;
mod culling;
mod error;
mod factory;
mod framebuffer;
mod init;
mod shader;
mod streaming;
mod textures;
mod transform;
mod units;

pub use backends::{CoreDevice, CreateFailure, FixedFunctionDevice, GlDevice, ShaderDevice};
pub use buffers::{configure_attributes, StaticBufferId, StaticStorage};
pub use caps::{BufferSupport, Capabilities, FramebufferSupport, ShadowSupport, SupportTier};
pub use contract::Device;
pub use culling::{sphere_visibility, Plane};
pub use error::{DeviceError, DeviceResult};
pub use factory::{create_device, create_device_named, BackendKind, BackendSelection, UnknownBackend};
pub use framebuffer::{
    AttachmentKind, DefaultFramebuffer, Framebuffer, FramebufferParams, GlFramebuffer,
    DEFAULT_FRAMEBUFFER,
};
pub use init::{DeviceConfig, DeviceShaders, RenderSettings, ShaderSources};
pub use shader::ShaderProgram;
pub use streaming::DynamicBuffer;
pub use textures::{MipmapPath, TextureError};
pub use transform::TransformState;
pub use units::{UnitMap, UnitRole};
