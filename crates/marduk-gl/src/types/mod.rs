//! Value types shared by every backend.
//!
//! Nothing in here touches a graphics context; these are the plain data the
//! rest of the engine hands to a [`Device`](crate::device::Device).

mod color;
mod light;
mod state;
mod texture;
mod vertex;

pub use color::Color;
pub use light::{Light, LightType, Material};
pub use state::{
    BlendFunc, CompFunc, CullMode, FillMode, FogMode, FogParams, FrustumPlanes, PrimitiveType,
    RenderState, ShadeModel, TransformType,
};
pub use texture::{
    ChannelMasks, ImageData, TexFilter, TexImgFormat, TexMixArgument, TexMixOperation,
    TexWrapMode, Texture, TextureCreateParams, TextureSize, TextureStageParams,
};
pub use vertex::{
    ComponentType, VertexAttribute, VertexCol, VertexFormat, VertexShape, VertexTex2, Vertex,
    Vertices,
};
