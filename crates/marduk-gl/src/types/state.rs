use super::Color;

/// Primitive topology for draw calls.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Toggleable pipeline state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderState {
    DepthWrite,
    Lighting,
    Fog,
    AlphaTest,
    Blending,
    DepthTest,
    Culling,
    DepthBias,
    ShadowMapping,
}

/// Which transform slot `set_transform` writes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TransformType {
    World,
    View,
    Projection,
    Shadow,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum CompFunc {
    Never,
    #[default]
    Less,
    Equal,
    NotEqual,
    LessEqual,
    Greater,
    GreaterEqual,
    Always,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFunc {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    DstColor,
    InvDstColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    SrcAlphaSaturate,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum FogMode {
    #[default]
    Linear,
    Exp,
    Exp2,
}

/// Front-face winding; the opposite winding is culled.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum CullMode {
    Cw,
    #[default]
    Ccw,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ShadeModel {
    Flat,
    #[default]
    Smooth,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum FillMode {
    Point,
    Lines,
    #[default]
    Polygon,
}

/// Fog configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FogParams {
    pub mode: FogMode,
    pub color: Color,
    pub start: f32,
    pub end: f32,
    pub density: f32,
}

impl Default for FogParams {
    fn default() -> Self {
        Self {
            mode: FogMode::Linear,
            color: Color::gray(0.8),
            start: 100.0,
            end: 200.0,
            density: 1.0,
        }
    }
}

bitflags::bitflags! {
    /// View-frustum planes a bounding sphere lies entirely outside of.
    ///
    /// An empty set means the sphere is at least partially inside every plane.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FrustumPlanes: u32 {
        const LEFT = 0x01;
        const RIGHT = 0x02;
        const TOP = 0x04;
        const BOTTOM = 0x08;
        const FRONT = 0x10;
        const BACK = 0x20;
    }
}
