use winit::dpi::PhysicalSize;

/// Window-level parameters a device is created with.
///
/// These mirror what the windowing layer negotiated for the context; the
/// device only reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Drawable size in physical pixels.
    pub size: PhysicalSize<u32>,

    /// Depth buffer precision in bits.
    pub depth_size: u8,

    /// Stencil buffer precision in bits.
    pub stencil_size: u8,

    /// Bits per color channel (red, green, blue, alpha).
    pub color_bits: [u8; 4],

    pub double_buffer: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            size: PhysicalSize::new(800, 600),
            depth_size: 24,
            stencil_size: 8,
            color_bits: [8, 8, 8, 8],
            double_buffer: true,
        }
    }
}

impl DeviceConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self { size: PhysicalSize::new(width, height), ..Self::default() }
    }
}

/// Engine-level quality knobs applied on top of hardware limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Highest mipmap level generated for mipmapped textures.
    pub mipmap_level: u32,

    /// Requested anisotropy; clamped to what the hardware reports.
    pub anisotropy_level: f32,

    /// Prefer per-pixel lighting on shader backends that offer both paths.
    pub per_pixel_lighting: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mipmap_level: 1,
            anisotropy_level: 1.0,
            per_pixel_lighting: true,
        }
    }
}

/// Shader program text supplied by the asset layer.
///
/// The device compiles and links these; it never reads files itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self { vertex: vertex.into(), fragment: fragment.into() }
    }
}

/// Programs for every shader-based backend the factory may try.
///
/// A backend whose entry is missing fails creation, and the factory moves on
/// to the next lower generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceShaders {
    /// Program for the fixed-light-count shader backend.
    pub shader: Option<ShaderSources>,
    /// Program for the core-profile backend.
    pub core: Option<ShaderSources>,
}
