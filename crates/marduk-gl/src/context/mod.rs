//! Graphics-context seam.
//!
//! This module is responsible for:
//! - the [`GlContext`] trait, the full command vocabulary a device issues
//! - typed object handles and the small enums that parameterize commands
//! - [`HeadlessContext`], a bookkeeping-only implementation with call counting
//!
//! Context creation (window, pixel format, loader) is not done here. A caller
//! creates the context elsewhere and hands it to a device.

mod handles;
mod headless;

pub use handles::{
    BufferHandle, FramebufferHandle, ListHandle, ProgramHandle, RenderbufferHandle, ShaderHandle,
    TextureHandle, UniformLocation, VertexArrayHandle,
};
pub use headless::{CallLog, HeadlessConfig, HeadlessContext};

use crate::math::Mat4;
use crate::types::{
    BlendFunc, Color, CompFunc, CullMode, FillMode, FogParams, Material, PrimitiveType,
    ShadeModel, TexWrapMode, VertexFormat,
};

// ── queries ───────────────────────────────────────────────────────────────

/// Context version as reported by the driver.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlVersion {
    pub major: u8,
    pub minor: u8,
}

impl GlVersion {
    #[inline]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// `10 * major + minor`, e.g. 33 for 3.3.
    #[inline]
    pub const fn code(self) -> u32 {
        self.major as u32 * 10 + self.minor as u32
    }

    #[inline]
    pub const fn at_least(self, major: u8, minor: u8) -> bool {
        self.code() >= major as u32 * 10 + minor as u32
    }
}

impl core::fmt::Display for GlVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Integer implementation limits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Limit {
    MaxLights,
    /// Fixed-function texture units.
    MaxTextureUnits,
    /// Units addressable from shaders.
    MaxTextureImageUnits,
    MaxTextureSize,
    MaxSamples,
    MaxRenderbufferSize,
}

/// Driver error codes drained by [`GlContext::take_error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GlError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
    StackOverflow,
    StackUnderflow,
}

impl core::fmt::Display for GlError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            GlError::InvalidEnum => "invalid enum",
            GlError::InvalidValue => "invalid value",
            GlError::InvalidOperation => "invalid operation",
            GlError::InvalidFramebufferOperation => "invalid framebuffer operation",
            GlError::OutOfMemory => "out of memory",
            GlError::StackOverflow => "stack overflow",
            GlError::StackUnderflow => "stack underflow",
        };
        f.write_str(s)
    }
}

// ── fixed state ───────────────────────────────────────────────────────────

/// Server-side toggles.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    AlphaTest,
    CullFace,
    PolygonOffsetFill,
    Fog,
    Lighting,
    Light(u32),
    Normalize,
    /// 2D texturing on the active unit.
    Texture2D,
    /// Eye-linear coordinate generation for S, T, R and Q on the active unit.
    TexGen,
    Multisample,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    Projection,
    ModelView,
    Texture,
}

/// Fixed-function light parameters, excluding position.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FixedLight {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub attenuation: [f32; 3],
    /// Degrees; 180 disables the cone.
    pub spot_cutoff: f32,
    pub spot_exponent: f32,
}

// ── textures ──────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest,
    Linear,
}

/// Parameter of the texture bound to the active unit.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TexParam {
    MinFilter(MinFilter),
    MagFilter(MagFilter),
    WrapS(TexWrapMode),
    WrapT(TexWrapMode),
    BaseLevel(i32),
    MaxLevel(i32),
    /// Legacy automatic mipmap generation on upload.
    AutoMipmap(bool),
    MaxAnisotropy(f32),
    /// Depth comparison for shadow sampling; `None` samples raw depth.
    DepthCompare(Option<CompFunc>),
    BorderColor(Color),
}

/// Internal storage of a texture image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    Rgb,
    Rgba,
    Depth(u8),
}

/// Channel order of client pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Depth,
}

impl PixelLayout {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb | PixelLayout::Bgr => 3,
            PixelLayout::Rgba | PixelLayout::Bgra | PixelLayout::Depth => 4,
        }
    }
}

/// Full image description for the texture bound to the active unit.
#[derive(Debug, Copy, Clone)]
pub struct TexImage<'a> {
    pub level: i32,
    pub internal: InternalFormat,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    /// `None` allocates storage without initializing it.
    pub data: Option<&'a [u8]>,
}

/// Texture-environment (combiner) state of the active unit.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TexEnv {
    Mode(TexEnvMode),
    Color(Color),
    CombineRgb(CombineFunc),
    CombineAlpha(CombineFunc),
    SourceRgb(u8, CombineSource),
    OperandRgb(u8, CombineOperand),
    SourceAlpha(u8, CombineSource),
    OperandAlpha(u8, CombineOperand),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TexEnvMode {
    Modulate,
    Replace,
    Combine,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CombineFunc {
    Replace,
    Modulate,
    Add,
    Subtract,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CombineSource {
    Texture,
    TextureUnit(u32),
    Previous,
    PrimaryColor,
    Constant,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CombineOperand {
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
}

// ── buffers and arrays ────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

/// Per-slot vertex attribute source for the bound vertex array.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AttribSource {
    /// Read from the bound buffer: component count, stride and byte offset.
    Array { size: u8, normalized: bool, stride: usize, offset: usize },
    /// Constant value for every vertex.
    Constant([f32; 4]),
}

/// Where client-array draws read vertex bytes from.
#[derive(Debug, Copy, Clone)]
pub enum ArrayData<'a> {
    /// Application memory.
    Client(&'a [u8]),
    /// The currently bound array buffer, starting at a byte offset.
    Bound(usize),
}

/// Legacy client-array draw description.
#[derive(Debug, Copy, Clone)]
pub struct ClientArrays<'a> {
    pub data: ArrayData<'a>,
    pub format: &'a VertexFormat,
    /// Physical units receiving the first and second texture coordinate sets.
    pub tex_units: [u32; 2],
}

/// Vertex ranges of one draw submission.
#[derive(Debug, Copy, Clone)]
pub enum DrawRanges<'a> {
    Single { first: i32, count: i32 },
    /// Parallel `first`/`count` arrays submitted as one batched call.
    Multi { first: &'a [i32], count: &'a [i32] },
}

// ── shaders ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4 { transpose: bool, value: Mat4 },
}

// ── framebuffers ──────────────────────────────────────────────────────────

/// Entry-point family used for framebuffer objects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferApi {
    /// Core or ARB entry points.
    Core,
    /// `EXT_framebuffer_object` entry points.
    Ext,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    Both,
    Read,
    Draw,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color,
    Depth,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    Rgba8,
    Depth(u8),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    Undefined,
    IncompleteAttachment,
    IncompleteMissingAttachment,
    IncompleteDimensions,
    IncompleteFormats,
    IncompleteDrawBuffer,
    IncompleteReadBuffer,
    IncompleteMultisample,
    Unsupported,
}

impl core::fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            FramebufferStatus::Complete => "complete",
            FramebufferStatus::Undefined => "undefined",
            FramebufferStatus::IncompleteAttachment => "incomplete attachment",
            FramebufferStatus::IncompleteMissingAttachment => "missing attachment",
            FramebufferStatus::IncompleteDimensions => "incomplete dimensions",
            FramebufferStatus::IncompleteFormats => "incomplete formats",
            FramebufferStatus::IncompleteDrawBuffer => "incomplete draw buffer",
            FramebufferStatus::IncompleteReadBuffer => "incomplete read buffer",
            FramebufferStatus::IncompleteMultisample => "incomplete multisample",
            FramebufferStatus::Unsupported => "unsupported attachment combination",
        };
        f.write_str(s)
    }
}

// ── the seam ──────────────────────────────────────────────────────────────

/// Command interface of a current graphics context.
///
/// One value corresponds to one context, used from the thread that owns it.
/// Commands that bind operate on the "active" unit/buffer/framebuffer the way
/// the driver does; callers track bindings themselves to avoid redundant work.
pub trait GlContext {
    // queries
    fn version(&mut self) -> GlVersion;
    /// Vendor, renderer and version strings joined for display.
    fn renderer_description(&mut self) -> String;
    fn has_extension(&mut self, name: &str) -> bool;
    fn get_integer(&mut self, limit: Limit) -> i32;
    fn max_anisotropy(&mut self) -> f32;
    /// Pops one pending driver error, if any.
    fn take_error(&mut self) -> Option<GlError>;
    fn flush(&mut self);

    // frame state
    fn set_enabled(&mut self, cap: Capability, enabled: bool);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear(&mut self, color: bool, depth: bool);
    fn clear_color(&mut self, color: Color);
    fn depth_mask(&mut self, enabled: bool);
    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool);
    fn depth_func(&mut self, func: CompFunc);
    fn alpha_func(&mut self, func: CompFunc, reference: f32);
    fn blend_func(&mut self, src: BlendFunc, dst: BlendFunc);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn front_face(&mut self, mode: CullMode);
    fn shade_model(&mut self, model: ShadeModel);
    fn polygon_mode(&mut self, mode: FillMode);
    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32) -> Vec<u8>;

    // fixed-function pipeline
    fn load_matrix(&mut self, mode: MatrixMode, matrix: &Mat4);
    fn light(&mut self, index: u32, light: &FixedLight);
    /// Position is transformed by the current modelview matrix.
    fn light_position(&mut self, index: u32, position: [f32; 4], spot_direction: [f32; 3]);
    fn material(&mut self, material: &Material);
    fn light_model_ambient(&mut self, color: Color);
    fn fog(&mut self, params: &FogParams);
    fn tex_env(&mut self, env: TexEnv);
    fn tex_gen_eye_linear(&mut self);

    // textures
    fn gen_texture(&mut self) -> TextureHandle;
    fn delete_texture(&mut self, texture: TextureHandle);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: TextureHandle);
    fn tex_parameter(&mut self, param: TexParam);
    fn tex_image_2d(&mut self, image: &TexImage<'_>);
    fn tex_sub_image_2d(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: &[u8],
    );
    fn generate_mipmap(&mut self);
    /// Copies from the read framebuffer into the bound texture.
    fn copy_tex_sub_image_2d(&mut self, x: i32, y: i32, width: i32, height: i32);

    // buffers
    fn gen_buffer(&mut self) -> BufferHandle;
    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn bind_array_buffer(&mut self, buffer: BufferHandle);
    /// (Re)allocates storage of the bound buffer. `None` orphans the contents.
    fn buffer_data(&mut self, size: usize, data: Option<&[u8]>, usage: BufferUsage);
    fn buffer_sub_data(&mut self, offset: usize, data: &[u8]);
    /// Writes through an unsynchronized write-only mapping of the bound buffer.
    /// Returns `false` if the range could not be mapped.
    fn map_write_unsynchronized(&mut self, offset: usize, data: &[u8]) -> bool;

    // vertex arrays
    fn gen_vertex_array(&mut self) -> VertexArrayHandle;
    fn delete_vertex_array(&mut self, vao: VertexArrayHandle);
    fn bind_vertex_array(&mut self, vao: VertexArrayHandle);
    fn vertex_attrib(&mut self, slot: u32, source: AttribSource);

    // draws
    fn draw_arrays(&mut self, primitive: PrimitiveType, ranges: DrawRanges<'_>);
    fn draw_client_arrays(
        &mut self,
        primitive: PrimitiveType,
        arrays: &ClientArrays<'_>,
        ranges: DrawRanges<'_>,
    );

    // display lists
    fn gen_list(&mut self) -> ListHandle;
    fn delete_list(&mut self, list: ListHandle);
    /// Starts compiling; draws until [`end_list`](Self::end_list) are recorded.
    fn begin_list(&mut self, list: ListHandle);
    fn end_list(&mut self);
    fn call_list(&mut self, list: ListHandle);

    // programs
    fn create_shader(&mut self, stage: ShaderStage) -> ShaderHandle;
    /// Compiles `source`; on failure returns the info log.
    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String>;
    fn delete_shader(&mut self, shader: ShaderHandle);
    fn create_program(&mut self) -> ProgramHandle;
    /// Attaches and links; on failure returns the info log.
    fn link_program(&mut self, program: ProgramHandle, shaders: &[ShaderHandle])
    -> Result<(), String>;
    fn delete_program(&mut self, program: ProgramHandle);
    fn use_program(&mut self, program: ProgramHandle);
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn uniform(&mut self, location: UniformLocation, value: UniformValue);

    // framebuffer objects
    fn gen_framebuffer(&mut self, api: FramebufferApi) -> FramebufferHandle;
    fn delete_framebuffer(&mut self, api: FramebufferApi, fbo: FramebufferHandle);
    fn bind_framebuffer(
        &mut self,
        api: FramebufferApi,
        target: FramebufferTarget,
        fbo: FramebufferHandle,
    );
    fn gen_renderbuffer(&mut self, api: FramebufferApi) -> RenderbufferHandle;
    fn delete_renderbuffer(&mut self, api: FramebufferApi, rbo: RenderbufferHandle);
    fn renderbuffer_storage(
        &mut self,
        api: FramebufferApi,
        rbo: RenderbufferHandle,
        format: RenderbufferFormat,
        samples: u32,
        width: u32,
        height: u32,
    );
    fn attach_renderbuffer(
        &mut self,
        api: FramebufferApi,
        attachment: Attachment,
        rbo: RenderbufferHandle,
    );
    fn attach_texture(&mut self, api: FramebufferApi, attachment: Attachment, texture: TextureHandle);
    fn check_framebuffer_status(&mut self, api: FramebufferApi) -> FramebufferStatus;
    /// Blits color from the read to the draw framebuffer.
    fn blit_framebuffer(&mut self, api: FramebufferApi, src: [i32; 4], dst: [i32; 4]);
}
