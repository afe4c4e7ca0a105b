use crate::context::TextureHandle;
use crate::math::{Mat4, Vec3};
use crate::types::{
    BlendFunc, Color, CompFunc, CullMode, FillMode, FogParams, FrustumPlanes, ImageData, Light,
    Material, PrimitiveType, RenderState, ShadeModel, TexImgFormat, TexWrapMode, Texture,
    TextureCreateParams, TextureStageParams, TransformType, VertexFormat, Vertices,
};

use super::buffers::StaticBufferId;
use super::caps::Capabilities;
use super::error::DeviceResult;
use super::framebuffer::{Framebuffer, FramebufferParams};
use super::init::DeviceConfig;
use super::BackendKind;

/// The rendering device every higher layer draws through.
///
/// Implementations differ in which hardware generation they drive; callers
/// never branch on that. Unit indices are logical: 0 primary, 1 secondary,
/// 2 shadow map. Passing an out-of-range light or unit index panics.
pub trait Device {
    // ── lifecycle ─────────────────────────────────────────────────────────

    fn kind(&self) -> BackendKind;

    /// Short backend name, e.g. "gl33".
    fn name(&self) -> &'static str;

    /// Renderer and driver version as reported by the context.
    fn hardware_info(&mut self) -> String;

    /// Releases every owned resource. Further calls do nothing.
    ///
    /// A destroyed device must not be used for anything but dropping; debug
    /// builds panic when scene, texture, buffer, draw or framebuffer
    /// operations are called afterwards.
    fn destroy(&mut self);

    /// Adapts the default framebuffer to a new window configuration.
    fn config_changed(&mut self, config: &DeviceConfig);

    fn capabilities(&self) -> &Capabilities;

    /// Diagnostic of the last failed resource creation.
    fn error_message(&self) -> &str;

    fn max_lights(&self) -> usize {
        self.capabilities().max_lights
    }

    fn max_textures(&self) -> usize {
        self.capabilities().max_textures
    }

    fn max_texture_size(&self) -> u32 {
        self.capabilities().max_texture_size
    }

    fn is_anisotropy_supported(&self) -> bool {
        self.capabilities().anisotropy_supported
    }

    fn max_anisotropy_level(&self) -> f32 {
        self.capabilities().max_anisotropy
    }

    fn is_multisampling_supported(&self) -> bool {
        self.capabilities().multisampling_supported
    }

    fn max_samples(&self) -> u32 {
        self.capabilities().max_samples
    }

    fn is_shadow_mapping_supported(&self) -> bool {
        self.capabilities().shadow_mapping_supported()
    }

    fn is_framebuffer_supported(&self) -> bool {
        self.capabilities().framebuffer_supported()
    }

    // ── scene ─────────────────────────────────────────────────────────────

    /// Clears color and depth and uploads the current transforms.
    fn begin_scene(&mut self);

    /// Flushes pending draws; debug builds also drain driver errors.
    fn end_scene(&mut self);

    fn clear(&mut self);

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    // ── transforms, material, lights ──────────────────────────────────────

    fn set_transform(&mut self, kind: TransformType, matrix: &Mat4);

    /// Stored matrix; the view matrix is returned with its handedness flip.
    fn transform(&self, kind: TransformType) -> Mat4;

    fn set_material(&mut self, material: &Material);

    fn material(&self) -> &Material;

    fn set_light(&mut self, index: usize, light: &Light);

    fn light(&self, index: usize) -> &Light;

    fn set_light_enabled(&mut self, index: usize, enabled: bool);

    fn is_light_enabled(&self, index: usize) -> bool;

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads `image`. Bad image data yields an invalid texture and sets
    /// [`error_message`](Device::error_message).
    fn create_texture(&mut self, image: &ImageData<'_>, params: &TextureCreateParams) -> Texture;

    /// Invalid immediately when shadow mapping is unsupported.
    fn create_depth_texture(&mut self, width: u32, height: u32, depth: u8) -> Texture;

    /// Writes `image` into `texture` at `offset`.
    fn update_texture(
        &mut self,
        texture: &Texture,
        offset: (i32, i32),
        image: &ImageData<'_>,
        format: TexImgFormat,
    ) -> bool;

    /// Unbinds `texture` from every unit, then frees it.
    fn destroy_texture(&mut self, texture: &Texture);

    fn destroy_all_textures(&mut self);

    /// Binds `texture` on `unit`; rebinding the current texture does nothing.
    fn set_texture(&mut self, unit: usize, texture: &Texture);

    fn set_texture_handle(&mut self, unit: usize, handle: TextureHandle) {
        self.set_texture(unit, &Texture { handle, ..Texture::default() });
    }

    fn texture(&self, unit: usize) -> Texture;

    fn set_texture_enabled(&mut self, unit: usize, enabled: bool);

    fn is_texture_enabled(&self, unit: usize) -> bool;

    fn set_texture_stage_params(&mut self, unit: usize, params: &TextureStageParams);

    fn texture_stage_params(&self, unit: usize) -> TextureStageParams;

    fn set_texture_stage_wrap(&mut self, unit: usize, wrap_s: TexWrapMode, wrap_t: TexWrapMode);

    /// Copies a rectangle of the bound framebuffer into `texture`.
    fn copy_framebuffer_to_texture(
        &mut self,
        texture: &Texture,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> bool;

    // ── primitives ────────────────────────────────────────────────────────

    /// Draws `vertices`; `color` is used when the shape has no vertex color.
    fn draw_primitive(&mut self, primitive: PrimitiveType, vertices: Vertices<'_>, color: Color);

    /// Draws `count` vertices of an arbitrary interleaved layout.
    fn draw_primitive_format(
        &mut self,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        count: usize,
    );

    /// Draws the sub-ranges `first[i]..first[i] + count[i]` of `vertices`.
    fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        vertices: Vertices<'_>,
        first: &[i32],
        count: &[i32],
        color: Color,
    );

    fn draw_primitives_format(
        &mut self,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        first: &[i32],
        count: &[i32],
    );

    // ── static buffers ────────────────────────────────────────────────────

    fn create_static_buffer(&mut self, primitive: PrimitiveType, vertices: Vertices<'_>) -> StaticBufferId;

    fn update_static_buffer(
        &mut self,
        id: StaticBufferId,
        primitive: PrimitiveType,
        vertices: Vertices<'_>,
    ) -> bool;

    fn draw_static_buffer(&mut self, id: StaticBufferId) -> bool;

    fn destroy_static_buffer(&mut self, id: StaticBufferId) -> bool;

    // ── render state ──────────────────────────────────────────────────────

    /// Toggles one state. Setting the current value again does nothing.
    fn set_render_state(&mut self, state: RenderState, enabled: bool);

    fn render_state(&self, state: RenderState) -> bool;

    fn set_color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);

    fn set_depth_test_func(&mut self, func: CompFunc);

    fn set_depth_bias(&mut self, factor: f32, units: f32);

    fn set_alpha_test_func(&mut self, func: CompFunc, reference: f32);

    fn set_blend_func(&mut self, src: BlendFunc, dst: BlendFunc);

    fn set_clear_color(&mut self, color: Color);

    fn set_global_ambient(&mut self, color: Color);

    fn set_fog_params(&mut self, params: &FogParams);

    fn set_cull_mode(&mut self, mode: CullMode);

    fn set_shade_model(&mut self, model: ShadeModel);

    fn set_fill_mode(&mut self, mode: FillMode);

    /// Brightness of shadowed areas, 0 black to 1 unshadowed.
    fn set_shadow_color(&mut self, value: f32);

    // ── culling ───────────────────────────────────────────────────────────

    /// Frustum planes the sphere lies entirely outside of.
    fn compute_sphere_visibility(&mut self, center: Vec3, radius: f32) -> FrustumPlanes;

    // ── framebuffers ──────────────────────────────────────────────────────

    fn framebuffer(&self, name: &str) -> Option<&dyn Framebuffer>;

    fn create_framebuffer(&mut self, name: &str, params: &FramebufferParams) -> DeviceResult<&dyn Framebuffer>;

    /// Deletes `name`; the default framebuffer is left alone.
    fn delete_framebuffer(&mut self, name: &str);

    fn bind_framebuffer(&mut self, name: &str) -> bool;

    fn unbind_framebuffer(&mut self, name: &str) -> bool;

    fn copy_framebuffer_to_screen(&mut self, name: &str, src: [i32; 4], dst: [i32; 4]) -> bool;

    /// RGBA bytes of a rectangle of the bound framebuffer.
    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32) -> Vec<u8>;
}
