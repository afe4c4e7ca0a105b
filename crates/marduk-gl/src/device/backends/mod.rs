//! Device implementations.
//!
//! [`GlDevice`] carries everything the three hardware generations share:
//! resource managers, transform and light bookkeeping, binding dedup and the
//! render-state guard. What differs between generations lives behind the
//! [`Pipeline`] trait, with one implementation per backend:
//! - [`FixedPipeline`]: fixed-function lights, matrices and texture combiners
//! - [`ShaderPipeline`]: one program with eight lights, legacy client arrays
//! - [`CorePipeline`]: core-profile program, vertex arrays, streamed vertices

mod core_profile;
mod fixed;
mod shader;

pub use self::core_profile::CorePipeline;
pub use self::fixed::FixedPipeline;
pub use self::shader::ShaderPipeline;

use crate::context::{Capability, DrawRanges, GlContext, GlVersion, TextureHandle};
use crate::math::{Mat4, Vec3};
use crate::types::{
    BlendFunc, Color, CompFunc, CullMode, FillMode, FogParams, FrustumPlanes, ImageData, Light,
    Material, PrimitiveType, RenderState, ShadeModel, TexImgFormat, TexWrapMode, Texture,
    TextureCreateParams, TextureStageParams, TransformType, VertexFormat, Vertices,
};

use super::buffers::{StaticBufferId, StaticBuffers, StaticStorage};
use super::caps::{self, Capabilities};
use super::contract::Device;
use super::culling;
use super::error::{DeviceError, DeviceResult};
use super::framebuffer::{DefaultFramebuffer, Framebuffer, FramebufferParams, FramebufferSet};
use super::init::{DeviceConfig, DeviceShaders, RenderSettings};
use super::textures::{MipmapPath, TextureBindings, TextureManager};
use super::transform::TransformState;
use super::units::UnitMap;
use super::BackendKind;

pub type FixedFunctionDevice = GlDevice<FixedPipeline>;
pub type ShaderDevice = GlDevice<ShaderPipeline>;
pub type CoreDevice = GlDevice<CorePipeline>;

const RENDER_STATES: usize = 9;

/// State shared by every backend, handed to [`Pipeline`] hooks.
pub struct DeviceState {
    pub gl: Box<dyn GlContext>,
    pub config: DeviceConfig,
    pub settings: RenderSettings,
    pub caps: Capabilities,
    pub units: UnitMap,
    pub transforms: TransformState,
    pub material: Material,
    pub lights: Vec<Light>,
    pub lights_enabled: Vec<bool>,
    render_states: [bool; RENDER_STATES],
    pub textures: TextureManager,
    pub bindings: TextureBindings,
    pub buffers: StaticBuffers,
    pub framebuffers: FramebufferSet,
    pub alpha_func: (CompFunc, f32),
    pub fog: FogParams,
    pub global_ambient: Color,
    pub shade_model: ShadeModel,
    pub shadow_color: f32,
    pub error: String,
}

impl DeviceState {
    #[inline]
    pub fn render_state(&self, state: RenderState) -> bool {
        self.render_states[state as usize]
    }

    /// Physical unit of logical unit `unit`.
    #[inline]
    pub fn physical(&self, unit: usize) -> u32 {
        self.units.physical_of(unit)
    }

    /// Texture currently held by logical unit `unit`, or none when the unit
    /// does not exist.
    pub fn bound_handle(&self, unit: usize) -> TextureHandle {
        if unit < self.bindings.len() {
            self.bindings.get(unit).texture.handle
        } else {
            TextureHandle::NONE
        }
    }
}

/// What one hardware generation does differently.
///
/// `create` runs before the device exists and may fail; every other hook
/// runs against a fully built [`DeviceState`].
pub trait Pipeline: Sized {
    const KIND: BackendKind;
    const NAME: &'static str;
    const MIN_VERSION: GlVersion;
    const MIPMAP_PATH: MipmapPath;

    fn unit_map(caps: &Capabilities) -> UnitMap;
    fn static_storage(caps: &Capabilities) -> StaticStorage;

    fn create(gl: &mut dyn GlContext, caps: &Capabilities, shaders: &DeviceShaders) -> DeviceResult<Self>;

    /// Applies initial pipeline state.
    fn init(&mut self, dev: &mut DeviceState);
    fn destroy(&mut self, dev: &mut DeviceState);

    /// Uploads every transform matrix.
    fn upload_transforms(&mut self, dev: &mut DeviceState);
    fn transform_changed(&mut self, dev: &mut DeviceState, kind: TransformType);

    fn apply_material(&mut self, dev: &mut DeviceState);
    fn apply_light(&mut self, dev: &mut DeviceState, index: usize);
    fn apply_light_enabled(&mut self, dev: &mut DeviceState, index: usize);

    /// Lighting, fog, alpha test and shadow mapping. The value in `dev` is
    /// already updated and differs from the previous one.
    fn apply_render_state(&mut self, dev: &mut DeviceState, state: RenderState);

    fn bind_texture(&mut self, dev: &mut DeviceState, unit: usize);
    fn apply_texture_enabled(&mut self, dev: &mut DeviceState, unit: usize);
    fn apply_stage_params(&mut self, dev: &mut DeviceState, unit: usize);

    fn apply_alpha_func(&mut self, dev: &mut DeviceState);
    fn apply_fog(&mut self, dev: &mut DeviceState);
    fn apply_global_ambient(&mut self, dev: &mut DeviceState);
    fn apply_shade_model(&mut self, dev: &mut DeviceState);
    fn apply_shadow_color(&mut self, dev: &mut DeviceState);

    /// Immediate draw of client memory.
    fn draw(
        &mut self,
        dev: &mut DeviceState,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        ranges: DrawRanges<'_>,
    );
}

/// Panics unless every range lies inside `data`.
fn assert_ranges_in_bounds(data: &[u8], format: &VertexFormat, first: &[i32], count: &[i32]) {
    let mut end = 0usize;
    for (&f, &c) in first.iter().zip(count) {
        assert!(f >= 0 && c >= 0, "negative draw range {f}+{c}");
        if c > 0 {
            end = end.max((f + c) as usize);
        }
    }
    let needed = format.byte_len(end);
    assert!(
        needed <= data.len(),
        "draw reads {needed} bytes but only {} were supplied",
        data.len()
    );
}

/// A device whose construction failed, handing the context back so another
/// backend can try it.
pub struct CreateFailure {
    pub error: DeviceError,
    pub context: Box<dyn GlContext>,
}

impl std::fmt::Debug for CreateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateFailure").field("error", &self.error).finish_non_exhaustive()
    }
}

/// [`Device`] over one [`Pipeline`].
pub struct GlDevice<P: Pipeline> {
    state: DeviceState,
    pipeline: P,
    destroyed: bool,
}

impl<P: Pipeline> GlDevice<P> {
    pub fn new(
        gl: Box<dyn GlContext>,
        config: &DeviceConfig,
        settings: &RenderSettings,
        shaders: &DeviceShaders,
    ) -> DeviceResult<Self> {
        Self::try_new(gl, config, settings, shaders).map_err(|f| f.error)
    }

    /// Like [`new`](Self::new), but returns the context on failure.
    pub fn try_new(
        mut gl: Box<dyn GlContext>,
        config: &DeviceConfig,
        settings: &RenderSettings,
        shaders: &DeviceShaders,
    ) -> Result<Self, CreateFailure> {
        let version = gl.version();
        if !version.at_least(P::MIN_VERSION.major, P::MIN_VERSION.minor) {
            log::warn!("{} backend needs OpenGL {}, context has {version}", P::NAME, P::MIN_VERSION);
            let error = DeviceError::UnsupportedVersion { required: P::MIN_VERSION, actual: version };
            return Err(CreateFailure { error, context: gl });
        }

        let caps = caps::probe(gl.as_mut(), P::KIND);
        let pipeline = match P::create(gl.as_mut(), &caps, shaders) {
            Ok(p) => p,
            Err(error) => return Err(CreateFailure { error, context: gl }),
        };

        let units = P::unit_map(&caps);
        let default_fb = DefaultFramebuffer::new(
            config.size.width,
            config.size.height,
            config.depth_size,
            caps.framebuffer.api(),
        );

        let state = DeviceState {
            gl,
            config: config.clone(),
            settings: settings.clone(),
            units,
            transforms: TransformState::default(),
            material: Material::default(),
            lights: vec![Light::default(); caps.max_lights],
            lights_enabled: vec![false; caps.max_lights],
            render_states: [false; RENDER_STATES],
            textures: TextureManager::new(P::MIPMAP_PATH),
            bindings: TextureBindings::new(caps.max_textures),
            buffers: StaticBuffers::new(P::static_storage(&caps)),
            framebuffers: FramebufferSet::new(default_fb),
            alpha_func: (CompFunc::Greater, 0.5),
            fog: FogParams::default(),
            global_ambient: Color::BLACK,
            shade_model: ShadeModel::Smooth,
            shadow_color: 0.5,
            error: String::new(),
            caps,
        };

        let mut device = Self { state, pipeline, destroyed: false };
        device.init_state();
        log::info!(
            "{} device created (OpenGL {}, quality shadows: {})",
            P::NAME,
            device.state.caps.version,
            device.state.units.quality_shadows()
        );
        Ok(device)
    }

    fn init_state(&mut self) {
        let dev = &mut self.state;
        let size = dev.config.size;
        dev.gl.viewport(0, 0, size.width as i32, size.height as i32);
        dev.gl.set_enabled(Capability::DepthTest, true);
        dev.gl.depth_func(CompFunc::Less);
        dev.gl.depth_mask(true);
        dev.gl.clear_color(Color::BLACK);
        dev.render_states[RenderState::DepthTest as usize] = true;
        dev.render_states[RenderState::DepthWrite as usize] = true;
        self.pipeline.init(dev);
    }

    /// Direct access to the shared state, mostly for inspection in tests.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    #[inline]
    fn debug_assert_live(&self) {
        debug_assert!(!self.destroyed, "{} device used after destroy", P::NAME);
    }

    fn error(&mut self, message: String) {
        log::error!("{message}");
        self.state.error = message;
    }

    fn draw_ranges(
        &mut self,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        first: &[i32],
        count: &[i32],
    ) {
        self.debug_assert_live();
        assert_eq!(first.len(), count.len(), "first and count arrays differ in length");
        assert_ranges_in_bounds(data, format, first, count);
        if first.is_empty() {
            return;
        }
        if self.state.caps.multi_draw_arrays {
            let ranges = DrawRanges::Multi { first, count };
            self.pipeline.draw(&mut self.state, primitive, data, format, ranges);
        } else {
            for (&f, &c) in first.iter().zip(count) {
                let ranges = DrawRanges::Single { first: f, count: c };
                self.pipeline.draw(&mut self.state, primitive, data, format, ranges);
            }
        }
    }

    /// Framebuffers, then textures, then buffers, then pipeline objects.
    fn release_all(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let dev = &mut self.state;
        dev.framebuffers.destroy_all(dev.gl.as_mut());

        for unit in 0..dev.bindings.len() {
            if dev.bindings.get(unit).texture.is_valid() {
                let physical = dev.units.physical_of(unit);
                dev.gl.active_texture(physical);
                dev.gl.bind_texture(TextureHandle::NONE);
            }
        }
        dev.bindings.clear_textures();
        dev.textures.destroy_all(dev.gl.as_mut());
        dev.buffers.destroy_all(dev.gl.as_mut());
        self.pipeline.destroy(dev);
        log::debug!("{} device destroyed", P::NAME);
    }
}

impl<P: Pipeline> Drop for GlDevice<P> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<P: Pipeline> Device for GlDevice<P> {
    fn kind(&self) -> BackendKind {
        P::KIND
    }

    fn name(&self) -> &'static str {
        P::NAME
    }

    fn hardware_info(&mut self) -> String {
        self.state.gl.renderer_description()
    }

    fn destroy(&mut self) {
        self.release_all();
    }

    fn config_changed(&mut self, config: &DeviceConfig) {
        let size = config.size;
        self.state.config = config.clone();
        self.state.framebuffers.resize_default(size.width, size.height);
        self.state.gl.viewport(0, 0, size.width as i32, size.height as i32);
        log::debug!("default framebuffer resized to {}x{}", size.width, size.height);
    }

    fn capabilities(&self) -> &Capabilities {
        &self.state.caps
    }

    fn error_message(&self) -> &str {
        &self.state.error
    }

    // ── scene ─────────────────────────────────────────────────────────────

    fn begin_scene(&mut self) {
        self.debug_assert_live();
        self.clear();
        self.pipeline.upload_transforms(&mut self.state);
    }

    fn end_scene(&mut self) {
        self.debug_assert_live();
        self.state.gl.flush();
        if cfg!(debug_assertions) {
            while let Some(err) = self.state.gl.take_error() {
                log::error!("OpenGL error: {err}");
            }
        }
    }

    fn clear(&mut self) {
        let gl = &mut self.state.gl;
        // depth writes must be on for the depth clear to take effect
        gl.depth_mask(true);
        gl.clear(true, true);
        if !self.state.render_states[RenderState::DepthWrite as usize] {
            self.state.gl.depth_mask(false);
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.state.gl.viewport(x, y, width, height);
    }

    // ── transforms, material, lights ──────────────────────────────────────

    fn set_transform(&mut self, kind: TransformType, matrix: &Mat4) {
        self.state.transforms.set(kind, matrix);
        self.pipeline.transform_changed(&mut self.state, kind);
    }

    fn transform(&self, kind: TransformType) -> Mat4 {
        let t = &self.state.transforms;
        match kind {
            TransformType::World => *t.world(),
            TransformType::View => *t.view(),
            TransformType::Projection => *t.projection(),
            TransformType::Shadow => *t.shadow(),
        }
    }

    fn set_material(&mut self, material: &Material) {
        self.state.material = *material;
        self.pipeline.apply_material(&mut self.state);
    }

    fn material(&self) -> &Material {
        &self.state.material
    }

    fn set_light(&mut self, index: usize, light: &Light) {
        assert!(index < self.state.lights.len(), "light index {index} out of range");
        self.state.lights[index] = *light;
        self.pipeline.apply_light(&mut self.state, index);
    }

    fn light(&self, index: usize) -> &Light {
        assert!(index < self.state.lights.len(), "light index {index} out of range");
        &self.state.lights[index]
    }

    fn set_light_enabled(&mut self, index: usize, enabled: bool) {
        assert!(index < self.state.lights.len(), "light index {index} out of range");
        self.state.lights_enabled[index] = enabled;
        self.pipeline.apply_light_enabled(&mut self.state, index);
    }

    fn is_light_enabled(&self, index: usize) -> bool {
        assert!(index < self.state.lights.len(), "light index {index} out of range");
        self.state.lights_enabled[index]
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self, image: &ImageData<'_>, params: &TextureCreateParams) -> Texture {
        self.debug_assert_live();
        let dev = &mut self.state;
        let unit = dev.physical(0);
        let restore = dev.bound_handle(0);
        let result = dev.textures.create(
            dev.gl.as_mut(),
            image,
            params,
            &dev.caps,
            &dev.settings,
            unit,
            restore,
        );
        match result {
            Ok(texture) => texture,
            Err(e) => {
                self.error(format!("texture creation failed: {e}"));
                Texture::invalid()
            }
        }
    }

    fn create_depth_texture(&mut self, width: u32, height: u32, depth: u8) -> Texture {
        self.debug_assert_live();
        let dev = &mut self.state;
        let unit = dev.physical(0);
        let restore = dev.bound_handle(0);
        match dev.textures.create_depth(dev.gl.as_mut(), width, height, depth, &dev.caps, unit, restore) {
            Ok(texture) => texture,
            Err(e) => {
                self.error(format!("depth texture creation failed: {e}"));
                Texture::invalid()
            }
        }
    }

    fn update_texture(
        &mut self,
        texture: &Texture,
        offset: (i32, i32),
        image: &ImageData<'_>,
        format: TexImgFormat,
    ) -> bool {
        let dev = &mut self.state;
        let unit = dev.physical(0);
        let restore = dev.bound_handle(0);
        match dev.textures.update(dev.gl.as_mut(), texture, offset, image, format, unit, restore) {
            Ok(()) => true,
            Err(e) => {
                self.error(format!("texture update failed: {e}"));
                false
            }
        }
    }

    fn destroy_texture(&mut self, texture: &Texture) {
        if !texture.is_valid() {
            return;
        }
        let dev = &mut self.state;
        for unit in dev.bindings.unbind_everywhere(texture.handle) {
            let physical = dev.units.physical_of(unit);
            dev.gl.active_texture(physical);
            dev.gl.bind_texture(TextureHandle::NONE);
        }
        dev.textures.destroy(dev.gl.as_mut(), texture);
    }

    fn destroy_all_textures(&mut self) {
        let dev = &mut self.state;
        for unit in 0..dev.bindings.len() {
            if dev.bindings.get(unit).texture.is_valid() {
                let physical = dev.units.physical_of(unit);
                dev.gl.active_texture(physical);
                dev.gl.bind_texture(TextureHandle::NONE);
            }
        }
        dev.bindings.clear_textures();
        dev.textures.destroy_all(dev.gl.as_mut());
    }

    fn set_texture(&mut self, unit: usize, texture: &Texture) {
        self.debug_assert_live();
        if !self.state.bindings.bind(unit, *texture) {
            return;
        }
        self.pipeline.bind_texture(&mut self.state, unit);
    }

    fn texture(&self, unit: usize) -> Texture {
        self.state.bindings.get(unit).texture
    }

    fn set_texture_enabled(&mut self, unit: usize, enabled: bool) {
        let slot = self.state.bindings.get_mut(unit);
        if slot.enabled == enabled {
            return;
        }
        slot.enabled = enabled;
        self.pipeline.apply_texture_enabled(&mut self.state, unit);
    }

    fn is_texture_enabled(&self, unit: usize) -> bool {
        self.state.bindings.get(unit).enabled
    }

    fn set_texture_stage_params(&mut self, unit: usize, params: &TextureStageParams) {
        self.state.bindings.get_mut(unit).params = *params;
        self.pipeline.apply_stage_params(&mut self.state, unit);
    }

    fn texture_stage_params(&self, unit: usize) -> TextureStageParams {
        self.state.bindings.get(unit).params
    }

    fn set_texture_stage_wrap(&mut self, unit: usize, wrap_s: TexWrapMode, wrap_t: TexWrapMode) {
        let params = &mut self.state.bindings.get_mut(unit).params;
        params.wrap_s = wrap_s;
        params.wrap_t = wrap_t;
        self.pipeline.apply_stage_params(&mut self.state, unit);
    }

    fn copy_framebuffer_to_texture(
        &mut self,
        texture: &Texture,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> bool {
        if !texture.is_valid() {
            return false;
        }
        let dev = &mut self.state;
        let unit = dev.physical(0);
        let restore = dev.bound_handle(0);
        dev.gl.active_texture(unit);
        dev.gl.bind_texture(texture.handle);
        dev.gl.copy_tex_sub_image_2d(x, y, width, height);
        dev.gl.bind_texture(restore);
        true
    }

    // ── primitives ────────────────────────────────────────────────────────

    fn draw_primitive(&mut self, primitive: PrimitiveType, vertices: Vertices<'_>, color: Color) {
        self.debug_assert_live();
        let format = vertices.format(color);
        let ranges = DrawRanges::Single { first: 0, count: vertices.len() as i32 };
        self.pipeline.draw(&mut self.state, primitive, vertices.as_bytes(), &format, ranges);
    }

    fn draw_primitive_format(
        &mut self,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        count: usize,
    ) {
        self.debug_assert_live();
        assert_ranges_in_bounds(data, format, &[0], &[count as i32]);
        let ranges = DrawRanges::Single { first: 0, count: count as i32 };
        self.pipeline.draw(&mut self.state, primitive, data, format, ranges);
    }

    fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        vertices: Vertices<'_>,
        first: &[i32],
        count: &[i32],
        color: Color,
    ) {
        let format = vertices.format(color);
        self.draw_ranges(primitive, vertices.as_bytes(), &format, first, count);
    }

    fn draw_primitives_format(
        &mut self,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        first: &[i32],
        count: &[i32],
    ) {
        self.draw_ranges(primitive, data, format, first, count);
    }

    // ── static buffers ────────────────────────────────────────────────────

    fn create_static_buffer(&mut self, primitive: PrimitiveType, vertices: Vertices<'_>) -> StaticBufferId {
        self.debug_assert_live();
        let dev = &mut self.state;
        let format = vertices.format(Color::WHITE);
        dev.buffers.create(dev.gl.as_mut(), primitive, &format, vertices.as_bytes(), vertices.len())
    }

    fn update_static_buffer(
        &mut self,
        id: StaticBufferId,
        primitive: PrimitiveType,
        vertices: Vertices<'_>,
    ) -> bool {
        let dev = &mut self.state;
        let format = vertices.format(Color::WHITE);
        dev.buffers.update(dev.gl.as_mut(), id, primitive, &format, vertices.as_bytes(), vertices.len())
    }

    fn draw_static_buffer(&mut self, id: StaticBufferId) -> bool {
        self.debug_assert_live();
        let dev = &mut self.state;
        let tex_units = [dev.physical(0), dev.physical(1)];
        dev.buffers.draw(dev.gl.as_mut(), id, tex_units)
    }

    fn destroy_static_buffer(&mut self, id: StaticBufferId) -> bool {
        let dev = &mut self.state;
        dev.buffers.destroy(dev.gl.as_mut(), id)
    }

    // ── render state ──────────────────────────────────────────────────────

    fn set_render_state(&mut self, state: RenderState, enabled: bool) {
        self.debug_assert_live();
        if self.state.render_state(state) == enabled {
            return;
        }
        if state == RenderState::ShadowMapping && enabled && !self.state.caps.shadow_mapping_supported() {
            log::debug!("shadow mapping requested but not supported");
            return;
        }
        self.state.render_states[state as usize] = enabled;

        let cap = match state {
            RenderState::DepthWrite => {
                self.state.gl.depth_mask(enabled);
                return;
            }
            RenderState::Blending => Capability::Blend,
            RenderState::DepthTest => Capability::DepthTest,
            RenderState::Culling => Capability::CullFace,
            RenderState::DepthBias => Capability::PolygonOffsetFill,
            RenderState::Lighting | RenderState::Fog | RenderState::AlphaTest | RenderState::ShadowMapping => {
                self.pipeline.apply_render_state(&mut self.state, state);
                return;
            }
        };
        self.state.gl.set_enabled(cap, enabled);
    }

    fn render_state(&self, state: RenderState) -> bool {
        self.state.render_state(state)
    }

    fn set_color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.state.gl.color_mask(red, green, blue, alpha);
    }

    fn set_depth_test_func(&mut self, func: CompFunc) {
        self.state.gl.depth_func(func);
    }

    fn set_depth_bias(&mut self, factor: f32, units: f32) {
        self.state.gl.polygon_offset(factor, units);
    }

    fn set_alpha_test_func(&mut self, func: CompFunc, reference: f32) {
        self.state.alpha_func = (func, reference);
        self.pipeline.apply_alpha_func(&mut self.state);
    }

    fn set_blend_func(&mut self, src: BlendFunc, dst: BlendFunc) {
        self.state.gl.blend_func(src, dst);
    }

    fn set_clear_color(&mut self, color: Color) {
        self.state.gl.clear_color(color);
    }

    fn set_global_ambient(&mut self, color: Color) {
        self.state.global_ambient = color;
        self.pipeline.apply_global_ambient(&mut self.state);
    }

    fn set_fog_params(&mut self, params: &FogParams) {
        self.state.fog = *params;
        self.pipeline.apply_fog(&mut self.state);
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.state.gl.front_face(mode);
    }

    fn set_shade_model(&mut self, model: ShadeModel) {
        self.state.shade_model = model;
        self.pipeline.apply_shade_model(&mut self.state);
    }

    fn set_fill_mode(&mut self, mode: FillMode) {
        self.state.gl.polygon_mode(mode);
    }

    fn set_shadow_color(&mut self, value: f32) {
        self.state.shadow_color = value.clamp(0.0, 1.0);
        self.pipeline.apply_shadow_color(&mut self.state);
    }

    // ── culling ───────────────────────────────────────────────────────────

    fn compute_sphere_visibility(&mut self, center: Vec3, radius: f32) -> FrustumPlanes {
        culling::sphere_visibility(self.state.transforms.combined(), center, radius)
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn framebuffer(&self, name: &str) -> Option<&dyn Framebuffer> {
        self.state.framebuffers.get(name)
    }

    fn create_framebuffer(&mut self, name: &str, params: &FramebufferParams) -> DeviceResult<&dyn Framebuffer> {
        self.debug_assert_live();
        let dev = &mut self.state;
        let unit = dev.physical(0);
        let restore = dev.bound_handle(0);
        match dev.framebuffers.create(dev.gl.as_mut(), name, params, &dev.caps, unit, restore) {
            Ok(fb) => Ok(fb),
            Err(e) => {
                let message = format!("framebuffer \"{name}\" not created: {e}");
                log::error!("{message}");
                dev.error = message;
                Err(e)
            }
        }
    }

    fn delete_framebuffer(&mut self, name: &str) {
        let dev = &mut self.state;
        dev.framebuffers.delete(dev.gl.as_mut(), name);
    }

    fn bind_framebuffer(&mut self, name: &str) -> bool {
        let dev = &mut self.state;
        dev.framebuffers.bind(dev.gl.as_mut(), name)
    }

    fn unbind_framebuffer(&mut self, name: &str) -> bool {
        let dev = &mut self.state;
        dev.framebuffers.unbind(dev.gl.as_mut(), name)
    }

    fn copy_framebuffer_to_screen(&mut self, name: &str, src: [i32; 4], dst: [i32; 4]) -> bool {
        let dev = &mut self.state;
        dev.framebuffers.copy_to_screen(dev.gl.as_mut(), name, src, dst)
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32) -> Vec<u8> {
        self.state.gl.read_pixels(x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CallLog, HeadlessConfig, HeadlessContext};
    use crate::types::Vertex;

    fn device(config: HeadlessConfig) -> (CoreDevice, CallLog) {
        let gl = HeadlessContext::new(config);
        let log = gl.log();
        let shaders = DeviceShaders {
            core: Some(crate::device::ShaderSources::new("void main() {}", "void main() {}")),
            ..DeviceShaders::default()
        };
        let dev = CoreDevice::new(Box::new(gl), &DeviceConfig::default(), &RenderSettings::default(), &shaders)
            .expect("core device");
        (dev, log)
    }

    fn rgba(dev: &mut CoreDevice) -> Texture {
        let px = [255u8; 16];
        dev.create_texture(&ImageData::rgba(&px, 2, 2), &TextureCreateParams::default())
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn rebinding_same_texture_does_no_driver_work() {
        let (mut dev, log) = device(HeadlessConfig::default());
        let t = rgba(&mut dev);
        log.reset();
        dev.set_texture(0, &t);
        let first = log.count("bind_texture");
        dev.set_texture(0, &t);
        assert_eq!(log.count("bind_texture"), first);
        assert_eq!(dev.texture(0), t);
    }

    #[test]
    fn identical_pixels_create_distinct_textures() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        let a = rgba(&mut dev);
        let b = rgba(&mut dev);
        assert!(a.is_valid() && b.is_valid());
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_image_sets_error_message() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        let px = [0u8; 3];
        let t = dev.create_texture(&ImageData::rgba(&px, 2, 2), &TextureCreateParams::default());
        assert!(!t.is_valid());
        assert!(dev.error_message().contains("too short"));
    }

    #[test]
    fn destroying_a_bound_texture_unbinds_every_unit() {
        let (mut dev, log) = device(HeadlessConfig::default());
        let t = rgba(&mut dev);
        dev.set_texture(0, &t);
        dev.set_texture(1, &t);
        dev.destroy_texture(&t);
        assert!(!dev.texture(0).is_valid());
        assert!(!dev.texture(1).is_valid());
        assert!(log.bound_texture(0).is_none());
        assert!(log.bound_texture(1).is_none());
        assert_eq!(log.live_textures(), 0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_unit_panics() {
        let (mut dev, _log) = device(HeadlessConfig { max_texture_image_units: 2, ..HeadlessConfig::default() });
        let t = rgba(&mut dev);
        dev.set_texture(2, &t);
    }

    #[test]
    #[should_panic]
    fn out_of_range_light_panics() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        dev.set_light_enabled(8, true);
    }

    // ── state ─────────────────────────────────────────────────────────────

    #[test]
    fn repeated_render_state_is_ignored() {
        let (mut dev, log) = device(HeadlessConfig::default());
        log.reset();
        dev.set_render_state(RenderState::Blending, true);
        dev.set_render_state(RenderState::Blending, true);
        assert_eq!(log.count("set_enabled"), 1);
        assert!(dev.render_state(RenderState::Blending));
    }

    #[test]
    fn sphere_visibility_is_deterministic() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        let center = Vec3::new(0.25, 0.0, 0.0);
        let a = dev.compute_sphere_visibility(center, 0.1);
        let b = dev.compute_sphere_visibility(center, 0.1);
        assert_eq!(a, b);
        assert_eq!(a, FrustumPlanes::empty());
        assert!(dev.compute_sphere_visibility(Vec3::new(5.0, 0.0, 0.0), 0.5).contains(FrustumPlanes::RIGHT));
    }

    #[test]
    fn end_scene_drains_driver_errors() {
        let (mut dev, log) = device(HeadlessConfig {
            pending_errors: vec![crate::context::GlError::InvalidValue; 3],
            ..HeadlessConfig::default()
        });
        log.reset();
        dev.end_scene();
        assert_eq!(log.count("flush"), 1);
        if cfg!(debug_assertions) {
            assert_eq!(log.count("take_error"), 4);
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "bytes but only")]
    fn short_vertex_data_panics_before_reaching_the_driver() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        let mesh = [Vertex::default(); 3];
        let vertices = Vertices::from(&mesh[..]);
        let format = vertices.format(Color::WHITE);
        let bytes = vertices.as_bytes();
        dev.draw_primitive_format(PrimitiveType::Triangles, &bytes[..bytes.len() - 4], &format, 3);
    }

    #[test]
    #[should_panic(expected = "bytes but only")]
    fn multi_range_past_the_end_panics() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        let mesh = [Vertex::default(); 4];
        let vertices = Vertices::from(&mesh[..]);
        let format = vertices.format(Color::WHITE);
        dev.draw_primitives_format(PrimitiveType::Lines, vertices.as_bytes(), &format, &[0, 2], &[2, 4]);
    }

    #[test]
    fn ranges_ending_at_the_last_vertex_draw() {
        let (mut dev, log) = device(HeadlessConfig::default());
        let mesh = [Vertex::default(); 4];
        let vertices = Vertices::from(&mesh[..]);
        let format = vertices.format(Color::WHITE);
        log.reset();
        dev.draw_primitives_format(PrimitiveType::Lines, vertices.as_bytes(), &format, &[0, 2], &[2, 2]);
        assert_eq!(log.count("draw_arrays"), 1);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "used after destroy")]
    fn drawing_after_destroy_panics_in_debug_builds() {
        let (mut dev, _log) = device(HeadlessConfig::default());
        dev.destroy();
        dev.begin_scene();
    }

    #[test]
    fn destroy_releases_in_dependency_order() {
        let (mut dev, log) = device(HeadlessConfig { record_history: true, ..HeadlessConfig::default() });
        dev.create_framebuffer("offscreen", &FramebufferParams::default()).expect("complete");
        rgba(&mut dev);
        let mesh = [Vertex::default(); 3];
        dev.create_static_buffer(PrimitiveType::Triangles, Vertices::from(&mesh[..]));
        log.reset();

        dev.destroy();
        let history = log.history();
        let pos = |cmd: &str| history.iter().position(|c| *c == cmd).unwrap_or(usize::MAX);
        assert!(pos("delete_framebuffer") < pos("delete_texture"));
        assert!(pos("delete_texture") < pos("delete_buffer"));
        assert_eq!(log.live_textures(), 0);
        assert_eq!(log.live_framebuffers(), 0);
        assert_eq!(log.live_buffers(), 0);
        assert_eq!(log.live_programs(), 0);

        log.reset();
        dev.destroy();
        assert!(log.history().is_empty());
    }

    #[test]
    fn config_change_resizes_default_framebuffer_only() {
        let (mut dev, log) = device(HeadlessConfig::default());
        rgba(&mut dev);
        dev.config_changed(&DeviceConfig::with_size(1280, 720));
        let default = dev.framebuffer("default").expect("default exists");
        assert_eq!((default.width(), default.height()), (1280, 720));
        assert_eq!(log.live_textures(), 1);
    }
}
