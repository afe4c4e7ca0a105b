//! Fixed-function pipeline for 1.x-generation hardware.
//!
//! Lights, matrices and fog go straight to the driver's fixed state. Shadows
//! use eye-linear texture coordinate generation on a reserved unit; with four
//! or more units a second reserved unit composites the shadow term against
//! the lit color ("quality" shadows), otherwise the shadow map simply
//! modulates the result.

use crate::context::{
    ArrayData, Capability, ClientArrays, CombineFunc, CombineOperand, CombineSource, DrawRanges,
    FixedLight, GlContext, GlVersion, InternalFormat, MagFilter, MatrixMode, MinFilter,
    PixelLayout, TexEnv, TexEnvMode, TexImage, TexParam, TextureHandle,
};
use crate::types::{
    Color, LightType, PrimitiveType, RenderState, TexWrapMode, TransformType, VertexFormat,
};

use super::{DeviceState, Pipeline};
use crate::device::buffers::StaticStorage;
use crate::device::caps::{BufferSupport, Capabilities};
use crate::device::combine;
use crate::device::error::DeviceResult;
use crate::device::init::DeviceShaders;
use crate::device::textures::MipmapPath;
use crate::device::units::{UnitMap, UnitRole};
use crate::device::BackendKind;

/// Units needed before the shadow stages get a compositing unit of their own.
const QUALITY_SHADOW_UNITS: usize = 4;

#[derive(Debug)]
pub struct FixedPipeline {
    /// 1x1 white texture feeding the compositing unit.
    white: TextureHandle,
    shadows: bool,
}

fn create_white_texture(gl: &mut dyn GlContext) -> TextureHandle {
    let handle = gl.gen_texture();
    gl.active_texture(0);
    gl.bind_texture(handle);
    gl.tex_image_2d(&TexImage {
        level: 0,
        internal: InternalFormat::Rgba,
        width: 1,
        height: 1,
        layout: PixelLayout::Rgba,
        data: Some(&[255; 4]),
    });
    gl.tex_parameter(TexParam::MinFilter(MinFilter::Nearest));
    gl.tex_parameter(TexParam::MagFilter(MagFilter::Nearest));
    gl.bind_texture(TextureHandle::NONE);
    handle
}

fn apply_wrap(gl: &mut dyn GlContext, wrap_s: TexWrapMode, wrap_t: TexWrapMode) {
    gl.tex_parameter(TexParam::WrapS(wrap_s));
    gl.tex_parameter(TexParam::WrapT(wrap_t));
}

impl FixedPipeline {
    fn is_shadow_unit(dev: &DeviceState, unit: usize) -> bool {
        matches!(UnitRole::of_logical(unit), Some(UnitRole::Shadow))
            || (dev.units.quality_shadows() && UnitRole::of_logical(unit) == Some(UnitRole::ShadowCompose))
    }

    /// Re-issues positions of enabled lights under the current view matrix.
    fn position_lights(&self, dev: &mut DeviceState) {
        let view = *dev.transforms.view();
        dev.gl.load_matrix(MatrixMode::ModelView, &view);
        for (index, light) in dev.lights.iter().enumerate() {
            if !dev.lights_enabled[index] {
                continue;
            }
            let d = light.direction;
            dev.gl.light_position(index as u32, light.homogeneous_position(), [-d.x, -d.y, -d.z]);
        }
        let modelview = *dev.transforms.modelview();
        dev.gl.load_matrix(MatrixMode::ModelView, &modelview);
    }

    fn enable_shadows(&mut self, dev: &mut DeviceState) {
        if self.shadows {
            return;
        }
        let shadow_unit = dev.units.physical(UnitRole::Shadow);
        let shadow_matrix = *dev.transforms.shadow();
        let gl = dev.gl.as_mut();

        gl.active_texture(shadow_unit);
        gl.set_enabled(Capability::Texture2D, true);
        gl.load_matrix(MatrixMode::Texture, &shadow_matrix);
        gl.set_enabled(Capability::TexGen, true);
        gl.tex_gen_eye_linear();

        if !dev.units.quality_shadows() {
            gl.tex_env(TexEnv::Mode(TexEnvMode::Modulate));
            self.shadows = true;
            return;
        }

        // shadow stage: rgb = (1 - shadow) * shadow color, alpha passes through
        gl.tex_env(TexEnv::Mode(TexEnvMode::Combine));
        gl.tex_env(TexEnv::Color(Color::gray(dev.shadow_color)));
        gl.tex_env(TexEnv::CombineRgb(CombineFunc::Modulate));
        gl.tex_env(TexEnv::SourceRgb(0, CombineSource::Texture));
        gl.tex_env(TexEnv::OperandRgb(0, CombineOperand::OneMinusSrcColor));
        gl.tex_env(TexEnv::SourceRgb(1, CombineSource::Constant));
        gl.tex_env(TexEnv::OperandRgb(1, CombineOperand::SrcColor));
        gl.tex_env(TexEnv::CombineAlpha(CombineFunc::Replace));
        gl.tex_env(TexEnv::SourceAlpha(0, CombineSource::Previous));
        gl.tex_env(TexEnv::OperandAlpha(0, CombineOperand::SrcAlpha));
        apply_wrap(gl, TexWrapMode::ClampToBorder, TexWrapMode::ClampToBorder);

        // compose stage: rgb = (1 - previous) * primary color
        gl.active_texture(dev.units.physical(UnitRole::ShadowCompose));
        gl.set_enabled(Capability::Texture2D, true);
        gl.bind_texture(self.white);
        gl.tex_env(TexEnv::Mode(TexEnvMode::Combine));
        gl.tex_env(TexEnv::CombineRgb(CombineFunc::Modulate));
        gl.tex_env(TexEnv::SourceRgb(0, CombineSource::Previous));
        gl.tex_env(TexEnv::OperandRgb(0, CombineOperand::OneMinusSrcColor));
        gl.tex_env(TexEnv::SourceRgb(1, CombineSource::PrimaryColor));
        gl.tex_env(TexEnv::OperandRgb(1, CombineOperand::SrcColor));
        gl.tex_env(TexEnv::CombineAlpha(CombineFunc::Replace));
        gl.tex_env(TexEnv::SourceAlpha(0, CombineSource::PrimaryColor));
        gl.tex_env(TexEnv::OperandAlpha(0, CombineOperand::SrcAlpha));

        self.shadows = true;
    }

    fn disable_shadows(&mut self, dev: &mut DeviceState) {
        if !self.shadows {
            return;
        }
        let shadow_unit = dev.units.physical(UnitRole::Shadow);
        let gl = dev.gl.as_mut();
        gl.active_texture(shadow_unit);
        gl.set_enabled(Capability::Texture2D, false);
        gl.bind_texture(TextureHandle::NONE);
        gl.set_enabled(Capability::TexGen, false);

        if dev.units.quality_shadows() {
            gl.active_texture(dev.units.physical(UnitRole::ShadowCompose));
            gl.set_enabled(Capability::Texture2D, false);
        }

        let shadow_slot = 2;
        if shadow_slot < dev.bindings.len() {
            dev.bindings.bind(shadow_slot, crate::types::Texture::invalid());
        }
        self.shadows = false;
    }
}

impl Pipeline for FixedPipeline {
    const KIND: BackendKind = BackendKind::FixedFunction;
    const NAME: &'static str = "gl14";
    const MIN_VERSION: GlVersion = GlVersion::new(1, 1);
    const MIPMAP_PATH: MipmapPath = MipmapPath::AutoParameter;

    fn unit_map(caps: &Capabilities) -> UnitMap {
        UnitMap::new(caps.max_textures >= QUALITY_SHADOW_UNITS)
    }

    fn static_storage(caps: &Capabilities) -> StaticStorage {
        match caps.vertex_buffers {
            BufferSupport::None => StaticStorage::DisplayList,
            _ => StaticStorage::Buffer,
        }
    }

    fn create(gl: &mut dyn GlContext, caps: &Capabilities, _shaders: &DeviceShaders) -> DeviceResult<Self> {
        let white = if caps.max_textures >= QUALITY_SHADOW_UNITS {
            log::debug!("using quality shadows");
            create_white_texture(gl)
        } else {
            log::debug!("using simple shadows");
            TextureHandle::NONE
        };
        Ok(Self { white, shadows: false })
    }

    fn init(&mut self, dev: &mut DeviceState) {
        dev.alpha_func.1 = 0.1;
        self.apply_alpha_func(dev);
        dev.gl.shade_model(dev.shade_model);
        dev.gl.light_model_ambient(dev.global_ambient);

        for unit in 0..dev.bindings.len() {
            let physical = dev.physical(unit);
            let params = dev.bindings.get(unit).params;
            dev.gl.active_texture(physical);
            combine::apply_stage(dev.gl.as_mut(), &params, dev.units);
        }

        self.upload_transforms(dev);
    }

    fn destroy(&mut self, dev: &mut DeviceState) {
        if !self.white.is_none() {
            dev.gl.delete_texture(self.white);
            self.white = TextureHandle::NONE;
        }
    }

    fn upload_transforms(&mut self, dev: &mut DeviceState) {
        let projection = *dev.transforms.projection();
        let modelview = *dev.transforms.modelview();
        dev.gl.load_matrix(MatrixMode::Projection, &projection);
        dev.gl.load_matrix(MatrixMode::ModelView, &modelview);
    }

    fn transform_changed(&mut self, dev: &mut DeviceState, kind: TransformType) {
        match kind {
            TransformType::World => {
                let modelview = *dev.transforms.modelview();
                dev.gl.load_matrix(MatrixMode::ModelView, &modelview);
            }
            TransformType::View => self.position_lights(dev),
            TransformType::Projection => {
                let projection = *dev.transforms.projection();
                dev.gl.load_matrix(MatrixMode::Projection, &projection);
            }
            TransformType::Shadow => {
                let shadow = *dev.transforms.shadow();
                let unit = dev.units.physical(UnitRole::Shadow);
                dev.gl.active_texture(unit);
                dev.gl.load_matrix(MatrixMode::Texture, &shadow);
            }
        }
    }

    fn apply_material(&mut self, dev: &mut DeviceState) {
        let material = dev.material;
        dev.gl.material(&material);
    }

    fn apply_light(&mut self, dev: &mut DeviceState, index: usize) {
        let light = dev.lights[index];
        let spot_cutoff = match light.ty {
            LightType::Spot => light.spot_angle.to_degrees(),
            _ => 180.0,
        };
        dev.gl.light(
            index as u32,
            &FixedLight {
                ambient: light.ambient,
                diffuse: light.diffuse,
                specular: light.specular,
                attenuation: [light.attenuation0, light.attenuation1, light.attenuation2],
                spot_cutoff,
                spot_exponent: light.spot_intensity,
            },
        );

        let view = *dev.transforms.view();
        let modelview = *dev.transforms.modelview();
        let d = light.direction;
        dev.gl.load_matrix(MatrixMode::ModelView, &view);
        dev.gl.light_position(index as u32, light.homogeneous_position(), [-d.x, -d.y, -d.z]);
        dev.gl.load_matrix(MatrixMode::ModelView, &modelview);
    }

    fn apply_light_enabled(&mut self, dev: &mut DeviceState, index: usize) {
        let enabled = dev.lights_enabled[index];
        dev.gl.set_enabled(Capability::Light(index as u32), enabled);
    }

    fn apply_render_state(&mut self, dev: &mut DeviceState, state: RenderState) {
        let enabled = dev.render_state(state);
        match state {
            RenderState::Lighting => {
                dev.gl.set_enabled(Capability::Lighting, enabled);
                if enabled {
                    self.position_lights(dev);
                }
            }
            RenderState::Fog => dev.gl.set_enabled(Capability::Fog, enabled),
            RenderState::AlphaTest => dev.gl.set_enabled(Capability::AlphaTest, enabled),
            RenderState::ShadowMapping if enabled => self.enable_shadows(dev),
            RenderState::ShadowMapping => self.disable_shadows(dev),
            _ => {}
        }
    }

    fn bind_texture(&mut self, dev: &mut DeviceState, unit: usize) {
        let slot = *dev.bindings.get(unit);
        let physical = dev.physical(unit);
        dev.gl.active_texture(physical);
        dev.gl.bind_texture(slot.texture.handle);

        if slot.texture.is_valid() {
            apply_wrap(dev.gl.as_mut(), slot.params.wrap_s, slot.params.wrap_t);
        }
        if !(self.shadows && Self::is_shadow_unit(dev, unit)) {
            dev.gl.set_enabled(Capability::Texture2D, slot.enabled && slot.texture.is_valid());
        }
    }

    fn apply_texture_enabled(&mut self, dev: &mut DeviceState, unit: usize) {
        if self.shadows && Self::is_shadow_unit(dev, unit) {
            return;
        }
        let slot = *dev.bindings.get(unit);
        let physical = dev.physical(unit);
        dev.gl.active_texture(physical);
        dev.gl.set_enabled(Capability::Texture2D, slot.enabled && slot.texture.is_valid());
    }

    fn apply_stage_params(&mut self, dev: &mut DeviceState, unit: usize) {
        let slot = *dev.bindings.get(unit);
        let physical = dev.physical(unit);
        dev.gl.active_texture(physical);
        combine::apply_stage(dev.gl.as_mut(), &slot.params, dev.units);
        if slot.texture.is_valid() {
            apply_wrap(dev.gl.as_mut(), slot.params.wrap_s, slot.params.wrap_t);
        }
    }

    fn apply_alpha_func(&mut self, dev: &mut DeviceState) {
        let (func, reference) = dev.alpha_func;
        dev.gl.alpha_func(func, reference);
    }

    fn apply_fog(&mut self, dev: &mut DeviceState) {
        let fog = dev.fog;
        dev.gl.fog(&fog);
    }

    fn apply_global_ambient(&mut self, dev: &mut DeviceState) {
        dev.gl.light_model_ambient(dev.global_ambient);
    }

    fn apply_shade_model(&mut self, dev: &mut DeviceState) {
        dev.gl.shade_model(dev.shade_model);
    }

    fn apply_shadow_color(&mut self, dev: &mut DeviceState) {
        if !(self.shadows && dev.units.quality_shadows()) {
            return;
        }
        let unit = dev.units.physical(UnitRole::Shadow);
        dev.gl.active_texture(unit);
        dev.gl.tex_env(TexEnv::Color(Color::gray(dev.shadow_color)));
    }

    fn draw(
        &mut self,
        dev: &mut DeviceState,
        primitive: PrimitiveType,
        data: &[u8],
        format: &VertexFormat,
        ranges: DrawRanges<'_>,
    ) {
        let arrays = ClientArrays {
            data: ArrayData::Client(data),
            format,
            tex_units: [dev.physical(0), dev.physical(1)],
        };
        dev.gl.draw_client_arrays(primitive, &arrays, ranges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CallLog, HeadlessConfig, HeadlessContext};
    use crate::device::backends::FixedFunctionDevice;
    use crate::device::{Device, DeviceConfig, RenderSettings};
    use crate::math::Mat4;
    use crate::types::{ImageData, Light, Texture, TextureCreateParams, Vertex, Vertices};

    fn device(config: HeadlessConfig) -> (FixedFunctionDevice, CallLog) {
        let gl = HeadlessContext::new(config);
        let log = gl.log();
        let dev = FixedFunctionDevice::new(
            Box::new(gl),
            &DeviceConfig::default(),
            &RenderSettings::default(),
            &DeviceShaders::default(),
        )
        .expect("fixed device");
        (dev, log)
    }

    fn gl14() -> HeadlessConfig {
        HeadlessConfig::with_version(1, 4)
    }

    fn texture(dev: &mut FixedFunctionDevice) -> Texture {
        let px = [200u8; 16];
        dev.create_texture(&ImageData::rgba(&px, 2, 2), &TextureCreateParams::default())
    }

    // ── shadows ───────────────────────────────────────────────────────────

    #[test]
    fn quality_shadows_program_both_reserved_units() {
        let (mut dev, log) = device(gl14());
        assert!(dev.state().units.quality_shadows());
        assert_eq!(log.live_textures(), 1);

        dev.set_render_state(RenderState::ShadowMapping, true);
        assert!(dev.render_state(RenderState::ShadowMapping));
        assert!(log.is_enabled(Capability::TexGen));
        assert_eq!(log.count("tex_gen_eye_linear"), 1);
        // compose unit samples the white texture
        assert!(!log.bound_texture(1).is_none());

        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.count("tex_gen_eye_linear"), 1);

        dev.set_render_state(RenderState::ShadowMapping, false);
        assert!(!log.is_enabled(Capability::TexGen));
        assert!(log.bound_texture(0).is_none());
    }

    #[test]
    fn three_units_fall_back_to_simple_shadows() {
        let (mut dev, log) = device(HeadlessConfig { max_texture_units: 3, ..gl14() });
        assert!(!dev.state().units.quality_shadows());
        assert_eq!(log.live_textures(), 0);

        log.reset();
        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.count("tex_gen_eye_linear"), 1);
        // a single modulate, no combiner sources
        assert_eq!(log.count("tex_env"), 1);
    }

    #[test]
    fn shadow_mapping_without_support_is_ignored() {
        let (mut dev, log) = device(HeadlessConfig::with_version(1, 3));
        assert!(!dev.is_shadow_mapping_supported());
        dev.set_render_state(RenderState::ShadowMapping, true);
        assert!(!dev.render_state(RenderState::ShadowMapping));
        assert_eq!(log.count("tex_gen_eye_linear"), 0);
        assert!(!dev.create_depth_texture(256, 256, 24).is_valid());
    }

    #[test]
    fn shadow_color_only_touches_active_quality_shadows() {
        let (mut dev, log) = device(gl14());
        log.reset();
        dev.set_shadow_color(0.3);
        assert_eq!(log.count("tex_env"), 0);

        dev.set_render_state(RenderState::ShadowMapping, true);
        log.reset();
        dev.set_shadow_color(0.3);
        assert_eq!(log.count("tex_env"), 1);
    }

    // ── units ─────────────────────────────────────────────────────────────

    #[test]
    fn quality_mode_remaps_primary_unit() {
        let (mut dev, log) = device(gl14());
        let t = texture(&mut dev);
        dev.set_texture(0, &t);
        assert_eq!(log.bound_texture(2), t.handle);
        dev.set_texture(1, &t);
        assert_eq!(log.bound_texture(3), t.handle);
    }

    #[test]
    fn remembered_wrap_follows_the_next_bound_texture() {
        let (mut dev, log) = device(gl14());
        let t = texture(&mut dev);
        dev.set_texture(0, &t);
        assert_eq!(log.wrap(2), (Some(TexWrapMode::Repeat), Some(TexWrapMode::Repeat)));
        dev.set_texture(0, &Texture::invalid());

        log.reset();
        dev.set_texture_stage_wrap(0, TexWrapMode::Clamp, TexWrapMode::Clamp);
        assert_eq!(log.count("tex_parameter"), 0);

        dev.set_texture(0, &t);
        assert_eq!(log.bound_texture(2), t.handle);
        assert_eq!(log.wrap(2), (Some(TexWrapMode::Clamp), Some(TexWrapMode::Clamp)));
    }

    #[test]
    fn enabling_a_unit_without_texture_keeps_texturing_off() {
        let (mut dev, log) = device(HeadlessConfig { max_texture_units: 2, ..gl14() });
        dev.set_texture_enabled(0, true);
        assert!(!log.is_enabled(Capability::Texture2D));
        let t = texture(&mut dev);
        dev.set_texture(0, &t);
        assert!(log.is_enabled(Capability::Texture2D));
    }

    // ── lights ────────────────────────────────────────────────────────────

    #[test]
    fn view_change_repositions_enabled_lights() {
        let (mut dev, log) = device(gl14());
        dev.set_light(0, &Light::default());
        dev.set_light_enabled(0, true);
        assert!(log.is_enabled(Capability::Light(0)));

        log.reset();
        dev.set_transform(TransformType::View, &Mat4::IDENTITY);
        assert_eq!(log.count("light_position"), 1);
        assert_eq!(log.count("load_matrix"), 2);
    }

    #[test]
    fn world_change_reloads_modelview_only() {
        let (mut dev, log) = device(gl14());
        log.reset();
        dev.set_transform(TransformType::World, &Mat4::IDENTITY);
        assert_eq!(log.count("load_matrix"), 1);
        assert_eq!(log.count("light_position"), 0);
    }

    // ── drawing ───────────────────────────────────────────────────────────

    #[test]
    fn static_buffers_use_display_lists_without_vbo() {
        let (mut dev, log) = device(HeadlessConfig::with_version(1, 3));
        let mesh = [Vertex::default(); 6];
        let id = dev.create_static_buffer(PrimitiveType::Triangles, Vertices::from(&mesh[..]));
        assert!(matches!(id, crate::device::StaticBufferId::DisplayList(_)));
        assert_eq!(log.live_lists(), 1);
        assert!(dev.draw_static_buffer(id));
        assert_eq!(log.count("call_list"), 1);
    }

    #[test]
    fn multi_draw_is_batched_when_available() {
        let mesh = [Vertex::default(); 9];
        let first = [0, 3, 6];
        let count = [3, 3, 3];

        let (mut dev, log) = device(gl14());
        dev.draw_primitives(PrimitiveType::Triangles, Vertices::from(&mesh[..]), &first, &count, Color::WHITE);
        assert_eq!(log.count("draw_client_arrays"), 1);

        let (mut dev, log) = device(HeadlessConfig::with_version(1, 3));
        dev.draw_primitives(PrimitiveType::Triangles, Vertices::from(&mesh[..]), &first, &count, Color::WHITE);
        assert_eq!(log.count("draw_client_arrays"), 3);
    }

    #[test]
    #[should_panic]
    fn mismatched_range_arrays_panic() {
        let (mut dev, _log) = device(gl14());
        let mesh = [Vertex::default(); 3];
        dev.draw_primitives(PrimitiveType::Triangles, Vertices::from(&mesh[..]), &[0, 1], &[3], Color::WHITE);
    }

    #[test]
    fn destroy_frees_white_texture() {
        let (mut dev, log) = device(gl14());
        dev.destroy();
        assert_eq!(log.live_textures(), 0);
    }
}
