//! Programmable pipeline for 2.1-generation hardware.
//!
//! One program serves every draw. Lights and material still live in the
//! driver's fixed state, which the program reads; matrices, per-unit texture
//! enables and the fixed-function toggles become uniforms. Vertices come from
//! client memory, as on the fixed-function path.

use crate::context::{
    ArrayData, ClientArrays, DrawRanges, FixedLight, GlContext, GlVersion, MatrixMode,
    TexParam, UniformValue,
};
use crate::math::{self, Mat4};
use crate::types::{LightType, PrimitiveType, RenderState, TransformType, VertexFormat};

use super::{DeviceState, Pipeline};
use crate::device::buffers::StaticStorage;
use crate::device::caps::Capabilities;
use crate::device::error::{DeviceError, DeviceResult};
use crate::device::init::DeviceShaders;
use crate::device::shader::ShaderProgram;
use crate::device::textures::MipmapPath;
use crate::device::units::UnitMap;
use crate::device::BackendKind;

/// Logical units the program samples.
pub(super) const SAMPLED_UNITS: usize = 3;
const SHADOW_UNIT: usize = 2;

/// Inverse-transpose of the world matrix, uploaded transposed; identity when
/// the world matrix is singular.
pub(super) fn normal_matrix(world: &Mat4) -> Mat4 {
    math::inverse(world).unwrap_or(Mat4::IDENTITY)
}

/// Uploads the four scene matrices plus the normal matrix.
pub(super) fn upload_matrices(program: &mut ShaderProgram, dev: &mut DeviceState) {
    let t = &dev.transforms;
    let (world, view, projection, shadow) = (*t.world(), *t.view(), *t.projection(), *t.shadow());
    let gl = dev.gl.as_mut();
    set_matrix(program, gl, "uni_ProjectionMatrix", &projection);
    set_matrix(program, gl, "uni_ViewMatrix", &view);
    set_matrix(program, gl, "uni_ShadowMatrix", &shadow);
    set_world(program, gl, &world);
}

pub(super) fn set_matrix(program: &mut ShaderProgram, gl: &mut dyn GlContext, name: &str, m: &Mat4) {
    program.set(gl, name, UniformValue::Mat4 { transpose: false, value: *m });
}

pub(super) fn set_world(program: &mut ShaderProgram, gl: &mut dyn GlContext, world: &Mat4) {
    set_matrix(program, gl, "uni_ModelMatrix", world);
    program.set(gl, "uni_NormalMatrix", UniformValue::Mat4 { transpose: true, value: normal_matrix(world) });
}

pub(super) fn set_transform(program: &mut ShaderProgram, dev: &mut DeviceState, kind: TransformType) {
    let t = &dev.transforms;
    match kind {
        TransformType::World => {
            let world = *t.world();
            set_world(program, dev.gl.as_mut(), &world);
        }
        TransformType::View => {
            let view = *t.view();
            set_matrix(program, dev.gl.as_mut(), "uni_ViewMatrix", &view);
        }
        TransformType::Projection => {
            let projection = *t.projection();
            set_matrix(program, dev.gl.as_mut(), "uni_ProjectionMatrix", &projection);
        }
        TransformType::Shadow => {
            let shadow = *t.shadow();
            set_matrix(program, dev.gl.as_mut(), "uni_ShadowMatrix", &shadow);
        }
    }
}

pub(super) fn apply_fog_uniforms(program: &mut ShaderProgram, dev: &mut DeviceState) {
    let fog = dev.fog;
    let gl = dev.gl.as_mut();
    program.set(gl, "uni_FogRange", UniformValue::Vec2([fog.start, fog.end]));
    program.set(gl, "uni_FogColor", UniformValue::Vec4(fog.color.to_array()));
}

/// Uniforms every program of this generation declares.
const UNIFORMS: &[&str] = &[
    "uni_ProjectionMatrix",
    "uni_ViewMatrix",
    "uni_ModelMatrix",
    "uni_NormalMatrix",
    "uni_ShadowMatrix",
    "uni_PrimaryTexture",
    "uni_SecondaryTexture",
    "uni_ShadowTexture",
    "uni_LightingEnabled",
    "uni_FogEnabled",
    "uni_FogRange",
    "uni_FogColor",
    "uni_AlphaTestEnabled",
    "uni_AlphaReference",
    "uni_ShadowColor",
];

#[derive(Debug)]
pub struct ShaderPipeline {
    program: ShaderProgram,
}

impl ShaderPipeline {
    fn texture_flag(dev: &DeviceState, unit: usize) -> bool {
        if unit >= dev.bindings.len() {
            return false;
        }
        let slot = dev.bindings.get(unit);
        (slot.enabled && slot.texture.is_valid())
            || (unit == SHADOW_UNIT && dev.render_state(RenderState::ShadowMapping))
    }

    fn update_texture_flag(&mut self, dev: &mut DeviceState, unit: usize) {
        if unit >= SAMPLED_UNITS {
            return;
        }
        let on = Self::texture_flag(dev, unit);
        self.program.set_bool(dev.gl.as_mut(), &format!("uni_TextureEnabled[{unit}]"), on);
    }

    /// Light positions are given in world space; the program applies the
    /// view transform itself.
    fn position_light(dev: &mut DeviceState, index: usize) {
        let light = dev.lights[index];
        let d = light.direction;
        dev.gl.light_position(index as u32, light.homogeneous_position(), [-d.x, -d.y, -d.z]);
    }

    fn position_lights(dev: &mut DeviceState) {
        dev.gl.load_matrix(MatrixMode::ModelView, &Mat4::IDENTITY);
        for index in 0..dev.lights.len() {
            if dev.lights_enabled[index] {
                Self::position_light(dev, index);
            }
        }
    }
}

impl Pipeline for ShaderPipeline {
    const KIND: BackendKind = BackendKind::Shader;
    const NAME: &'static str = "gl21";
    const MIN_VERSION: GlVersion = GlVersion::new(2, 1);
    const MIPMAP_PATH: MipmapPath = MipmapPath::Generate;

    fn unit_map(_caps: &Capabilities) -> UnitMap {
        UnitMap::new(false)
    }

    fn static_storage(_caps: &Capabilities) -> StaticStorage {
        StaticStorage::Buffer
    }

    fn create(gl: &mut dyn GlContext, _caps: &Capabilities, shaders: &DeviceShaders) -> DeviceResult<Self> {
        let sources = shaders
            .shader
            .as_ref()
            .ok_or(DeviceError::MissingShaderSources { backend: Self::NAME })?;
        let mut program = ShaderProgram::build(gl, sources)?;
        gl.use_program(program.handle());
        program.resolve(gl, UNIFORMS);
        Ok(Self { program })
    }

    fn init(&mut self, dev: &mut DeviceState) {
        dev.alpha_func.1 = 0.5;
        let lights = dev.lights.len();
        {
            let gl = dev.gl.as_mut();
            let p = &mut self.program;
            p.set_int(gl, "uni_PrimaryTexture", 0);
            p.set_int(gl, "uni_SecondaryTexture", 1);
            p.set_int(gl, "uni_ShadowTexture", 2);
            p.set_bool(gl, "uni_LightingEnabled", false);
            p.set_bool(gl, "uni_FogEnabled", false);
            p.set_bool(gl, "uni_AlphaTestEnabled", false);
            for unit in 0..SAMPLED_UNITS {
                p.set_bool(gl, &format!("uni_TextureEnabled[{unit}]"), false);
            }
            for index in 0..lights {
                p.set_bool(gl, &format!("uni_LightEnabled[{index}]"), false);
            }
        }
        self.apply_alpha_func(dev);
        self.apply_fog(dev);
        self.apply_shadow_color(dev);
        self.apply_shade_model(dev);
        self.apply_global_ambient(dev);
        self.upload_transforms(dev);
    }

    fn destroy(&mut self, dev: &mut DeviceState) {
        dev.gl.use_program(crate::context::ProgramHandle::NONE);
        self.program.destroy(dev.gl.as_mut());
    }

    fn upload_transforms(&mut self, dev: &mut DeviceState) {
        upload_matrices(&mut self.program, dev);
    }

    fn transform_changed(&mut self, dev: &mut DeviceState, kind: TransformType) {
        set_transform(&mut self.program, dev, kind);
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
        dev.gl.load_matrix(MatrixMode::ModelView, &Mat4::IDENTITY);
        Self::position_light(dev, index);
    }

    fn apply_light_enabled(&mut self, dev: &mut DeviceState, index: usize) {
        let enabled = dev.lights_enabled[index];
        self.program.set_bool(dev.gl.as_mut(), &format!("uni_LightEnabled[{index}]"), enabled);
    }

    fn apply_render_state(&mut self, dev: &mut DeviceState, state: RenderState) {
        let enabled = dev.render_state(state);
        match state {
            RenderState::Lighting => {
                if enabled {
                    Self::position_lights(dev);
                }
                self.program.set_bool(dev.gl.as_mut(), "uni_LightingEnabled", enabled);
            }
            RenderState::Fog => self.program.set_bool(dev.gl.as_mut(), "uni_FogEnabled", enabled),
            RenderState::AlphaTest => {
                self.program.set_bool(dev.gl.as_mut(), "uni_AlphaTestEnabled", enabled)
            }
            RenderState::ShadowMapping => {
                self.update_texture_flag(dev, SHADOW_UNIT);
                set_transform(&mut self.program, dev, TransformType::Shadow);
            }
            _ => {}
        }
    }

    fn bind_texture(&mut self, dev: &mut DeviceState, unit: usize) {
        let slot = *dev.bindings.get(unit);
        let physical = dev.physical(unit);
        dev.gl.active_texture(physical);
        dev.gl.bind_texture(slot.texture.handle);
        if slot.texture.is_valid() {
            dev.gl.tex_parameter(TexParam::WrapS(slot.params.wrap_s));
            dev.gl.tex_parameter(TexParam::WrapT(slot.params.wrap_t));
        }
        self.update_texture_flag(dev, unit);
    }

    fn apply_texture_enabled(&mut self, dev: &mut DeviceState, unit: usize) {
        self.update_texture_flag(dev, unit);
    }

    /// Combiner settings have no meaning here; only addressing is applied.
    fn apply_stage_params(&mut self, dev: &mut DeviceState, unit: usize) {
        let slot = *dev.bindings.get(unit);
        if !slot.texture.is_valid() {
            return;
        }
        let physical = dev.physical(unit);
        dev.gl.active_texture(physical);
        dev.gl.tex_parameter(TexParam::WrapS(slot.params.wrap_s));
        dev.gl.tex_parameter(TexParam::WrapT(slot.params.wrap_t));
    }

    fn apply_alpha_func(&mut self, dev: &mut DeviceState) {
        let reference = dev.alpha_func.1;
        self.program.set_float(dev.gl.as_mut(), "uni_AlphaReference", reference);
    }

    fn apply_fog(&mut self, dev: &mut DeviceState) {
        apply_fog_uniforms(&mut self.program, dev);
    }

    fn apply_global_ambient(&mut self, dev: &mut DeviceState) {
        dev.gl.light_model_ambient(dev.global_ambient);
    }

    fn apply_shade_model(&mut self, dev: &mut DeviceState) {
        dev.gl.shade_model(dev.shade_model);
    }

    fn apply_shadow_color(&mut self, dev: &mut DeviceState) {
        let value = dev.shadow_color;
        self.program.set_float(dev.gl.as_mut(), "uni_ShadowColor", value);
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
    use crate::device::backends::ShaderDevice;
    use crate::device::{Device, DeviceConfig, RenderSettings, ShaderSources};
    use crate::math::Vec3;
    use crate::types::{FogParams, Light};

    fn shaders() -> DeviceShaders {
        DeviceShaders {
            shader: Some(ShaderSources::new("void main() {}", "void main() {}")),
            ..DeviceShaders::default()
        }
    }

    fn try_device(config: HeadlessConfig, shaders: &DeviceShaders) -> (DeviceResult<ShaderDevice>, CallLog) {
        let gl = HeadlessContext::new(config);
        let log = gl.log();
        let dev = ShaderDevice::new(Box::new(gl), &DeviceConfig::default(), &RenderSettings::default(), shaders);
        (dev, log)
    }

    fn device() -> (ShaderDevice, CallLog) {
        let (dev, log) = try_device(HeadlessConfig::with_version(2, 1), &shaders());
        (dev.expect("gl21 device"), log)
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn missing_sources_fail_and_return_context() {
        let gl = HeadlessContext::new(HeadlessConfig::with_version(2, 1));
        let failure = ShaderDevice::try_new(
            Box::new(gl),
            &DeviceConfig::default(),
            &RenderSettings::default(),
            &DeviceShaders::default(),
        )
        .err()
        .expect("creation fails");
        assert!(matches!(failure.error, DeviceError::MissingShaderSources { backend: "gl21" }));
        let mut context = failure.context;
        assert_eq!(context.version(), GlVersion::new(2, 1));
    }

    #[test]
    fn old_context_is_rejected() {
        let (dev, log) = try_device(HeadlessConfig::with_version(2, 0), &shaders());
        assert!(matches!(dev, Err(DeviceError::UnsupportedVersion { .. })));
        assert_eq!(log.count("create_program"), 0);
    }

    #[test]
    fn compile_error_leaves_nothing_allocated() {
        let config = HeadlessConfig { fail_shader_compile: true, ..HeadlessConfig::with_version(2, 1) };
        let (dev, log) = try_device(config, &shaders());
        assert!(matches!(dev, Err(DeviceError::ShaderCompile { .. })));
        assert_eq!(log.live_programs(), 0);
    }

    #[test]
    fn samplers_are_bound_to_fixed_units() {
        let (_dev, log) = device();
        assert_eq!(log.uniform("uni_PrimaryTexture"), Some(UniformValue::Int(0)));
        assert_eq!(log.uniform("uni_SecondaryTexture"), Some(UniformValue::Int(1)));
        assert_eq!(log.uniform("uni_ShadowTexture"), Some(UniformValue::Int(2)));
        assert_eq!(log.uniform("uni_AlphaReference"), Some(UniformValue::Float(0.5)));
    }

    // ── state ─────────────────────────────────────────────────────────────

    #[test]
    fn lighting_toggles_uniform_and_places_lights() {
        let (mut dev, log) = device();
        dev.set_light(0, &Light::default());
        dev.set_light_enabled(0, true);
        assert_eq!(log.uniform("uni_LightEnabled[0]"), Some(UniformValue::Int(1)));

        log.reset();
        dev.set_render_state(RenderState::Lighting, true);
        assert_eq!(log.uniform("uni_LightingEnabled"), Some(UniformValue::Int(1)));
        assert_eq!(log.count("light_position"), 1);
    }

    #[test]
    fn shadow_mapping_enables_shadow_sampler() {
        let (mut dev, log) = device();
        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.uniform("uni_TextureEnabled[2]"), Some(UniformValue::Int(1)));
        dev.set_render_state(RenderState::ShadowMapping, false);
        assert_eq!(log.uniform("uni_TextureEnabled[2]"), Some(UniformValue::Int(0)));
    }

    #[test]
    fn texture_units_come_from_image_unit_limit() {
        let config = HeadlessConfig {
            max_texture_units: 2,
            max_texture_image_units: 16,
            ..HeadlessConfig::with_version(2, 1)
        };
        let (dev, log) = try_device(config, &shaders());
        let mut dev = dev.expect("gl21 device");
        assert_eq!(dev.max_textures(), 16);

        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.uniform("uni_TextureEnabled[2]"), Some(UniformValue::Int(1)));
    }

    #[test]
    fn shadow_flag_is_off_when_the_unit_does_not_exist() {
        let config = HeadlessConfig {
            max_texture_image_units: 2,
            ..HeadlessConfig::with_version(2, 1)
        };
        let (dev, log) = try_device(config, &shaders());
        let mut dev = dev.expect("gl21 device");
        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.uniform("uni_TextureEnabled[2]"), Some(UniformValue::Int(0)));
    }

    #[test]
    fn fog_range_is_uploaded() {
        let (mut dev, log) = device();
        dev.set_fog_params(&FogParams { start: 10.0, end: 50.0, ..FogParams::default() });
        assert_eq!(log.uniform("uni_FogRange"), Some(UniformValue::Vec2([10.0, 50.0])));
    }

    #[test]
    fn singular_world_gets_identity_normal_matrix() {
        let (mut dev, log) = device();
        dev.set_transform(TransformType::World, &Mat4::scale(Vec3::new(0.0, 1.0, 1.0)));
        assert_eq!(
            log.uniform("uni_NormalMatrix"),
            Some(UniformValue::Mat4 { transpose: true, value: Mat4::IDENTITY })
        );

        let scaled = Mat4::scale(Vec3::splat(2.0));
        dev.set_transform(TransformType::World, &scaled);
        let expected = math::inverse(&scaled).expect("invertible");
        assert_eq!(
            log.uniform("uni_NormalMatrix"),
            Some(UniformValue::Mat4 { transpose: true, value: expected })
        );
    }

    #[test]
    fn destroy_releases_program() {
        let (mut dev, log) = device();
        dev.destroy();
        assert_eq!(log.live_programs(), 0);
        assert!(log.current_program().is_none());
    }
}
