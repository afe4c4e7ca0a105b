//! Core-profile pipeline for 3.3-generation hardware.
//!
//! No fixed state is left: lights, material and every toggle are uniforms.
//! Immediate draws stream their vertices through one shared [`DynamicBuffer`]
//! and a dedicated vertex array; static buffers own a vertex array each.

use crate::context::{
    DrawRanges, GlContext, GlVersion, ProgramHandle, TexParam, UniformValue, VertexArrayHandle,
};
use crate::types::{PrimitiveType, RenderState, ShadeModel, TransformType, VertexFormat};

use super::shader::{apply_fog_uniforms, set_transform, upload_matrices};
use super::{DeviceState, Pipeline};
use crate::device::buffers::{configure_attributes, StaticStorage};
use crate::device::caps::Capabilities;
use crate::device::error::{DeviceError, DeviceResult};
use crate::device::init::DeviceShaders;
use crate::device::shader::ShaderProgram;
use crate::device::streaming::DynamicBuffer;
use crate::device::textures::MipmapPath;
use crate::device::units::UnitMap;
use crate::device::BackendKind;

const TEXTURE_ENABLE_UNIFORMS: [&str; 3] = [
    "uni_PrimaryTextureEnabled",
    "uni_SecondaryTextureEnabled",
    "uni_ShadowTextureEnabled",
];
const SHADOW_UNIT: usize = 2;

const UNIFORMS: &[&str] = &[
    "uni_ProjectionMatrix",
    "uni_ViewMatrix",
    "uni_ModelMatrix",
    "uni_NormalMatrix",
    "uni_ShadowMatrix",
    "uni_PrimaryTexture",
    "uni_SecondaryTexture",
    "uni_ShadowTexture",
    "uni_PrimaryTextureEnabled",
    "uni_SecondaryTextureEnabled",
    "uni_ShadowTextureEnabled",
    "uni_AmbientColor",
    "uni_DiffuseColor",
    "uni_SpecularColor",
    "uni_SmoothShading",
    "uni_LightingEnabled",
    "uni_FogEnabled",
    "uni_FogRange",
    "uni_FogColor",
    "uni_AlphaTestEnabled",
    "uni_AlphaReference",
    "uni_ShadowColor",
];

fn light_uniform(index: usize, field: &str) -> String {
    format!("uni_Light[{index}].{field}")
}

/// Bytes a draw of `ranges` reads from the start of the vertex data.
fn used_bytes(format: &VertexFormat, ranges: &DrawRanges<'_>) -> usize {
    let end = match *ranges {
        DrawRanges::Single { first, count } => (first + count).max(0),
        DrawRanges::Multi { first, count } => {
            first.iter().zip(count).map(|(f, c)| (f + c).max(0)).max().unwrap_or(0)
        }
    };
    format.byte_len(end as usize)
}

#[derive(Debug)]
pub struct CorePipeline {
    program: ShaderProgram,
    vao: VertexArrayHandle,
    stream: DynamicBuffer,
}

impl CorePipeline {
    /// Streaming buffer backing immediate draws.
    pub fn stream(&self) -> &DynamicBuffer {
        &self.stream
    }

    fn update_texture_flag(&mut self, dev: &mut DeviceState, unit: usize) {
        let Some(name) = TEXTURE_ENABLE_UNIFORMS.get(unit) else {
            return;
        };
        if unit >= dev.bindings.len() {
            self.program.set_bool(dev.gl.as_mut(), name, false);
            return;
        }
        let slot = dev.bindings.get(unit);
        let on = (slot.enabled && slot.texture.is_valid())
            || (unit == SHADOW_UNIT && dev.render_state(RenderState::ShadowMapping));
        self.program.set_bool(dev.gl.as_mut(), name, on);
    }
}

impl Pipeline for CorePipeline {
    const KIND: BackendKind = BackendKind::Core;
    const NAME: &'static str = "gl33";
    const MIN_VERSION: GlVersion = GlVersion::new(3, 0);
    const MIPMAP_PATH: MipmapPath = MipmapPath::Generate;

    fn unit_map(_caps: &Capabilities) -> UnitMap {
        UnitMap::new(false)
    }

    fn static_storage(_caps: &Capabilities) -> StaticStorage {
        StaticStorage::VertexArray
    }

    fn create(gl: &mut dyn GlContext, caps: &Capabilities, shaders: &DeviceShaders) -> DeviceResult<Self> {
        if !caps.version.at_least(3, 3) {
            log::warn!("OpenGL {} is below 3.3, the core backend may misbehave", caps.version);
        }
        let sources = shaders
            .core
            .as_ref()
            .ok_or(DeviceError::MissingShaderSources { backend: Self::NAME })?;
        let mut program = ShaderProgram::build(gl, sources)?;
        gl.use_program(program.handle());
        program.resolve(gl, UNIFORMS);

        let vao = gl.gen_vertex_array();
        let stream = DynamicBuffer::new(gl, DynamicBuffer::DEFAULT_CAPACITY);
        Ok(Self { program, vao, stream })
    }

    fn init(&mut self, dev: &mut DeviceState) {
        dev.alpha_func.1 = 1.0;
        let lights = dev.lights.len();
        {
            let gl = dev.gl.as_mut();
            let p = &mut self.program;
            p.set_int(gl, "uni_PrimaryTexture", 0);
            p.set_int(gl, "uni_SecondaryTexture", 1);
            p.set_int(gl, "uni_ShadowTexture", 2);
            for name in TEXTURE_ENABLE_UNIFORMS {
                p.set_bool(gl, name, false);
            }
            p.set_bool(gl, "uni_LightingEnabled", false);
            p.set_bool(gl, "uni_FogEnabled", false);
            p.set_bool(gl, "uni_AlphaTestEnabled", false);
            for index in 0..lights {
                p.set_bool(gl, &light_uniform(index, "Enabled"), false);
            }
        }
        self.apply_material(dev);
        self.apply_alpha_func(dev);
        self.apply_fog(dev);
        self.apply_shadow_color(dev);
        self.apply_shade_model(dev);
        self.upload_transforms(dev);
    }

    fn destroy(&mut self, dev: &mut DeviceState) {
        let gl = dev.gl.as_mut();
        gl.bind_vertex_array(VertexArrayHandle::NONE);
        if !self.vao.is_none() {
            gl.delete_vertex_array(self.vao);
            self.vao = VertexArrayHandle::NONE;
        }
        self.stream.destroy(gl);
        gl.use_program(ProgramHandle::NONE);
        self.program.destroy(gl);
    }

    fn upload_transforms(&mut self, dev: &mut DeviceState) {
        upload_matrices(&mut self.program, dev);
    }

    fn transform_changed(&mut self, dev: &mut DeviceState, kind: TransformType) {
        set_transform(&mut self.program, dev, kind);
    }

    fn apply_material(&mut self, dev: &mut DeviceState) {
        let m = dev.material;
        let gl = dev.gl.as_mut();
        self.program.set(gl, "uni_AmbientColor", UniformValue::Vec4(m.ambient.to_array()));
        self.program.set(gl, "uni_DiffuseColor", UniformValue::Vec4(m.diffuse.to_array()));
        self.program.set(gl, "uni_SpecularColor", UniformValue::Vec4(m.specular.to_array()));
    }

    fn apply_light(&mut self, dev: &mut DeviceState, index: usize) {
        let light = dev.lights[index];
        let gl = dev.gl.as_mut();
        let p = &mut self.program;
        p.set(gl, &light_uniform(index, "Ambient"), UniformValue::Vec4(light.ambient.to_array()));
        p.set(gl, &light_uniform(index, "Diffuse"), UniformValue::Vec4(light.diffuse.to_array()));
        p.set(gl, &light_uniform(index, "Specular"), UniformValue::Vec4(light.specular.to_array()));
        p.set(
            gl,
            &light_uniform(index, "Attenuation"),
            UniformValue::Vec3([light.attenuation0, light.attenuation1, light.attenuation2]),
        );
        p.set(gl, &light_uniform(index, "Position"), UniformValue::Vec4(light.homogeneous_position()));
    }

    fn apply_light_enabled(&mut self, dev: &mut DeviceState, index: usize) {
        let enabled = dev.lights_enabled[index];
        self.program.set_bool(dev.gl.as_mut(), &light_uniform(index, "Enabled"), enabled);
    }

    fn apply_render_state(&mut self, dev: &mut DeviceState, state: RenderState) {
        let enabled = dev.render_state(state);
        match state {
            RenderState::Lighting => self.program.set_bool(dev.gl.as_mut(), "uni_LightingEnabled", enabled),
            RenderState::Fog => self.program.set_bool(dev.gl.as_mut(), "uni_FogEnabled", enabled),
            RenderState::AlphaTest => self.program.set_bool(dev.gl.as_mut(), "uni_AlphaTestEnabled", enabled),
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

    // no global ambient term in this program; the value is only recorded
    fn apply_global_ambient(&mut self, _dev: &mut DeviceState) {}

    fn apply_shade_model(&mut self, dev: &mut DeviceState) {
        let smooth = dev.shade_model == ShadeModel::Smooth;
        self.program.set_bool(dev.gl.as_mut(), "uni_SmoothShading", smooth);
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
        let size = used_bytes(format, &ranges).min(data.len());
        if size == 0 {
            return;
        }
        let gl = dev.gl.as_mut();
        let offset = self.stream.upload(gl, &data[..size]);
        gl.bind_vertex_array(self.vao);
        configure_attributes(gl, format, offset);
        gl.draw_arrays(primitive, ranges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CallLog, HeadlessConfig, HeadlessContext};
    use crate::device::backends::CoreDevice;
    use crate::device::{Device, DeviceConfig, RenderSettings, ShaderSources, StaticBufferId};
    use crate::math::Vec3;
    use crate::types::{Color, Light, LightType, Material, Vertex, VertexCol, Vertices};

    fn shaders() -> DeviceShaders {
        DeviceShaders {
            core: Some(ShaderSources::new("void main() {}", "void main() {}")),
            ..DeviceShaders::default()
        }
    }

    fn try_device(config: HeadlessConfig) -> (DeviceResult<CoreDevice>, CallLog) {
        let gl = HeadlessContext::new(config);
        let log = gl.log();
        let dev = CoreDevice::new(Box::new(gl), &DeviceConfig::default(), &RenderSettings::default(), &shaders());
        (dev, log)
    }

    fn device() -> (CoreDevice, CallLog) {
        let (dev, log) = try_device(HeadlessConfig::default());
        (dev.expect("gl33 device"), log)
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn version_three_zero_is_accepted() {
        let (dev, _log) = try_device(HeadlessConfig::with_version(3, 0));
        assert!(dev.is_ok());
        let (dev, _log) = try_device(HeadlessConfig::with_version(2, 1));
        assert!(matches!(dev, Err(DeviceError::UnsupportedVersion { .. })));
    }

    #[test]
    fn missing_core_sources_name_the_backend() {
        let gl = HeadlessContext::new(HeadlessConfig::default());
        let shaders = DeviceShaders {
            shader: Some(ShaderSources::new("void main() {}", "void main() {}")),
            core: None,
        };
        let err = CoreDevice::new(Box::new(gl), &DeviceConfig::default(), &RenderSettings::default(), &shaders)
            .err()
            .expect("creation fails");
        assert!(matches!(err, DeviceError::MissingShaderSources { backend: "gl33" }));
    }

    // ── streaming ─────────────────────────────────────────────────────────

    #[test]
    fn immediate_draws_stream_through_shared_buffer() {
        let (mut dev, log) = device();
        let tri = [VertexCol::new([0.0; 3], Color::WHITE); 3];
        log.reset();

        dev.draw_primitive(PrimitiveType::Triangles, Vertices::from(&tri[..]), Color::WHITE);
        assert_eq!(log.count("map_write_unsynchronized"), 1);
        assert_eq!(log.count("draw_arrays"), 1);
        assert_eq!(log.count("vertex_attrib"), 5);
        let after_first = dev.pipeline().stream().offset();
        assert_eq!(after_first, std::mem::size_of_val(&tri));

        dev.draw_primitive(PrimitiveType::Triangles, Vertices::from(&tri[..]), Color::WHITE);
        assert_eq!(dev.pipeline().stream().offset(), 2 * after_first);
        assert_eq!(log.count("gen_buffer"), 0);
    }

    #[test]
    fn empty_draw_uploads_nothing() {
        let (mut dev, log) = device();
        log.reset();
        dev.draw_primitive(PrimitiveType::Triangles, Vertices::Plain(&[]), Color::WHITE);
        assert_eq!(log.count("draw_arrays"), 0);
        assert_eq!(dev.pipeline().stream().offset(), 0);
    }

    #[test]
    fn static_buffers_own_a_vertex_array() {
        let (mut dev, log) = device();
        let mesh = [Vertex::default(); 3];
        let id = dev.create_static_buffer(PrimitiveType::Triangles, Vertices::from(&mesh[..]));
        assert!(matches!(id, StaticBufferId::Buffer(_)));
        log.reset();
        assert!(dev.draw_static_buffer(id));
        assert_eq!(log.count("draw_arrays"), 1);
        assert_eq!(log.count("draw_client_arrays"), 0);
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    #[test]
    fn directional_light_points_towards_the_light() {
        let (mut dev, log) = device();
        let light = Light {
            ty: LightType::Directional,
            direction: Vec3::new(0.0, -1.0, 0.0),
            ..Light::default()
        };
        dev.set_light(0, &light);
        assert_eq!(
            log.uniform("uni_Light[0].Position"),
            Some(UniformValue::Vec4([0.0, 1.0, 0.0, 0.0]))
        );
        dev.set_light_enabled(0, true);
        assert_eq!(log.uniform("uni_Light[0].Enabled"), Some(UniformValue::Int(1)));
    }

    #[test]
    fn material_and_shading_are_uniforms() {
        let (mut dev, log) = device();
        let material = Material { diffuse: Color::rgb(1.0, 0.0, 0.0), ..Material::default() };
        dev.set_material(&material);
        assert_eq!(log.uniform("uni_DiffuseColor"), Some(UniformValue::Vec4([1.0, 0.0, 0.0, 1.0])));

        assert_eq!(log.uniform("uni_SmoothShading"), Some(UniformValue::Int(1)));
        dev.set_shade_model(ShadeModel::Flat);
        assert_eq!(log.uniform("uni_SmoothShading"), Some(UniformValue::Int(0)));
        assert_eq!(log.count("shade_model"), 0);
    }

    #[test]
    fn shadow_mapping_uses_shadow_enable_uniform() {
        let (mut dev, log) = device();
        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.uniform("uni_ShadowTextureEnabled"), Some(UniformValue::Int(1)));
        assert_eq!(log.uniform("uni_PrimaryTextureEnabled"), Some(UniformValue::Int(0)));
    }

    #[test]
    fn shadow_uniform_stays_off_without_a_shadow_unit() {
        let (dev, log) = try_device(HeadlessConfig { max_texture_image_units: 2, ..HeadlessConfig::default() });
        let mut dev = dev.expect("gl33 device");
        dev.set_render_state(RenderState::ShadowMapping, true);
        assert_eq!(log.uniform("uni_ShadowTextureEnabled"), Some(UniformValue::Int(0)));
    }

    #[test]
    fn global_ambient_issues_no_driver_call() {
        let (mut dev, log) = device();
        log.reset();
        dev.set_global_ambient(Color::gray(0.2));
        assert!(log.history().is_empty());
        assert_eq!(log.count("light_model_ambient"), 0);
    }

    #[test]
    fn destroy_frees_stream_and_vertex_array() {
        let (mut dev, log) = device();
        dev.destroy();
        assert_eq!(log.live_buffers(), 0);
        assert_eq!(log.live_programs(), 0);
    }
}
