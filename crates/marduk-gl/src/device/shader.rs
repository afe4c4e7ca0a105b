//! Program objects built from caller-supplied source text.

use std::collections::HashMap;

use crate::context::{GlContext, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation, UniformValue};

use super::error::{DeviceError, DeviceResult};
use super::init::ShaderSources;

fn compile(gl: &mut dyn GlContext, stage: ShaderStage, source: &str) -> DeviceResult<ShaderHandle> {
    let shader = gl.create_shader(stage);
    if let Err(log) = gl.compile_shader(shader, source) {
        gl.delete_shader(shader);
        log::error!("{stage:?} shader compilation failed:\n{log}");
        return Err(DeviceError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

/// A linked program plus a cache of resolved uniform locations.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    /// Compiles both stages and links them. Nothing is left allocated on
    /// failure.
    pub fn build(gl: &mut dyn GlContext, sources: &ShaderSources) -> DeviceResult<Self> {
        let vertex = compile(gl, ShaderStage::Vertex, &sources.vertex)?;
        let fragment = match compile(gl, ShaderStage::Fragment, &sources.fragment) {
            Ok(f) => f,
            Err(e) => {
                gl.delete_shader(vertex);
                return Err(e);
            }
        };

        let program = gl.create_program();
        let linked = gl.link_program(program, &[vertex, fragment]);

        // attached shaders are no longer needed once linking is done
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        if let Err(log) = linked {
            gl.delete_program(program);
            log::error!("shader program link failed:\n{log}");
            return Err(DeviceError::ProgramLink { log });
        }

        log::debug!("linked shader program {}", program.0);
        Ok(Self { handle: program, uniforms: HashMap::new() })
    }

    #[inline]
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Looks up `names` up front so the first frame does no string queries.
    pub fn resolve(&mut self, gl: &mut dyn GlContext, names: &[&str]) {
        for name in names {
            if self.location(gl, name).is_none() {
                log::debug!("uniform {name} not found in program {}", self.handle.0);
            }
        }
    }

    pub fn location(&mut self, gl: &mut dyn GlContext, name: &str) -> Option<UniformLocation> {
        if let Some(loc) = self.uniforms.get(name) {
            return *loc;
        }
        let loc = gl.uniform_location(self.handle, name);
        self.uniforms.insert(name.to_owned(), loc);
        loc
    }

    /// Writes a uniform of the program currently in use. Uniforms the
    /// program does not declare are skipped.
    pub fn set(&mut self, gl: &mut dyn GlContext, name: &str, value: UniformValue) {
        if let Some(loc) = self.location(gl, name) {
            gl.uniform(loc, value);
        }
    }

    pub fn set_int(&mut self, gl: &mut dyn GlContext, name: &str, value: i32) {
        self.set(gl, name, UniformValue::Int(value));
    }

    pub fn set_bool(&mut self, gl: &mut dyn GlContext, name: &str, value: bool) {
        self.set(gl, name, UniformValue::Int(value as i32));
    }

    pub fn set_float(&mut self, gl: &mut dyn GlContext, name: &str, value: f32) {
        self.set(gl, name, UniformValue::Float(value));
    }

    pub fn destroy(&mut self, gl: &mut dyn GlContext) {
        if self.handle.is_none() {
            return;
        }
        gl.delete_program(self.handle);
        self.handle = ProgramHandle::NONE;
        self.uniforms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessConfig, HeadlessContext};

    fn sources() -> ShaderSources {
        ShaderSources::new("void main() {}", "void main() {}")
    }

    #[test]
    fn compile_failure_reports_log_and_frees_shaders() {
        let mut gl = HeadlessContext::new(HeadlessConfig { fail_shader_compile: true, ..HeadlessConfig::default() });
        let log = gl.log();
        let err = ShaderProgram::build(&mut gl, &sources()).unwrap_err();
        match err {
            DeviceError::ShaderCompile { stage, log: info } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(info.contains("syntax error"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(log.count("delete_shader"), log.count("create_shader"));
        assert_eq!(log.live_programs(), 0);
    }

    #[test]
    fn empty_fragment_source_fails_after_vertex_compiles() {
        let mut gl = HeadlessContext::default();
        let log = gl.log();
        let err = ShaderProgram::build(&mut gl, &ShaderSources::new("void main() {}", "  ")).unwrap_err();
        assert!(matches!(err, DeviceError::ShaderCompile { stage: ShaderStage::Fragment, .. }));
        assert_eq!(log.count("delete_shader"), 2);
    }

    #[test]
    fn link_failure_deletes_program() {
        let mut gl = HeadlessContext::new(HeadlessConfig { fail_program_link: true, ..HeadlessConfig::default() });
        let log = gl.log();
        let err = ShaderProgram::build(&mut gl, &sources()).unwrap_err();
        assert!(matches!(err, DeviceError::ProgramLink { .. }));
        assert_eq!(log.live_programs(), 0);
    }

    #[test]
    fn locations_are_cached() {
        let mut gl = HeadlessContext::default();
        let log = gl.log();
        let mut program = ShaderProgram::build(&mut gl, &sources()).expect("builds");
        program.set_int(&mut gl, "uni_PrimaryTexture", 0);
        program.set_int(&mut gl, "uni_PrimaryTexture", 0);
        assert_eq!(log.count("uniform_location"), 1);
        assert_eq!(log.uniform("uni_PrimaryTexture"), Some(UniformValue::Int(0)));

        program.destroy(&mut gl);
        program.destroy(&mut gl);
        assert_eq!(log.count("delete_program"), 1);
    }
}
