//! Headless context.
//!
//! Keeps the object bookkeeping a driver would (names, buffer sizes, unit
//! bindings, uniforms) without rasterizing anything. Every command bumps a
//! per-command counter visible through [`CallLog`], which stays readable after
//! the context itself has been moved into a device.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::math::Mat4;
use crate::types::{
    BlendFunc, Color, CompFunc, CullMode, FillMode, FogParams, Material, PrimitiveType,
    ShadeModel, TexWrapMode,
};

use super::{
    ArrayData, AttribSource, Attachment, BufferHandle, BufferUsage, Capability, ClientArrays,
    DrawRanges, FixedLight, FramebufferApi, FramebufferHandle, FramebufferStatus,
    FramebufferTarget, GlContext, GlError, GlVersion, Limit, ListHandle, MatrixMode, PixelLayout,
    ProgramHandle, RenderbufferFormat, RenderbufferHandle, ShaderHandle, ShaderStage, TexEnv,
    TexImage, TexParam, TextureHandle, UniformLocation, UniformValue, VertexArrayHandle,
};

/// What the simulated driver reports and how it misbehaves.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub version: GlVersion,
    pub extensions: Vec<String>,
    pub renderer: String,

    pub max_lights: i32,
    pub max_texture_units: i32,
    pub max_texture_image_units: i32,
    pub max_texture_size: i32,
    pub max_samples: i32,
    pub max_renderbuffer_size: i32,
    pub max_anisotropy: f32,

    /// Every shader compile fails with a canned log.
    pub fail_shader_compile: bool,
    /// Every program link fails with a canned log.
    pub fail_program_link: bool,
    /// Unsynchronized buffer mapping always fails.
    pub fail_buffer_map: bool,
    /// Status every framebuffer completeness check reports.
    pub framebuffer_status: FramebufferStatus,
    /// Errors queued for `take_error`.
    pub pending_errors: Vec<GlError>,
    /// Keep an ordered list of every command name.
    pub record_history: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            version: GlVersion::new(3, 3),
            extensions: Vec::new(),
            renderer: "marduk headless".to_owned(),
            max_lights: 8,
            max_texture_units: 4,
            max_texture_image_units: 16,
            max_texture_size: 4096,
            max_samples: 4,
            max_renderbuffer_size: 4096,
            max_anisotropy: 16.0,
            fail_shader_compile: false,
            fail_program_link: false,
            fail_buffer_map: false,
            framebuffer_status: FramebufferStatus::Complete,
            pending_errors: Vec::new(),
            record_history: false,
        }
    }
}

impl HeadlessConfig {
    pub fn with_version(major: u8, minor: u8) -> Self {
        Self { version: GlVersion::new(major, minor), ..Self::default() }
    }

    pub fn extension(mut self, name: &str) -> Self {
        self.extensions.push(name.to_owned());
        self
    }
}

#[derive(Debug, Default)]
struct State {
    counts: HashMap<&'static str, usize>,
    history: Vec<&'static str>,
    record_history: bool,
    next_name: u32,

    textures: HashSet<u32>,
    buffers: HashMap<u32, usize>,
    vertex_arrays: HashSet<u32>,
    lists: HashSet<u32>,
    shaders: HashSet<u32>,
    programs: HashSet<u32>,
    framebuffers: HashSet<u32>,
    renderbuffers: HashSet<u32>,

    enabled: HashSet<Capability>,
    active_unit: u32,
    unit_textures: HashMap<u32, TextureHandle>,
    unit_wrap: HashMap<u32, (Option<TexWrapMode>, Option<TexWrapMode>)>,
    bound_buffer: BufferHandle,
    bound_framebuffer: FramebufferHandle,
    compiling_list: Option<ListHandle>,
    current_program: ProgramHandle,
    locations: HashMap<(u32, String), i32>,
    uniforms: HashMap<i32, UniformValue>,
    errors: VecDeque<GlError>,
}

impl State {
    fn hit(&mut self, name: &'static str) {
        *self.counts.entry(name).or_insert(0) += 1;
        if self.record_history {
            self.history.push(name);
        }
    }

    fn name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }
}

/// Shared read access to a [`HeadlessContext`]'s counters and object state.
#[derive(Debug, Clone)]
pub struct CallLog {
    state: Rc<RefCell<State>>,
}

impl CallLog {
    /// Times `command` (a [`GlContext`] method name) was issued.
    pub fn count(&self, command: &str) -> usize {
        self.state.borrow().counts.get(command).copied().unwrap_or(0)
    }

    /// Ordered command names; empty unless history recording is on.
    pub fn history(&self) -> Vec<&'static str> {
        self.state.borrow().history.clone()
    }

    /// Clears counters and history, keeping object state.
    pub fn reset(&self) {
        let mut s = self.state.borrow_mut();
        s.counts.clear();
        s.history.clear();
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_lists(&self) -> usize {
        self.state.borrow().lists.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state.borrow().framebuffers.len()
    }

    pub fn live_renderbuffers(&self) -> usize {
        self.state.borrow().renderbuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Allocated storage of a live buffer.
    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<usize> {
        self.state.borrow().buffers.get(&buffer.0).copied()
    }

    pub fn bound_texture(&self, unit: u32) -> TextureHandle {
        self.state.borrow().unit_textures.get(&unit).copied().unwrap_or_default()
    }

    /// Last `(s, t)` wrap modes issued while `unit` was active.
    pub fn wrap(&self, unit: u32) -> (Option<TexWrapMode>, Option<TexWrapMode>) {
        self.state.borrow().unit_wrap.get(&unit).copied().unwrap_or_default()
    }

    pub fn bound_framebuffer(&self) -> FramebufferHandle {
        self.state.borrow().bound_framebuffer
    }

    pub fn current_program(&self) -> ProgramHandle {
        self.state.borrow().current_program
    }

    pub fn is_compiling_list(&self) -> bool {
        self.state.borrow().compiling_list.is_some()
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.state.borrow().enabled.contains(&cap)
    }

    /// Last value written to the uniform `name` of any program.
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        let s = self.state.borrow();
        s.locations
            .iter()
            .filter(|((_, n), _)| n == name)
            .find_map(|(_, loc)| s.uniforms.get(loc).copied())
    }
}

/// Bookkeeping-only [`GlContext`].
#[derive(Debug)]
pub struct HeadlessContext {
    config: HeadlessConfig,
    state: Rc<RefCell<State>>,
}

impl HeadlessContext {
    pub fn new(config: HeadlessConfig) -> Self {
        let state = State {
            record_history: config.record_history,
            errors: config.pending_errors.iter().copied().collect(),
            ..State::default()
        };
        Self { config, state: Rc::new(RefCell::new(state)) }
    }

    pub fn log(&self) -> CallLog {
        CallLog { state: Rc::clone(&self.state) }
    }

    fn hit(&self, name: &'static str) {
        self.state.borrow_mut().hit(name);
    }

    fn alloc(&self, name: &'static str, pick: impl FnOnce(&mut State) -> &mut HashSet<u32>) -> u32 {
        let mut s = self.state.borrow_mut();
        s.hit(name);
        let id = s.name();
        pick(&mut *s).insert(id);
        id
    }

    fn free(&self, name: &'static str, id: u32, pick: impl FnOnce(&mut State) -> &mut HashSet<u32>) {
        let mut s = self.state.borrow_mut();
        s.hit(name);
        pick(&mut *s).remove(&id);
    }

    fn validate_ranges(&self, ranges: &DrawRanges<'_>) {
        if let DrawRanges::Multi { first, count } = ranges {
            debug_assert_eq!(first.len(), count.len(), "multi-draw arrays differ in length");
        }
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl GlContext for HeadlessContext {
    fn version(&mut self) -> GlVersion {
        self.hit("version");
        self.config.version
    }

    fn renderer_description(&mut self) -> String {
        self.hit("renderer_description");
        format!("{} (OpenGL {})", self.config.renderer, self.config.version)
    }

    fn has_extension(&mut self, name: &str) -> bool {
        self.hit("has_extension");
        self.config.extensions.iter().any(|e| e == name)
    }

    fn get_integer(&mut self, limit: Limit) -> i32 {
        self.hit("get_integer");
        match limit {
            Limit::MaxLights => self.config.max_lights,
            Limit::MaxTextureUnits => self.config.max_texture_units,
            Limit::MaxTextureImageUnits => self.config.max_texture_image_units,
            Limit::MaxTextureSize => self.config.max_texture_size,
            Limit::MaxSamples => self.config.max_samples,
            Limit::MaxRenderbufferSize => self.config.max_renderbuffer_size,
        }
    }

    fn max_anisotropy(&mut self) -> f32 {
        self.hit("max_anisotropy");
        self.config.max_anisotropy
    }

    fn take_error(&mut self) -> Option<GlError> {
        let mut s = self.state.borrow_mut();
        s.hit("take_error");
        s.errors.pop_front()
    }

    fn flush(&mut self) {
        self.hit("flush");
    }

    // ── frame state ───────────────────────────────────────────────────────

    fn set_enabled(&mut self, cap: Capability, enabled: bool) {
        let mut s = self.state.borrow_mut();
        s.hit("set_enabled");
        if enabled {
            s.enabled.insert(cap);
        } else {
            s.enabled.remove(&cap);
        }
    }

    fn viewport(&mut self, _x: i32, _y: i32, _width: i32, _height: i32) {
        self.hit("viewport");
    }

    fn clear(&mut self, _color: bool, _depth: bool) {
        self.hit("clear");
    }

    fn clear_color(&mut self, _color: Color) {
        self.hit("clear_color");
    }

    fn depth_mask(&mut self, _enabled: bool) {
        self.hit("depth_mask");
    }

    fn color_mask(&mut self, _r: bool, _g: bool, _b: bool, _a: bool) {
        self.hit("color_mask");
    }

    fn depth_func(&mut self, _func: CompFunc) {
        self.hit("depth_func");
    }

    fn alpha_func(&mut self, _func: CompFunc, _reference: f32) {
        self.hit("alpha_func");
    }

    fn blend_func(&mut self, _src: BlendFunc, _dst: BlendFunc) {
        self.hit("blend_func");
    }

    fn polygon_offset(&mut self, _factor: f32, _units: f32) {
        self.hit("polygon_offset");
    }

    fn front_face(&mut self, _mode: CullMode) {
        self.hit("front_face");
    }

    fn shade_model(&mut self, _model: ShadeModel) {
        self.hit("shade_model");
    }

    fn polygon_mode(&mut self, _mode: FillMode) {
        self.hit("polygon_mode");
    }

    fn read_pixels(&mut self, _x: i32, _y: i32, width: i32, height: i32) -> Vec<u8> {
        self.hit("read_pixels");
        vec![0; width.max(0) as usize * height.max(0) as usize * 4]
    }

    // ── fixed-function ────────────────────────────────────────────────────

    fn load_matrix(&mut self, _mode: MatrixMode, _matrix: &Mat4) {
        self.hit("load_matrix");
    }

    fn light(&mut self, _index: u32, _light: &FixedLight) {
        self.hit("light");
    }

    fn light_position(&mut self, _index: u32, _position: [f32; 4], _spot_direction: [f32; 3]) {
        self.hit("light_position");
    }

    fn material(&mut self, _material: &Material) {
        self.hit("material");
    }

    fn light_model_ambient(&mut self, _color: Color) {
        self.hit("light_model_ambient");
    }

    fn fog(&mut self, _params: &FogParams) {
        self.hit("fog");
    }

    fn tex_env(&mut self, _env: TexEnv) {
        self.hit("tex_env");
    }

    fn tex_gen_eye_linear(&mut self) {
        self.hit("tex_gen_eye_linear");
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn gen_texture(&mut self) -> TextureHandle {
        TextureHandle(self.alloc("gen_texture", |s| &mut s.textures))
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.free("delete_texture", texture.0, |s| &mut s.textures);
        // the driver unbinds a deleted texture from every unit
        self.state.borrow_mut().unit_textures.retain(|_, t| *t != texture);
    }

    fn active_texture(&mut self, unit: u32) {
        let mut s = self.state.borrow_mut();
        s.hit("active_texture");
        s.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        let mut s = self.state.borrow_mut();
        s.hit("bind_texture");
        let unit = s.active_unit;
        s.unit_textures.insert(unit, texture);
    }

    fn tex_parameter(&mut self, param: TexParam) {
        let mut s = self.state.borrow_mut();
        s.hit("tex_parameter");
        let unit = s.active_unit;
        let wrap = s.unit_wrap.entry(unit).or_default();
        match param {
            TexParam::WrapS(mode) => wrap.0 = Some(mode),
            TexParam::WrapT(mode) => wrap.1 = Some(mode),
            _ => {}
        }
    }

    fn tex_image_2d(&mut self, image: &TexImage<'_>) {
        self.hit("tex_image_2d");
        if let Some(data) = image.data {
            debug_assert!(
                data.len() >= image.width as usize * image.height as usize * image.layout.bytes_per_pixel(),
                "tex_image_2d: pixel data shorter than image"
            );
        }
    }

    fn tex_sub_image_2d(
        &mut self,
        _x: i32,
        _y: i32,
        _width: u32,
        _height: u32,
        _layout: PixelLayout,
        _data: &[u8],
    ) {
        self.hit("tex_sub_image_2d");
    }

    fn generate_mipmap(&mut self) {
        self.hit("generate_mipmap");
    }

    fn copy_tex_sub_image_2d(&mut self, _x: i32, _y: i32, _width: i32, _height: i32) {
        self.hit("copy_tex_sub_image_2d");
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn gen_buffer(&mut self) -> BufferHandle {
        let mut s = self.state.borrow_mut();
        s.hit("gen_buffer");
        let id = s.name();
        s.buffers.insert(id, 0);
        BufferHandle(id)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        let mut s = self.state.borrow_mut();
        s.hit("delete_buffer");
        s.buffers.remove(&buffer.0);
        if s.bound_buffer == buffer {
            s.bound_buffer = BufferHandle::NONE;
        }
    }

    fn bind_array_buffer(&mut self, buffer: BufferHandle) {
        let mut s = self.state.borrow_mut();
        s.hit("bind_array_buffer");
        s.bound_buffer = buffer;
    }

    fn buffer_data(&mut self, size: usize, _data: Option<&[u8]>, _usage: BufferUsage) {
        let mut s = self.state.borrow_mut();
        s.hit("buffer_data");
        let bound = s.bound_buffer.0;
        if let Some(storage) = s.buffers.get_mut(&bound) {
            *storage = size;
        }
    }

    fn buffer_sub_data(&mut self, offset: usize, data: &[u8]) {
        let mut s = self.state.borrow_mut();
        s.hit("buffer_sub_data");
        let bound = s.bound_buffer.0;
        let fits = s.buffers.get(&bound).is_some_and(|size| offset + data.len() <= *size);
        if !fits {
            s.errors.push_back(GlError::InvalidValue);
        }
    }

    fn map_write_unsynchronized(&mut self, offset: usize, data: &[u8]) -> bool {
        let mut s = self.state.borrow_mut();
        s.hit("map_write_unsynchronized");
        if self.config.fail_buffer_map {
            return false;
        }
        let bound = s.bound_buffer.0;
        s.buffers.get(&bound).is_some_and(|size| offset + data.len() <= *size)
    }

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn gen_vertex_array(&mut self) -> VertexArrayHandle {
        VertexArrayHandle(self.alloc("gen_vertex_array", |s| &mut s.vertex_arrays))
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayHandle) {
        self.free("delete_vertex_array", vao.0, |s| &mut s.vertex_arrays);
    }

    fn bind_vertex_array(&mut self, _vao: VertexArrayHandle) {
        self.hit("bind_vertex_array");
    }

    fn vertex_attrib(&mut self, _slot: u32, _source: AttribSource) {
        self.hit("vertex_attrib");
    }

    // ── draws ─────────────────────────────────────────────────────────────

    fn draw_arrays(&mut self, _primitive: PrimitiveType, ranges: DrawRanges<'_>) {
        self.validate_ranges(&ranges);
        self.hit("draw_arrays");
    }

    fn draw_client_arrays(
        &mut self,
        _primitive: PrimitiveType,
        arrays: &ClientArrays<'_>,
        ranges: DrawRanges<'_>,
    ) {
        self.validate_ranges(&ranges);
        if let (ArrayData::Client(data), DrawRanges::Single { first, count }) = (arrays.data, ranges) {
            let needed = arrays.format.byte_len((first + count).max(0) as usize);
            debug_assert!(data.len() >= needed, "client array shorter than draw range");
        }
        self.hit("draw_client_arrays");
    }

    // ── display lists ─────────────────────────────────────────────────────

    fn gen_list(&mut self) -> ListHandle {
        ListHandle(self.alloc("gen_list", |s| &mut s.lists))
    }

    fn delete_list(&mut self, list: ListHandle) {
        self.free("delete_list", list.0, |s| &mut s.lists);
    }

    fn begin_list(&mut self, list: ListHandle) {
        let mut s = self.state.borrow_mut();
        s.hit("begin_list");
        s.compiling_list = Some(list);
    }

    fn end_list(&mut self) {
        let mut s = self.state.borrow_mut();
        s.hit("end_list");
        s.compiling_list = None;
    }

    fn call_list(&mut self, _list: ListHandle) {
        self.hit("call_list");
    }

    // ── programs ──────────────────────────────────────────────────────────

    fn create_shader(&mut self, _stage: ShaderStage) -> ShaderHandle {
        ShaderHandle(self.alloc("create_shader", |s| &mut s.shaders))
    }

    fn compile_shader(&mut self, _shader: ShaderHandle, source: &str) -> Result<(), String> {
        self.hit("compile_shader");
        if self.config.fail_shader_compile || source.trim().is_empty() {
            return Err("0:1(1): error: syntax error, unexpected end of file".to_owned());
        }
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.free("delete_shader", shader.0, |s| &mut s.shaders);
    }

    fn create_program(&mut self) -> ProgramHandle {
        ProgramHandle(self.alloc("create_program", |s| &mut s.programs))
    }

    fn link_program(&mut self, _program: ProgramHandle, shaders: &[ShaderHandle]) -> Result<(), String> {
        self.hit("link_program");
        if self.config.fail_program_link || shaders.is_empty() {
            return Err("error: linking with uncompiled/unspecialized shader".to_owned());
        }
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.free("delete_program", program.0, |s| &mut s.programs);
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let mut s = self.state.borrow_mut();
        s.hit("use_program");
        s.current_program = program;
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut s = self.state.borrow_mut();
        s.hit("uniform_location");
        if !s.programs.contains(&program.0) {
            return None;
        }
        let next = s.locations.len() as i32;
        let loc = *s.locations.entry((program.0, name.to_owned())).or_insert(next);
        Some(UniformLocation(loc))
    }

    fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let mut s = self.state.borrow_mut();
        s.hit("uniform");
        s.uniforms.insert(location.0, value);
    }

    // ── framebuffer objects ───────────────────────────────────────────────

    fn gen_framebuffer(&mut self, _api: FramebufferApi) -> FramebufferHandle {
        FramebufferHandle(self.alloc("gen_framebuffer", |s| &mut s.framebuffers))
    }

    fn delete_framebuffer(&mut self, _api: FramebufferApi, fbo: FramebufferHandle) {
        self.free("delete_framebuffer", fbo.0, |s| &mut s.framebuffers);
    }

    fn bind_framebuffer(&mut self, _api: FramebufferApi, target: FramebufferTarget, fbo: FramebufferHandle) {
        let mut s = self.state.borrow_mut();
        s.hit("bind_framebuffer");
        if matches!(target, FramebufferTarget::Both | FramebufferTarget::Draw) {
            s.bound_framebuffer = fbo;
        }
    }

    fn gen_renderbuffer(&mut self, _api: FramebufferApi) -> RenderbufferHandle {
        RenderbufferHandle(self.alloc("gen_renderbuffer", |s| &mut s.renderbuffers))
    }

    fn delete_renderbuffer(&mut self, _api: FramebufferApi, rbo: RenderbufferHandle) {
        self.free("delete_renderbuffer", rbo.0, |s| &mut s.renderbuffers);
    }

    fn renderbuffer_storage(
        &mut self,
        _api: FramebufferApi,
        _rbo: RenderbufferHandle,
        _format: RenderbufferFormat,
        samples: u32,
        _width: u32,
        _height: u32,
    ) {
        let mut s = self.state.borrow_mut();
        s.hit("renderbuffer_storage");
        if samples as i32 > self.config.max_samples {
            s.errors.push_back(GlError::InvalidValue);
        }
    }

    fn attach_renderbuffer(&mut self, _api: FramebufferApi, _attachment: Attachment, _rbo: RenderbufferHandle) {
        self.hit("attach_renderbuffer");
    }

    fn attach_texture(&mut self, _api: FramebufferApi, _attachment: Attachment, _texture: TextureHandle) {
        self.hit("attach_texture");
    }

    fn check_framebuffer_status(&mut self, _api: FramebufferApi) -> FramebufferStatus {
        self.hit("check_framebuffer_status");
        self.config.framebuffer_status
    }

    fn blit_framebuffer(&mut self, _api: FramebufferApi, _src: [i32; 4], _dst: [i32; 4]) {
        self.hit("blit_framebuffer");
    }
}
