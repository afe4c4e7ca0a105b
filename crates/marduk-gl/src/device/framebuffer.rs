//! Default and offscreen framebuffers.
//!
//! The default framebuffer stands for the window surface and always exists
//! under the name [`DEFAULT_FRAMEBUFFER`]. Offscreen framebuffers are created
//! and deleted by name. Which object is currently bound is tracked by a
//! [`FramebufferBinding`] owned by the device and passed to every operation.

use std::collections::HashMap;

use crate::context::{
    Attachment, FramebufferApi, FramebufferHandle, FramebufferStatus, FramebufferTarget,
    GlContext, InternalFormat, MagFilter, MinFilter, PixelLayout, RenderbufferFormat,
    RenderbufferHandle, TexImage, TexParam, TextureHandle,
};
use crate::types::{Color, CompFunc, TexWrapMode};

use super::caps::Capabilities;
use super::error::{DeviceError, DeviceResult};

/// Reserved name of the window-backed framebuffer.
pub const DEFAULT_FRAMEBUFFER: &str = "default";

/// Storage of one attachment.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    #[default]
    Renderbuffer,
    /// Sampleable texture, readable after rendering.
    Texture,
    None,
}

/// Options for an offscreen framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferParams {
    pub width: u32,
    pub height: u32,
    /// Depth precision in bits: 16, 24 or 32.
    pub depth: u8,
    /// Requested sample count; clamped to what the hardware offers.
    pub samples: u32,
    pub color: AttachmentKind,
    pub depth_attachment: AttachmentKind,
}

impl Default for FramebufferParams {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            depth: 16,
            samples: 1,
            color: AttachmentKind::Renderbuffer,
            depth_attachment: AttachmentKind::Renderbuffer,
        }
    }
}

fn depth_bits(requested: u8) -> u8 {
    match requested {
        0..=16 => 16,
        17..=24 => 24,
        _ => 32,
    }
}

/// Currently bound framebuffer object of one device.
#[derive(Debug, Clone, Default)]
pub struct FramebufferBinding {
    current: FramebufferHandle,
}

impl FramebufferBinding {
    #[inline]
    pub fn current(&self) -> FramebufferHandle {
        self.current
    }

    pub fn bind(&mut self, gl: &mut dyn GlContext, api: FramebufferApi, fbo: FramebufferHandle) {
        gl.bind_framebuffer(api, FramebufferTarget::Both, fbo);
        self.current = fbo;
    }
}

/// Common interface of default and offscreen framebuffers.
pub trait Framebuffer {
    fn is_default(&self) -> bool;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn depth(&self) -> u8;
    fn samples(&self) -> u32;

    /// Color texture, or the none handle when color is not a texture.
    fn color_texture(&self) -> TextureHandle;
    fn depth_texture(&self) -> TextureHandle;

    fn bind(&self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding);
    fn unbind(&self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding);

    /// Blits the color contents of `src` to `dst` on the window surface.
    fn copy_to_screen(
        &self,
        gl: &mut dyn GlContext,
        binding: &mut FramebufferBinding,
        src: [i32; 4],
        dst: [i32; 4],
    );

    fn destroy(&mut self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding);
}

// ── default ───────────────────────────────────────────────────────────────

/// The window surface. Never destroyed; resized on configuration changes.
#[derive(Debug, Clone)]
pub struct DefaultFramebuffer {
    width: u32,
    height: u32,
    depth: u8,
    samples: u32,
    /// Entry points for rebinding object 0, when objects exist at all.
    api: Option<FramebufferApi>,
}

impl DefaultFramebuffer {
    pub fn new(width: u32, height: u32, depth: u8, api: Option<FramebufferApi>) -> Self {
        Self { width, height, depth, samples: 1, api }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

impl Framebuffer for DefaultFramebuffer {
    fn is_default(&self) -> bool {
        true
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn depth(&self) -> u8 {
        self.depth
    }

    fn samples(&self) -> u32 {
        self.samples
    }

    fn color_texture(&self) -> TextureHandle {
        TextureHandle::NONE
    }

    fn depth_texture(&self) -> TextureHandle {
        TextureHandle::NONE
    }

    fn bind(&self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding) {
        if let Some(api) = self.api {
            binding.bind(gl, api, FramebufferHandle::NONE);
        }
    }

    fn unbind(&self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding) {
        self.bind(gl, binding);
    }

    fn copy_to_screen(
        &self,
        _gl: &mut dyn GlContext,
        _binding: &mut FramebufferBinding,
        _src: [i32; 4],
        _dst: [i32; 4],
    ) {
    }

    fn destroy(&mut self, _gl: &mut dyn GlContext, _binding: &mut FramebufferBinding) {}
}

// ── offscreen ─────────────────────────────────────────────────────────────

/// Framebuffer object with renderbuffer or texture attachments.
#[derive(Debug)]
pub struct GlFramebuffer {
    api: FramebufferApi,
    fbo: FramebufferHandle,
    color_rbo: RenderbufferHandle,
    depth_rbo: RenderbufferHandle,
    color_texture: TextureHandle,
    depth_texture: TextureHandle,
    width: u32,
    height: u32,
    depth: u8,
    samples: u32,
}

impl GlFramebuffer {
    /// Builds and validates the object. Texture attachments are created on
    /// `unit`, which gets `restore` bound again afterwards.
    pub fn create(
        gl: &mut dyn GlContext,
        binding: &mut FramebufferBinding,
        api: FramebufferApi,
        params: &FramebufferParams,
        caps: &Capabilities,
        unit: u32,
        restore: TextureHandle,
    ) -> DeviceResult<Self> {
        let samples = if caps.multisampling_supported {
            params.samples.clamp(1, caps.max_samples.max(1))
        } else {
            if params.samples > 1 {
                log::debug!("multisampling unsupported, framebuffer uses 1 sample");
            }
            1
        };
        // multisample textures are not attachable here
        let kind = |k: AttachmentKind| match (k, samples > 1) {
            (AttachmentKind::Texture, true) => AttachmentKind::Renderbuffer,
            (k, _) => k,
        };

        let mut fb = GlFramebuffer {
            api,
            fbo: gl.gen_framebuffer(api),
            color_rbo: RenderbufferHandle::NONE,
            depth_rbo: RenderbufferHandle::NONE,
            color_texture: TextureHandle::NONE,
            depth_texture: TextureHandle::NONE,
            width: params.width,
            height: params.height,
            depth: depth_bits(params.depth),
            samples,
        };
        gl.bind_framebuffer(api, FramebufferTarget::Both, fb.fbo);

        match kind(params.color) {
            AttachmentKind::Renderbuffer => {
                fb.color_rbo = fb.attach_renderbuffer(gl, Attachment::Color, RenderbufferFormat::Rgba8);
            }
            AttachmentKind::Texture => {
                fb.color_texture = fb.attach_texture(gl, Attachment::Color, unit, restore);
            }
            AttachmentKind::None => {}
        }

        match kind(params.depth_attachment) {
            AttachmentKind::Renderbuffer => {
                let format = RenderbufferFormat::Depth(fb.depth);
                fb.depth_rbo = fb.attach_renderbuffer(gl, Attachment::Depth, format);
            }
            AttachmentKind::Texture => {
                fb.depth_texture = fb.attach_texture(gl, Attachment::Depth, unit, restore);
            }
            AttachmentKind::None => {}
        }

        let status = gl.check_framebuffer_status(api);
        if status != FramebufferStatus::Complete {
            log::error!("framebuffer {}x{} is incomplete: {status}", fb.width, fb.height);
            fb.release(gl);
            gl.bind_framebuffer(api, FramebufferTarget::Both, binding.current());
            return Err(DeviceError::FramebufferIncomplete(status));
        }

        gl.bind_framebuffer(api, FramebufferTarget::Both, binding.current());
        log::debug!(
            "created framebuffer {} ({}x{}, depth {}, samples {})",
            fb.fbo.0,
            fb.width,
            fb.height,
            fb.depth,
            fb.samples
        );
        Ok(fb)
    }

    fn attach_renderbuffer(
        &self,
        gl: &mut dyn GlContext,
        attachment: Attachment,
        format: RenderbufferFormat,
    ) -> RenderbufferHandle {
        let rbo = gl.gen_renderbuffer(self.api);
        gl.renderbuffer_storage(self.api, rbo, format, self.samples, self.width, self.height);
        gl.attach_renderbuffer(self.api, attachment, rbo);
        rbo
    }

    fn attach_texture(
        &self,
        gl: &mut dyn GlContext,
        attachment: Attachment,
        unit: u32,
        restore: TextureHandle,
    ) -> TextureHandle {
        let texture = gl.gen_texture();
        gl.active_texture(unit);
        gl.bind_texture(texture);

        let (internal, layout) = match attachment {
            Attachment::Color => (InternalFormat::Rgba, PixelLayout::Rgba),
            Attachment::Depth => (InternalFormat::Depth(self.depth), PixelLayout::Depth),
        };
        gl.tex_image_2d(&TexImage {
            level: 0,
            internal,
            width: self.width,
            height: self.height,
            layout,
            data: None,
        });
        gl.tex_parameter(TexParam::MinFilter(MinFilter::Linear));
        gl.tex_parameter(TexParam::MagFilter(MagFilter::Linear));

        if attachment == Attachment::Depth {
            gl.tex_parameter(TexParam::WrapS(TexWrapMode::ClampToBorder));
            gl.tex_parameter(TexParam::WrapT(TexWrapMode::ClampToBorder));
            gl.tex_parameter(TexParam::BorderColor(Color::WHITE));
            gl.tex_parameter(TexParam::DepthCompare(Some(CompFunc::LessEqual)));
        } else {
            gl.tex_parameter(TexParam::WrapS(TexWrapMode::Clamp));
            gl.tex_parameter(TexParam::WrapT(TexWrapMode::Clamp));
        }

        gl.attach_texture(self.api, attachment, texture);
        gl.bind_texture(restore);
        texture
    }

    /// Deletes every object this framebuffer owns.
    fn release(&mut self, gl: &mut dyn GlContext) {
        if !self.color_rbo.is_none() {
            gl.delete_renderbuffer(self.api, self.color_rbo);
            self.color_rbo = RenderbufferHandle::NONE;
        }
        if !self.depth_rbo.is_none() {
            gl.delete_renderbuffer(self.api, self.depth_rbo);
            self.depth_rbo = RenderbufferHandle::NONE;
        }
        if !self.color_texture.is_none() {
            gl.delete_texture(self.color_texture);
            self.color_texture = TextureHandle::NONE;
        }
        if !self.depth_texture.is_none() {
            gl.delete_texture(self.depth_texture);
            self.depth_texture = TextureHandle::NONE;
        }
        if !self.fbo.is_none() {
            gl.delete_framebuffer(self.api, self.fbo);
            self.fbo = FramebufferHandle::NONE;
        }
    }
}

impl Framebuffer for GlFramebuffer {
    fn is_default(&self) -> bool {
        false
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn depth(&self) -> u8 {
        self.depth
    }

    fn samples(&self) -> u32 {
        self.samples
    }

    fn color_texture(&self) -> TextureHandle {
        self.color_texture
    }

    fn depth_texture(&self) -> TextureHandle {
        self.depth_texture
    }

    fn bind(&self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding) {
        binding.bind(gl, self.api, self.fbo);
    }

    fn unbind(&self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding) {
        binding.bind(gl, self.api, FramebufferHandle::NONE);
    }

    fn copy_to_screen(
        &self,
        gl: &mut dyn GlContext,
        binding: &mut FramebufferBinding,
        src: [i32; 4],
        dst: [i32; 4],
    ) {
        gl.bind_framebuffer(self.api, FramebufferTarget::Read, self.fbo);
        gl.bind_framebuffer(self.api, FramebufferTarget::Draw, FramebufferHandle::NONE);
        gl.blit_framebuffer(self.api, src, dst);
        gl.bind_framebuffer(self.api, FramebufferTarget::Both, binding.current());
    }

    fn destroy(&mut self, gl: &mut dyn GlContext, binding: &mut FramebufferBinding) {
        if binding.current() == self.fbo && !self.fbo.is_none() {
            binding.bind(gl, self.api, FramebufferHandle::NONE);
        }
        self.release(gl);
    }
}

// ── registry ──────────────────────────────────────────────────────────────

/// Framebuffers of one device, keyed by name.
#[derive(Debug)]
pub struct FramebufferSet {
    default: DefaultFramebuffer,
    offscreen: HashMap<String, GlFramebuffer>,
    binding: FramebufferBinding,
}

impl FramebufferSet {
    pub fn new(default: DefaultFramebuffer) -> Self {
        Self { default, offscreen: HashMap::new(), binding: FramebufferBinding::default() }
    }

    #[inline]
    pub fn binding(&self) -> &FramebufferBinding {
        &self.binding
    }

    pub fn default_framebuffer(&self) -> &DefaultFramebuffer {
        &self.default
    }

    pub fn resize_default(&mut self, width: u32, height: u32) {
        self.default.resize(width, height);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Framebuffer> {
        if name == DEFAULT_FRAMEBUFFER {
            return Some(&self.default);
        }
        self.offscreen.get(name).map(|fb| fb as &dyn Framebuffer)
    }

    pub fn len(&self) -> usize {
        self.offscreen.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn create(
        &mut self,
        gl: &mut dyn GlContext,
        name: &str,
        params: &FramebufferParams,
        caps: &Capabilities,
        unit: u32,
        restore: TextureHandle,
    ) -> DeviceResult<&dyn Framebuffer> {
        if name == DEFAULT_FRAMEBUFFER {
            return Err(DeviceError::ReservedFramebuffer(name.to_owned()));
        }
        if self.offscreen.contains_key(name) {
            return Err(DeviceError::FramebufferExists(name.to_owned()));
        }
        let Some(api) = caps.framebuffer.api() else {
            return Err(DeviceError::FramebufferUnsupported);
        };

        let fb = GlFramebuffer::create(gl, &mut self.binding, api, params, caps, unit, restore)?;
        let fb: &dyn Framebuffer = self.offscreen.entry(name.to_owned()).or_insert(fb);
        Ok(fb)
    }

    /// Deletes `name`. The default framebuffer is never deleted.
    pub fn delete(&mut self, gl: &mut dyn GlContext, name: &str) -> bool {
        if name == DEFAULT_FRAMEBUFFER {
            return false;
        }
        match self.offscreen.remove(name) {
            Some(mut fb) => {
                fb.destroy(gl, &mut self.binding);
                log::debug!("deleted framebuffer \"{name}\"");
                true
            }
            None => false,
        }
    }

    fn with<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&dyn Framebuffer, &mut FramebufferBinding) -> R,
    ) -> Option<R> {
        let fb: &dyn Framebuffer = if name == DEFAULT_FRAMEBUFFER {
            &self.default
        } else {
            self.offscreen.get(name)?
        };
        Some(f(fb, &mut self.binding))
    }

    pub fn bind(&mut self, gl: &mut dyn GlContext, name: &str) -> bool {
        self.with(name, |fb, binding| fb.bind(gl, binding)).is_some()
    }

    pub fn unbind(&mut self, gl: &mut dyn GlContext, name: &str) -> bool {
        self.with(name, |fb, binding| fb.unbind(gl, binding)).is_some()
    }

    pub fn copy_to_screen(&mut self, gl: &mut dyn GlContext, name: &str, src: [i32; 4], dst: [i32; 4]) -> bool {
        self.with(name, |fb, binding| fb.copy_to_screen(gl, binding, src, dst)).is_some()
    }

    /// Deletes every offscreen framebuffer and rebinds the window surface.
    pub fn destroy_all(&mut self, gl: &mut dyn GlContext) {
        for (name, mut fb) in self.offscreen.drain() {
            fb.destroy(gl, &mut self.binding);
            log::debug!("deleted framebuffer \"{name}\"");
        }
        if !self.binding.current().is_none() {
            self.default.bind(gl, &mut self.binding);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessConfig, HeadlessContext};
    use crate::device::caps::FramebufferSupport;

    fn caps(multisample: bool) -> Capabilities {
        Capabilities {
            framebuffer: FramebufferSupport::Core,
            multisampling_supported: multisample,
            max_samples: if multisample { 4 } else { 1 },
            ..Capabilities::default()
        }
    }

    fn set() -> FramebufferSet {
        FramebufferSet::new(DefaultFramebuffer::new(800, 600, 24, Some(FramebufferApi::Core)))
    }

    // ── default protection ────────────────────────────────────────────────

    #[test]
    fn default_name_is_reserved() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut fbs = set();
        let err = fbs
            .create(&mut gl, DEFAULT_FRAMEBUFFER, &FramebufferParams::default(), &caps(true), 0, TextureHandle::NONE)
            .err();
        assert!(matches!(err, Some(DeviceError::ReservedFramebuffer(_))));

        assert!(!fbs.delete(&mut gl, DEFAULT_FRAMEBUFFER));
        let default = fbs.get(DEFAULT_FRAMEBUFFER).expect("default always exists");
        assert!(default.is_default());
        assert_eq!((default.width(), default.height()), (800, 600));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut fbs = set();
        let params = FramebufferParams::default();
        assert!(fbs.create(&mut gl, "shadow", &params, &caps(true), 0, TextureHandle::NONE).is_ok());
        let err = fbs.create(&mut gl, "shadow", &params, &caps(true), 0, TextureHandle::NONE).err();
        assert!(matches!(err, Some(DeviceError::FramebufferExists(_))));
    }

    #[test]
    fn creation_needs_framebuffer_support() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut fbs = set();
        let err = fbs
            .create(&mut gl, "x", &FramebufferParams::default(), &Capabilities::default(), 0, TextureHandle::NONE)
            .err();
        assert!(matches!(err, Some(DeviceError::FramebufferUnsupported)));
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn samples_clamp_to_one_without_multisampling() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut fbs = set();
        let params = FramebufferParams { samples: 4, ..FramebufferParams::default() };
        let fb = fbs.create(&mut gl, "msaa", &params, &caps(false), 0, TextureHandle::NONE).expect("complete");
        assert_eq!(fb.samples(), 1);
    }

    #[test]
    fn samples_clamp_to_hardware_maximum() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut fbs = set();
        let params = FramebufferParams { samples: 16, ..FramebufferParams::default() };
        let fb = fbs.create(&mut gl, "msaa", &params, &caps(true), 0, TextureHandle::NONE).expect("complete");
        assert_eq!(fb.samples(), 4);
    }

    #[test]
    fn incomplete_framebuffer_is_torn_down() {
        let mut gl = HeadlessContext::new(HeadlessConfig {
            framebuffer_status: FramebufferStatus::IncompleteAttachment,
            ..HeadlessConfig::default()
        });
        let log = gl.log();
        let mut fbs = set();
        let params = FramebufferParams { color: AttachmentKind::Texture, ..FramebufferParams::default() };
        let err = fbs.create(&mut gl, "bad", &params, &caps(true), 0, TextureHandle::NONE).err();
        assert!(matches!(
            err,
            Some(DeviceError::FramebufferIncomplete(FramebufferStatus::IncompleteAttachment))
        ));
        assert_eq!(log.live_framebuffers(), 0);
        assert_eq!(log.live_renderbuffers(), 0);
        assert_eq!(log.live_textures(), 0);
        assert!(fbs.get("bad").is_none());
    }

    #[test]
    fn texture_attachments_are_exposed() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut fbs = set();
        let params = FramebufferParams {
            color: AttachmentKind::None,
            depth_attachment: AttachmentKind::Texture,
            depth: 20,
            ..FramebufferParams::default()
        };
        let fb = fbs.create(&mut gl, "shadow", &params, &caps(true), 0, TextureHandle::NONE).expect("complete");
        assert!(fb.color_texture().is_none());
        assert!(!fb.depth_texture().is_none());
        assert_eq!(fb.depth(), 24);
    }

    // ── binding ───────────────────────────────────────────────────────────

    #[test]
    fn copy_to_screen_restores_binding() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        let mut fbs = set();
        fbs.create(&mut gl, "a", &FramebufferParams::default(), &caps(true), 0, TextureHandle::NONE)
            .expect("complete");
        fbs.create(&mut gl, "b", &FramebufferParams::default(), &caps(true), 0, TextureHandle::NONE)
            .expect("complete");

        assert!(fbs.bind(&mut gl, "a"));
        let a = fbs.binding().current();
        assert!(fbs.copy_to_screen(&mut gl, "b", [0, 0, 64, 64], [0, 0, 64, 64]));
        assert_eq!(log.count("blit_framebuffer"), 1);
        assert_eq!(log.bound_framebuffer(), a);
        assert!(!fbs.bind(&mut gl, "missing"));
    }

    #[test]
    fn separate_sets_track_bindings_independently() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut first = set();
        let second = set();
        first
            .create(&mut gl, "a", &FramebufferParams::default(), &caps(true), 0, TextureHandle::NONE)
            .expect("complete");
        first.bind(&mut gl, "a");
        assert!(!first.binding().current().is_none());
        assert!(second.binding().current().is_none());
    }

    #[test]
    fn destroy_all_rebinds_default() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        let mut fbs = set();
        fbs.create(&mut gl, "a", &FramebufferParams::default(), &caps(true), 0, TextureHandle::NONE)
            .expect("complete");
        fbs.bind(&mut gl, "a");
        fbs.destroy_all(&mut gl);
        assert_eq!(log.live_framebuffers(), 0);
        assert!(log.bound_framebuffer().is_none());
        assert_eq!(fbs.len(), 1);
    }
}
