//! Capability probe.
//!
//! Each optional feature is resolved once through the same cascade: a version
//! that makes it core wins outright, otherwise named extensions are tried in
//! priority order, otherwise the feature is unsupported. Downstream code
//! branches on the resulting tier and never probes again.

use crate::context::{FramebufferApi, GlContext, GlVersion, Limit};

use super::BackendKind;

/// Coarse support level shared by every optional feature.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SupportTier {
    #[default]
    None,
    Extension,
    Core,
}

/// Framebuffer object support, best first: core, ARB, EXT, none.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum FramebufferSupport {
    #[default]
    None,
    Ext,
    Arb,
    Core,
}

impl FramebufferSupport {
    pub fn tier(self) -> SupportTier {
        match self {
            FramebufferSupport::None => SupportTier::None,
            FramebufferSupport::Ext | FramebufferSupport::Arb => SupportTier::Extension,
            FramebufferSupport::Core => SupportTier::Core,
        }
    }

    /// Entry points to use, or `None` when unsupported.
    pub fn api(self) -> Option<FramebufferApi> {
        match self {
            FramebufferSupport::None => None,
            FramebufferSupport::Ext => Some(FramebufferApi::Ext),
            FramebufferSupport::Arb | FramebufferSupport::Core => Some(FramebufferApi::Core),
        }
    }
}

/// Depth texture + comparison support.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ShadowSupport {
    #[default]
    None,
    Arb,
    Core,
}

impl ShadowSupport {
    pub fn tier(self) -> SupportTier {
        match self {
            ShadowSupport::None => SupportTier::None,
            ShadowSupport::Arb => SupportTier::Extension,
            ShadowSupport::Core => SupportTier::Core,
        }
    }
}

/// Vertex buffer object support.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BufferSupport {
    /// Static geometry falls back to display lists.
    #[default]
    None,
    Arb,
    Core,
}

impl BufferSupport {
    pub fn tier(self) -> SupportTier {
        match self {
            BufferSupport::None => SupportTier::None,
            BufferSupport::Arb => SupportTier::Extension,
            BufferSupport::Core => SupportTier::Core,
        }
    }
}

/// Hardware limits and feature tiers, fixed after device creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub version: GlVersion,
    pub max_lights: usize,
    /// Texture units usable by this backend.
    pub max_textures: usize,
    pub max_texture_size: u32,
    pub anisotropy_supported: bool,
    pub max_anisotropy: f32,
    pub multisampling_supported: bool,
    pub max_samples: u32,
    pub shadow_mapping: ShadowSupport,
    pub framebuffer: FramebufferSupport,
    pub vertex_buffers: BufferSupport,
    pub multi_draw_arrays: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            version: GlVersion::default(),
            max_lights: 8,
            max_textures: 1,
            max_texture_size: 1024,
            anisotropy_supported: false,
            max_anisotropy: 1.0,
            multisampling_supported: false,
            max_samples: 1,
            shadow_mapping: ShadowSupport::None,
            framebuffer: FramebufferSupport::None,
            vertex_buffers: BufferSupport::None,
            multi_draw_arrays: false,
        }
    }
}

impl Capabilities {
    #[inline]
    pub fn shadow_mapping_supported(&self) -> bool {
        self.shadow_mapping != ShadowSupport::None
    }

    #[inline]
    pub fn framebuffer_supported(&self) -> bool {
        self.framebuffer != FramebufferSupport::None
    }

    /// More than one texture unit is available.
    #[inline]
    pub fn multitexturing(&self) -> bool {
        self.max_textures > 1
    }
}

// ── probing ───────────────────────────────────────────────────────────────

/// Resolves one feature: `core` when the version already includes it,
/// otherwise the first candidate whose extensions are all present.
///
/// No extension is queried when the version check succeeds.
pub fn cascade<T: Copy>(
    gl: &mut dyn GlContext,
    core_version: (u8, u8),
    core: T,
    candidates: &[(&[&str], T)],
    none: T,
) -> T {
    let version = gl.version();
    if version.at_least(core_version.0, core_version.1) {
        return core;
    }

    candidates
        .iter()
        .find(|(names, _)| names.iter().all(|name| gl.has_extension(name)))
        .map(|(_, tier)| *tier)
        .unwrap_or(none)
}

pub fn probe_framebuffer(gl: &mut dyn GlContext) -> FramebufferSupport {
    cascade(
        gl,
        (3, 0),
        FramebufferSupport::Core,
        &[
            (&["GL_ARB_framebuffer_object"], FramebufferSupport::Arb),
            (&["GL_EXT_framebuffer_object"], FramebufferSupport::Ext),
        ],
        FramebufferSupport::None,
    )
}

pub fn probe_shadow_mapping(gl: &mut dyn GlContext) -> ShadowSupport {
    cascade(
        gl,
        (1, 4),
        ShadowSupport::Core,
        &[(&["GL_ARB_depth_texture", "GL_ARB_shadow"], ShadowSupport::Arb)],
        ShadowSupport::None,
    )
}

pub fn probe_vertex_buffers(gl: &mut dyn GlContext) -> BufferSupport {
    cascade(
        gl,
        (1, 5),
        BufferSupport::Core,
        &[(&["GL_ARB_vertex_buffer_object"], BufferSupport::Arb)],
        BufferSupport::None,
    )
}

/// Queries everything `kind` needs and logs each result.
pub fn probe(gl: &mut dyn GlContext, kind: BackendKind) -> Capabilities {
    let version = gl.version();
    log::info!("OpenGL version {version}, probing for {kind:?} backend");

    let mut caps = Capabilities { version, ..Capabilities::default() };

    caps.max_texture_size = gl.get_integer(Limit::MaxTextureSize).max(1) as u32;

    let (units, lights) = match kind {
        BackendKind::FixedFunction => (
            gl.get_integer(Limit::MaxTextureUnits),
            gl.get_integer(Limit::MaxLights),
        ),
        BackendKind::Shader | BackendKind::Core => (gl.get_integer(Limit::MaxTextureImageUnits), 8),
    };
    caps.max_textures = units.max(1) as usize;
    caps.max_lights = lights.max(0) as usize;
    log::info!("texture units: {}, lights: {}", caps.max_textures, caps.max_lights);

    caps.anisotropy_supported = cascade(
        gl,
        (4, 6),
        true,
        &[
            (&["GL_EXT_texture_filter_anisotropic"], true),
            (&["GL_ARB_texture_filter_anisotropic"], true),
        ],
        false,
    );
    if caps.anisotropy_supported {
        caps.max_anisotropy = gl.max_anisotropy().max(1.0);
        log::info!("anisotropic filtering supported, max level {}", caps.max_anisotropy);
    } else {
        log::info!("anisotropic filtering not supported");
    }

    caps.framebuffer = match kind {
        BackendKind::Core => FramebufferSupport::Core,
        _ => probe_framebuffer(gl),
    };
    log::info!("framebuffer objects: {:?}", caps.framebuffer);

    caps.multisampling_supported = caps.framebuffer_supported()
        && cascade(gl, (3, 0), true, &[(&["GL_EXT_framebuffer_multisample"], true)], false);
    if caps.multisampling_supported {
        caps.max_samples = gl.get_integer(Limit::MaxSamples).max(1) as u32;
        log::info!("multisampling supported, max samples {}", caps.max_samples);
    } else {
        log::info!("multisampling not supported");
    }

    caps.shadow_mapping = match kind {
        BackendKind::FixedFunction => probe_shadow_mapping(gl),
        _ => ShadowSupport::Core,
    };
    log::info!("shadow mapping: {:?}", caps.shadow_mapping);

    caps.vertex_buffers = match kind {
        BackendKind::FixedFunction => probe_vertex_buffers(gl),
        _ => BufferSupport::Core,
    };
    log::info!("vertex buffers: {:?}", caps.vertex_buffers);

    caps.multi_draw_arrays = version.at_least(1, 4);

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessConfig, HeadlessContext};

    fn ctx(config: HeadlessConfig) -> HeadlessContext {
        HeadlessContext::new(config)
    }

    #[test]
    fn core_version_skips_extension_queries() {
        let mut gl = ctx(HeadlessConfig::with_version(4, 6));
        let log = gl.log();
        let caps = probe(&mut gl, BackendKind::FixedFunction);
        assert_eq!(log.count("has_extension"), 0);
        assert_eq!(caps.framebuffer, FramebufferSupport::Core);
        assert_eq!(caps.shadow_mapping, ShadowSupport::Core);
        assert_eq!(caps.vertex_buffers, BufferSupport::Core);
        assert!(caps.anisotropy_supported);
    }

    #[test]
    fn cascade_prefers_arb_over_ext() {
        let mut gl = ctx(
            HeadlessConfig::with_version(2, 1)
                .extension("GL_EXT_framebuffer_object")
                .extension("GL_ARB_framebuffer_object"),
        );
        assert_eq!(probe_framebuffer(&mut gl), FramebufferSupport::Arb);
    }

    #[test]
    fn cascade_falls_through_to_ext_then_none() {
        let mut gl = ctx(HeadlessConfig::with_version(1, 4).extension("GL_EXT_framebuffer_object"));
        assert_eq!(probe_framebuffer(&mut gl), FramebufferSupport::Ext);
        assert_eq!(FramebufferSupport::Ext.api(), Some(FramebufferApi::Ext));

        let mut gl = ctx(HeadlessConfig::with_version(1, 4));
        assert_eq!(probe_framebuffer(&mut gl), FramebufferSupport::None);
        assert_eq!(FramebufferSupport::None.tier(), SupportTier::None);
    }

    #[test]
    fn shadow_extension_needs_both_extensions() {
        let mut gl = ctx(HeadlessConfig::with_version(1, 3).extension("GL_ARB_depth_texture"));
        assert_eq!(probe_shadow_mapping(&mut gl), ShadowSupport::None);

        let mut gl = ctx(
            HeadlessConfig::with_version(1, 3)
                .extension("GL_ARB_depth_texture")
                .extension("GL_ARB_shadow"),
        );
        assert_eq!(probe_shadow_mapping(&mut gl), ShadowSupport::Arb);
    }

    #[test]
    fn multisampling_requires_framebuffers() {
        let mut gl = ctx(HeadlessConfig::with_version(1, 4).extension("GL_EXT_framebuffer_multisample"));
        let caps = probe(&mut gl, BackendKind::FixedFunction);
        assert!(!caps.multisampling_supported);
        assert_eq!(caps.max_samples, 1);
    }

    #[test]
    fn shader_backends_read_image_units() {
        let config = HeadlessConfig {
            max_texture_units: 4,
            max_texture_image_units: 16,
            ..HeadlessConfig::with_version(3, 3)
        };
        for kind in [BackendKind::Shader, BackendKind::Core] {
            let mut gl = ctx(config.clone());
            let caps = probe(&mut gl, kind);
            assert_eq!(caps.max_textures, 16, "{kind}");
            assert_eq!(caps.max_lights, 8, "{kind}");
            assert!(caps.multisampling_supported);
            assert_eq!(caps.max_samples, 4);
        }
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(SupportTier::Core > SupportTier::Extension);
        assert!(SupportTier::Extension > SupportTier::None);
    }
}
