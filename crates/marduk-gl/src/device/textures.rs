//! Texture resource manager.
//!
//! Owns every texture a device creates. Units only hold copies of the
//! [`Texture`] value; the registry here is the single place a handle is freed.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::context::{
    GlContext, InternalFormat, MagFilter, MinFilter, PixelLayout, TexImage, TexParam,
    TextureHandle,
};
use crate::types::{
    ChannelMasks, Color, CompFunc, ImageData, TexFilter, TexImgFormat, TexWrapMode, Texture,
    TextureCreateParams, TextureSize, TextureStageParams,
};

use super::caps::Capabilities;
use super::init::RenderSettings;

/// Why image data could not become a texture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureError {
    #[error("image has zero size")]
    Empty,

    #[error("image data too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown pixel format ({bytes_per_pixel} bytes per pixel)")]
    UnknownFormat { bytes_per_pixel: u8 },

    #[error("image {width}x{height} exceeds maximum texture size {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("texture is not valid")]
    InvalidTexture,

    #[error("depth textures require shadow mapping support")]
    DepthUnsupported,
}

/// How mipmaps get generated after an upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MipmapPath {
    /// Legacy per-texture parameter, set before the upload.
    AutoParameter,
    /// Explicit generation call after the upload.
    Generate,
}

/// Pixel data ready for upload.
#[derive(Debug)]
struct PreparedImage<'a> {
    pixels: Cow<'a, [u8]>,
    layout: PixelLayout,
    alpha: bool,
    size: TextureSize,
}

fn layout_of(format: TexImgFormat, image: &ImageData<'_>) -> Result<(PixelLayout, bool, bool), TextureError> {
    // (layout, alpha, needs conversion to RGBA)
    let explicit = match format {
        TexImgFormat::Rgb => Some((PixelLayout::Rgb, false)),
        TexImgFormat::Bgr => Some((PixelLayout::Bgr, false)),
        TexImgFormat::Rgba => Some((PixelLayout::Rgba, true)),
        TexImgFormat::Bgra => Some((PixelLayout::Bgra, true)),
        TexImgFormat::Auto => None,
    };
    if let Some((layout, alpha)) = explicit {
        return Ok((layout, alpha, false));
    }

    let m = image.masks;
    match image.bytes_per_pixel {
        4 if m == ChannelMasks::BGRA => Ok((PixelLayout::Bgra, true, false)),
        4 if m == ChannelMasks::RGBA => Ok((PixelLayout::Rgba, true, false)),
        3 if m == ChannelMasks::BGR => Ok((PixelLayout::Bgr, false, false)),
        3 if m == ChannelMasks::RGB => Ok((PixelLayout::Rgb, false, false)),
        3 | 4 => Ok((PixelLayout::Rgba, m.a != 0, true)),
        other => Err(TextureError::UnknownFormat { bytes_per_pixel: other }),
    }
}

fn extract(word: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    ((word & mask) >> mask.trailing_zeros()) as u8
}

/// Repacks arbitrary 3/4-byte pixels into RGBA using the channel masks.
fn convert_to_rgba(image: &ImageData<'_>) -> Vec<u8> {
    let bpp = image.bytes_per_pixel as usize;
    let m = image.masks;
    let mut out = Vec::with_capacity(image.width as usize * image.height as usize * 4);
    for px in image.pixels[..image.expected_len()].chunks_exact(bpp) {
        let mut bytes = [0u8; 4];
        bytes[..bpp].copy_from_slice(px);
        let word = u32::from_le_bytes(bytes);
        let a = if m.a == 0 { 255 } else { extract(word, m.a) };
        out.extend_from_slice(&[extract(word, m.r), extract(word, m.g), extract(word, m.b), a]);
    }
    out
}

/// Copies `pixels` into the top-left corner of a zeroed power-of-two image.
fn pad_to_power_of_two(pixels: &[u8], size: TextureSize, bpp: usize) -> (Vec<u8>, TextureSize) {
    let padded = size.next_power_of_two();
    let src_row = size.width as usize * bpp;
    let dst_row = padded.width as usize * bpp;
    let mut out = vec![0u8; dst_row * padded.height as usize];
    for (y, row) in pixels.chunks_exact(src_row).take(size.height as usize).enumerate() {
        out[y * dst_row..y * dst_row + src_row].copy_from_slice(row);
    }
    (out, padded)
}

fn prepare<'a>(
    image: &ImageData<'a>,
    format: TexImgFormat,
    pad: bool,
) -> Result<PreparedImage<'a>, TextureError> {
    if image.width == 0 || image.height == 0 {
        return Err(TextureError::Empty);
    }
    if image.bytes_per_pixel == 0 {
        return Err(TextureError::UnknownFormat { bytes_per_pixel: 0 });
    }
    let expected = image.expected_len();
    if image.pixels.len() < expected {
        return Err(TextureError::Truncated { expected, actual: image.pixels.len() });
    }

    let (layout, alpha, convert) = layout_of(format, image)?;
    if layout.bytes_per_pixel() != image.bytes_per_pixel as usize && !convert {
        return Err(TextureError::UnknownFormat { bytes_per_pixel: image.bytes_per_pixel });
    }

    let pixels: Cow<'a, [u8]> = if convert {
        log::debug!("converting {}-byte pixels to RGBA", image.bytes_per_pixel);
        Cow::Owned(convert_to_rgba(image))
    } else {
        Cow::Borrowed(&image.pixels[..expected])
    };

    let size = image.size();
    if pad && !size.is_power_of_two() {
        let (padded, padded_size) = pad_to_power_of_two(&pixels, size, layout.bytes_per_pixel());
        return Ok(PreparedImage { pixels: Cow::Owned(padded), layout, alpha, size: padded_size });
    }

    Ok(PreparedImage { pixels, layout, alpha, size })
}

fn filters(filter: TexFilter, mipmap: bool) -> (MinFilter, MagFilter) {
    match (filter, mipmap) {
        (TexFilter::Nearest, false) => (MinFilter::Nearest, MagFilter::Nearest),
        (TexFilter::Nearest, true) => (MinFilter::NearestMipmapNearest, MagFilter::Nearest),
        (TexFilter::Bilinear, false) | (TexFilter::Trilinear, false) => {
            (MinFilter::Linear, MagFilter::Linear)
        }
        (TexFilter::Bilinear, true) => (MinFilter::LinearMipmapNearest, MagFilter::Linear),
        (TexFilter::Trilinear, true) => (MinFilter::LinearMipmapLinear, MagFilter::Linear),
    }
}

/// Registry of live textures plus creation/upload logic.
#[derive(Debug)]
pub struct TextureManager {
    textures: HashMap<TextureHandle, Texture>,
    mipmap_path: MipmapPath,
}

impl TextureManager {
    pub fn new(mipmap_path: MipmapPath) -> Self {
        Self { textures: HashMap::new(), mipmap_path }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn contains(&self, texture: &Texture) -> bool {
        self.textures.contains_key(&texture.handle)
    }

    /// Uploads `image` on `unit`, then rebinds `restore` there.
    ///
    /// Identical pixel data always produces a new texture.
    pub fn create(
        &mut self,
        gl: &mut dyn GlContext,
        image: &ImageData<'_>,
        params: &TextureCreateParams,
        caps: &Capabilities,
        settings: &RenderSettings,
        unit: u32,
        restore: TextureHandle,
    ) -> Result<Texture, TextureError> {
        let max = caps.max_texture_size;
        if image.width > max || image.height > max {
            return Err(TextureError::TooLarge { width: image.width, height: image.height, max });
        }

        let prepared = prepare(image, params.format, params.pad_to_power_of_two)?;

        let handle = gl.gen_texture();
        gl.active_texture(unit);
        gl.bind_texture(handle);

        let (min, mag) = filters(params.filter, params.mipmap);
        gl.tex_parameter(TexParam::MinFilter(min));
        gl.tex_parameter(TexParam::MagFilter(mag));

        if params.mipmap {
            gl.tex_parameter(TexParam::BaseLevel(0));
            gl.tex_parameter(TexParam::MaxLevel(settings.mipmap_level as i32));
            if self.mipmap_path == MipmapPath::AutoParameter {
                gl.tex_parameter(TexParam::AutoMipmap(true));
            }
        } else {
            gl.tex_parameter(TexParam::MaxLevel(0));
        }

        if caps.anisotropy_supported && params.filter == TexFilter::Trilinear {
            let level = settings.anisotropy_level.clamp(1.0, caps.max_anisotropy);
            gl.tex_parameter(TexParam::MaxAnisotropy(level));
        }

        gl.tex_image_2d(&TexImage {
            level: 0,
            internal: if prepared.alpha { InternalFormat::Rgba } else { InternalFormat::Rgb },
            width: prepared.size.width,
            height: prepared.size.height,
            layout: prepared.layout,
            data: Some(&prepared.pixels),
        });

        if params.mipmap && self.mipmap_path == MipmapPath::Generate {
            gl.generate_mipmap();
        }

        gl.bind_texture(restore);

        let texture = Texture {
            handle,
            size: prepared.size,
            original_size: image.size(),
            alpha: prepared.alpha,
        };
        self.textures.insert(handle, texture);
        log::debug!(
            "created texture {} ({}x{}, alpha: {})",
            handle.0,
            texture.size.width,
            texture.size.height,
            texture.alpha
        );
        Ok(texture)
    }

    /// Depth texture sampled with a less-or-equal comparison.
    pub fn create_depth(
        &mut self,
        gl: &mut dyn GlContext,
        width: u32,
        height: u32,
        depth_bits: u8,
        caps: &Capabilities,
        unit: u32,
        restore: TextureHandle,
    ) -> Result<Texture, TextureError> {
        if !caps.shadow_mapping_supported() {
            return Err(TextureError::DepthUnsupported);
        }
        if width == 0 || height == 0 {
            return Err(TextureError::Empty);
        }

        let handle = gl.gen_texture();
        gl.active_texture(unit);
        gl.bind_texture(handle);

        gl.tex_image_2d(&TexImage {
            level: 0,
            internal: InternalFormat::Depth(depth_bits),
            width,
            height,
            layout: PixelLayout::Depth,
            data: None,
        });

        gl.tex_parameter(TexParam::MinFilter(MinFilter::Linear));
        gl.tex_parameter(TexParam::MagFilter(MagFilter::Linear));
        gl.tex_parameter(TexParam::WrapS(TexWrapMode::ClampToBorder));
        gl.tex_parameter(TexParam::WrapT(TexWrapMode::ClampToBorder));
        gl.tex_parameter(TexParam::BorderColor(Color::WHITE));
        gl.tex_parameter(TexParam::DepthCompare(Some(CompFunc::LessEqual)));

        gl.bind_texture(restore);

        let size = TextureSize::new(width, height);
        let texture = Texture { handle, size, original_size: size, alpha: false };
        self.textures.insert(handle, texture);
        log::debug!("created {depth_bits}-bit depth texture {} ({width}x{height})", handle.0);
        Ok(texture)
    }

    /// Replaces a sub-rectangle of `texture` starting at `offset`.
    pub fn update(
        &mut self,
        gl: &mut dyn GlContext,
        texture: &Texture,
        offset: (i32, i32),
        image: &ImageData<'_>,
        format: TexImgFormat,
        unit: u32,
        restore: TextureHandle,
    ) -> Result<(), TextureError> {
        if !texture.is_valid() || !self.contains(texture) {
            return Err(TextureError::InvalidTexture);
        }
        let prepared = prepare(image, format, false)?;

        gl.active_texture(unit);
        gl.bind_texture(texture.handle);
        gl.tex_sub_image_2d(
            offset.0,
            offset.1,
            prepared.size.width,
            prepared.size.height,
            prepared.layout,
            &prepared.pixels,
        );
        gl.bind_texture(restore);
        Ok(())
    }

    /// Frees one texture. Unknown or invalid textures are ignored.
    pub fn destroy(&mut self, gl: &mut dyn GlContext, texture: &Texture) -> bool {
        if self.textures.remove(&texture.handle).is_none() {
            return false;
        }
        gl.delete_texture(texture.handle);
        log::debug!("destroyed texture {}", texture.handle.0);
        true
    }

    pub fn destroy_all(&mut self, gl: &mut dyn GlContext) {
        if !self.textures.is_empty() {
            log::debug!("destroying {} textures", self.textures.len());
        }
        for (handle, _) in self.textures.drain() {
            gl.delete_texture(handle);
        }
    }
}

// ── unit bookkeeping ──────────────────────────────────────────────────────

/// What one texture unit currently holds.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct UnitState {
    pub texture: Texture,
    pub enabled: bool,
    pub params: TextureStageParams,
}

/// Per-unit texture, enable flag and stage parameters.
#[derive(Debug, Clone)]
pub struct TextureBindings {
    units: Vec<UnitState>,
}

impl TextureBindings {
    pub fn new(count: usize) -> Self {
        Self { units: vec![UnitState::default(); count] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[track_caller]
    fn check(&self, unit: usize) {
        assert!(unit < self.units.len(), "texture unit {unit} out of range (max {})", self.units.len());
    }

    #[track_caller]
    pub fn get(&self, unit: usize) -> &UnitState {
        self.check(unit);
        &self.units[unit]
    }

    #[track_caller]
    pub fn get_mut(&mut self, unit: usize) -> &mut UnitState {
        self.check(unit);
        &mut self.units[unit]
    }

    /// Records `texture` on `unit`. Returns `false` when the unit already held
    /// it, meaning no driver work is needed.
    #[track_caller]
    pub fn bind(&mut self, unit: usize, texture: Texture) -> bool {
        let slot = self.get_mut(unit);
        if slot.texture == texture {
            return false;
        }
        slot.texture = texture;
        true
    }

    /// Clears every unit holding `handle`, returning their indices.
    pub fn unbind_everywhere(&mut self, handle: TextureHandle) -> Vec<usize> {
        let mut cleared = Vec::new();
        for (i, slot) in self.units.iter_mut().enumerate() {
            if slot.texture.handle == handle {
                slot.texture = Texture::invalid();
                cleared.push(i);
            }
        }
        cleared
    }

    pub fn clear_textures(&mut self) {
        for slot in &mut self.units {
            slot.texture = Texture::invalid();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessConfig, HeadlessContext};

    fn caps() -> Capabilities {
        Capabilities {
            max_texture_size: 256,
            anisotropy_supported: true,
            max_anisotropy: 8.0,
            ..Capabilities::default()
        }
    }

    fn create(
        mgr: &mut TextureManager,
        gl: &mut HeadlessContext,
        image: &ImageData<'_>,
        params: &TextureCreateParams,
    ) -> Result<Texture, TextureError> {
        mgr.create(gl, image, params, &caps(), &RenderSettings::default(), 0, TextureHandle::NONE)
    }

    // ── format detection ──────────────────────────────────────────────────

    #[test]
    fn auto_format_reads_channel_masks() {
        let px = [0u8; 16];
        let bgra = ImageData::bgra(&px, 2, 2);
        assert_eq!(layout_of(TexImgFormat::Auto, &bgra), Ok((PixelLayout::Bgra, true, false)));
        let rgb = ImageData::rgb(&px, 2, 2);
        assert_eq!(layout_of(TexImgFormat::Auto, &rgb), Ok((PixelLayout::Rgb, false, false)));
    }

    #[test]
    fn unusual_masks_convert_to_rgba() {
        // ARGB in memory order A, R, G, B
        let masks = ChannelMasks { a: 0x0000_00FF, r: 0x0000_FF00, g: 0x00FF_0000, b: 0xFF00_0000 };
        let px = [10u8, 20, 30, 40];
        let image = ImageData { pixels: &px, width: 1, height: 1, bytes_per_pixel: 4, masks };
        let prepared = prepare(&image, TexImgFormat::Auto, false).expect("convertible");
        assert_eq!(prepared.layout, PixelLayout::Rgba);
        assert_eq!(&*prepared.pixels, &[20, 30, 40, 10]);
    }

    #[test]
    fn two_byte_pixels_are_rejected() {
        let px = [0u8; 8];
        let image = ImageData { pixels: &px, width: 2, height: 2, bytes_per_pixel: 2, masks: ChannelMasks::default() };
        assert_eq!(
            prepare(&image, TexImgFormat::Auto, false).unwrap_err(),
            TextureError::UnknownFormat { bytes_per_pixel: 2 }
        );
    }

    #[test]
    fn padding_keeps_rows_in_place() {
        let px: Vec<u8> = (1..=9).collect();
        let (out, size) = pad_to_power_of_two(&px, TextureSize::new(3, 1), 3);
        assert_eq!(size, TextureSize::new(4, 1));
        assert_eq!(&out[..9], &px[..]);
        assert_eq!(&out[9..], &[0, 0, 0]);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn identical_data_yields_distinct_textures() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut mgr = TextureManager::new(MipmapPath::Generate);
        let px = [255u8; 16];
        let image = ImageData::rgba(&px, 2, 2);
        let a = create(&mut mgr, &mut gl, &image, &TextureCreateParams::default()).expect("valid");
        let b = create(&mut mgr, &mut gl, &image, &TextureCreateParams::default()).expect("valid");
        assert_ne!(a, b);
        assert_eq!(mgr.len(), 2);
    }

    #[test]
    fn truncated_data_is_reported() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut mgr = TextureManager::new(MipmapPath::Generate);
        let px = [0u8; 10];
        let err = create(&mut mgr, &mut gl, &ImageData::rgba(&px, 2, 2), &TextureCreateParams::default())
            .unwrap_err();
        assert_eq!(err, TextureError::Truncated { expected: 16, actual: 10 });
        assert!(mgr.is_empty());
    }

    #[test]
    fn oversized_images_are_rejected() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut mgr = TextureManager::new(MipmapPath::Generate);
        let px = vec![0u8; 512 * 4];
        let err = create(&mut mgr, &mut gl, &ImageData::rgba(&px, 512, 1), &TextureCreateParams::default())
            .unwrap_err();
        assert!(matches!(err, TextureError::TooLarge { max: 256, .. }));
    }

    #[test]
    fn padded_texture_remembers_original_size() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut mgr = TextureManager::new(MipmapPath::Generate);
        let px = vec![0u8; 3 * 5 * 3];
        let params = TextureCreateParams { pad_to_power_of_two: true, ..TextureCreateParams::default() };
        let t = create(&mut mgr, &mut gl, &ImageData::rgb(&px, 3, 5), &params).expect("valid");
        assert_eq!(t.size, TextureSize::new(4, 8));
        assert_eq!(t.original_size, TextureSize::new(3, 5));
        assert!(!t.alpha);
    }

    #[test]
    fn mipmap_path_selects_generation_call() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        let px = [0u8; 16];
        let params = TextureCreateParams { mipmap: true, filter: TexFilter::Trilinear, ..TextureCreateParams::default() };

        let mut legacy = TextureManager::new(MipmapPath::AutoParameter);
        create(&mut legacy, &mut gl, &ImageData::rgba(&px, 2, 2), &params).expect("valid");
        assert_eq!(log.count("generate_mipmap"), 0);

        let mut modern = TextureManager::new(MipmapPath::Generate);
        create(&mut modern, &mut gl, &ImageData::rgba(&px, 2, 2), &params).expect("valid");
        assert_eq!(log.count("generate_mipmap"), 1);
    }

    #[test]
    fn depth_texture_needs_shadow_support() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let mut mgr = TextureManager::new(MipmapPath::Generate);
        let err = mgr
            .create_depth(&mut gl, 64, 64, 24, &Capabilities::default(), 0, TextureHandle::NONE)
            .unwrap_err();
        assert_eq!(err, TextureError::DepthUnsupported);
    }

    #[test]
    fn destroy_all_frees_every_handle() {
        let mut gl = HeadlessContext::new(HeadlessConfig::default());
        let log = gl.log();
        let mut mgr = TextureManager::new(MipmapPath::Generate);
        let px = [0u8; 4];
        for _ in 0..3 {
            create(&mut mgr, &mut gl, &ImageData::rgba(&px, 1, 1), &TextureCreateParams::default())
                .expect("valid");
        }
        assert_eq!(log.live_textures(), 3);
        mgr.destroy_all(&mut gl);
        assert_eq!(log.live_textures(), 0);
        assert!(mgr.is_empty());
    }

    // ── bindings ──────────────────────────────────────────────────────────

    #[test]
    fn rebinding_same_texture_is_a_no_op() {
        let mut b = TextureBindings::new(2);
        let t = Texture { handle: TextureHandle(7), ..Texture::default() };
        assert!(b.bind(0, t));
        assert!(!b.bind(0, t));
        assert!(b.bind(1, t));
        assert_eq!(b.unbind_everywhere(TextureHandle(7)), vec![0, 1]);
        assert!(!b.get(0).texture.is_valid());
    }

    #[test]
    #[should_panic]
    fn unit_out_of_range_panics() {
        let b = TextureBindings::new(2);
        let _ = b.get(2);
    }
}
