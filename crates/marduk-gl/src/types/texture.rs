use core::hash::{Hash, Hasher};

use crate::context::TextureHandle;

use super::Color;

/// Texture dimensions in texels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_power_of_two(self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }

    #[inline]
    pub fn next_power_of_two(self) -> Self {
        Self::new(self.width.next_power_of_two(), self.height.next_power_of_two())
    }
}

/// Handle plus metadata of a live texture.
///
/// Equality and hashing consider the handle only. A zero handle marks an
/// invalid texture, which is what failed creation returns.
#[derive(Debug, Copy, Clone, Default)]
pub struct Texture {
    pub handle: TextureHandle,
    pub size: TextureSize,
    /// Size before power-of-two padding.
    pub original_size: TextureSize,
    pub alpha: bool,
}

impl Texture {
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.handle.is_none()
    }

    #[inline]
    pub fn invalid() -> Self {
        Self::default()
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Texture {}

impl Hash for Texture {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

// ── creation ──────────────────────────────────────────────────────────────

/// Source channel order. `Auto` inspects the image's channel masks.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TexImgFormat {
    #[default]
    Auto,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TexFilter {
    #[default]
    Nearest,
    Bilinear,
    Trilinear,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureCreateParams {
    pub format: TexImgFormat,
    pub filter: TexFilter,
    pub mipmap: bool,
    pub pad_to_power_of_two: bool,
}

impl Default for TextureCreateParams {
    fn default() -> Self {
        Self {
            format: TexImgFormat::Auto,
            filter: TexFilter::Nearest,
            mipmap: false,
            pad_to_power_of_two: false,
        }
    }
}

/// Bit masks locating each channel inside one little-endian pixel word.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ChannelMasks {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

impl ChannelMasks {
    /// Bytes in memory order R, G, B, A.
    pub const RGBA: ChannelMasks = ChannelMasks { r: 0x0000_00FF, g: 0x0000_FF00, b: 0x00FF_0000, a: 0xFF00_0000 };
    /// Bytes in memory order B, G, R, A.
    pub const BGRA: ChannelMasks = ChannelMasks { r: 0x00FF_0000, g: 0x0000_FF00, b: 0x0000_00FF, a: 0xFF00_0000 };
    pub const RGB: ChannelMasks = ChannelMasks { r: 0x0000FF, g: 0x00FF00, b: 0xFF0000, a: 0 };
    pub const BGR: ChannelMasks = ChannelMasks { r: 0xFF0000, g: 0x00FF00, b: 0x0000FF, a: 0 };
}

/// Decoded image handed over by the asset loader.
///
/// Rows are tightly packed, top row first. Decoding and file access happen
/// elsewhere.
#[derive(Debug, Copy, Clone)]
pub struct ImageData<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u8,
    pub masks: ChannelMasks,
}

impl<'a> ImageData<'a> {
    pub fn rgba(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self { pixels, width, height, bytes_per_pixel: 4, masks: ChannelMasks::RGBA }
    }

    pub fn bgra(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self { pixels, width, height, bytes_per_pixel: 4, masks: ChannelMasks::BGRA }
    }

    pub fn rgb(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self { pixels, width, height, bytes_per_pixel: 3, masks: ChannelMasks::RGB }
    }

    pub fn bgr(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self { pixels, width, height, bytes_per_pixel: 3, masks: ChannelMasks::BGR }
    }

    #[inline]
    pub fn size(&self) -> TextureSize {
        TextureSize::new(self.width, self.height)
    }

    /// Byte length a well-formed image of these dimensions must have.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }
}

// ── stage state ───────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TexWrapMode {
    Clamp,
    ClampToBorder,
    #[default]
    Repeat,
}

/// How a texture stage combines its arguments.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TexMixOperation {
    /// Previous stage result modulated by this stage's texture.
    #[default]
    Default,
    Replace,
    Modulate,
    Add,
    Subtract,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TexMixArgument {
    /// Texture bound to this stage.
    Texture,
    /// Texture bound to an explicit unit (0..=3).
    TextureUnit(u8),
    /// Result of the previous stage.
    ComputedColor,
    /// Interpolated vertex color.
    SrcColor,
    /// Stage constant (`TextureStageParams::factor`).
    Factor,
}

/// Per-unit texture combine and addressing state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureStageParams {
    pub color_operation: TexMixOperation,
    pub color_arg1: TexMixArgument,
    pub color_arg2: TexMixArgument,
    pub alpha_operation: TexMixOperation,
    pub alpha_arg1: TexMixArgument,
    pub alpha_arg2: TexMixArgument,
    pub wrap_s: TexWrapMode,
    pub wrap_t: TexWrapMode,
    pub factor: Color,
}

impl Default for TextureStageParams {
    fn default() -> Self {
        Self {
            color_operation: TexMixOperation::Default,
            color_arg1: TexMixArgument::ComputedColor,
            color_arg2: TexMixArgument::Texture,
            alpha_operation: TexMixOperation::Default,
            alpha_arg1: TexMixArgument::ComputedColor,
            alpha_arg2: TexMixArgument::Texture,
            wrap_s: TexWrapMode::Repeat,
            wrap_t: TexWrapMode::Repeat,
            factor: Color::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textures_compare_by_handle_only() {
        let a = Texture {
            handle: TextureHandle(3),
            size: TextureSize::new(4, 4),
            original_size: TextureSize::new(3, 3),
            alpha: true,
        };
        let b = Texture { handle: TextureHandle(3), ..Texture::default() };
        let c = Texture { handle: TextureHandle(4), ..a };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_handle_is_invalid() {
        assert!(!Texture::invalid().is_valid());
    }

    #[test]
    fn power_of_two_padding_rounds_each_axis() {
        let s = TextureSize::new(100, 64).next_power_of_two();
        assert_eq!(s, TextureSize::new(128, 64));
        assert!(s.is_power_of_two());
    }
}
