use core::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

use super::Color;

// ── vertex shapes ─────────────────────────────────────────────────────────

/// Position, normal and one texture coordinate set.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub coord: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// [`Vertex`] plus a second texture coordinate set.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct VertexTex2 {
    pub coord: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub uv2: [f32; 2],
}

/// Position and per-vertex color, no lighting inputs.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct VertexCol {
    pub coord: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    #[inline]
    pub const fn new(coord: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { coord, normal, uv }
    }
}

impl VertexCol {
    #[inline]
    pub fn new(coord: [f32; 3], color: Color) -> Self {
        Self { coord, color: color.to_array() }
    }
}

// ── layout descriptor ─────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ComponentType {
    U8,
    U16,
    I16,
    #[default]
    F32,
}

impl ComponentType {
    pub const fn byte_size(self) -> usize {
        match self {
            ComponentType::U8 => 1,
            ComponentType::U16 | ComponentType::I16 => 2,
            ComponentType::F32 => 4,
        }
    }
}

/// One attribute stream of an interleaved vertex array.
///
/// When `enabled` is false, `value` is used as a constant for every vertex.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VertexAttribute {
    pub enabled: bool,
    pub normalized: bool,
    pub size: u8,
    pub ty: ComponentType,
    pub offset: usize,
    pub stride: usize,
    pub value: [f32; 4],
}

impl Default for VertexAttribute {
    fn default() -> Self {
        Self::constant([0.0, 0.0, 0.0, 1.0])
    }
}

impl VertexAttribute {
    pub const fn floats(size: u8, offset: usize, stride: usize) -> Self {
        Self {
            enabled: true,
            normalized: false,
            size,
            ty: ComponentType::F32,
            offset,
            stride,
            value: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub const fn constant(value: [f32; 4]) -> Self {
        Self {
            enabled: false,
            normalized: false,
            size: 4,
            ty: ComponentType::F32,
            offset: 0,
            stride: 0,
            value,
        }
    }
}

/// Interleaved layout of an arbitrary vertex array.
///
/// Attribute slots are fixed: 0 position, 1 normal, 2 color, 3 first texture
/// coordinate, 4 second texture coordinate.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct VertexFormat {
    pub vertex: VertexAttribute,
    pub normal: VertexAttribute,
    pub color: VertexAttribute,
    pub tex1: VertexAttribute,
    pub tex2: VertexAttribute,
}

impl VertexFormat {
    pub const SLOT_COORD: u32 = 0;
    pub const SLOT_NORMAL: u32 = 1;
    pub const SLOT_COLOR: u32 = 2;
    pub const SLOT_TEX1: u32 = 3;
    pub const SLOT_TEX2: u32 = 4;

    /// Attributes paired with their slot index.
    pub fn slots(&self) -> [(u32, &VertexAttribute); 5] {
        [
            (Self::SLOT_COORD, &self.vertex),
            (Self::SLOT_NORMAL, &self.normal),
            (Self::SLOT_COLOR, &self.color),
            (Self::SLOT_TEX1, &self.tex1),
            (Self::SLOT_TEX2, &self.tex2),
        ]
    }

    /// Replaces a disabled color attribute with a constant.
    pub fn with_constant_color(mut self, color: Color) -> Self {
        if !self.color.enabled {
            self.color = VertexAttribute::constant(color.to_array());
        }
        self
    }

    /// Bytes needed to hold `count` vertices of this layout.
    pub fn byte_len(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        self.slots()
            .iter()
            .filter(|(_, a)| a.enabled)
            .map(|(_, a)| a.offset + a.stride * (count - 1) + a.size as usize * a.ty.byte_size())
            .max()
            .unwrap_or(0)
    }
}

/// Tags the three built-in vertex shapes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexShape {
    Plain,
    Tex2,
    Col,
}

impl VertexShape {
    pub const fn stride(self) -> usize {
        match self {
            VertexShape::Plain => size_of::<Vertex>(),
            VertexShape::Tex2 => size_of::<VertexTex2>(),
            VertexShape::Col => size_of::<VertexCol>(),
        }
    }

    pub fn format(self) -> VertexFormat {
        let stride = self.stride();
        match self {
            VertexShape::Plain => VertexFormat {
                vertex: VertexAttribute::floats(3, offset_of!(Vertex, coord), stride),
                normal: VertexAttribute::floats(3, offset_of!(Vertex, normal), stride),
                color: VertexAttribute::constant([1.0; 4]),
                tex1: VertexAttribute::floats(2, offset_of!(Vertex, uv), stride),
                tex2: VertexAttribute::constant([0.0, 0.0, 0.0, 1.0]),
            },
            VertexShape::Tex2 => VertexFormat {
                vertex: VertexAttribute::floats(3, offset_of!(VertexTex2, coord), stride),
                normal: VertexAttribute::floats(3, offset_of!(VertexTex2, normal), stride),
                color: VertexAttribute::constant([1.0; 4]),
                tex1: VertexAttribute::floats(2, offset_of!(VertexTex2, uv), stride),
                tex2: VertexAttribute::floats(2, offset_of!(VertexTex2, uv2), stride),
            },
            VertexShape::Col => VertexFormat {
                vertex: VertexAttribute::floats(3, offset_of!(VertexCol, coord), stride),
                normal: VertexAttribute::constant([0.0, 0.0, 1.0, 0.0]),
                color: VertexAttribute::floats(4, offset_of!(VertexCol, color), stride),
                tex1: VertexAttribute::constant([0.0, 0.0, 0.0, 1.0]),
                tex2: VertexAttribute::constant([0.0, 0.0, 0.0, 1.0]),
            },
        }
    }
}

/// Borrowed vertex array in one of the built-in shapes.
#[derive(Debug, Copy, Clone)]
pub enum Vertices<'a> {
    Plain(&'a [Vertex]),
    Tex2(&'a [VertexTex2]),
    Col(&'a [VertexCol]),
}

impl<'a> Vertices<'a> {
    pub fn shape(&self) -> VertexShape {
        match self {
            Vertices::Plain(_) => VertexShape::Plain,
            Vertices::Tex2(_) => VertexShape::Tex2,
            Vertices::Col(_) => VertexShape::Col,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vertices::Plain(v) => v.len(),
            Vertices::Tex2(v) => v.len(),
            Vertices::Col(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Vertices::Plain(v) => bytemuck::cast_slice(v),
            Vertices::Tex2(v) => bytemuck::cast_slice(v),
            Vertices::Col(v) => bytemuck::cast_slice(v),
        }
    }

    /// Layout of this array; `color` fills the color slot when the shape
    /// carries no per-vertex color.
    pub fn format(&self, color: Color) -> VertexFormat {
        self.shape().format().with_constant_color(color)
    }
}

impl<'a> From<&'a [Vertex]> for Vertices<'a> {
    fn from(v: &'a [Vertex]) -> Self {
        Vertices::Plain(v)
    }
}

impl<'a> From<&'a [VertexTex2]> for Vertices<'a> {
    fn from(v: &'a [VertexTex2]) -> Self {
        Vertices::Tex2(v)
    }
}

impl<'a> From<&'a [VertexCol]> for Vertices<'a> {
    fn from(v: &'a [VertexCol]) -> Self {
        Vertices::Col(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_strides_match_struct_sizes() {
        assert_eq!(VertexShape::Plain.stride(), 32);
        assert_eq!(VertexShape::Tex2.stride(), 40);
        assert_eq!(VertexShape::Col.stride(), 28);
    }

    #[test]
    fn byte_len_covers_last_vertex() {
        let f = VertexShape::Tex2.format();
        assert_eq!(f.byte_len(0), 0);
        assert_eq!(f.byte_len(1), 40);
        assert_eq!(f.byte_len(3), 120);
    }

    #[test]
    fn constant_color_only_fills_disabled_slot() {
        let red = Color::rgb(1.0, 0.0, 0.0);
        let plain = VertexShape::Plain.format().with_constant_color(red);
        assert_eq!(plain.color.value, [1.0, 0.0, 0.0, 1.0]);

        let col = VertexShape::Col.format().with_constant_color(red);
        assert!(col.color.enabled);
    }

    #[test]
    fn vertices_view_exposes_raw_bytes() {
        let vs = [Vertex::default(); 2];
        let v = Vertices::from(&vs[..]);
        assert_eq!(v.len(), 2);
        assert_eq!(v.as_bytes().len(), 64);
        assert_eq!(v.shape(), VertexShape::Plain);
    }
}
