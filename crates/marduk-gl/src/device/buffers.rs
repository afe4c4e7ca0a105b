//! Static vertex buffers.
//!
//! One buffer per mesh, addressed by a [`StaticBufferId`] the manager hands
//! out. Depending on what the context offers, storage is a buffer object
//! (optionally wrapped in a vertex array object) or a compiled display list.

use std::collections::HashMap;

use crate::context::{
    ArrayData, AttribSource, BufferHandle, BufferUsage, ClientArrays, DrawRanges, GlContext,
    ListHandle, VertexArrayHandle,
};
use crate::types::{PrimitiveType, VertexFormat};

/// Identifies a static buffer. The variant records what backs it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StaticBufferId {
    Buffer(u32),
    DisplayList(u32),
}

/// How a manager stores static geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StaticStorage {
    /// Compiled client-array draw.
    DisplayList,
    /// Buffer object drawn through client-array pointers.
    Buffer,
    /// Buffer object with its attribute layout captured in a vertex array.
    VertexArray,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Backing {
    List(ListHandle),
    Buffer { buffer: BufferHandle, vao: VertexArrayHandle },
}

/// Metadata of one static buffer.
#[derive(Debug, Clone)]
pub struct StaticBuffer {
    pub primitive: PrimitiveType,
    pub format: VertexFormat,
    pub vertex_count: usize,
    /// Bytes of the current payload.
    pub size: usize,
    /// Bytes of storage reserved; never below `size`.
    pub capacity: usize,
    backing: Backing,
}

/// Points every vertex slot of the bound vertex array at `format`, reading
/// from the bound buffer starting at `base` bytes.
pub fn configure_attributes(gl: &mut dyn GlContext, format: &VertexFormat, base: usize) {
    for (slot, attr) in format.slots() {
        let source = if attr.enabled {
            AttribSource::Array {
                size: attr.size,
                normalized: attr.normalized,
                stride: attr.stride,
                offset: base + attr.offset,
            }
        } else {
            AttribSource::Constant(attr.value)
        };
        gl.vertex_attrib(slot, source);
    }
}

/// Registry of static buffers for one device.
#[derive(Debug)]
pub struct StaticBuffers {
    storage: StaticStorage,
    next_id: u32,
    buffers: HashMap<StaticBufferId, StaticBuffer>,
}

impl StaticBuffers {
    pub fn new(storage: StaticStorage) -> Self {
        Self { storage, next_id: 0, buffers: HashMap::new() }
    }

    #[inline]
    pub fn storage(&self) -> StaticStorage {
        self.storage
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, id: StaticBufferId) -> Option<&StaticBuffer> {
        self.buffers.get(&id)
    }

    fn next_id(&mut self) -> StaticBufferId {
        self.next_id += 1;
        match self.storage {
            StaticStorage::DisplayList => StaticBufferId::DisplayList(self.next_id),
            StaticStorage::Buffer | StaticStorage::VertexArray => StaticBufferId::Buffer(self.next_id),
        }
    }

    /// Uploads `count` vertices of `format` laid out in `data`.
    pub fn create(
        &mut self,
        gl: &mut dyn GlContext,
        primitive: PrimitiveType,
        format: &VertexFormat,
        data: &[u8],
        count: usize,
    ) -> StaticBufferId {
        let size = format.byte_len(count).min(data.len());
        let data = &data[..size];

        let backing = match self.storage {
            StaticStorage::DisplayList => {
                let list = gl.gen_list();
                compile_list(gl, list, primitive, format, data, count);
                Backing::List(list)
            }
            StaticStorage::Buffer => {
                let buffer = gl.gen_buffer();
                gl.bind_array_buffer(buffer);
                gl.buffer_data(size, Some(data), BufferUsage::StaticDraw);
                gl.bind_array_buffer(BufferHandle::NONE);
                Backing::Buffer { buffer, vao: VertexArrayHandle::NONE }
            }
            StaticStorage::VertexArray => {
                let vao = gl.gen_vertex_array();
                let buffer = gl.gen_buffer();
                gl.bind_vertex_array(vao);
                gl.bind_array_buffer(buffer);
                gl.buffer_data(size, Some(data), BufferUsage::StaticDraw);
                configure_attributes(gl, format, 0);
                gl.bind_vertex_array(VertexArrayHandle::NONE);
                Backing::Buffer { buffer, vao }
            }
        };

        let id = self.next_id();
        self.buffers.insert(
            id,
            StaticBuffer {
                primitive,
                format: *format,
                vertex_count: count,
                size,
                capacity: size,
                backing,
            },
        );
        log::debug!("created static buffer {id:?} ({count} vertices, {size} bytes)");
        id
    }

    /// Replaces the contents of `id`. Storage is reallocated only when the
    /// new payload is larger than what was reserved.
    pub fn update(
        &mut self,
        gl: &mut dyn GlContext,
        id: StaticBufferId,
        primitive: PrimitiveType,
        format: &VertexFormat,
        data: &[u8],
        count: usize,
    ) -> bool {
        let Some(buf) = self.buffers.get_mut(&id) else {
            log::warn!("update of unknown static buffer {id:?}");
            return false;
        };

        let size = format.byte_len(count).min(data.len());
        let data = &data[..size];

        match buf.backing {
            Backing::List(list) => {
                compile_list(gl, list, primitive, format, data, count);
                buf.capacity = size;
            }
            Backing::Buffer { buffer, vao } => {
                if !vao.is_none() {
                    gl.bind_vertex_array(vao);
                }
                gl.bind_array_buffer(buffer);
                if size > buf.capacity {
                    gl.buffer_data(size, Some(data), BufferUsage::StaticDraw);
                    buf.capacity = size;
                } else {
                    gl.buffer_sub_data(0, data);
                }
                if !vao.is_none() {
                    if buf.format != *format {
                        configure_attributes(gl, format, 0);
                    }
                    gl.bind_vertex_array(VertexArrayHandle::NONE);
                } else {
                    gl.bind_array_buffer(BufferHandle::NONE);
                }
            }
        }

        buf.primitive = primitive;
        buf.format = *format;
        buf.vertex_count = count;
        buf.size = size;
        true
    }

    /// Draws `id`. `tex_units` are the physical units receiving the two
    /// texture coordinate sets on client-array paths.
    pub fn draw(&self, gl: &mut dyn GlContext, id: StaticBufferId, tex_units: [u32; 2]) -> bool {
        let Some(buf) = self.buffers.get(&id) else {
            log::warn!("draw of unknown static buffer {id:?}");
            return false;
        };

        let ranges = DrawRanges::Single { first: 0, count: buf.vertex_count as i32 };
        match buf.backing {
            Backing::List(list) => gl.call_list(list),
            Backing::Buffer { buffer, vao } if vao.is_none() => {
                gl.bind_array_buffer(buffer);
                let arrays = ClientArrays { data: ArrayData::Bound(0), format: &buf.format, tex_units };
                gl.draw_client_arrays(buf.primitive, &arrays, ranges);
                gl.bind_array_buffer(BufferHandle::NONE);
            }
            Backing::Buffer { vao, .. } => {
                gl.bind_vertex_array(vao);
                gl.draw_arrays(buf.primitive, ranges);
                gl.bind_vertex_array(VertexArrayHandle::NONE);
            }
        }
        true
    }

    pub fn destroy(&mut self, gl: &mut dyn GlContext, id: StaticBufferId) -> bool {
        match self.buffers.remove(&id) {
            Some(buf) => {
                release(gl, buf.backing);
                log::debug!("destroyed static buffer {id:?}");
                true
            }
            None => false,
        }
    }

    pub fn destroy_all(&mut self, gl: &mut dyn GlContext) {
        if !self.buffers.is_empty() {
            log::debug!("destroying {} static buffers", self.buffers.len());
        }
        for (_, buf) in self.buffers.drain() {
            release(gl, buf.backing);
        }
    }
}

fn compile_list(
    gl: &mut dyn GlContext,
    list: ListHandle,
    primitive: PrimitiveType,
    format: &VertexFormat,
    data: &[u8],
    count: usize,
) {
    gl.begin_list(list);
    let arrays = ClientArrays { data: ArrayData::Client(data), format, tex_units: [0, 1] };
    gl.draw_client_arrays(primitive, &arrays, DrawRanges::Single { first: 0, count: count as i32 });
    gl.end_list();
}

fn release(gl: &mut dyn GlContext, backing: Backing) {
    match backing {
        Backing::List(list) => gl.delete_list(list),
        Backing::Buffer { buffer, vao } => {
            gl.delete_buffer(buffer);
            if !vao.is_none() {
                gl.delete_vertex_array(vao);
            }
        }
    }
}
