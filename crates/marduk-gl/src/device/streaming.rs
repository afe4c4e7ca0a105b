use crate::context::{BufferHandle, BufferUsage, GlContext};

/// Shared buffer for transient per-draw geometry.
///
/// Writes append at a cursor. When a write would run past the end, the storage
/// is orphaned and the cursor returns to zero, so the driver never has to wait
/// for draws still reading the old contents.
#[derive(Debug)]
pub struct DynamicBuffer {
    handle: BufferHandle,
    capacity: usize,
    offset: usize,
    resets: u64,
}

impl DynamicBuffer {
    pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

    pub fn new(gl: &mut dyn GlContext, capacity: usize) -> Self {
        let handle = gl.gen_buffer();
        gl.bind_array_buffer(handle);
        gl.buffer_data(capacity, None, BufferUsage::StreamDraw);
        log::debug!("dynamic buffer {} allocated ({capacity} bytes)", handle.0);
        Self { handle, capacity, offset: 0, resets: 0 }
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Times the storage was orphaned.
    #[inline]
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Writes `data` and returns the byte offset it now lives at.
    ///
    /// Leaves the buffer bound as the array buffer.
    pub fn upload(&mut self, gl: &mut dyn GlContext, data: &[u8]) -> usize {
        let size = data.len();
        gl.bind_array_buffer(self.handle);

        if size > self.capacity {
            let grown = size.next_power_of_two();
            log::warn!("dynamic buffer too small for {size} bytes, growing to {grown}");
            self.capacity = grown;
            self.orphan(gl);
        } else if self.offset + size > self.capacity {
            self.orphan(gl);
        }

        if !gl.map_write_unsynchronized(self.offset, data) {
            log::warn!("unsynchronized map of dynamic buffer failed, using sub-data upload");
            gl.buffer_sub_data(self.offset, data);
        }

        let at = self.offset;
        self.offset += size;
        at
    }

    fn orphan(&mut self, gl: &mut dyn GlContext) {
        gl.buffer_data(self.capacity, None, BufferUsage::StreamDraw);
        self.offset = 0;
        self.resets += 1;
    }

    pub fn destroy(&mut self, gl: &mut dyn GlContext) {
        if self.handle.is_none() {
            return;
        }
        gl.delete_buffer(self.handle);
        self.handle = BufferHandle::NONE;
        self.offset = 0;
    }
}
