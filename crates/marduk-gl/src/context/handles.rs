//! Typed driver object names.
//!
//! Each object kind gets its own newtype so a buffer name can never be passed
//! where a texture is expected. Zero is the driver's "no object".

macro_rules! gl_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub const NONE: Self = Self(0);

            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }
        }
    };
}

gl_handle!(
    /// Texture object.
    TextureHandle
);
gl_handle!(
    /// Buffer object (vertex data).
    BufferHandle
);
gl_handle!(
    /// Vertex array object.
    VertexArrayHandle
);
gl_handle!(
    /// Precompiled display list.
    ListHandle
);
gl_handle!(ShaderHandle);
gl_handle!(ProgramHandle);
gl_handle!(FramebufferHandle);
gl_handle!(RenderbufferHandle);

/// Resolved uniform location inside a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);
