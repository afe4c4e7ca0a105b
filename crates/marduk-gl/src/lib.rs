//! Marduk OpenGL device layer.
//!
//! One [`device::Device`] contract over three hardware generations of
//! OpenGL: fixed-function 1.x, GLSL 2.1 and the 3.3 core profile. GL calls go
//! through the [`context::GlContext`] seam so devices can be driven by a
//! real loader or by the recording [`context::HeadlessContext`].

pub mod context;
pub mod device;
pub mod logging;
pub mod math;
pub mod types;
