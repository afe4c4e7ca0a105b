//! Math primitives used by the device layer.
//!
//! Matrices are stored column-major (OpenGL convention): element at
//! `(row, col)` lives at index `col * 4 + row`. Every accessor and free function
//! in this module follows that convention; callers never index the raw array.

mod mat4;
mod vec3;

pub use mat4::{determinant, inverse, multiply, transpose, Mat4};
pub use vec3::Vec3;
