use crate::math::{Mat4, Vec3};
use crate::types::TransformType;

/// Current transform matrices of a device.
///
/// The view matrix is stored with the Z axis flipped, converting the engine's
/// left-handed view space to the right-handed one the pipeline expects.
/// The combined matrix (projection x view x world) is recomputed on demand and
/// only used for culling.
#[derive(Debug, Clone)]
pub struct TransformState {
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    shadow: Mat4,
    modelview: Mat4,
    combined: Mat4,
    combined_dirty: bool,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            shadow: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
            combined: Mat4::IDENTITY,
            combined_dirty: true,
        }
    }
}

impl TransformState {
    /// Z-flip applied to every incoming view matrix.
    pub fn handedness_flip() -> Mat4 {
        Mat4::scale(Vec3::new(1.0, 1.0, -1.0))
    }

    pub fn set(&mut self, kind: TransformType, matrix: &Mat4) {
        match kind {
            TransformType::World => {
                self.world = *matrix;
                self.modelview = self.view * self.world;
                self.combined_dirty = true;
            }
            TransformType::View => {
                self.view = Self::handedness_flip() * *matrix;
                self.modelview = self.view * self.world;
                self.combined_dirty = true;
            }
            TransformType::Projection => {
                self.projection = *matrix;
                self.combined_dirty = true;
            }
            TransformType::Shadow => {
                self.shadow = *matrix;
            }
        }
    }

    #[inline]
    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    /// View matrix with the handedness flip already applied.
    #[inline]
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    #[inline]
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    #[inline]
    pub fn shadow(&self) -> &Mat4 {
        &self.shadow
    }

    #[inline]
    pub fn modelview(&self) -> &Mat4 {
        &self.modelview
    }

    #[inline]
    pub fn is_combined_dirty(&self) -> bool {
        self.combined_dirty
    }

    /// Projection x modelview, recomputed only after a source matrix changed.
    pub fn combined(&mut self) -> &Mat4 {
        if self.combined_dirty {
            self.combined = self.projection * self.modelview;
            self.combined_dirty = false;
        }
        &self.combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_is_stored_flipped() {
        let mut t = TransformState::default();
        t.set(TransformType::View, &Mat4::IDENTITY);
        assert_eq!(t.view().get(2, 2), -1.0);
        assert_eq!(t.modelview().get(2, 2), -1.0);
    }

    #[test]
    fn combined_recomputes_lazily() {
        let mut t = TransformState::default();
        let _ = t.combined();
        assert!(!t.is_combined_dirty());

        t.set(TransformType::World, &Mat4::translation(Vec3::new(1.0, 0.0, 0.0)));
        assert!(t.is_combined_dirty());
        assert_eq!(t.combined().get(0, 3), 1.0);
        assert!(!t.is_combined_dirty());
    }

    #[test]
    fn shadow_matrix_leaves_combined_clean() {
        let mut t = TransformState::default();
        let _ = t.combined();
        t.set(TransformType::Shadow, &Mat4::scale(Vec3::splat(0.5)));
        assert!(!t.is_combined_dirty());
        assert_eq!(t.shadow().get(0, 0), 0.5);
    }
}
