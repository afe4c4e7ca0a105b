use crate::math::Vec3;

use super::Color;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum LightType {
    Directional,
    #[default]
    Point,
    Spot,
}

/// One hardware light slot.
///
/// `position` is used by point and spot lights, `direction` by directional and
/// spot lights. Spot angle is in radians.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub ty: LightType,
    pub position: Vec3,
    pub direction: Vec3,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub attenuation0: f32,
    pub attenuation1: f32,
    pub attenuation2: f32,
    pub spot_angle: f32,
    pub spot_intensity: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            ty: LightType::Point,
            position: Vec3::zero(),
            direction: Vec3::new(0.0, 0.0, 1.0),
            ambient: Color::BLACK,
            diffuse: Color::WHITE,
            specular: Color::WHITE,
            attenuation0: 1.0,
            attenuation1: 0.0,
            attenuation2: 0.0,
            spot_angle: core::f32::consts::FRAC_PI_2,
            spot_intensity: 1.0,
        }
    }
}

impl Light {
    /// Homogeneous position as fixed-function lighting expects it: directional
    /// lights point *towards* the light with `w = 0`.
    pub fn homogeneous_position(&self) -> [f32; 4] {
        match self.ty {
            LightType::Directional => [-self.direction.x, -self.direction.y, -self.direction.z, 0.0],
            LightType::Point | LightType::Spot => {
                [self.position.x, self.position.y, self.position.z, 1.0]
            }
        }
    }
}

/// Surface reflectance used by lighting.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Color::gray(0.4),
            diffuse: Color::gray(0.8),
            specular: Color::gray(0.3),
        }
    }
}
