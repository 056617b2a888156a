//! Light data blocks.

use usdio_math::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LightType {
    #[default]
    Point,
    Sun,
    Spot,
    Area,
}

/// Shape of an area light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AreaShape {
    #[default]
    Square,
    Rect,
    Disk,
    Ellipse,
}

/// A light. Sizes are in scene units, angles in radians.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    pub area_shape: AreaShape,
    pub color: Vec3,
    /// Radiant power in watts (sun: irradiance).
    pub energy: f32,
    pub spec_fac: f32,
    /// Area width, disk diameter, or point/spot radius.
    pub area_size: f32,
    /// Area height for rectangle and ellipse shapes.
    pub area_sizey: f32,
    /// Full cone angle of a spot light.
    pub spotsize: f32,
    pub spotblend: f32,
    /// Angular diameter of a sun light.
    pub sun_angle: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            area_shape: AreaShape::Square,
            color: Vec3::ONE,
            energy: 10.0,
            spec_fac: 1.0,
            area_size: 0.25,
            area_sizey: 0.25,
            spotsize: 45f32.to_radians(),
            spotblend: 0.15,
            sun_angle: 0.526f32.to_radians(),
        }
    }
}

impl Light {
    pub fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            ..Default::default()
        }
    }

    pub fn area(shape: AreaShape, size: f32, sizey: f32) -> Self {
        Self {
            light_type: LightType::Area,
            area_shape: shape,
            area_size: size,
            area_sizey: sizey,
            ..Default::default()
        }
    }
}
