//! Camera data blocks.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

/// A camera. Lens and sensor sizes are in millimetres.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    pub lens: f32,
    pub sensor_x: f32,
    pub sensor_y: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    pub clip_start: f32,
    pub clip_end: f32,
    pub focus_distance: f32,
    pub fstop: f32,
    pub ortho_scale: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            lens: 50.0,
            sensor_x: 36.0,
            sensor_y: 24.0,
            shift_x: 0.0,
            shift_y: 0.0,
            clip_start: 0.1,
            clip_end: 100.0,
            focus_distance: 10.0,
            fstop: 2.8,
            ortho_scale: 6.0,
        }
    }
}
