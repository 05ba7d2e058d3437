//! Cameras for the side view panels and the lensing view

use glam::{DVec3, Mat4, Vec2};

/// 2D orthographic camera looking at a region of the orbital plane
#[derive(Debug, Clone)]
pub struct Camera2D {
    pub center: Vec2,
    /// Half the visible height in world units
    pub half_height: f32,
    pub aspect_ratio: f32,
}

impl Camera2D {
    pub fn new(half_height: f32, aspect_ratio: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            half_height,
            aspect_ratio,
        }
    }

    /// Get the view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        let half_width = self.half_height * self.aspect_ratio;

        let projection = Mat4::orthographic_rh(
            -half_width,
            half_width,
            -self.half_height,
            self.half_height,
            -1.0,
            1.0,
        );

        let view = Mat4::from_translation(-self.center.extend(0.0));

        projection * view
    }

    /// Scale the visible region; factors below 1 zoom in
    pub fn zoom(&mut self, factor: f32, min_half_height: f32, max_half_height: f32) {
        self.half_height = (self.half_height * factor).clamp(min_half_height, max_half_height);
    }

    /// Scale the view and its centre together, e.g. to follow a change of length scale
    pub fn rescale(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.half_height *= factor;
            self.center *= factor;
        }
    }

    /// World units covered by one pixel of a viewport `height_px` tall
    pub fn world_per_pixel(&self, height_px: u32) -> f32 {
        2.0 * self.half_height / height_px.max(1) as f32
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }
}

/// Orbital camera around the origin. Angles in radians, distance in world units.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub yaw: f64,
    pub pitch: f64,
    pub distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl OrbitCamera {
    /// Keeps the camera off the poles, where yaw degenerates
    pub const MAX_PITCH: f64 = 1.5;

    pub fn new(distance: f64, min_distance: f64, max_distance: f64) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.1,
            distance: distance.clamp(min_distance, max_distance),
            min_distance,
            max_distance,
        }
    }

    /// Orbit the camera around the target
    pub fn orbit(&mut self, delta_yaw: f64, delta_pitch: f64) {
        self.yaw = (self.yaw + delta_yaw).rem_euclid(std::f64::consts::TAU);
        self.pitch = (self.pitch + delta_pitch).clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
    }

    /// Multiplicative zoom; positive steps move closer
    pub fn zoom(&mut self, steps: f64) {
        self.distance = (self.distance * 0.9_f64.powf(steps)).clamp(self.min_distance, self.max_distance);
    }

    pub fn position(&self) -> DVec3 {
        self.distance
            * DVec3::new(
                self.pitch.cos() * self.yaw.sin(),
                self.pitch.sin(),
                self.pitch.cos() * self.yaw.cos(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_2d_maps_visible_corners() {
        let camera = Camera2D::new(10.0, 2.0);
        let corner = camera.view_projection() * glam::Vec4::new(20.0, 10.0, 0.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
        assert!((camera.world_per_pixel(400) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_camera_2d_rescale() {
        let mut camera = Camera2D::new(14.0, 3.0);
        camera.center = Vec2::new(1.0, -2.0);
        camera.rescale(10.0);
        assert!((camera.half_height - 140.0).abs() < 1e-4);
        assert_eq!(camera.center, Vec2::new(10.0, -20.0));
        camera.rescale(0.0);
        assert!((camera.half_height - 140.0).abs() < 1e-4);
    }

    #[test]
    fn test_orbit_camera_limits() {
        let mut camera = OrbitCamera::new(20.0, 5.0, 100.0);
        camera.orbit(0.0, 10.0);
        assert_eq!(camera.pitch, OrbitCamera::MAX_PITCH);
        camera.zoom(1000.0);
        assert_eq!(camera.distance, 5.0);
        camera.zoom(-1000.0);
        assert_eq!(camera.distance, 100.0);
        assert!((camera.position().length() - 100.0).abs() < 1e-9);
    }
}
