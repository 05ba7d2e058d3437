//! Ray generation: camera pixels and impact-parameter sweeps to initial photon states
//!
//! The hole sits at the origin with its spin axis along +Y. A 3D ray from the
//! camera is reduced to its orbital plane (the plane through the hole, the
//! ray origin and the ray direction), where the equatorial equations apply.

use common::OrbitCamera;
use glam::{DVec2, DVec3};

use crate::metric::{ConservedQuantities, MetricVariant, PhotonState};
use crate::params::BlackHoleParams;

/// Static observers do not exist where the lapse sqrt(1 - 2M/r) falls below this
const MIN_LAPSE: f64 = 1e-3;

/// Tangential component below which a ray counts as purely radial
const RADIAL_EPSILON: f64 = 1e-9;

/// Focal length of the pinhole camera
pub const DEFAULT_FOCAL_LENGTH: f64 = 1.2;

/// Pinhole camera basis, rebuilt each frame from the orbit camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub eye: DVec3,
    pub forward: DVec3,
    pub right: DVec3,
    pub up: DVec3,
    pub focal_length: f64,
}

impl CameraState {
    pub fn look_at(eye: DVec3, target: DVec3, focal_length: f64) -> Self {
        let forward = (target - eye).try_normalize().unwrap_or(DVec3::NEG_Z);
        // Looking straight along the spin axis: pick another reference
        let right = forward
            .cross(DVec3::Y)
            .try_normalize()
            .unwrap_or_else(|| forward.cross(DVec3::Z).normalize());
        let up = right.cross(forward);
        Self {
            eye,
            forward,
            right,
            up,
            focal_length,
        }
    }

    /// Pinhole at the orbit camera's position, looking at the hole
    pub fn from_orbit(orbit: &OrbitCamera, focal_length: f64) -> Self {
        Self::look_at(orbit.position(), DVec3::ZERO, focal_length)
    }

    pub fn distance(&self) -> f64 {
        self.eye.length()
    }

    /// Unit direction through the centre of pixel (x, y), origin top-left
    pub fn pixel_direction(&self, x: u32, y: u32, width: u32, height: u32) -> DVec3 {
        let (w, h) = (width as f64, height as f64);
        let u = (x as f64 + 0.5 - 0.5 * w) / h;
        let v = -(y as f64 + 0.5 - 0.5 * h) / h;
        (u * self.right + v * self.up + self.focal_length * self.forward).normalize()
    }
}

/// A 3D ray expressed in its own orbital plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarRay {
    /// Distance from the hole to the ray origin
    pub radius: f64,
    /// Angle between the ray and the inward radial direction, in [0, π]
    pub launch_angle: f64,
    /// Unit vector from the hole toward the ray origin (φ = 0)
    pub radial_axis: DVec3,
    /// In-plane unit vector perpendicular to `radial_axis`, on the side the ray turns toward
    pub tangent_axis: DVec3,
    /// Orbital normal · spin axis. +1 co-rotating equatorial, -1 counter-rotating.
    pub spin_alignment: f64,
}

impl PlanarRay {
    pub fn new(origin: DVec3, direction: DVec3) -> Option<Self> {
        if !origin.is_finite() || !direction.is_finite() {
            return None;
        }
        let radius = origin.length();
        let direction = direction.try_normalize()?;
        if radius <= 0.0 {
            return None;
        }
        let radial_axis = origin / radius;
        let outward = direction.dot(radial_axis);
        let tangential = direction - outward * radial_axis;
        // Radial rays leave the plane undefined
        let tangent_axis = if tangential.length_squared() > RADIAL_EPSILON * RADIAL_EPSILON {
            tangential.normalize()
        } else {
            any_perpendicular(radial_axis)
        };
        let normal = radial_axis.cross(tangent_axis);

        Some(Self {
            radius,
            launch_angle: (-outward).clamp(-1.0, 1.0).acos(),
            radial_axis,
            tangent_axis,
            spin_alignment: normal.y,
        })
    }

    /// Lift an in-plane heading (measured from `radial_axis` toward `tangent_axis`) back to 3D
    pub fn plane_direction(&self, heading: f64) -> DVec3 {
        heading.cos() * self.radial_axis + heading.sin() * self.tangent_axis
    }
}

/// Deterministic unit vector perpendicular to `axis`
fn any_perpendicular(axis: DVec3) -> DVec3 {
    let reference = if axis.x.abs() > 0.9 {
        DVec3::Y
    } else {
        DVec3::X
    };
    (reference - reference.dot(axis) * axis).normalize()
}

/// Photon leaving a static observer at `radius` (φ = 0) at angle `launch_angle`
/// from the inward radial direction, measured in the observer's own frame.
/// `sense` picks the side the ray leans toward: positive is counter-clockwise.
///
/// In the equatorial Kerr frame
/// `L = sense sinψ sqrt(Δ) / (1 - 2M/r) - 2Ma / (r - 2M)`, which reduces to
/// `r sinψ / sqrt(1 - 2M/r)` without spin. Frame dragging makes a radial
/// launch (ψ = 0 or π) carry a small negative L.
///
/// Returns `None` at or inside the capture radius, or where no static
/// observer exists.
pub fn launch_local(
    params: &BlackHoleParams,
    variant: MetricVariant,
    radius: f64,
    launch_angle: f64,
    sense: f64,
) -> Option<PhotonState> {
    let params = params.for_variant(variant);
    if !radius.is_finite() || radius <= params.horizon_radius() {
        return None;
    }
    let lapse_sq = 1.0 - 2.0 * params.mass() / radius;
    if lapse_sq < MIN_LAPSE * MIN_LAPSE {
        return None;
    }

    let (m, a) = (params.mass(), params.spin());
    let delta = radius * radius - 2.0 * m * radius + a * a;
    let angular_momentum =
        sense.signum() * launch_angle.sin() * delta.sqrt() / lapse_sq - 2.0 * m * a / (radius - 2.0 * m);
    let conserved = ConservedQuantities::equatorial(1.0, angular_momentum);
    let speed = variant
        .radial_potential(&params, radius, &conserved)
        .max(0.0)
        .sqrt();
    let radial_velocity = if launch_angle < std::f64::consts::FRAC_PI_2 {
        -speed
    } else {
        speed
    };

    Some(PhotonState {
        r: radius,
        phi: 0.0,
        radial_velocity,
        lambda: 0.0,
        conserved,
    })
}

/// Photon coming in from far away on the line y = -b, heading +x.
///
/// Positive `b` passes below the hole and orbits counter-clockwise (L = b).
pub fn from_impact_parameter(
    params: &BlackHoleParams,
    variant: MetricVariant,
    impact_parameter: f64,
    start_distance: f64,
) -> Option<PhotonState> {
    let params = params.for_variant(variant);
    let start = DVec2::new(-start_distance, -impact_parameter);
    let r = start.length();
    if !r.is_finite() || r <= params.horizon_radius() {
        return None;
    }

    let conserved = ConservedQuantities::equatorial(1.0, impact_parameter);
    let speed = variant
        .radial_potential(&params, r, &conserved)
        .max(0.0)
        .sqrt();
    Some(PhotonState {
        r,
        phi: start.y.atan2(start.x),
        radial_velocity: -speed,
        lambda: 0.0,
        conserved,
    })
}

/// Side-view fan of parallel photons
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanConfig {
    /// Launch distance in units of mass
    pub start_distance: f64,
    /// Impact parameters span [-spread, spread], in units of mass
    pub spread: f64,
    pub count: usize,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            start_distance: 24.0,
            spread: 8.0,
            count: 21,
        }
    }
}

impl FanConfig {
    /// Impact parameters of the fan for a hole of mass `mass`
    pub fn impact_parameters(&self, mass: f64) -> Vec<f64> {
        match self.count {
            0 => Vec::new(),
            1 => vec![0.0],
            n => (0..n)
                .map(|i| mass * self.spread * (2.0 * i as f64 / (n - 1) as f64 - 1.0))
                .collect(),
        }
    }
}

pub fn fan(params: &BlackHoleParams, variant: MetricVariant, config: &FanConfig) -> Vec<PhotonState> {
    let distance = config.start_distance * params.mass();
    config
        .impact_parameters(params.mass())
        .into_iter()
        .filter_map(|b| from_impact_parameter(params, variant, b, distance))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    pub(crate) fn orbit_camera(yaw: f64, pitch: f64, distance: f64) -> CameraState {
        let orbit = OrbitCamera {
            yaw,
            pitch,
            distance,
            min_distance: 1.0,
            max_distance: 1000.0,
        };
        CameraState::from_orbit(&orbit, DEFAULT_FOCAL_LENGTH)
    }

    #[test]
    fn test_centre_pixel_looks_forward() {
        let camera = orbit_camera(0.4, 0.2, 20.0);
        let dir = camera.pixel_direction(50, 50, 101, 101);
        assert!((dir - camera.forward).length() < 1e-12);
        assert!((camera.forward + camera.eye / camera.distance()).length() < 1e-12);
        assert!((camera.distance() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_pixel_orientation() {
        let camera = orbit_camera(0.0, 0.0, 10.0);
        // Eye on +Z looking toward -Z: right is +X, up is +Y
        assert!((camera.right - DVec3::X).length() < 1e-12);
        assert!((camera.up - DVec3::Y).length() < 1e-12);

        let top_left = camera.pixel_direction(0, 0, 200, 100);
        assert!(top_left.x < 0.0 && top_left.y > 0.0);
        let bottom_right = camera.pixel_direction(199, 99, 200, 100);
        assert!(bottom_right.x > 0.0 && bottom_right.y < 0.0);
    }

    #[test]
    fn test_look_at_along_spin_axis() {
        let camera = CameraState::look_at(DVec3::new(0.0, 15.0, 0.0), DVec3::ZERO, 1.0);
        assert!(camera.right.is_finite() && camera.up.is_finite());
        assert!(camera.right.dot(camera.forward).abs() < 1e-12);
        assert!(camera.up.dot(camera.forward).abs() < 1e-12);
    }

    #[test]
    fn test_planar_ray_geometry() {
        let origin = DVec3::new(0.0, 0.0, 10.0);
        let ray = PlanarRay::new(origin, DVec3::new(1.0, 0.0, -1.0)).unwrap();
        assert!((ray.radius - 10.0).abs() < 1e-12);
        assert!((ray.launch_angle - PI / 4.0).abs() < 1e-12);
        assert!((ray.tangent_axis - DVec3::X).length() < 1e-12);
        // Z × X = Y: co-rotating equatorial ray
        assert!((ray.spin_alignment - 1.0).abs() < 1e-12);

        let mirrored = PlanarRay::new(origin, DVec3::new(-1.0, 0.0, -1.0)).unwrap();
        assert!((mirrored.spin_alignment + 1.0).abs() < 1e-12);

        let polar = PlanarRay::new(origin, DVec3::new(0.0, 1.0, -1.0)).unwrap();
        assert!(polar.spin_alignment.abs() < 1e-12);
    }

    #[test]
    fn test_planar_ray_at_singularity() {
        let origin = DVec3::new(3.0, 4.0, 0.0);
        let inward = PlanarRay::new(origin, -origin).unwrap();
        assert!(inward.launch_angle.abs() < 1e-12);
        assert!(inward.tangent_axis.is_finite());
        assert!(inward.tangent_axis.dot(inward.radial_axis).abs() < 1e-12);
        assert_eq!(PlanarRay::new(origin, -origin), Some(inward));

        assert!(PlanarRay::new(DVec3::ZERO, DVec3::X).is_none());
        assert!(PlanarRay::new(origin, DVec3::ZERO).is_none());
        assert!(PlanarRay::new(origin, DVec3::new(f64::NAN, 0.0, 1.0)).is_none());
    }

    #[test]
    fn test_plane_direction_round_trip() {
        let ray = PlanarRay::new(DVec3::new(2.0, 1.0, 9.0), DVec3::new(0.3, -0.2, -1.0)).unwrap();
        let original = DVec3::new(0.3, -0.2, -1.0).normalize();
        // The launch heading is π - ψ measured from the outward radial axis
        let rebuilt = ray.plane_direction(PI - ray.launch_angle);
        assert!((rebuilt - original).length() < 1e-12);
    }

    #[test]
    fn test_launch_local_rejects_inside_horizon() {
        let params = BlackHoleParams::schwarzschild(1.0);
        for variant in [MetricVariant::Schwarzschild, MetricVariant::Kerr] {
            assert!(launch_local(&params, variant, 1.5, 0.3, 1.0).is_none());
            assert!(launch_local(&params, variant, 2.0, 0.3, 1.0).is_none());
            assert!(launch_local(&params, variant, 10.0, 0.3, 1.0).is_some());
        }
    }

    #[test]
    fn test_launch_local_tangent_is_turning_point() {
        let params = BlackHoleParams::schwarzschild(1.0);
        let state = launch_local(&params, MetricVariant::Schwarzschild, 10.0, FRAC_PI_2, -1.0).unwrap();
        assert!(state.radial_velocity.abs() < 1e-6);
        assert!(state.conserved.angular_momentum < 0.0);
        let heading = state.heading(MetricVariant::Schwarzschild, &params);
        assert!((heading + FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_kerr_launch_in_static_frame() {
        let params = BlackHoleParams::new(1.0, 0.9);
        let radius = 20.0;

        // Radial in the observer's frame: no angular motion at launch
        let inward = launch_local(&params, MetricVariant::Kerr, radius, 0.0, 1.0).unwrap();
        let rate = MetricVariant::Kerr.angular_rate(&params, radius, &inward.conserved);
        assert!(rate.abs() < 1e-12);
        assert!((inward.conserved.angular_momentum + 1.8 / 18.0).abs() < 1e-12);

        // Both sides of the same launch angle leave with the same radial speed
        let pos = launch_local(&params, MetricVariant::Kerr, radius, 1.0, 1.0).unwrap();
        let neg = launch_local(&params, MetricVariant::Kerr, radius, 1.0, -1.0).unwrap();
        assert!((pos.radial_velocity - neg.radial_velocity).abs() < 1e-9);
        assert!(pos.conserved.angular_momentum > 0.0 && neg.conserved.angular_momentum < 0.0);

        // Without spin Kerr and Schwarzschild launches agree
        let still = BlackHoleParams::schwarzschild(1.0);
        let kerr = launch_local(&still, MetricVariant::Kerr, radius, 0.7, 1.0).unwrap();
        let expected = radius * 0.7_f64.sin() / (1.0 - 2.0 / radius).sqrt();
        assert!((kerr.conserved.angular_momentum - expected).abs() < 1e-9);
    }

    #[test]
    fn test_impact_parameter_launch() {
        let params = BlackHoleParams::new(1.0, 0.5);
        let state = from_impact_parameter(&params, MetricVariant::Kerr, 4.0, 1000.0).unwrap();
        assert!((state.position() - DVec2::new(-1000.0, -4.0)).length() < 1e-9);
        assert_eq!(state.conserved.angular_momentum, 4.0);
        assert!(state.radial_velocity < 0.0);
        assert!(state.heading(MetricVariant::Kerr, &params).abs() < 1e-4);
    }

    #[test]
    fn test_fan_spread() {
        let params = BlackHoleParams::schwarzschild(2.0);
        let config = FanConfig::default();
        let photons = fan(&params, MetricVariant::Schwarzschild, &config);
        assert_eq!(photons.len(), config.count);
        let b: Vec<f64> = photons.iter().map(|p| p.conserved.impact_parameter()).collect();
        assert!((b[0] + 16.0).abs() < 1e-12);
        assert!((b[config.count - 1] - 16.0).abs() < 1e-12);
        assert!(b[config.count / 2].abs() < 1e-12);
        assert_eq!(FanConfig { count: 1, ..config }.impact_parameters(1.0), vec![0.0]);
    }
}
