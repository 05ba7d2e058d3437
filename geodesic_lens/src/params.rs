//! Black hole parameters
//!
//! Geometrized units throughout (G = c = 1): mass and the Kerr spin
//! parameter `a` are both lengths. A `BlackHoleParams` value is immutable;
//! user input produces a new value between frames, so the derived radii
//! stored alongside mass and spin can never go stale.

use crate::metric::MetricVariant;

/// Smallest mass the simulation accepts
pub const MIN_MASS: f64 = 0.1;
/// Largest mass the simulation accepts
pub const MAX_MASS: f64 = 10.0;
/// Mass used when the requested mass is not a number
pub const DEFAULT_MASS: f64 = 1.0;
/// Largest allowed |a| / M. An extremal hole makes Δ degenerate at the horizon.
pub const MAX_SPIN_RATIO: f64 = 0.998;

/// Below this |a| the Kerr closed forms divide 0 by 0; use Schwarzschild values.
const SPIN_EPSILON: f64 = 1e-9;

/// Incremental change requested by user input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamDelta {
    /// Additive change in mass
    pub mass: f64,
    /// Additive change in the dimensionless spin a/M
    pub spin_ratio: f64,
}

impl ParamDelta {
    pub fn mass(mass: f64) -> Self {
        Self {
            mass,
            spin_ratio: 0.0,
        }
    }

    pub fn spin_ratio(spin_ratio: f64) -> Self {
        Self {
            mass: 0.0,
            spin_ratio,
        }
    }
}

/// Mass and spin of the hole plus the closed-form radii derived from them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackHoleParams {
    mass: f64,
    spin: f64,
    horizon_radius: f64,
    /// Circular photon orbits for positive / negative angular momentum
    photon_orbits: (f64, f64),
    /// Critical impact parameter magnitudes for positive / negative angular momentum
    critical_impact: (f64, f64),
}

impl BlackHoleParams {
    /// Build a parameter set, clamping mass and spin into the valid range
    pub fn new(mass: f64, spin: f64) -> Self {
        let mass = if mass.is_finite() {
            mass.clamp(MIN_MASS, MAX_MASS)
        } else {
            DEFAULT_MASS
        };
        let max_spin = MAX_SPIN_RATIO * mass;
        let spin = if spin.is_finite() {
            spin.clamp(-max_spin, max_spin)
        } else {
            0.0
        };

        let horizon_radius = mass + (mass * mass - spin * spin).max(0.0).sqrt();
        let positive_orbit = photon_orbit_radius(mass, spin, 1.0);
        let negative_orbit = photon_orbit_radius(mass, spin, -1.0);
        let critical_impact = (
            critical_impact_parameter(mass, spin, positive_orbit).abs(),
            critical_impact_parameter(mass, spin, negative_orbit).abs(),
        );

        Self {
            mass,
            spin,
            horizon_radius,
            photon_orbits: (positive_orbit, negative_orbit),
            critical_impact,
        }
    }

    pub fn schwarzschild(mass: f64) -> Self {
        Self::new(mass, 0.0)
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Kerr parameter `a` (length units, signed)
    pub fn spin(&self) -> f64 {
        self.spin
    }

    /// Dimensionless spin a/M
    pub fn spin_ratio(&self) -> f64 {
        self.spin / self.mass
    }

    /// Outer event horizon r+ = M + sqrt(M² - a²)
    pub fn horizon_radius(&self) -> f64 {
        self.horizon_radius
    }

    /// Photon sphere of the non-rotating hole, 3M
    pub fn photon_sphere_radius(&self) -> f64 {
        3.0 * self.mass
    }

    /// Equatorial circular photon orbits as (positive L, negative L).
    /// With positive spin the first is the prograde orbit.
    pub fn photon_orbit_radii(&self) -> (f64, f64) {
        self.photon_orbits
    }

    /// Critical impact parameter magnitudes as (positive L, negative L).
    /// Photons with b in (-second, first) are captured.
    pub fn critical_impact_parameters(&self) -> (f64, f64) {
        self.critical_impact
    }

    /// Parameters as seen by a metric variant: Schwarzschild ignores spin
    pub fn for_variant(&self, variant: MetricVariant) -> Self {
        match variant {
            MetricVariant::Schwarzschild if self.spin != 0.0 => Self::schwarzschild(self.mass),
            _ => *self,
        }
    }

    /// clamp(adjust(current, delta)). The spin ratio a/M survives mass changes.
    pub fn adjusted(&self, delta: ParamDelta) -> Self {
        let mass = (self.mass + delta.mass).clamp(MIN_MASS, MAX_MASS);
        let ratio = (self.spin_ratio() + delta.spin_ratio).clamp(-MAX_SPIN_RATIO, MAX_SPIN_RATIO);
        Self::new(mass, ratio * mass)
    }
}

impl Default for BlackHoleParams {
    fn default() -> Self {
        Self::new(DEFAULT_MASS, 0.0)
    }
}

/// Equatorial circular photon orbit for angular momentum of sign `sense`.
///
/// r = 2M (1 + cos(2/3 acos(-sense a / M)))
fn photon_orbit_radius(mass: f64, spin: f64, sense: f64) -> f64 {
    let chi = (-sense * spin / mass).clamp(-1.0, 1.0);
    2.0 * mass * (1.0 + ((2.0 / 3.0) * chi.acos()).cos())
}

/// L/E of the circular photon orbit at radius `r`
fn critical_impact_parameter(mass: f64, spin: f64, r: f64) -> f64 {
    if spin.abs() < SPIN_EPSILON {
        // r is 3M here; the sign is irrelevant, callers take the magnitude
        return 3.0 * 3.0_f64.sqrt() * mass;
    }
    let a2 = spin * spin;
    -(r * r * r - 3.0 * mass * r * r + a2 * r + a2 * mass) / (spin * (r - mass))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schwarzschild_radii() {
        let params = BlackHoleParams::schwarzschild(2.0);
        assert!((params.horizon_radius() - 4.0).abs() < 1e-12);
        assert!((params.photon_sphere_radius() - 6.0).abs() < 1e-12);

        let (pos, neg) = params.photon_orbit_radii();
        assert!((pos - 6.0).abs() < 1e-9);
        assert!((neg - 6.0).abs() < 1e-9);

        let (bp, bn) = params.critical_impact_parameters();
        let expected = 3.0 * 3.0_f64.sqrt() * 2.0;
        assert!((bp - expected).abs() < 1e-9);
        assert!((bn - expected).abs() < 1e-9);
    }

    #[test]
    fn test_kerr_radii() {
        let params = BlackHoleParams::new(1.0, 0.9);
        assert!((params.horizon_radius() - (1.0 + 0.19_f64.sqrt())).abs() < 1e-12);

        // Known equatorial photon orbits for a = 0.9M
        let (pro, retro) = params.photon_orbit_radii();
        assert!((pro - 1.5578).abs() < 1e-3);
        assert!((retro - 3.9103).abs() < 1e-3);

        let (bp, bn) = params.critical_impact_parameters();
        assert!((bp - 2.8444).abs() < 1e-3);
        assert!((bn - 6.8323).abs() < 1e-3);
    }

    #[test]
    fn test_negative_spin_mirrors_positive() {
        let plus = BlackHoleParams::new(1.0, 0.6);
        let minus = BlackHoleParams::new(1.0, -0.6);
        let (a, b) = plus.critical_impact_parameters();
        let (c, d) = minus.critical_impact_parameters();
        assert!((a - d).abs() < 1e-9);
        assert!((b - c).abs() < 1e-9);
    }

    #[test]
    fn test_small_spin_is_continuous() {
        let tiny = BlackHoleParams::new(1.0, 1e-6);
        let (bp, bn) = tiny.critical_impact_parameters();
        let schwarzschild = 3.0 * 3.0_f64.sqrt();
        assert!((bp - schwarzschild).abs() < 1e-3);
        assert!((bn - schwarzschild).abs() < 1e-3);
    }

    #[test]
    fn test_clamps_invalid_input() {
        let params = BlackHoleParams::new(-3.0, 5.0);
        assert_eq!(params.mass(), MIN_MASS);
        assert!(params.spin().abs() <= MAX_SPIN_RATIO * params.mass() + 1e-15);
        assert!(params.horizon_radius().is_finite());

        let params = BlackHoleParams::new(f64::NAN, f64::INFINITY);
        assert_eq!(params.mass(), DEFAULT_MASS);
        assert_eq!(params.spin(), 0.0);

        let params = BlackHoleParams::new(1.0, -1.0);
        assert!((params.spin() + MAX_SPIN_RATIO).abs() < 1e-12);
    }

    #[test]
    fn test_adjust_keeps_spin_ratio() {
        let params = BlackHoleParams::new(1.0, 0.5);
        let heavier = params.adjusted(ParamDelta::mass(1.0));
        assert!((heavier.mass() - 2.0).abs() < 1e-12);
        assert!((heavier.spin_ratio() - 0.5).abs() < 1e-12);

        let spun = params.adjusted(ParamDelta::spin_ratio(10.0));
        assert!((spun.spin_ratio() - MAX_SPIN_RATIO).abs() < 1e-12);

        let floor = params.adjusted(ParamDelta::mass(-100.0));
        assert_eq!(floor.mass(), MIN_MASS);
    }

    #[test]
    fn test_radii_follow_params() {
        let params = BlackHoleParams::new(1.0, 0.0);
        let changed = params.adjusted(ParamDelta::mass(0.5));
        assert!((changed.horizon_radius() - 3.0).abs() < 1e-12);
        assert!((changed.photon_sphere_radius() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_for_variant_drops_spin() {
        let params = BlackHoleParams::new(1.0, 0.9);
        let static_view = params.for_variant(MetricVariant::Schwarzschild);
        assert_eq!(static_view.spin(), 0.0);
        assert_eq!(static_view.mass(), 1.0);
        assert_eq!(params.for_variant(MetricVariant::Kerr), params);
    }
}
