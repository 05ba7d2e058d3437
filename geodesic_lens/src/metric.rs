//! Null geodesic equations for Schwarzschild and equatorial Kerr spacetimes
//!
//! Photons move in their orbital plane, described by Boyer-Lindquist-like
//! (r, φ). With the conserved energy E and angular momentum L held fixed the
//! motion reduces to
//!
//! ```text
//! (dr/dλ)² = V(r)        d²r/dλ² = V'(r) / 2        dφ/dλ = Φ(r)
//! ```
//!
//! The second-order radial form passes through turning points without any
//! sign bookkeeping, which keeps the integrator a plain RK4 loop.

use glam::DVec2;

use crate::params::BlackHoleParams;

/// Which spacetime a photon lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricVariant {
    /// Non-rotating, spherically symmetric
    Schwarzschild,
    /// Rotating, restricted to the equatorial plane
    Kerr,
}

impl MetricVariant {
    pub fn label(self) -> &'static str {
        match self {
            MetricVariant::Schwarzschild => "Schwarzschild",
            MetricVariant::Kerr => "Kerr",
        }
    }

    /// (dr/dλ)² as a function of radius
    pub fn radial_potential(
        self,
        params: &BlackHoleParams,
        r: f64,
        conserved: &ConservedQuantities,
    ) -> f64 {
        let (e, l) = (conserved.energy, conserved.angular_momentum);
        match self {
            MetricVariant::Schwarzschild => {
                let m = params.mass();
                e * e - (1.0 - 2.0 * m / r) * l * l / (r * r)
            }
            MetricVariant::Kerr => {
                let k = KerrTerms::at(params, r, e, l);
                k.radial / (r * r * r * r)
            }
        }
    }

    /// dφ/dλ
    pub fn angular_rate(
        self,
        params: &BlackHoleParams,
        r: f64,
        conserved: &ConservedQuantities,
    ) -> f64 {
        match self {
            MetricVariant::Schwarzschild => conserved.angular_momentum / (r * r),
            MetricVariant::Kerr => {
                let (e, l) = (conserved.energy, conserved.angular_momentum);
                let a = params.spin();
                let k = KerrTerms::at(params, r, e, l);
                ((l - a * e) + a * k.p / k.delta) / (r * r)
            }
        }
    }

    /// d²r/dλ² = V'(r) / 2
    pub fn radial_acceleration(
        self,
        params: &BlackHoleParams,
        r: f64,
        conserved: &ConservedQuantities,
    ) -> f64 {
        let l = conserved.angular_momentum;
        match self {
            MetricVariant::Schwarzschild => {
                let m = params.mass();
                l * l * (r - 3.0 * m) / (r * r * r * r)
            }
            MetricVariant::Kerr => {
                let k = KerrTerms::at(params, r, conserved.energy, l);
                let r4 = r * r * r * r;
                // V = R / r⁴  =>  V' = (R' r - 4 R) / r⁵
                0.5 * (k.radial_slope * r - 4.0 * k.radial) / (r4 * r)
            }
        }
    }

    /// Right-hand side of the geodesic ODE at `state`
    pub fn derivative(self, params: &BlackHoleParams, state: &PhotonState) -> Derivative {
        Derivative {
            dr: state.radial_velocity,
            dphi: self.angular_rate(params, state.r, &state.conserved),
            dvr: self.radial_acceleration(params, state.r, &state.conserved),
        }
    }

    /// Energy implied by the null constraint at the current (r, dr/dλ, L).
    ///
    /// Equal to the launch energy for an exact solution; any difference is
    /// integration error.
    pub fn measured_energy(self, params: &BlackHoleParams, state: &PhotonState) -> f64 {
        let r = state.r;
        let l = state.conserved.angular_momentum;
        let vr = state.radial_velocity;
        match self {
            MetricVariant::Schwarzschild => {
                let m = params.mass();
                (vr * vr + (1.0 - 2.0 * m / r) * l * l / (r * r)).sqrt()
            }
            MetricVariant::Kerr => {
                // (dr/dλ)² r⁴ = [E(r²+a²) - aL]² - Δ(L - aE)², quadratic in E
                let a = params.spin();
                let delta = kerr_delta(params, r);
                let w = r * r + a * a;
                let qa = w * w - delta * a * a;
                let qb = -2.0 * a * l * w + 2.0 * delta * a * l;
                let qc = a * a * l * l - delta * l * l - vr * vr * r * r * r * r;
                let disc = (qb * qb - 4.0 * qa * qc).max(0.0);
                (-qb + disc.sqrt()) / (2.0 * qa)
            }
        }
    }
}

/// Δ = r² - 2Mr + a²
fn kerr_delta(params: &BlackHoleParams, r: f64) -> f64 {
    let a = params.spin();
    r * r - 2.0 * params.mass() * r + a * a
}

/// Shared pieces of the equatorial Kerr equations
struct KerrTerms {
    /// P = E(r² + a²) - aL
    p: f64,
    delta: f64,
    /// R = P² - Δ(L - aE)²
    radial: f64,
    /// dR/dr
    radial_slope: f64,
}

impl KerrTerms {
    fn at(params: &BlackHoleParams, r: f64, e: f64, l: f64) -> Self {
        let m = params.mass();
        let a = params.spin();
        let p = e * (r * r + a * a) - a * l;
        let delta = kerr_delta(params, r);
        let x = l - a * e;
        Self {
            p,
            delta,
            radial: p * p - delta * x * x,
            radial_slope: 4.0 * e * r * p - (2.0 * r - 2.0 * m) * x * x,
        }
    }
}

/// Constants of motion, fixed when the photon is generated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConservedQuantities {
    pub energy: f64,
    /// Signed; positive is counter-clockwise in the orbital plane
    pub angular_momentum: f64,
    /// Carter constant Q, zero for equatorial motion
    pub carter: f64,
}

impl ConservedQuantities {
    pub fn equatorial(energy: f64, angular_momentum: f64) -> Self {
        Self {
            energy,
            angular_momentum,
            carter: 0.0,
        }
    }

    /// b = L / E
    pub fn impact_parameter(&self) -> f64 {
        self.angular_momentum / self.energy
    }
}

/// The integration variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonState {
    pub r: f64,
    pub phi: f64,
    /// dr/dλ
    pub radial_velocity: f64,
    /// Affine parameter elapsed since launch
    pub lambda: f64,
    pub conserved: ConservedQuantities,
}

impl PhotonState {
    /// Position in the orbital plane
    pub fn position(&self) -> DVec2 {
        DVec2::new(self.r * self.phi.cos(), self.r * self.phi.sin())
    }

    /// Unwrapped angle of the direction of travel in the orbital plane
    pub fn heading(&self, variant: MetricVariant, params: &BlackHoleParams) -> f64 {
        let tangential = self.r * variant.angular_rate(params, self.r, &self.conserved);
        self.phi + tangential.atan2(self.radial_velocity)
    }

    /// Unit direction of travel in the orbital plane
    pub fn direction(&self, variant: MetricVariant, params: &BlackHoleParams) -> DVec2 {
        DVec2::from_angle(self.heading(variant, params))
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.phi.is_finite() && self.radial_velocity.is_finite()
    }

    /// Apply `h * derivative` to the evolved components
    pub(crate) fn offset(&self, d: &Derivative, h: f64) -> Self {
        Self {
            r: self.r + d.dr * h,
            phi: self.phi + d.dphi * h,
            radial_velocity: self.radial_velocity + d.dvr * h,
            lambda: self.lambda + h,
            conserved: self.conserved,
        }
    }
}

/// d/dλ of (r, φ, dr/dλ)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative {
    pub dr: f64,
    pub dphi: f64,
    pub dvr: f64,
}

impl Derivative {
    pub fn is_finite(&self) -> bool {
        self.dr.is_finite() && self.dphi.is_finite() && self.dvr.is_finite()
    }
}
