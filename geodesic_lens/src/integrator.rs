//! Geodesic integrator
//!
//! Classical RK4 along the affine parameter with a radius-proportional step
//! that shrinks near the horizon. Termination is checked before every step:
//! horizon capture, escape past the far boundary, or the step limit.

use glam::DVec2;

use crate::metric::{Derivative, MetricVariant, PhotonState};
use crate::params::BlackHoleParams;
use crate::trajectory::Trajectory;

/// Hard ceiling on steps taken by a single `advance_by` call
const MAX_STEPS_PER_ADVANCE: usize = 4096;

/// Step control and termination settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorConfig {
    /// Step length as a fraction of the current radius
    pub step_scale: f64,
    /// Smallest step, in units of mass
    pub min_step: f64,
    /// Capture when r < horizon * (1 + capture_margin)
    pub capture_margin: f64,
    /// Far boundary in units of mass
    pub escape_radius: f64,
    pub max_steps: usize,
    /// Allowed difference between launch and final measured energy
    pub energy_tolerance: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            step_scale: 0.01,
            min_step: 1e-3,
            capture_margin: 0.01,
            escape_radius: 500.0,
            max_steps: 100_000,
            energy_tolerance: 1e-5,
        }
    }
}

impl IntegratorConfig {
    /// Step length at radius `r`
    pub fn step_size(&self, r: f64, params: &BlackHoleParams) -> f64 {
        let horizon = params.horizon_radius();
        let proximity = ((r - horizon) / horizon).clamp(0.0, 1.0);
        (self.step_scale * r * proximity).max(self.min_step * params.mass())
    }

    pub fn capture_radius(&self, params: &BlackHoleParams) -> f64 {
        params.horizon_radius() * (1.0 + self.capture_margin)
    }

    /// Far boundary for a photon launched at `launch_radius`. Photons
    /// launched beyond the configured boundary must still reach periapsis.
    pub fn escape_radius_for(&self, params: &BlackHoleParams, launch_radius: f64) -> f64 {
        (self.escape_radius * params.mass()).max(1.5 * launch_radius)
    }
}

/// How an integration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Fell below the capture radius, or the state diverged
    Captured,
    /// Crossed the far boundary moving outward
    Escaped,
    /// Ran out of steps; treated as escaped along the last direction
    StepLimit,
}

impl Outcome {
    pub fn is_captured(self) -> bool {
        self == Outcome::Captured
    }
}

/// Result of integrating one photon to termination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminationResult {
    pub outcome: Outcome,
    /// Last finite state reached
    pub final_state: PhotonState,
    pub steps: usize,
    /// Unit direction of travel at the final state (orbital plane)
    pub direction: DVec2,
    /// Unwrapped heading angle of `direction`
    pub heading: f64,
    /// |measured energy at the end - measured energy at launch|
    pub energy_drift: f64,
}

impl TerminationResult {
    /// Direction to sample the background along; `None` when captured
    pub fn escape_direction(&self) -> Option<DVec2> {
        match self.outcome {
            Outcome::Captured => None,
            Outcome::Escaped | Outcome::StepLimit => Some(self.direction),
        }
    }

    /// Bending angle relative to the launch direction, positive toward the hole
    pub fn deflection_angle(
        &self,
        initial: &PhotonState,
        variant: MetricVariant,
        params: &BlackHoleParams,
    ) -> f64 {
        let sense = if initial.conserved.angular_momentum < 0.0 {
            -1.0
        } else {
            1.0
        };
        sense * (self.heading - initial.heading(variant, params))
    }
}

/// One RK4 step. `None` if any stage leaves the finite numbers.
pub fn rk4_step(
    variant: MetricVariant,
    params: &BlackHoleParams,
    state: &PhotonState,
    h: f64,
) -> Option<PhotonState> {
    let k1 = variant.derivative(params, state);
    let k2 = variant.derivative(params, &state.offset(&k1, h * 0.5));
    let k3 = variant.derivative(params, &state.offset(&k2, h * 0.5));
    let k4 = variant.derivative(params, &state.offset(&k3, h));

    if !(k1.is_finite() && k2.is_finite() && k3.is_finite() && k4.is_finite()) {
        return None;
    }

    let combined = Derivative {
        dr: (k1.dr + 2.0 * k2.dr + 2.0 * k3.dr + k4.dr) / 6.0,
        dphi: (k1.dphi + 2.0 * k2.dphi + 2.0 * k3.dphi + k4.dphi) / 6.0,
        dvr: (k1.dvr + 2.0 * k2.dvr + 2.0 * k3.dvr + k4.dvr) / 6.0,
    };
    let next = state.offset(&combined, h);
    next.is_finite().then_some(next)
}

/// Incremental integration of a single photon.
///
/// Holds its own params snapshot so a photon in flight is unaffected by
/// later parameter changes.
#[derive(Debug, Clone)]
pub struct Tracer {
    config: IntegratorConfig,
    params: BlackHoleParams,
    variant: MetricVariant,
    state: PhotonState,
    launch_energy: f64,
    capture_radius: f64,
    escape_radius: f64,
    steps: usize,
    outcome: Option<Outcome>,
}

impl Tracer {
    pub fn new(
        config: IntegratorConfig,
        params: BlackHoleParams,
        variant: MetricVariant,
        initial: PhotonState,
    ) -> Self {
        let params = params.for_variant(variant);
        Self {
            config,
            params,
            variant,
            state: initial,
            launch_energy: variant.measured_energy(&params, &initial),
            capture_radius: config.capture_radius(&params),
            escape_radius: config.escape_radius_for(&params, initial.r),
            steps: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> &PhotonState {
        &self.state
    }

    pub fn params(&self) -> &BlackHoleParams {
        &self.params
    }

    pub fn variant(&self) -> MetricVariant {
        self.variant
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    fn check_termination(&self) -> Option<Outcome> {
        let state = &self.state;
        if !state.is_finite() || state.r < self.capture_radius {
            return Some(Outcome::Captured);
        }
        if state.r > self.escape_radius && state.radial_velocity > 0.0 {
            return Some(Outcome::Escaped);
        }
        if self.steps >= self.config.max_steps {
            return Some(Outcome::StepLimit);
        }
        None
    }

    /// Take one accepted step, or report the terminal outcome
    pub fn step(&mut self) -> Option<Outcome> {
        if self.outcome.is_some() {
            return self.outcome;
        }
        if let Some(outcome) = self.check_termination() {
            self.outcome = Some(outcome);
            return self.outcome;
        }

        let h = self.config.step_size(self.state.r, &self.params);
        match rk4_step(self.variant, &self.params, &self.state, h) {
            Some(next) => {
                self.state = next;
                self.steps += 1;
                None
            }
            None => {
                log::debug!(
                    "{} photon diverged at r = {:.4}, treating as captured",
                    self.variant.label(),
                    self.state.r
                );
                self.outcome = Some(Outcome::Captured);
                self.outcome
            }
        }
    }

    /// Step until `budget` of affine parameter has elapsed or the photon
    /// terminates, appending each accepted position to `trajectory`.
    pub fn advance_by(&mut self, budget: f64, trajectory: &mut Trajectory) -> Option<Outcome> {
        let target = self.state.lambda + budget;
        for _ in 0..MAX_STEPS_PER_ADVANCE {
            if self.state.lambda >= target {
                break;
            }
            if let Some(outcome) = self.step() {
                return Some(outcome);
            }
            trajectory.push(self.state.position());
        }
        self.outcome
    }

    /// Summary of a finished (or abandoned) integration
    pub fn result(&self) -> TerminationResult {
        let heading = self.state.heading(self.variant, &self.params);
        let measured = self.variant.measured_energy(&self.params, &self.state);
        TerminationResult {
            outcome: self.outcome.unwrap_or(Outcome::StepLimit),
            final_state: self.state,
            steps: self.steps,
            direction: DVec2::from_angle(heading),
            heading,
            energy_drift: (measured - self.launch_energy).abs(),
        }
    }
}

/// One-shot integration front end
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Integrator {
    pub config: IntegratorConfig,
}

impl Integrator {
    pub fn new(config: IntegratorConfig) -> Self {
        Self { config }
    }

    /// Integrate to termination
    pub fn integrate(
        &self,
        initial: PhotonState,
        params: &BlackHoleParams,
        variant: MetricVariant,
    ) -> TerminationResult {
        let mut tracer = Tracer::new(self.config, *params, variant, initial);
        while tracer.step().is_none() {}
        self.finish(&tracer)
    }

    /// Integrate to termination, recording every accepted position
    pub fn trace(
        &self,
        initial: PhotonState,
        params: &BlackHoleParams,
        variant: MetricVariant,
    ) -> (TerminationResult, Trajectory) {
        let mut tracer = Tracer::new(self.config, *params, variant, initial);
        let mut trajectory = Trajectory::starting_at(initial.position());
        while tracer.step().is_none() {
            trajectory.push(tracer.state().position());
        }
        (self.finish(&tracer), trajectory)
    }

    fn finish(&self, tracer: &Tracer) -> TerminationResult {
        let result = tracer.result();
        if result.energy_drift > self.config.energy_tolerance && result.final_state.is_finite() {
            log::warn!(
                "{} photon energy drifted by {:.3e} over {} steps",
                tracer.variant().label(),
                result.energy_drift,
                result.steps
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rays::from_impact_parameter;

    const SQRT27: f64 = 5.196152422706632;

    fn launch(
        params: &BlackHoleParams,
        variant: MetricVariant,
        b: f64,
        distance: f64,
    ) -> PhotonState {
        from_impact_parameter(params, variant, b, distance).expect("valid launch")
    }

    fn run(params: &BlackHoleParams, variant: MetricVariant, b: f64, distance: f64) -> TerminationResult {
        let initial = launch(params, variant, b, distance);
        Integrator::default().integrate(initial, params, variant)
    }

    fn deflection(params: &BlackHoleParams, variant: MetricVariant, b: f64, distance: f64) -> f64 {
        let initial = launch(params, variant, b, distance);
        let result = Integrator::default().integrate(initial, params, variant);
        assert_eq!(result.outcome, Outcome::Escaped, "b = {b}");
        result.deflection_angle(&initial, variant, params)
    }

    fn valid_params() -> Vec<BlackHoleParams> {
        vec![
            BlackHoleParams::new(1.0, 0.0),
            BlackHoleParams::new(0.5, 0.3),
            BlackHoleParams::new(2.0, -1.8),
            BlackHoleParams::new(3.0, 2.97),
        ]
    }

    #[test]
    fn test_radial_photon_is_captured() {
        for params in valid_params() {
            for variant in [MetricVariant::Schwarzschild, MetricVariant::Kerr] {
                let result = run(&params, variant, 0.0, 40.0 * params.mass());
                assert_eq!(result.outcome, Outcome::Captured, "{variant:?} {params:?}");
                assert!(result.escape_direction().is_none());
            }
        }
    }

    #[test]
    fn test_wide_photon_escapes() {
        for params in valid_params() {
            for variant in [MetricVariant::Schwarzschild, MetricVariant::Kerr] {
                for sign in [1.0, -1.0] {
                    let b = sign * 1000.0 * params.mass();
                    let result = run(&params, variant, b, 1.0e5 * params.mass());
                    assert_eq!(result.outcome, Outcome::Escaped, "{variant:?} {params:?} b={b}");
                    assert!(result.escape_direction().is_some());
                }
            }
        }
    }

    #[test]
    fn test_weak_field_deflection_converges() {
        let params = BlackHoleParams::schwarzschild(1.0);
        let mut previous_error = f64::INFINITY;
        for &b in &[100.0, 1000.0, 10000.0] {
            let angle = deflection(&params, MetricVariant::Schwarzschild, b, 100.0 * b);
            let expected = 4.0 / b;
            let error = ((angle - expected) / expected).abs();
            assert!(error < previous_error, "b = {b}: error {error} not below {previous_error}");
            previous_error = error;
        }
        assert!(previous_error < 0.01);
    }

    #[test]
    fn test_schwarzschild_scenario() {
        let params = BlackHoleParams::new(1.0, 0.0);
        let variant = MetricVariant::Schwarzschild;

        // Below the critical impact parameter 3√3 ≈ 5.196
        assert_eq!(run(&params, variant, 5.0, 50.0).outcome, Outcome::Captured);
        assert_eq!(run(&params, variant, 10.0, 50.0).outcome, Outcome::Escaped);

        let angle = deflection(&params, variant, 10000.0, 1.0e6);
        assert!((angle - 4.0e-4).abs() < 4.0e-6, "deflection {angle}");
    }

    fn critical_impact(step_scale: f64) -> f64 {
        let params = BlackHoleParams::schwarzschild(1.0);
        let integrator = Integrator::new(IntegratorConfig {
            step_scale,
            ..IntegratorConfig::default()
        });
        let (mut low, mut high) = (4.5, 6.0);
        for _ in 0..30 {
            let mid = 0.5 * (low + high);
            let initial = launch(&params, MetricVariant::Schwarzschild, mid, 200.0);
            let result = integrator.integrate(initial, &params, MetricVariant::Schwarzschild);
            if result.outcome.is_captured() {
                low = mid;
            } else {
                high = mid;
            }
        }
        0.5 * (low + high)
    }

    #[test]
    fn test_critical_impact_parameter_converges() {
        let coarse = (critical_impact(0.04) - SQRT27).abs();
        let fine = (critical_impact(0.01) - SQRT27).abs();
        assert!(coarse < 2e-2, "coarse error {coarse}");
        assert!(fine < 1e-3, "fine error {fine}");
    }

    #[test]
    fn test_kerr_without_spin_reproduces_schwarzschild() {
        let params = BlackHoleParams::schwarzschild(1.0);
        for &b in &[-40.0, -8.0, -3.0, 0.0, 2.0, 6.5, 25.0] {
            let s = run(&params, MetricVariant::Schwarzschild, b, 60.0);
            let k = run(&params, MetricVariant::Kerr, b, 60.0);
            assert_eq!(s.outcome, k.outcome, "b = {b}");
            assert!((s.final_state.r - k.final_state.r).abs() < 1e-6, "b = {b}");
            assert!((s.heading - k.heading).abs() < 1e-6, "b = {b}");
        }
    }

    #[test]
    fn test_integration_is_deterministic() {
        let params = BlackHoleParams::new(1.0, 0.7);
        let integrator = Integrator::default();
        let initial = launch(&params, MetricVariant::Kerr, 4.2, 30.0);
        let (a, path_a) = integrator.trace(initial, &params, MetricVariant::Kerr);
        let (b, path_b) = integrator.trace(initial, &params, MetricVariant::Kerr);
        assert_eq!(a, b);
        assert_eq!(path_a.points(), path_b.points());
    }

    #[test]
    fn test_trace_matches_integrate() {
        let params = BlackHoleParams::new(1.0, -0.5);
        let integrator = Integrator::default();
        let initial = launch(&params, MetricVariant::Kerr, 7.0, 30.0);
        let (traced, path) = integrator.trace(initial, &params, MetricVariant::Kerr);
        let integrated = integrator.integrate(initial, &params, MetricVariant::Kerr);
        assert_eq!(traced, integrated);
        assert_eq!(path.len(), traced.steps + 1);
    }

    #[test]
    fn test_energy_drift_within_tolerance() {
        let config = IntegratorConfig::default();
        let integrator = Integrator::new(config);
        for (variant, params) in [
            (MetricVariant::Schwarzschild, BlackHoleParams::schwarzschild(1.0)),
            (MetricVariant::Kerr, BlackHoleParams::new(1.0, 0.9)),
        ] {
            for &b in &[3.0, 10.0, -6.0] {
                let initial = launch(&params, variant, b, 50.0);
                let result = integrator.integrate(initial, &params, variant);
                assert!(
                    result.energy_drift < config.energy_tolerance,
                    "{variant:?} b={b}: drift {}",
                    result.energy_drift
                );
                assert_eq!(result.final_state.conserved, initial.conserved);
            }
        }
    }

    #[test]
    fn test_frame_dragging_asymmetry() {
        let kerr = BlackHoleParams::new(1.0, 0.9);
        let still = BlackHoleParams::new(1.0, 0.0);

        let prograde = run(&kerr, MetricVariant::Kerr, 6.0, 200.0);
        let retrograde = run(&kerr, MetricVariant::Kerr, -6.0, 200.0);
        assert_eq!(prograde.outcome, Outcome::Escaped);
        assert_eq!(retrograde.outcome, Outcome::Captured);

        let spinning = deflection(&kerr, MetricVariant::Kerr, 6.0, 200.0);
        let static_hole = deflection(&still, MetricVariant::Kerr, 6.0, 200.0);
        assert!(
            (spinning - static_hole).abs() > 0.1,
            "prograde {spinning} vs static {static_hole}"
        );
        assert_eq!(run(&still, MetricVariant::Kerr, -6.0, 200.0).outcome, Outcome::Escaped);
    }

    #[test]
    fn test_step_limit_is_treated_as_escape() {
        let params = BlackHoleParams::schwarzschild(1.0);
        let integrator = Integrator::new(IntegratorConfig {
            max_steps: 10,
            ..IntegratorConfig::default()
        });
        let initial = launch(&params, MetricVariant::Schwarzschild, 20.0, 50.0);
        let result = integrator.integrate(initial, &params, MetricVariant::Schwarzschild);
        assert_eq!(result.outcome, Outcome::StepLimit);
        assert_eq!(result.steps, 10);
        assert!(result.escape_direction().is_some());
    }

    #[test]
    fn test_diverging_state_is_captured() {
        let params = BlackHoleParams::schwarzschild(1.0);
        let mut initial = launch(&params, MetricVariant::Schwarzschild, 3.0, 20.0);
        initial.radial_velocity = f64::NAN;
        let result = Integrator::default().integrate(initial, &params, MetricVariant::Schwarzschild);
        assert_eq!(result.outcome, Outcome::Captured);
    }

    #[test]
    fn test_step_shrinks_near_horizon() {
        let config = IntegratorConfig::default();
        let params = BlackHoleParams::schwarzschild(1.0);
        let near = config.step_size(2.05, &params);
        let mid = config.step_size(3.0, &params);
        let far = config.step_size(100.0, &params);
        assert!(near < mid && mid < far);
        assert!(near * 1.5 < 2.05 - params.horizon_radius());
    }

    #[test]
    fn test_advance_by_records_progress() {
        let params = BlackHoleParams::schwarzschild(1.0);
        let initial = launch(&params, MetricVariant::Schwarzschild, 8.0, 30.0);
        let mut tracer = Tracer::new(IntegratorConfig::default(), params, MetricVariant::Schwarzschild, initial);
        let mut path = Trajectory::starting_at(initial.position());
        assert!(tracer.advance_by(1.0, &mut path).is_none());
        assert!(tracer.state().lambda >= 1.0);
        assert_eq!(path.len(), tracer.steps() + 1);

        while tracer.advance_by(50.0, &mut path).is_none() {}
        assert_eq!(tracer.outcome(), Some(Outcome::Escaped));
        let (one_shot, one_shot_path) =
            Integrator::default().trace(initial, &params, MetricVariant::Schwarzschild);
        assert_eq!(tracer.result(), one_shot);
        assert_eq!(path.points(), one_shot_path.points());
    }
}
