//! Side-by-side trajectory scene
//!
//! Two panels watch the same fan of photons: Schwarzschild on top, Kerr
//! below. Photons advance a fixed amount of affine parameter per frame so
//! their paths grow on screen. Every photon keeps the parameters it was
//! launched with; changing mass or spin only affects photons launched
//! afterwards and the overlay circles.

use rayon::prelude::*;

use crate::integrator::{IntegratorConfig, Outcome, Tracer};
use crate::metric::MetricVariant;
use crate::params::{BlackHoleParams, ParamDelta};
use crate::rays::{fan, FanConfig};
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideViewConfig {
    pub fan: FanConfig,
    pub integrator: IntegratorConfig,
    /// Affine parameter per frame, in units of mass
    pub lambda_per_frame: f64,
    /// Frames between fans while emitting
    pub spawn_interval: u64,
    /// Per panel; the oldest photons go first
    pub max_photons: usize,
}

impl Default for SideViewConfig {
    fn default() -> Self {
        Self {
            fan: FanConfig::default(),
            integrator: IntegratorConfig {
                escape_radius: 40.0,
                ..IntegratorConfig::default()
            },
            lambda_per_frame: 0.4,
            spawn_interval: 24,
            max_photons: 252,
        }
    }
}

/// A photon in flight together with the path it has drawn so far
#[derive(Debug, Clone)]
pub struct Photon {
    tracer: Tracer,
    trajectory: Trajectory,
}

impl Photon {
    pub fn new(tracer: Tracer) -> Self {
        let trajectory = Trajectory::starting_at(tracer.state().position());
        Self { tracer, trajectory }
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.tracer.outcome()
    }

    pub fn is_active(&self) -> bool {
        !self.tracer.is_finished()
    }

    /// Parameters the photon was launched with
    pub fn params(&self) -> &BlackHoleParams {
        self.tracer.params()
    }

    fn advance(&mut self, lambda_per_frame: f64) {
        if self.tracer.is_finished() {
            return;
        }
        let budget = lambda_per_frame * self.tracer.params().mass();
        self.tracer.advance_by(budget, &mut self.trajectory);
    }
}

/// Circles drawn over a panel
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub horizon_radius: f64,
    pub photon_orbits: Vec<f64>,
    /// Arc around a spinning horizon as (radius, signed sweep in radians).
    /// Positive sweeps run counter-clockwise, with the spin.
    pub spin_arc: Option<(f64, f64)>,
}

/// Angle covered by the spin arc
const SPIN_ARC_SWEEP: f64 = 1.5 * std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct Panel {
    variant: MetricVariant,
    photons: Vec<Photon>,
}

impl Panel {
    fn new(variant: MetricVariant) -> Self {
        Self {
            variant,
            photons: Vec::new(),
        }
    }

    pub fn variant(&self) -> MetricVariant {
        self.variant
    }

    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    pub fn active_count(&self) -> usize {
        self.photons.iter().filter(|p| p.is_active()).count()
    }

    pub fn captured_count(&self) -> usize {
        self.photons
            .iter()
            .filter(|p| p.outcome() == Some(Outcome::Captured))
            .count()
    }

    /// Horizon and circular photon orbits for the current parameters
    pub fn overlay(&self, params: &BlackHoleParams) -> Overlay {
        let params = params.for_variant(self.variant);
        let photon_orbits = match self.variant {
            MetricVariant::Schwarzschild => vec![params.photon_sphere_radius()],
            MetricVariant::Kerr => {
                let (pos, neg) = params.photon_orbit_radii();
                vec![pos, neg]
            }
        };
        let spin_arc = (params.spin() != 0.0).then(|| {
            (
                params.horizon_radius() + 0.5 * params.mass(),
                SPIN_ARC_SWEEP * params.spin().signum(),
            )
        });
        Overlay {
            horizon_radius: params.horizon_radius(),
            photon_orbits,
            spin_arc,
        }
    }

    fn launch(&mut self, params: &BlackHoleParams, config: &SideViewConfig) {
        let photons = fan(params, self.variant, &config.fan).into_iter().map(|initial| {
            Photon::new(Tracer::new(config.integrator, *params, self.variant, initial))
        });
        self.photons.extend(photons);

        let excess = self.photons.len().saturating_sub(config.max_photons);
        if excess > 0 {
            self.photons.drain(..excess);
        }
    }

    fn advance(&mut self, lambda_per_frame: f64) {
        self.photons
            .par_iter_mut()
            .for_each(|photon| photon.advance(lambda_per_frame));
    }
}

pub struct SideViewScene {
    config: SideViewConfig,
    params: BlackHoleParams,
    panels: [Panel; 2],
    show_photon_sphere: bool,
    emitting: bool,
    frame: u64,
}

impl SideViewScene {
    pub fn new(config: SideViewConfig, params: BlackHoleParams) -> Self {
        let mut scene = Self {
            config,
            params,
            panels: [
                Panel::new(MetricVariant::Schwarzschild),
                Panel::new(MetricVariant::Kerr),
            ],
            show_photon_sphere: true,
            emitting: true,
            frame: 0,
        };
        scene.spawn_fan();
        scene
    }

    pub fn config(&self) -> &SideViewConfig {
        &self.config
    }

    pub fn params(&self) -> &BlackHoleParams {
        &self.params
    }

    /// Replace the parameters. Photons in flight are left alone.
    pub fn set_params(&mut self, params: BlackHoleParams) {
        if params != self.params {
            log::info!(
                "Black hole parameters: M = {:.2}, a/M = {:.3}",
                params.mass(),
                params.spin_ratio()
            );
            self.params = params;
        }
    }

    pub fn adjust(&mut self, delta: ParamDelta) {
        self.set_params(self.params.adjusted(delta));
    }

    /// Clear every path and launch a fresh fan
    pub fn reset(&mut self) {
        for panel in &mut self.panels {
            panel.photons.clear();
        }
        self.frame = 0;
        self.spawn_fan();
        log::info!("Side view reset");
    }

    pub fn show_photon_sphere(&self) -> bool {
        self.show_photon_sphere
    }

    pub fn toggle_photon_sphere(&mut self) {
        self.show_photon_sphere = !self.show_photon_sphere;
    }

    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    pub fn toggle_emission(&mut self) {
        self.emitting = !self.emitting;
    }

    pub fn spawn_fan(&mut self) {
        for panel in &mut self.panels {
            panel.launch(&self.params, &self.config);
        }
    }

    /// Advance one frame
    pub fn update(&mut self) {
        self.frame += 1;
        if self.emitting && self.config.spawn_interval > 0 && self.frame % self.config.spawn_interval == 0 {
            self.spawn_fan();
        }
        for panel in &mut self.panels {
            panel.advance(self.config.lambda_per_frame);
        }
    }

    /// Top (Schwarzschild) then bottom (Kerr)
    pub fn panels(&self) -> &[Panel; 2] {
        &self.panels
    }

    pub fn photon_count(&self) -> usize {
        self.panels.iter().map(|p| p.photons.len()).sum()
    }

    pub fn active_count(&self) -> usize {
        self.panels.iter().map(Panel::active_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_scene(params: BlackHoleParams) -> SideViewScene {
        let mut scene = SideViewScene::new(SideViewConfig::default(), params);
        scene.toggle_emission();
        scene
    }

    #[test]
    fn test_new_scene_launches_fan() {
        let scene = SideViewScene::new(SideViewConfig::default(), BlackHoleParams::default());
        let count = SideViewConfig::default().fan.count;
        assert_eq!(scene.panels()[0].photons().len(), count);
        assert_eq!(scene.panels()[1].photons().len(), count);
        assert_eq!(scene.panels()[0].variant(), MetricVariant::Schwarzschild);
        assert_eq!(scene.panels()[1].variant(), MetricVariant::Kerr);
        assert!(scene.panels()[0].photons().iter().all(|p| p.trajectory().len() == 1));
    }

    #[test]
    fn test_update_grows_paths() {
        let mut scene = quiet_scene(BlackHoleParams::new(1.0, 0.6));
        scene.update();
        scene.update();
        for panel in scene.panels() {
            for photon in panel.photons() {
                assert!(photon.trajectory().len() > 1);
            }
        }
    }

    #[test]
    fn test_reset_clears_and_relaunches() {
        let mut scene = quiet_scene(BlackHoleParams::default());
        for _ in 0..50 {
            scene.update();
        }
        scene.spawn_fan();
        assert_eq!(scene.photon_count(), 4 * SideViewConfig::default().fan.count);

        scene.reset();
        assert_eq!(scene.photon_count(), 2 * SideViewConfig::default().fan.count);
        for panel in scene.panels() {
            assert!(panel.photons().iter().all(|p| p.trajectory().len() == 1 && p.is_active()));
        }
    }

    #[test]
    fn test_param_change_keeps_paths() {
        let mut scene = quiet_scene(BlackHoleParams::new(1.0, 0.0));
        for _ in 0..10 {
            scene.update();
        }
        let before: Vec<usize> = scene.panels()[0]
            .photons()
            .iter()
            .map(|p| p.trajectory().len())
            .collect();

        scene.adjust(ParamDelta::mass(1.0));
        assert_eq!(scene.params().mass(), 2.0);

        let after: Vec<usize> = scene.panels()[0]
            .photons()
            .iter()
            .map(|p| p.trajectory().len())
            .collect();
        assert_eq!(before, after);
        // Photons in flight keep their launch parameters
        assert!(scene.panels()[0].photons().iter().all(|p| p.params().mass() == 1.0));

        // The overlay follows the new parameters
        let overlay = scene.panels()[0].overlay(scene.params());
        assert!((overlay.horizon_radius - 4.0).abs() < 1e-12);
        assert_eq!(overlay.photon_orbits, vec![6.0]);

        scene.spawn_fan();
        let newest = scene.panels()[0].photons().last().unwrap();
        assert_eq!(newest.params().mass(), 2.0);
    }

    #[test]
    fn test_kerr_overlay_has_two_orbits() {
        let scene = quiet_scene(BlackHoleParams::new(1.0, 0.9));
        let overlay = scene.panels()[1].overlay(scene.params());
        assert_eq!(overlay.photon_orbits.len(), 2);
        assert!(overlay.photon_orbits[0] < overlay.photon_orbits[1]);
        assert!(overlay.horizon_radius < 2.0);

        let top = scene.panels()[0].overlay(scene.params());
        assert_eq!(top.horizon_radius, 2.0);
        assert_eq!(top.spin_arc, None);
    }

    #[test]
    fn test_spin_arc_follows_spin_direction() {
        let scene = quiet_scene(BlackHoleParams::new(1.0, 0.9));
        let (radius, sweep) = scene.panels()[1].overlay(scene.params()).spin_arc.unwrap();
        assert!(radius > scene.params().horizon_radius());
        assert!((sweep - 1.5 * std::f64::consts::PI).abs() < 1e-12);

        let retro = quiet_scene(BlackHoleParams::new(1.0, -0.9));
        let (_, sweep) = retro.panels()[1].overlay(retro.params()).spin_arc.unwrap();
        assert!(sweep < 0.0);

        let still = quiet_scene(BlackHoleParams::default());
        assert_eq!(still.panels()[1].overlay(still.params()).spin_arc, None);
    }

    #[test]
    fn test_photons_settle() {
        let mut scene = quiet_scene(BlackHoleParams::new(1.0, 0.9));
        for _ in 0..2000 {
            scene.update();
            if scene.active_count() == 0 {
                break;
            }
        }
        assert_eq!(scene.active_count(), 0);
        for panel in scene.panels() {
            // The central photon (b = 0) always falls in; the outermost ones escape
            let photons = panel.photons();
            assert_eq!(photons[photons.len() / 2].outcome(), Some(Outcome::Captured));
            assert_eq!(photons[0].outcome(), Some(Outcome::Escaped));
            assert_eq!(photons[photons.len() - 1].outcome(), Some(Outcome::Escaped));
        }
        // Frame dragging lets more photons past the spinning hole
        assert!(scene.panels()[1].captured_count() < scene.panels()[0].captured_count());
    }

    #[test]
    fn test_emission_is_capped() {
        let config = SideViewConfig {
            spawn_interval: 1,
            max_photons: 50,
            ..SideViewConfig::default()
        };
        let mut scene = SideViewScene::new(config, BlackHoleParams::default());
        for _ in 0..10 {
            scene.update();
        }
        for panel in scene.panels() {
            assert_eq!(panel.photons().len(), 50);
        }
        scene.toggle_emission();
        assert!(!scene.is_emitting());
        scene.update();
        assert_eq!(scene.photon_count(), 100);
    }
}
