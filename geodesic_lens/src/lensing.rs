//! Lensing sampler
//!
//! Every ray leaving a camera at distance r from the hole is fixed, up to a
//! rotation of its orbital plane, by its launch angle ψ from the inward
//! radial direction. A `DeflectionTable` integrates one photon per ψ and
//! the per-pixel work reduces to a lookup plus a change of basis. The same
//! lookup runs per fragment in `shaders/lensing.wgsl`.
//!
//! Kerr rays off the equator are approximated by blending the co-rotating
//! and counter-rotating equatorial tables by the alignment of the ray's
//! orbital normal with the spin axis. Equatorial rays are exact.

use std::f64::consts::PI;
use std::time::Instant;

use glam::DVec3;
use rayon::prelude::*;

use crate::background::Background;
use crate::integrator::{Integrator, IntegratorConfig};
use crate::metric::MetricVariant;
use crate::params::BlackHoleParams;
use crate::rays::{launch_local, CameraState, PlanarRay};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensingConfig {
    /// Launch angles sampled over [0, π]
    pub table_size: usize,
    pub integrator: IntegratorConfig,
    /// Color of rays that fall into the hole
    pub absorbed_color: [f32; 3],
}

impl Default for LensingConfig {
    fn default() -> Self {
        Self {
            table_size: 1024,
            integrator: IntegratorConfig::default(),
            absorbed_color: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TableEntry {
    Captured,
    /// In-plane heading at the far boundary, measured from the outward
    /// radial axis of the camera toward the ray's tangent axis
    Escaped { exit_angle: f64 },
}

impl TableEntry {
    fn exit_angle(self) -> Option<f64> {
        match self {
            TableEntry::Captured => None,
            TableEntry::Escaped { exit_angle } => Some(exit_angle),
        }
    }
}

/// What a pixel sees
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LensSample {
    Absorbed,
    /// Unit direction at which the ray leaves toward the sky
    Background(DVec3),
}

/// Exit angles by launch angle for one camera radius
#[derive(Debug, Clone, PartialEq)]
pub struct DeflectionTable {
    params: BlackHoleParams,
    variant: MetricVariant,
    radius: f64,
    /// Angular momentum along the spin axis
    positive: Vec<TableEntry>,
    /// Angular momentum against the spin axis
    negative: Vec<TableEntry>,
}

impl DeflectionTable {
    pub fn build(
        params: &BlackHoleParams,
        variant: MetricVariant,
        camera_radius: f64,
        config: &LensingConfig,
    ) -> Self {
        let size = config.table_size.max(2);
        let integrator = Integrator::new(config.integrator);
        let sweep = |sense: f64| -> Vec<TableEntry> {
            (0..size)
                .into_par_iter()
                .map(|i| {
                    let launch_angle = PI * i as f64 / (size - 1) as f64;
                    entry(&integrator, params, variant, camera_radius, launch_angle, sense)
                })
                .collect()
        };

        let positive = sweep(1.0);
        // Without spin both senses are mirror images
        let negative = match variant {
            MetricVariant::Kerr if params.spin() != 0.0 => sweep(-1.0),
            _ => positive.clone(),
        };

        Self {
            params: params.for_variant(variant),
            variant,
            radius: camera_radius,
            positive,
            negative,
        }
    }

    /// Whether this table is valid for the given inputs. Spin is ignored
    /// for Schwarzschild tables.
    pub fn matches(&self, params: &BlackHoleParams, variant: MetricVariant, camera_radius: f64) -> bool {
        self.params == params.for_variant(variant)
            && self.variant == variant
            && (self.radius - camera_radius).abs() <= 1e-9 * camera_radius.abs().max(1.0)
    }

    pub fn params(&self) -> &BlackHoleParams {
        &self.params
    }

    pub fn variant(&self) -> MetricVariant {
        self.variant
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.positive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty()
    }

    /// Fraction of launch angles that end in the hole, per sense
    pub fn captured_fraction(&self) -> (f64, f64) {
        let fraction = |entries: &[TableEntry]| {
            let captured = entries.iter().filter(|e| **e == TableEntry::Captured).count();
            captured as f64 / entries.len().max(1) as f64
        };
        (fraction(&self.positive), fraction(&self.negative))
    }

    /// Weight of the co-rotating table for a ray
    fn positive_weight(&self, ray: &PlanarRay) -> f64 {
        match self.variant {
            MetricVariant::Schwarzschild => 1.0,
            MetricVariant::Kerr => (0.5 * (1.0 + ray.spin_alignment)).clamp(0.0, 1.0),
        }
    }

    pub fn sample(&self, ray: &PlanarRay) -> LensSample {
        let w = self.positive_weight(ray);
        let pos = lookup(&self.positive, ray.launch_angle);
        let neg = lookup(&self.negative, ray.launch_angle);

        let exit_angle = match (pos, neg) {
            (Some(a), Some(b)) => Some(w * a + (1.0 - w) * b),
            _ if w >= 0.5 => pos,
            _ => neg,
        };

        match exit_angle {
            Some(angle) => LensSample::Background(ray.plane_direction(angle)),
            None => LensSample::Absorbed,
        }
    }

    /// Table packed for the GPU: positive sense then negative sense,
    /// each entry `[exit_angle, captured]`
    pub fn gpu_data(&self) -> Vec<[f32; 2]> {
        self.positive
            .iter()
            .chain(self.negative.iter())
            .map(|entry| match entry {
                TableEntry::Captured => [0.0, 1.0],
                TableEntry::Escaped { exit_angle } => [*exit_angle as f32, 0.0],
            })
            .collect()
    }
}

fn entry(
    integrator: &Integrator,
    params: &BlackHoleParams,
    variant: MetricVariant,
    radius: f64,
    launch_angle: f64,
    sense: f64,
) -> TableEntry {
    let Some(initial) = launch_local(params, variant, radius, launch_angle, sense) else {
        return TableEntry::Captured;
    };
    let result = integrator.integrate(initial, params, variant);
    match result.escape_direction() {
        // Mirror the negative sense back onto the ray's tangent axis
        Some(_) => TableEntry::Escaped {
            exit_angle: sense * result.heading,
        },
        None => TableEntry::Captured,
    }
}

/// Linear interpolation of the exit angle at `launch_angle`. Next to the
/// capture boundary the nearest entry wins.
fn lookup(entries: &[TableEntry], launch_angle: f64) -> Option<f64> {
    let n = entries.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return entries[0].exit_angle();
    }
    let f = (launch_angle / PI).clamp(0.0, 1.0) * (n - 1) as f64;
    let i0 = (f.floor() as usize).min(n - 2);
    let t = f - i0 as f64;
    match (entries[i0].exit_angle(), entries[i0 + 1].exit_angle()) {
        (Some(a), Some(b)) => Some(a + (b - a) * t),
        (a, b) => {
            if t < 0.5 {
                a
            } else {
                b
            }
        }
    }
}

/// Full integration for one ray; the reference the table approximates.
/// Off-equator Kerr rays use the nearer equatorial sense.
pub fn trace_exact(
    params: &BlackHoleParams,
    variant: MetricVariant,
    ray: &PlanarRay,
    config: &IntegratorConfig,
) -> LensSample {
    let sense = match variant {
        MetricVariant::Kerr if ray.spin_alignment < 0.0 => -1.0,
        _ => 1.0,
    };
    match entry(&Integrator::new(*config), params, variant, ray.radius, ray.launch_angle, sense) {
        TableEntry::Captured => LensSample::Absorbed,
        TableEntry::Escaped { exit_angle } => LensSample::Background(ray.plane_direction(exit_angle)),
    }
}

/// CPU evaluation of the lensed sky
pub struct LensingSampler {
    config: LensingConfig,
    table: DeflectionTable,
    background: Background,
}

impl LensingSampler {
    pub fn new(
        params: &BlackHoleParams,
        variant: MetricVariant,
        camera_radius: f64,
        background: Background,
        config: LensingConfig,
    ) -> Self {
        let table = DeflectionTable::build(params, variant, camera_radius, &config);
        Self {
            config,
            table,
            background,
        }
    }

    pub fn table(&self) -> &DeflectionTable {
        &self.table
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn config(&self) -> &LensingConfig {
        &self.config
    }

    /// Rebuild the table if the inputs changed. Returns true on rebuild.
    pub fn refresh(&mut self, params: &BlackHoleParams, variant: MetricVariant, camera_radius: f64) -> bool {
        if self.table.matches(params, variant, camera_radius) {
            return false;
        }
        let start = Instant::now();
        self.table = DeflectionTable::build(params, variant, camera_radius, &self.config);
        let (pos, neg) = self.table.captured_fraction();
        log::debug!(
            "Rebuilt {} deflection table (M = {:.3}, a = {:.3}, r = {:.2}) in {:.1?}, captured {:.1}% / {:.1}%",
            variant.label(),
            params.mass(),
            params.spin(),
            camera_radius,
            start.elapsed(),
            pos * 100.0,
            neg * 100.0
        );
        true
    }

    pub fn sample_ray(&self, ray: &PlanarRay) -> [f32; 3] {
        match self.table.sample(ray) {
            LensSample::Absorbed => self.config.absorbed_color,
            LensSample::Background(direction) => self.background.sample(direction),
        }
    }

    pub fn sample_pixel(&self, camera: &CameraState, x: u32, y: u32, width: u32, height: u32) -> [f32; 3] {
        let direction = camera.pixel_direction(x, y, width, height);
        match PlanarRay::new(camera.eye, direction) {
            Some(ray) => self.sample_ray(&ray),
            None => self.config.absorbed_color,
        }
    }

    /// Row-major RGB frame, rows evaluated in parallel
    pub fn render(&self, camera: &CameraState, width: u32, height: u32) -> Vec<[f32; 3]> {
        (0..height)
            .into_par_iter()
            .flat_map_iter(|y| (0..width).map(move |x| self.sample_pixel(camera, x, y, width, height)))
            .collect()
    }

    pub fn render_image(&self, camera: &CameraState, width: u32, height: u32) -> image::RgbImage {
        let pixels = self.render(camera, width, height);
        image::RgbImage::from_fn(width, height, |x, y| {
            let [r, g, b] = pixels[(y * width + x) as usize];
            image::Rgb([to_u8(r), to_u8(g), to_u8(b)])
        })
    }
}

fn to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}
