//! Equations sidebar and egui plumbing shared by both views
//!
//! Displays the geodesic equations and the live geometry of the current hole.

use common::GraphicsContext;
use egui::{Color32, Context, RichText};
use winit::event::WindowEvent;

use crate::params::BlackHoleParams;

/// An equation with its name and formula
pub struct Equation {
    pub name: &'static str,
    pub formula: &'static str,
    pub description: &'static str,
}

/// Draw the equations sidebar. `readouts` are live (label, value) pairs.
pub fn draw_equations_sidebar(
    ctx: &Context,
    title: &str,
    equations: &[Equation],
    variables: &[(&str, &str)],
    readouts: &[(String, String)],
) {
    egui::SidePanel::right("equations_panel")
        .resizable(true)
        .default_width(300.0)
        .show(ctx, |ui| {
            ui.heading(RichText::new(title).color(Color32::LIGHT_BLUE));
            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.collapsing(RichText::new("Live geometry").strong(), |ui| {
                    egui::Grid::new("readouts_grid")
                        .num_columns(2)
                        .spacing([10.0, 4.0])
                        .show(ui, |ui| {
                            for (label, value) in readouts {
                                ui.label(label.as_str());
                                ui.label(RichText::new(value.as_str()).monospace().color(Color32::WHITE));
                                ui.end_row();
                            }
                        });
                });

                ui.add_space(8.0);

                ui.collapsing(RichText::new("Equations").strong(), |ui| {
                    for eq in equations {
                        ui.group(|ui| {
                            ui.label(RichText::new(eq.name).strong().color(Color32::YELLOW));
                            ui.label(RichText::new(eq.formula).monospace().color(Color32::WHITE));
                            ui.label(RichText::new(eq.description).small().italics());
                        });
                        ui.add_space(4.0);
                    }
                });

                ui.add_space(8.0);

                ui.collapsing(RichText::new("Variables").strong(), |ui| {
                    egui::Grid::new("variables_grid")
                        .num_columns(2)
                        .spacing([10.0, 4.0])
                        .show(ui, |ui| {
                            for (symbol, meaning) in variables {
                                ui.label(RichText::new(*symbol).monospace().color(Color32::LIGHT_GREEN));
                                ui.label(*meaning);
                                ui.end_row();
                            }
                        });
                });
            });
        });
}

/// Derived radii of `params` formatted for the sidebar
pub fn geometry_readouts(params: &BlackHoleParams) -> Vec<(String, String)> {
    let (orbit_pos, orbit_neg) = params.photon_orbit_radii();
    let (b_pos, b_neg) = params.critical_impact_parameters();
    vec![
        ("Mass M".to_string(), format!("{:.2}", params.mass())),
        ("Spin a/M".to_string(), format!("{:+.3}", params.spin_ratio())),
        ("Horizon r+".to_string(), format!("{:.3}", params.horizon_radius())),
        ("Photon sphere 3M".to_string(), format!("{:.3}", params.photon_sphere_radius())),
        ("Photon orbits (L>0, L<0)".to_string(), format!("{orbit_pos:.3}, {orbit_neg:.3}")),
        ("Critical b (L>0, L<0)".to_string(), format!("{b_pos:.3}, {b_neg:.3}")),
    ]
}

// ============================================================================
// Side View - Schwarzschild vs Kerr
// ============================================================================

pub const SIDE_VIEW_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Schwarzschild Radial Equation",
        formula: "(dr/dλ)² = E² - (1 - 2M/r) L²/r²",
        description: "Null geodesic in the equatorial plane",
    },
    Equation {
        name: "Radial Acceleration",
        formula: "d²r/dλ² = L²(r - 3M)/r⁴",
        description: "Vanishes on the photon sphere r = 3M",
    },
    Equation {
        name: "Kerr Radial Function",
        formula: "R = [E(r²+a²) - aL]² - Δ(L - aE)²",
        description: "(dr/dλ)² = R/r⁴ with Δ = r² - 2Mr + a²",
    },
    Equation {
        name: "Kerr Angular Rate",
        formula: "dφ/dλ = [(L - aE) + aP/Δ] / r²",
        description: "Frame dragging: nonzero even for L = 0",
    },
    Equation {
        name: "Event Horizon",
        formula: "r+ = M + √(M² - a²)",
        description: "Photons inside never escape",
    },
    Equation {
        name: "Equatorial Photon Orbits",
        formula: "r = 2M[1 + cos(⅔ acos(∓a/M))]",
        description: "Prograde orbit shrinks, retrograde grows with spin",
    },
];

// ============================================================================
// Lensing View
// ============================================================================

pub const LENSING_EQUATIONS: &[Equation] = &[
    Equation {
        name: "Weak-Field Deflection",
        formula: "Δφ ≈ 4M/b",
        description: "Bending angle for distant light",
    },
    Equation {
        name: "Critical Impact Parameter",
        formula: "b_crit = 3√3 M",
        description: "Photons with b < b_crit fall in (a = 0)",
    },
    Equation {
        name: "Static Observer Launch",
        formula: "L = sin ψ √Δ / (1 - 2M/r) - 2Ma / (r - 2M)",
        description: "Angular momentum of a ray leaving the camera at angle ψ",
    },
    Equation {
        name: "Sky Lookup",
        formula: "u = ½ + atan2(z, x)/2π,  v = ½ - asin(y)/π",
        description: "Equirectangular background direction",
    },
];

pub const GEODESIC_VARIABLES: &[(&str, &str)] = &[
    ("M", "Black hole mass (G = c = 1)"),
    ("a", "Kerr spin parameter"),
    ("E", "Photon energy at infinity"),
    ("L", "Photon angular momentum"),
    ("b", "Impact parameter L/E"),
    ("λ", "Affine parameter"),
    ("Δ", "r² - 2Mr + a²"),
    ("ψ", "Angle from the inward radial direction"),
];

/// egui context, input state and wgpu painter
pub struct EguiLayer {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl EguiLayer {
    pub fn new(gfx: &GraphicsContext) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            &gfx.window,
            Some(gfx.window.scale_factor() as f32),
            None,
        );
        let renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);
        Self { ctx, state, renderer }
    }

    /// True when egui consumed the event
    pub fn on_window_event(&mut self, gfx: &GraphicsContext, event: &WindowEvent) -> bool {
        self.state.on_window_event(&gfx.window, event).consumed
    }

    /// Run `build_ui` and paint the result over `view`
    pub fn paint(
        &mut self,
        gfx: &GraphicsContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        build_ui: impl FnMut(&Context),
    ) {
        let raw_input = self.state.take_egui_input(&gfx.window);
        let full_output = self.ctx.run(raw_input, build_ui);

        self.state.handle_platform_output(&gfx.window, full_output.platform_output);
        let tris = self.ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(&gfx.device, &gfx.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gfx.size.width, gfx.size.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer.update_buffers(&gfx.device, &gfx.queue, encoder, &tris, &screen_descriptor);
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
