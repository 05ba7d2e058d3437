//! Side-by-side photon trajectories
//!
//! The same fan of photons is traced around a Schwarzschild hole (top)
//! and a Kerr hole of equal mass (bottom). Shows:
//! - Event horizon outline
//! - Photon orbit circles (one for Schwarzschild, two for Kerr)
//! - Spin direction arc around the Kerr horizon
//! - Paths growing frame by frame, fading toward their tails
//!
//! Controls:
//! - Scroll: Zoom in/out
//! - Up/Down: Adjust mass
//! - Left/Right: Adjust spin
//! - R: Reset paths
//! - H: Toggle photon orbit overlay
//! - Space: Toggle continuous emission

use common::{Camera2D, GraphicsContext};
use geodesic_lens::equations_ui::{
    draw_equations_sidebar, geometry_readouts, EguiLayer, GEODESIC_VARIABLES, SIDE_VIEW_EQUATIONS,
};
use geodesic_lens::params::{BlackHoleParams, ParamDelta, DEFAULT_MASS};
use geodesic_lens::renderer::SideViewRenderer;
use geodesic_lens::side_view::{SideViewConfig, SideViewScene};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, PhysicalKey},
};

const INITIAL_SPIN_RATIO: f64 = 0.9;
const MASS_STEP: f64 = 0.1;
const SPIN_STEP: f64 = 0.1;
// View extents in units of mass; the view follows mass changes
const INITIAL_HALF_HEIGHT: f32 = 14.0;
const MIN_HALF_HEIGHT: f32 = 3.0;
const MAX_HALF_HEIGHT: f32 = 60.0;

struct App {
    ctx: GraphicsContext,
    renderer: SideViewRenderer,
    camera: Camera2D,
    scene: SideViewScene,
    egui: EguiLayer,
}

impl App {
    fn new(ctx: GraphicsContext) -> Self {
        let renderer = SideViewRenderer::new(&ctx);
        let params = BlackHoleParams::new(DEFAULT_MASS, INITIAL_SPIN_RATIO * DEFAULT_MASS);
        let camera = Camera2D::new(
            INITIAL_HALF_HEIGHT * params.mass() as f32,
            Self::panel_aspect(ctx.size),
        );
        let scene = SideViewScene::new(SideViewConfig::default(), params);
        let egui = EguiLayer::new(&ctx);

        Self {
            ctx,
            renderer,
            camera,
            scene,
            egui,
        }
    }

    /// Each panel covers the full width and half the height
    fn panel_aspect(size: PhysicalSize<u32>) -> f32 {
        size.width as f32 / (size.height / 2).max(1) as f32
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.ctx.resize(new_size);
        self.camera.update_aspect_ratio(Self::panel_aspect(self.ctx.size));
    }

    fn adjust(&mut self, delta: ParamDelta) {
        let old_mass = self.scene.params().mass();
        self.scene.adjust(delta);
        self.camera.rescale((self.scene.params().mass() / old_mass) as f32);
    }

    fn update(&mut self) {
        self.scene.update();
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (width, height) = (self.ctx.size.width, self.ctx.size.height);
        self.renderer
            .update(&self.ctx.queue, &self.scene, &self.camera, (height / 2).max(1));

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.renderer.render(&mut encoder, &view, width, height);

        let scene = &self.scene;
        self.egui.paint(&self.ctx, &mut encoder, &view, |ctx| {
            draw_equations_sidebar(
                ctx,
                "Schwarzschild vs Kerr",
                SIDE_VIEW_EQUATIONS,
                GEODESIC_VARIABLES,
                &geometry_readouts(scene.params()),
            );

            egui::TopBottomPanel::top("status").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    for panel in scene.panels() {
                        ui.label(format!(
                            "{}: {} active, {} captured",
                            panel.variant().label(),
                            panel.active_count(),
                            panel.captured_count()
                        ));
                        ui.separator();
                    }
                    if scene.is_emitting() {
                        ui.label(egui::RichText::new("EMITTING").color(egui::Color32::GREEN));
                    } else {
                        ui.label("Paused emission (Space)");
                    }
                });
            });
        });

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        if state != ElementState::Pressed {
            return;
        }

        match key {
            KeyCode::KeyR => self.scene.reset(),
            KeyCode::KeyH => self.scene.toggle_photon_sphere(),
            KeyCode::Space => self.scene.toggle_emission(),
            KeyCode::ArrowUp => self.adjust(ParamDelta::mass(MASS_STEP)),
            KeyCode::ArrowDown => self.adjust(ParamDelta::mass(-MASS_STEP)),
            KeyCode::ArrowRight => self.adjust(ParamDelta::spin_ratio(SPIN_STEP)),
            KeyCode::ArrowLeft => self.adjust(ParamDelta::spin_ratio(-SPIN_STEP)),
            _ => {}
        }
    }

    fn handle_scroll(&mut self, delta: f32) {
        let mass = self.scene.params().mass() as f32;
        self.camera
            .zoom(1.0 - delta * 0.1, MIN_HALF_HEIGHT * mass, MAX_HALF_HEIGHT * mass);
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.egui.on_window_event(&self.ctx, event)
    }
}

fn main() {
    let (ctx, event_loop) = pollster::block_on(GraphicsContext::new(
        "Black Hole - Schwarzschild vs Kerr Photon Paths",
        1280,
        800,
    ));

    let mut app = App::new(ctx);

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { ref event, .. } => {
                    let consumed = app.handle_window_event(event);

                    if !consumed {
                        match event {
                            WindowEvent::CloseRequested => elwt.exit(),
                            WindowEvent::Resized(size) => app.resize(*size),
                            WindowEvent::KeyboardInput {
                                event:
                                    KeyEvent {
                                        physical_key: PhysicalKey::Code(key),
                                        state,
                                        ..
                                    },
                                ..
                            } => app.handle_key(*key, *state),
                            WindowEvent::MouseWheel { delta, .. } => {
                                let scroll = match delta {
                                    MouseScrollDelta::LineDelta(_, y) => *y,
                                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                                };
                                app.handle_scroll(scroll);
                            }
                            WindowEvent::RedrawRequested => {
                                app.update();
                                match app.render() {
                                    Ok(_) => {}
                                    Err(wgpu::SurfaceError::Lost) => app.resize(app.ctx.size),
                                    Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                                    Err(e) => log::error!("Render error: {:?}", e),
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Event::AboutToWait => {
                    app.ctx.window.request_redraw();
                }
                _ => {}
            }
        })
        .expect("Event loop error");
}
