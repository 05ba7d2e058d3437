//! Gravitational lensing of a background sky
//!
//! A pinhole camera orbits the hole; every pixel looks up its bent ray in a
//! deflection table traced for the current camera radius. Shows:
//! - The black shadow of captured rays
//! - The distorted sky and Einstein ring
//! - The asymmetric Kerr shadow
//!
//! Controls:
//! - Left drag: Orbit camera
//! - Scroll: Zoom in/out
//! - Up/Down: Adjust mass
//! - Left/Right: Adjust spin
//! - K: Switch Schwarzschild/Kerr
//! - P: Save a CPU-rendered reference frame

use common::{GraphicsContext, OrbitCamera};
use geodesic_lens::background::{Background, DEFAULT_BACKGROUND_PATH};
use geodesic_lens::equations_ui::{
    draw_equations_sidebar, geometry_readouts, EguiLayer, GEODESIC_VARIABLES, LENSING_EQUATIONS,
};
use geodesic_lens::lensing::{LensingConfig, LensingSampler};
use geodesic_lens::metric::MetricVariant;
use geodesic_lens::params::{BlackHoleParams, ParamDelta};
use geodesic_lens::rays::{CameraState, DEFAULT_FOCAL_LENGTH};
use geodesic_lens::renderer::{LensingRenderer, LensingUniform};
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, PhysicalKey},
};

const INITIAL_DISTANCE: f64 = 30.0;
const MAX_DISTANCE: f64 = 200.0;
/// Closest approach, in horizon radii
const MIN_DISTANCE_HORIZONS: f64 = 3.0;
const DRAG_SENSITIVITY: f64 = 0.005;
const MASS_STEP: f64 = 0.1;
const SPIN_STEP: f64 = 0.1;
const INITIAL_SPIN_RATIO: f64 = 0.9;
const REFERENCE_PATH: &str = "lensing_reference.png";

struct App {
    ctx: GraphicsContext,
    renderer: LensingRenderer,
    sampler: LensingSampler,
    orbit: OrbitCamera,
    params: BlackHoleParams,
    variant: MetricVariant,
    dragging: bool,
    cursor: Option<PhysicalPosition<f64>>,
    egui: EguiLayer,
}

impl App {
    fn new(ctx: GraphicsContext) -> Self {
        let params = BlackHoleParams::new(1.0, INITIAL_SPIN_RATIO);
        let variant = MetricVariant::Schwarzschild;
        let orbit = OrbitCamera::new(
            INITIAL_DISTANCE,
            MIN_DISTANCE_HORIZONS * params.horizon_radius(),
            MAX_DISTANCE,
        );

        let background = Background::load_or_noise(DEFAULT_BACKGROUND_PATH);
        let sampler = LensingSampler::new(&params, variant, orbit.distance, background, LensingConfig::default());
        let renderer = LensingRenderer::new(&ctx, sampler.background(), sampler.table());
        let egui = EguiLayer::new(&ctx);

        let mut app = Self {
            ctx,
            renderer,
            sampler,
            orbit,
            params,
            variant,
            dragging: false,
            cursor: None,
            egui,
        };
        app.update_title();
        app
    }

    fn camera(&self) -> CameraState {
        CameraState::from_orbit(&self.orbit, DEFAULT_FOCAL_LENGTH)
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.ctx.resize(new_size);
    }

    fn update_title(&self) {
        self.ctx.window.set_title(&format!(
            "Black Hole Lensing - {} | M = {:.2}, a/M = {:+.2}, r = {:.1}",
            self.variant.label(),
            self.params.mass(),
            self.params.spin_ratio(),
            self.orbit.distance
        ));
    }

    /// Rebuild and upload the table after a change of params, variant or radius
    fn refresh_table(&mut self) {
        if self.sampler.refresh(&self.params, self.variant, self.orbit.distance) {
            self.renderer
                .set_table(&self.ctx.device, &self.ctx.queue, self.sampler.table());
        }
        self.update_title();
    }

    fn set_params(&mut self, params: BlackHoleParams) {
        self.params = params;
        self.orbit.min_distance = MIN_DISTANCE_HORIZONS * params.horizon_radius();
        self.orbit.zoom(0.0);
        self.refresh_table();
    }

    fn toggle_variant(&mut self) {
        self.variant = match self.variant {
            MetricVariant::Schwarzschild => MetricVariant::Kerr,
            MetricVariant::Kerr => MetricVariant::Schwarzschild,
        };
        log::info!("Lensing view: {}", self.variant.label());
        self.refresh_table();
    }

    fn save_reference(&self) {
        let (width, height) = (self.ctx.size.width, self.ctx.size.height);
        let image = self.sampler.render_image(&self.camera(), width, height);
        match image.save(REFERENCE_PATH) {
            Ok(()) => log::info!("Saved {}x{} reference frame to {}", width, height, REFERENCE_PATH),
            Err(e) => log::error!("Failed to save {}: {}", REFERENCE_PATH, e),
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniform = LensingUniform::new(
            &self.camera(),
            self.sampler.table(),
            self.ctx.size.width,
            self.ctx.size.height,
            self.sampler.config().absorbed_color,
        );
        self.renderer.update(&self.ctx.queue, &uniform);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.renderer.render(&mut encoder, &view);

        let (params, table, distance) = (&self.params, self.sampler.table(), self.orbit.distance);
        self.egui.paint(&self.ctx, &mut encoder, &view, |ctx| {
            let mut readouts = geometry_readouts(params);
            readouts.push(("Camera radius".to_string(), format!("{distance:.2}")));
            let (captured_pos, captured_neg) = table.captured_fraction();
            readouts.push((
                "Captured launch angles".to_string(),
                format!("{:.1}%, {:.1}%", captured_pos * 100.0, captured_neg * 100.0),
            ));

            draw_equations_sidebar(
                ctx,
                "Gravitational Lensing",
                LENSING_EQUATIONS,
                GEODESIC_VARIABLES,
                &readouts,
            );
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
            KeyCode::KeyK => self.toggle_variant(),
            KeyCode::KeyP => self.save_reference(),
            KeyCode::ArrowUp => self.set_params(self.params.adjusted(ParamDelta::mass(MASS_STEP))),
            KeyCode::ArrowDown => self.set_params(self.params.adjusted(ParamDelta::mass(-MASS_STEP))),
            KeyCode::ArrowRight => self.set_params(self.params.adjusted(ParamDelta::spin_ratio(SPIN_STEP))),
            KeyCode::ArrowLeft => self.set_params(self.params.adjusted(ParamDelta::spin_ratio(-SPIN_STEP))),
            _ => {}
        }
    }

    fn handle_cursor(&mut self, position: PhysicalPosition<f64>) {
        if let (true, Some(last)) = (self.dragging, self.cursor) {
            let dx = position.x - last.x;
            let dy = position.y - last.y;
            self.orbit.orbit(-dx * DRAG_SENSITIVITY, dy * DRAG_SENSITIVITY);
        }
        self.cursor = Some(position);
    }

    fn handle_scroll(&mut self, delta: f32) {
        self.orbit.zoom(delta as f64);
        self.refresh_table();
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.egui.on_window_event(&self.ctx, event)
    }
}

fn main() {
    let (ctx, event_loop) = pollster::block_on(GraphicsContext::new(
        "Black Hole - Gravitational Lensing",
        1280,
        720,
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
                            WindowEvent::MouseInput {
                                state,
                                button: MouseButton::Left,
                                ..
                            } => app.dragging = *state == ElementState::Pressed,
                            WindowEvent::CursorMoved { position, .. } => app.handle_cursor(*position),
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
                            WindowEvent::RedrawRequested => match app.render() {
                                Ok(_) => {}
                                Err(wgpu::SurfaceError::Lost) => app.resize(app.ctx.size),
                                Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                                Err(e) => log::error!("Render error: {:?}", e),
                            },
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
