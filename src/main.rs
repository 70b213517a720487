//! Cursor Sparkles
//!
//! Move the pointer over the window to spray particles. Each frame steps the GPU simulation,
//! generates draw info and renders it as instanced quads.

mod config;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use config::AppConfig;
use glam::Vec2;
use sparkle_renderer::{SparkleRenderer, Viewport};
use sparkle_simulation::{
    gpu, ConfigError, GpuError, SimulationError, Simulator, SimulatorConfig, SlotKey,
};
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("surface is not supported by the adapter")]
    IncompatibleSurface,
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Prefer an sRGB format; fail if the surface offers nothing at all.
fn surface_format(
    caps: &wgpu::SurfaceCapabilities,
) -> Result<(wgpu::TextureFormat, wgpu::CompositeAlphaMode), AppError> {
    let format = caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or(caps.formats.first())
        .copied()
        .ok_or(AppError::IncompatibleSurface)?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .ok_or(AppError::IncompatibleSurface)?;
    Ok((format, alpha_mode))
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    simulator: Simulator,
    renderer: SparkleRenderer,
    viewport: Viewport,

    started: Instant,
    last_frame_time: Instant,
    frame_times: VecDeque<f32>,
}

impl GpuState {
    async fn new(window: Arc<Window>, simulator_config: SimulatorConfig) -> Result<Self, AppError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(GpuError::from)?;

        let (device, queue) = gpu::request_device(&adapter).await?;

        // Configure surface
        let surface_caps = surface.get_capabilities(&adapter);
        let (format, alpha_mode) = surface_format(&surface_caps)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: simulator_config.frames_in_flight,
        };
        surface.configure(&device, &config);

        let simulator = Simulator::new(device.clone(), queue.clone(), simulator_config)?;
        log::info!("✓ Simulator initialized ({} particles)", simulator.capacity());

        let renderer = SparkleRenderer::new(&device, config.format);
        log::info!("✓ Renderer initialized");

        let now = Instant::now();
        Ok(Self {
            surface,
            device,
            queue,
            viewport: Viewport::new(config.width, config.height),
            config,
            simulator,
            renderer,
            started: now,
            last_frame_time: now,
            frame_times: VecDeque::with_capacity(100),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.viewport.resize(new_size.width, new_size.height);
        }
    }

    /// Step, generate draw info and render one frame. Returns the average FPS.
    fn render(&mut self, max_delta_seconds: f32) -> Result<f32, AppError> {
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        self.simulator.step(frame_time.min(max_delta_seconds))?;
        let draw_info = self.simulator.generate_draw_info()?;
        let uniforms = self
            .simulator
            .frame_slot(SlotKey::RenderUniforms, SparkleRenderer::uniform_slot())?;

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.render(
            &self.device,
            &self.queue,
            &view,
            &self.viewport,
            self.started.elapsed().as_secs_f32(),
            &uniforms,
            &draw_info,
            self.simulator.capacity(),
        );
        output.present();

        if self.frame_times.len() == 100 {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        let average = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        Ok(if average > 0.0 { 1.0 / average } else { 0.0 })
    }
}

struct App {
    config: AppConfig,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    last_cursor_pos: Option<Vec2>,
}

impl App {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.demo.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.demo.width,
                self.config.demo.height,
            ));

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        self.window = Some(window.clone());
        self.gpu_state = Some(pollster::block_on(GpuState::new(
            window,
            self.config.simulator,
        ))?);
        Ok(())
    }

    /// Spawn a sparkle at the pointer, moving with the pointer's velocity.
    fn pointer_moved(&mut self, position: winit::dpi::PhysicalPosition<f64>) {
        // Window y grows downward, the simulation's y grows upward.
        let pos = Vec2::new(position.x as f32, -(position.y as f32));
        let prev = self.last_cursor_pos.unwrap_or(pos);
        let velocity = (pos - prev) * self.config.demo.velocity_scale;
        self.last_cursor_pos = Some(pos);

        if let Some(gpu_state) = &self.gpu_state {
            gpu_state
                .simulator
                .add_particle(pos.x, pos.y, velocity.x, velocity.y);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.init(event_loop) {
                log::error!("Startup failed: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::CursorMoved { position, .. } => self.pointer_moved(position),

            WindowEvent::CursorLeft { .. } => self.last_cursor_pos = None,

            WindowEvent::RedrawRequested => {
                if let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) {
                    match gpu_state.render(self.config.demo.max_delta_seconds) {
                        Ok(fps) => {
                            window.set_title(&format!(
                                "{} - {:.0} FPS - {} queued",
                                self.config.demo.title,
                                fps,
                                gpu_state.simulator.pending_particles()
                            ));
                        }
                        Err(AppError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                            gpu_state.resize(window.inner_size())
                        }
                        Err(AppError::Surface(wgpu::SurfaceError::Timeout)) => {
                            log::warn!("Surface timeout, skipping frame")
                        }
                        Err(err) => {
                            log::error!("Frame failed: {err}");
                            event_loop.exit();
                        }
                    }
                }
            }

            _ => {}
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<(), AppError> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from {path}");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    log::info!("Starting cursor sparkles...");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        config,
        window: None,
        gpu_state: None,
        last_cursor_pos: None,
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
