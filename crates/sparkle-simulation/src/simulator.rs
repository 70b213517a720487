//! GPU particle simulator: injection, physics step and draw-info generation

use std::sync::{Arc, Mutex};

use sparkle_particle::draw_info_buffer_size;

use crate::config::SimulatorConfig;
use crate::draw_info_pass::DrawInfoPass;
use crate::error::{GpuError, Result, SimulationError};
use crate::fence::CompletionToken;
use crate::frame_slots::{FrameSlots, SlotDescriptor};
use crate::gpu;
use crate::injection::{Injector, ParticleSender};
use crate::pacing::{FramePacer, StepPhase};
use crate::params::{StepUniforms, STEP_UNIFORMS_SIZE};
use crate::physics_pass::PhysicsPass;
use crate::state::{StateSnapshot, StateStore};

/// Purpose of a per-frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// Uniform buffer read by the physics pass
    StepUniforms,
    /// Write-mapped staging buffer the step uniforms are uploaded through
    UniformStaging,
    /// Output of the draw-info pass
    DrawInfo,
    /// Viewport uniforms owned by the renderer
    RenderUniforms,
}

/// GPU-based particle simulation
///
/// Keeps a pair of state buffers on the GPU. Each [`step`](Self::step) injects queued particles
/// into the live buffer, integrates it into the other one and flips the pair;
/// [`generate_draw_info`](Self::generate_draw_info) turns the live buffer into instanced quads.
pub struct Simulator {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: SimulatorConfig,

    state: StateStore,
    physics: PhysicsPass,
    draw_info: DrawInfoPass,
    slots: FrameSlots<SlotKey, wgpu::Buffer>,
    injector: Injector,
    pacer: FramePacer,

    device_lost: Arc<Mutex<Option<String>>>,
    generation: u64,
}

impl Simulator {
    /// Build a simulator on an existing device.
    ///
    /// The configuration is validated before any GPU object is created. Shader compilation and
    /// pipeline creation run inside a validation scope so a bad kernel fails here rather than on
    /// the first step. Replaces any device-lost callback already installed on `device`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: SimulatorConfig) -> Result<Self> {
        config.validate_for_limits(&device.limits())?;
        log::info!("Initializing Simulator with {config:?}");

        let device_lost = Arc::new(Mutex::new(None));
        let lost = device_lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({reason:?}): {message}");
            if let Ok(mut lost) = lost.lock() {
                *lost = Some(format!("{reason:?}: {message}"));
            }
        });

        let frames_in_flight = config.frames_in_flight as usize;
        let (state, physics, draw_info) = gpu::validation_scope(&device, "pipeline creation", || {
            let state = StateStore::new(&device, &queue, config.capacity);

            let mut physics = PhysicsPass::new(&device, frames_in_flight);
            physics.bind_state(&device, state.buffers());
            log::info!("Physics pipeline created");

            let mut draw_info = DrawInfoPass::new(&device);
            draw_info.bind_state(state.buffers());
            log::info!("Draw info pipeline created");

            Ok::<_, SimulationError>((state, physics, draw_info))
        })?;

        Ok(Self {
            slots: FrameSlots::new(frames_in_flight),
            injector: Injector::new(config.capacity),
            pacer: FramePacer::new(config.max_steps_in_flight as usize),
            device,
            queue,
            config,
            state,
            physics,
            draw_info,
            device_lost,
            generation: 0,
        })
    }

    /// Acquire a headless adapter and device and build a simulator on it.
    ///
    /// An invalid configuration is rejected before the adapter is requested.
    pub async fn create(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = gpu::request_adapter(&instance).await?;
        let (device, queue) = gpu::request_device(&adapter).await?;
        Self::new(device, queue, config)
    }

    /// Queue a particle for the next step. Never blocks.
    pub fn add_particle(&self, px: f32, py: f32, vx: f32, vy: f32) {
        self.injector.add_particle(px, py, vx, vy);
    }

    /// Handle for queuing particles from elsewhere, including other threads.
    pub fn particle_sender(&self) -> ParticleSender {
        self.injector.sender()
    }

    /// Advance the simulation by `delta_seconds`.
    ///
    /// Returns the token of the step's submission. If the step fails before its dispatch is
    /// submitted, the state buffers are not flipped and the step leaves no token behind. A failure
    /// while moving to the next frame slot happens after the submission, so the flip and the token
    /// both stand.
    pub fn step(&mut self, delta_seconds: f32) -> Result<CompletionToken> {
        self.check_device()?;
        self.pacer.begin()?;

        self.record_step(delta_seconds).inspect_err(|err| {
            self.pacer.abort();
            log::error!("Simulation step failed: {err}");
        })
    }

    fn record_step(&mut self, delta_seconds: f32) -> Result<CompletionToken> {
        // Draining
        let injected = self
            .injector
            .flush(&self.device, &self.queue, self.state.live())?;

        // Dispatching
        self.pacer.enter(StepPhase::Dispatching);
        let frame_index = self.slots.frame_index();
        let staging = self.frame_slot(
            SlotKey::UniformStaging,
            SlotDescriptor::new(
                STEP_UNIFORMS_SIZE,
                wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            ),
        )?;
        let uniforms = self.frame_slot(
            SlotKey::StepUniforms,
            SlotDescriptor::new(
                STEP_UNIFORMS_SIZE,
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            ),
        )?;
        gpu::write_mapped(
            &self.device,
            &staging,
            bytemuck::bytes_of(&StepUniforms::new(delta_seconds)),
        )?;
        self.physics
            .bind_uniforms(&self.device, frame_index, &uniforms);

        let index = gpu::validation_scope(&self.device, "physics step", || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Simulation Encoder"),
                });
            encoder.copy_buffer_to_buffer(&staging, 0, &uniforms, 0, STEP_UNIFORMS_SIZE);
            self.physics.encode(
                &mut encoder,
                self.state.live_index(),
                frame_index,
                self.config.workgroup_count(),
            )?;
            Ok::<_, SimulationError>(self.queue.submit(std::iter::once(encoder.finish())))
        })?;
        let token = CompletionToken::for_submission(&self.device, &self.queue, index);

        // Advancing: the dispatch is submitted, so the written buffer is now the live one.
        self.pacer.enter(StepPhase::Advancing);
        self.state.flip();
        self.generation += 1;
        let slots = &mut self.slots;
        self.pacer.retire(&token, |token| slots.advance_frame(token))?;

        log::trace!(
            "Step {} submitted (dt {delta_seconds:.4}, {injected} injected, frame {frame_index})",
            self.generation
        );
        Ok(token)
    }

    /// Run the draw-info pass over the live state and return the frame's draw-info buffer.
    ///
    /// Does not wait for the GPU. The buffer holds `capacity` records and is recycled after
    /// `frames_in_flight` further steps, so do not hold on to it longer than that.
    pub fn generate_draw_info(&mut self) -> Result<wgpu::Buffer> {
        self.check_device()?;

        let frame_index = self.slots.frame_index();
        let buffer = self.frame_slot(
            SlotKey::DrawInfo,
            SlotDescriptor::new(
                draw_info_buffer_size(self.config.capacity),
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            ),
        )?;

        gpu::validation_scope(&self.device, "draw info generation", || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Draw Info Encoder"),
                });
            self.draw_info.encode(
                &self.device,
                &mut encoder,
                self.state.live_index(),
                frame_index,
                &buffer,
                self.config.workgroup_count(),
            )?;
            self.queue.submit(std::iter::once(encoder.finish()));
            Ok::<_, SimulationError>(())
        })?;

        Ok(buffer)
    }

    /// Copy the live state buffer back to the CPU. Blocks until the copy has completed.
    pub fn inspect_state(&mut self) -> Result<StateSnapshot> {
        self.check_device()?;

        let size = self.state.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("State Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("State Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(self.state.live(), 0, &staging, 0, size);
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        }).map_err(GpuError::from)?;

        let bytes = gpu::read_mapped(&self.device, &staging);
        staging.destroy();
        Ok(StateSnapshot::new(bytes?))
    }

    /// Per-frame buffer for `key` at the current frame-in-flight index, created on first use.
    ///
    /// Every request for a key must use the descriptor it was first created with.
    pub fn frame_slot(&mut self, key: SlotKey, descriptor: SlotDescriptor) -> Result<wgpu::Buffer> {
        let device = &self.device;
        let buffer = self.slots.get_or_create(key, descriptor, |key, descriptor, index| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{key:?} #{index}")),
                size: descriptor.size,
                usage: descriptor.usage,
                mapped_at_creation: false,
            })
        })?;
        Ok(buffer.clone())
    }

    fn check_device(&self) -> Result<(), GpuError> {
        // The device-lost callback only fires from inside a poll.
        let polled = self.device.poll(wgpu::PollType::Poll);
        match self.device_lost.lock() {
            Ok(lost) => {
                if let Some(reason) = lost.as_ref() {
                    return Err(GpuError::DeviceLost(reason.clone()));
                }
            }
            Err(_) => return Err(GpuError::DeviceLost("device-lost flag poisoned".into())),
        }
        polled?;
        Ok(())
    }

    /// Get particle capacity
    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.config.frames_in_flight
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Current frame-in-flight index.
    pub fn frame_index(&self) -> usize {
        self.slots.frame_index()
    }

    /// Which of the two state buffers holds the newest generation.
    pub fn live_index(&self) -> usize {
        self.state.live_index()
    }

    /// Number of steps submitted so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Submitted steps the pacing gate has not yet seen complete.
    pub fn steps_in_flight(&self) -> usize {
        self.pacer.in_flight()
    }

    /// Particles queued but not yet injected.
    pub fn pending_particles(&self) -> usize {
        self.injector.pending()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
