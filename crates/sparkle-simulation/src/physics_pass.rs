//! Physics step compute pass

use crate::error::SimulationError;
use crate::params::STEP_UNIFORMS_SIZE;
use crate::ping_pong::PingPong;

/// Pipeline plus the bind groups it dispatches with
///
/// Group 0 pairs the state buffers (read, write). Both orientations are built once because the
/// buffers never change, only which one is live. Group 1 holds the step uniforms, one bind group
/// per frame-in-flight index.
pub struct PhysicsPass {
    pipeline: wgpu::ComputePipeline,
    state_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    state_bind_groups: Option<[wgpu::BindGroup; 2]>,
    uniform_bind_groups: Vec<Option<wgpu::BindGroup>>,
}

impl PhysicsPass {
    pub fn new(device: &wgpu::Device, frames_in_flight: usize) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Physics Step Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/physics_step.wgsl").into()),
        });

        let state_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Physics State Bind Group Layout"),
            entries: &[
                // State in (read-only storage) - Binding 0
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // State out (storage) - Binding 1
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Physics Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(STEP_UNIFORMS_SIZE),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Physics Pipeline Layout"),
            bind_group_layouts: &[&state_layout, &uniform_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Physics Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            state_layout,
            uniform_layout,
            state_bind_groups: None,
            uniform_bind_groups: vec![None; frames_in_flight],
        }
    }

    /// Build the bind groups for both read/write orientations of the state pair.
    pub fn bind_state(&mut self, device: &wgpu::Device, buffers: &PingPong<wgpu::Buffer>) {
        self.state_bind_groups = Some(buffers.orientations(|read, write| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Physics State Bind Group"),
                layout: &self.state_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: read.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: write.as_entire_binding(),
                    },
                ],
            })
        }));
    }

    /// Bind the uniform buffer of `frame_index`. Only the first call per frame index creates a
    /// bind group; frame slot buffers never change identity.
    pub fn bind_uniforms(&mut self, device: &wgpu::Device, frame_index: usize, buffer: &wgpu::Buffer) {
        let layout = &self.uniform_layout;
        self.uniform_bind_groups[frame_index].get_or_insert_with(|| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Physics Uniform Bind Group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        });
    }

    /// Record the dispatch reading the buffer at `live_index` and writing the other one.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        live_index: usize,
        frame_index: usize,
        workgroups: u32,
    ) -> Result<(), SimulationError> {
        let state = self
            .state_bind_groups
            .as_ref()
            .map(|groups| &groups[live_index])
            .ok_or(SimulationError::MissingBinding {
                pass: "physics step",
                binding: "state",
            })?;
        let uniforms = self
            .uniform_bind_groups
            .get(frame_index)
            .and_then(Option::as_ref)
            .ok_or(SimulationError::MissingBinding {
                pass: "physics step",
                binding: "uniforms",
            })?;

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Physics Step Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, state, &[]);
        compute_pass.set_bind_group(1, uniforms, &[]);
        compute_pass.dispatch_workgroups(workgroups, 1, 1);
        Ok(())
    }
}
