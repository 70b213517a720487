//! Draw-info generation compute pass

use std::collections::HashMap;

use crate::error::SimulationError;
use crate::ping_pong::PingPong;

/// Turns the live state buffer into renderer-ready [`DrawInfo`](sparkle_particle::DrawInfo)
/// records
pub struct DrawInfoPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    state_buffers: Option<[wgpu::Buffer; 2]>,
    // Keyed by (live state index, frame-in-flight index)
    bind_groups: HashMap<(usize, usize), wgpu::BindGroup>,
}

impl DrawInfoPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Draw Info Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw_info.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Info Bind Group Layout"),
            entries: &[
                // State (read-only storage) - Binding 0
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
                // Draw info out (storage) - Binding 1
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw Info Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Draw Info Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            layout,
            state_buffers: None,
            bind_groups: HashMap::new(),
        }
    }

    /// Point the pass at a state pair. Drops every cached bind group.
    pub fn bind_state(&mut self, buffers: &PingPong<wgpu::Buffer>) {
        self.state_buffers = Some(buffers.items().clone());
        self.bind_groups.clear();
    }

    /// Record the dispatch reading state buffer `live_index` into `draw_info`, the frame slot
    /// buffer of `frame_index`.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        live_index: usize,
        frame_index: usize,
        draw_info: &wgpu::Buffer,
        workgroups: u32,
    ) -> Result<(), SimulationError> {
        let state = self
            .state_buffers
            .as_ref()
            .map(|buffers| &buffers[live_index])
            .ok_or(SimulationError::MissingBinding {
                pass: "draw info",
                binding: "state",
            })?;

        let layout = &self.layout;
        let bind_group = self
            .bind_groups
            .entry((live_index, frame_index))
            .or_insert_with(|| {
                log::debug!("Creating draw info bind group for state {live_index}, frame {frame_index}");
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Draw Info Bind Group"),
                    layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: state.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: draw_info.as_entire_binding(),
                        },
                    ],
                })
            });

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Draw Info Pass"),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, &*bind_group, &[]);
        compute_pass.dispatch_workgroups(workgroups, 1, 1);
        Ok(())
    }
}
