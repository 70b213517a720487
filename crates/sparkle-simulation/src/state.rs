//! Ping-pong simulation state buffers and CPU-side snapshots of them

use sparkle_particle::{
    particle_offset, state_buffer_size, Particle, StateHeader, PARTICLE_SIZE, STATE_HEADER_SIZE,
};

use crate::ping_pong::PingPong;

/// The two simulation state buffers
///
/// The live buffer holds the newest generation and is the input of the next physics dispatch;
/// the prior buffer is that dispatch's output.
pub struct StateStore {
    buffers: PingPong<wgpu::Buffer>,
    capacity: u32,
    size: u64,
}

impl StateStore {
    /// Both buffers are zero-filled apart from the header.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, capacity: u32) -> Self {
        let size = state_buffer_size(capacity);
        let create = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let buffers = PingPong::new(create("State Buffer A"), create("State Buffer B"));

        let header = StateHeader::new(capacity);
        for buffer in buffers.items() {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(&header));
        }

        log::info!("State buffers created ({capacity} particles, {size} bytes each)");

        Self {
            buffers,
            capacity,
            size,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Size of each buffer in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn live_index(&self) -> usize {
        self.buffers.live_index()
    }

    pub fn live(&self) -> &wgpu::Buffer {
        self.buffers.live()
    }

    pub fn buffers(&self) -> &PingPong<wgpu::Buffer> {
        &self.buffers
    }

    pub fn flip(&mut self) {
        self.buffers.flip();
    }
}

/// Raw copy of a state buffer read back to the CPU
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    bytes: Vec<u8>,
}

impl StateSnapshot {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Capacity recorded in the header, zero if the snapshot is truncated.
    pub fn capacity(&self) -> u32 {
        self.bytes
            .get(..STATE_HEADER_SIZE as usize)
            .map(|header| bytemuck::pod_read_unaligned::<StateHeader>(header).capacity)
            .unwrap_or(0)
    }

    pub fn particle(&self, index: u32) -> Option<Particle> {
        let start = particle_offset(index) as usize;
        let end = start + PARTICLE_SIZE as usize;
        self.bytes.get(start..end).map(bytemuck::pod_read_unaligned)
    }

    /// Every slot, including empty ones.
    pub fn particles(&self) -> Vec<Particle> {
        (0..self.capacity())
            .map_while(|index| self.particle(index))
            .collect()
    }

    /// Slots that have been written by the injection queue.
    pub fn live_particles(&self) -> Vec<Particle> {
        self.particles()
            .into_iter()
            .filter(|particle| !particle.is_empty())
            .collect()
    }
}
