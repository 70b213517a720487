//! Particle injection: a multi-producer mailbox drained into the state ring once per step

use crossbeam_channel::{Receiver, Sender};
use glam::Vec2;
use rand::Rng;
use sparkle_particle::{particle_offset, Particle};

use crate::error::SimulationError;

/// Cloneable handle for queuing particles from any thread
///
/// Sending never blocks. Particles sent after the owning simulator is dropped are discarded.
#[derive(Clone)]
pub struct ParticleSender {
    sender: Sender<Particle>,
}

impl ParticleSender {
    /// Queue a new particle at `(px, py)` moving with `(vx, vy)` and a random seed.
    pub fn add_particle(&self, px: f32, py: f32, vx: f32, vy: f32) {
        let seed = rand::rng().random::<f32>();
        self.send(Particle::new(Vec2::new(px, py), Vec2::new(vx, vy), seed));
    }

    pub fn send(&self, particle: Particle) {
        if self.sender.send(particle).is_err() {
            log::trace!("Particle dropped, simulator is gone");
        }
    }
}

/// Unbounded client-side queue of particles waiting for the next step
pub struct ParticleQueue {
    sender: Sender<Particle>,
    receiver: Receiver<Particle>,
}

impl Default for ParticleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> ParticleSender {
        ParticleSender {
            sender: self.sender.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Take everything queued so far. Particles sent while draining land in this batch or the
    /// next one.
    pub fn drain(&self) -> Vec<Particle> {
        self.receiver.try_iter().collect()
    }
}

/// Contiguous run of ring slots written by one staging copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// First ring slot
    pub start: u32,
    /// Number of slots
    pub len: u32,
    /// Index of the first particle of this chunk in the drained batch
    pub source: usize,
}

/// Write cursor of the particle ring
///
/// Monotonic modulo capacity and unaware of particle lifetimes: once the ring is full, new
/// particles overwrite the oldest slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    next: u32,
    capacity: u32,
}

impl RingCursor {
    pub fn new(capacity: u32) -> Self {
        debug_assert!(capacity > 0);
        Self { next: 0, capacity }
    }

    /// Slot the next particle will be written to.
    pub fn position(&self) -> u32 {
        self.next
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Split a batch of `count` particles into chunks that never cross the end of the ring and
    /// advance the cursor past them.
    ///
    /// A batch larger than the ring would overwrite its own head, so only the last `capacity`
    /// particles are planned. The result has at most two chunks.
    pub fn plan(&mut self, count: usize) -> Vec<Chunk> {
        let capacity = self.capacity as usize;
        let skipped = count.saturating_sub(capacity);
        let mut cursor = ((self.next as usize + skipped) % capacity) as u32;
        let mut source = skipped;
        let mut remaining = (count - skipped) as u32;

        let mut chunks = Vec::with_capacity(2);
        while remaining > 0 {
            let len = remaining.min(self.capacity - cursor);
            chunks.push(Chunk {
                start: cursor,
                len,
                source,
            });
            source += len as usize;
            remaining -= len;
            cursor = (cursor + len) % self.capacity;
        }

        self.next = cursor;
        chunks
    }
}

/// Injection queue plus the ring cursor it writes through
pub struct Injector {
    queue: ParticleQueue,
    sender: ParticleSender,
    cursor: RingCursor,
}

impl Injector {
    pub fn new(capacity: u32) -> Self {
        let queue = ParticleQueue::new();
        Self {
            sender: queue.sender(),
            queue,
            cursor: RingCursor::new(capacity),
        }
    }

    /// Queue a particle through the injector's own sender.
    pub fn add_particle(&self, px: f32, py: f32, vx: f32, vy: f32) {
        self.sender.add_particle(px, py, vx, vy);
    }

    pub fn sender(&self) -> ParticleSender {
        self.sender.clone()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn cursor(&self) -> RingCursor {
        self.cursor
    }

    /// Copy every queued particle into `state` and return how many slots were written.
    ///
    /// One write-mapped staging buffer is used per chunk; all copies go out in a single
    /// submission, after which the staging buffers are destroyed. Earlier submissions on the same
    /// queue are ordered before these copies, so no extra wait is needed.
    pub fn flush(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        state: &wgpu::Buffer,
    ) -> Result<usize, SimulationError> {
        let particles = self.queue.drain();
        if particles.is_empty() {
            return Ok(0);
        }

        if particles.len() > self.cursor.capacity() as usize {
            log::warn!(
                "{} particles queued for a ring of {}, dropping the oldest {}",
                particles.len(),
                self.cursor.capacity(),
                particles.len() - self.cursor.capacity() as usize
            );
        }

        let chunks = self.cursor.plan(particles.len());
        log::trace!("Injecting {} particles as {chunks:?}", particles.len());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Injection Encoder"),
        });

        let mut staging = Vec::with_capacity(chunks.len());
        let mut written = 0;
        for chunk in &chunks {
            let batch = &particles[chunk.source..chunk.source + chunk.len as usize];
            let bytes: &[u8] = bytemuck::cast_slice(batch);

            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Particle Staging Buffer"),
                size: bytes.len() as u64,
                usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: true,
            });
            buffer
                .slice(..)
                .get_mapped_range_mut()
                .copy_from_slice(bytes);
            buffer.unmap();

            encoder.copy_buffer_to_buffer(
                &buffer,
                0,
                state,
                particle_offset(chunk.start),
                bytes.len() as u64,
            );
            staging.push(buffer);
            written += chunk.len as usize;
        }

        queue.submit(std::iter::once(encoder.finish()));

        for buffer in staging {
            buffer.destroy();
        }

        log::debug!(
            "Injected {written} particles, cursor now at {}",
            self.cursor.position()
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_at(capacity: u32, position: u32) -> RingCursor {
        let mut cursor = RingCursor::new(capacity);
        cursor.plan(position as usize);
        assert_eq!(cursor.position(), position);
        cursor
    }

    #[test]
    fn test_wraparound_splits_into_two_chunks() {
        let mut cursor = cursor_at(4, 3);
        let chunks = cursor.plan(3);
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    start: 3,
                    len: 1,
                    source: 0
                },
                Chunk {
                    start: 0,
                    len: 2,
                    source: 1
                },
            ]
        );
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_batch_that_fits_is_one_chunk() {
        let mut cursor = RingCursor::new(8);
        assert_eq!(
            cursor.plan(5),
            vec![Chunk {
                start: 0,
                len: 5,
                source: 0
            }]
        );
        assert_eq!(cursor.position(), 5);
        assert!(cursor.plan(0).is_empty());
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_batch_ending_at_ring_end_wraps_cursor() {
        let mut cursor = cursor_at(4, 1);
        let chunks = cursor.plan(3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_overflowing_batch_keeps_newest() {
        let mut cursor = cursor_at(4, 1);
        let chunks = cursor.plan(10);

        // Six particles are skipped; the last four start where the sixth would have gone.
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    start: 3,
                    len: 1,
                    source: 6
                },
                Chunk {
                    start: 0,
                    len: 3,
                    source: 7
                },
            ]
        );
        assert_eq!(cursor.position(), 3);
        assert_eq!(chunks.iter().map(|c| c.len).sum::<u32>(), 4);
    }

    #[test]
    fn test_chunks_never_cross_ring_end() {
        for capacity in 1..6u32 {
            for start in 0..capacity {
                for count in 0..12usize {
                    let mut cursor = cursor_at(capacity, start);
                    let chunks = cursor.plan(count);
                    assert!(chunks.len() <= 2);
                    assert!(chunks.iter().all(|c| c.len > 0 && c.start + c.len <= capacity));
                    assert_eq!(
                        cursor.position() as usize,
                        (start as usize + count) % capacity as usize
                    );
                }
            }
        }
    }

    #[test]
    fn test_queue_drains_everything_from_all_senders() {
        let queue = ParticleQueue::new();
        let senders: Vec<_> = (0..4).map(|_| queue.sender()).collect();

        std::thread::scope(|scope| {
            for (i, sender) in senders.iter().enumerate() {
                scope.spawn(move || {
                    for j in 0..25 {
                        sender.add_particle(i as f32, j as f32, 0.0, 0.0);
                    }
                });
            }
        });

        assert_eq!(queue.len(), 100);
        let drained = queue.drain();
        assert_eq!(drained.len(), 100);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
        assert!(drained.iter().all(|p| (0.0..1.0).contains(&p.seed)));
    }

    #[test]
    fn test_injector_queues_through_its_sender() {
        let injector = Injector::new(4);
        injector.add_particle(1.0, 2.0, 3.0, 4.0);
        injector.sender().add_particle(5.0, 6.0, 7.0, 8.0);
        assert_eq!(injector.pending(), 2);

        let drained = injector.queue.drain();
        assert_eq!(drained[0].position, [1.0, 2.0]);
        assert_eq!(drained[0].velocity, [3.0, 4.0]);
        assert_eq!(drained[1].position, [5.0, 6.0]);
        assert_eq!(injector.pending(), 0);
    }

    #[test]
    fn test_sender_outliving_queue_does_not_panic() {
        let queue = ParticleQueue::new();
        let sender = queue.sender();
        drop(queue);
        sender.add_particle(0.0, 0.0, 1.0, 1.0);
    }
}
