//! Frame-in-flight ring and keyed per-frame buffer slots

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{GpuError, SimulationError};
use crate::fence::CompletionToken;

/// One completion token per frame-in-flight index
///
/// Resources replicated per frame are only reused after the token stored for their index has
/// resolved.
#[derive(Debug)]
pub struct FrameRing {
    tokens: Vec<CompletionToken>,
    current: usize,
}

impl FrameRing {
    pub fn new(frames_in_flight: usize) -> Self {
        debug_assert!(frames_in_flight > 0);
        Self {
            tokens: vec![CompletionToken::signaled(); frames_in_flight.max(1)],
            current: 0,
        }
    }

    /// Index of the frame currently being recorded.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Retire the current frame with `retired` and move to the next index.
    ///
    /// Blocks until the frame that last used the next index has completed. On error the index
    /// does not move, but `retired` is kept so a later advance still waits for it.
    pub fn advance(&mut self, retired: CompletionToken) -> Result<(), GpuError> {
        self.tokens[self.current] = retired;
        let next = (self.current + 1) % self.tokens.len();
        self.tokens[next].wait()?;
        self.current = next;
        Ok(())
    }
}

/// Size and usage a slot was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

impl SlotDescriptor {
    pub fn new(size: u64, usage: wgpu::BufferUsages) -> Self {
        Self { size, usage }
    }
}

impl fmt::Display for SlotDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes ({:?})", self.size, self.usage)
    }
}

struct Slot<B> {
    descriptor: SlotDescriptor,
    replicas: Vec<B>,
}

/// Lazily created, per-frame replicated resources keyed by purpose
///
/// `B` is the resource type; the simulator uses `wgpu::Buffer`, tests use plain ids.
pub struct FrameSlots<K, B> {
    ring: FrameRing,
    slots: HashMap<K, Slot<B>>,
}

impl<K, B> FrameSlots<K, B>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            ring: FrameRing::new(frames_in_flight),
            slots: HashMap::new(),
        }
    }

    /// Current frame-in-flight index.
    pub fn frame_index(&self) -> usize {
        self.ring.current()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.ring.len()
    }

    /// Resource for `key` at the current frame index.
    ///
    /// The first request for a key calls `create` once per frame in flight with the key,
    /// descriptor and replica index. Later requests must use the same descriptor.
    pub fn get_or_create<F>(
        &mut self,
        key: K,
        descriptor: SlotDescriptor,
        mut create: F,
    ) -> Result<&B, SimulationError>
    where
        F: FnMut(K, &SlotDescriptor, usize) -> B,
    {
        let frames = self.ring.len();
        let slot = self.slots.entry(key).or_insert_with(|| {
            log::debug!("Creating frame slot {key:?}: {descriptor} x{frames}");
            Slot {
                descriptor,
                replicas: (0..frames).map(|i| create(key, &descriptor, i)).collect(),
            }
        });

        if slot.descriptor != descriptor {
            return Err(SimulationError::SlotDescriptorMismatch {
                key: format!("{key:?}"),
                existing: slot.descriptor.to_string(),
                requested: descriptor.to_string(),
            });
        }
        Ok(&slot.replicas[self.ring.current()])
    }

    /// Resource for `key` at an explicit frame index, if the slot exists.
    pub fn get(&self, key: K, frame_index: usize) -> Option<&B> {
        self.slots
            .get(&key)
            .and_then(|slot| slot.replicas.get(frame_index))
    }

    pub fn advance_frame(&mut self, retired: CompletionToken) -> Result<(), GpuError> {
        self.ring.advance(retired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::testing::FenceLog;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        Uniforms,
        DrawInfo,
    }

    fn uniforms() -> SlotDescriptor {
        SlotDescriptor::new(16, wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST)
    }

    /// Allocates increasing ids so tests can tell buffers apart
    fn counter() -> impl FnMut(Key, &SlotDescriptor, usize) -> u32 {
        let mut next = 0;
        move |_, _, _| {
            next += 1;
            next
        }
    }

    #[test]
    fn test_same_buffer_within_frame() {
        let mut slots = FrameSlots::new(2);
        let mut create = counter();
        let first = *slots.get_or_create(Key::Uniforms, uniforms(), &mut create).unwrap();
        let second = *slots.get_or_create(Key::Uniforms, uniforms(), &mut create).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_replicas_created_once_per_frame() {
        let mut slots = FrameSlots::new(3);
        let mut calls = Vec::new();
        slots
            .get_or_create(Key::DrawInfo, uniforms(), |key, _, index| {
                calls.push((key, index));
                index
            })
            .unwrap();
        slots
            .get_or_create(Key::DrawInfo, uniforms(), |_, _, _| unreachable!())
            .unwrap();
        assert_eq!(
            calls,
            vec![(Key::DrawInfo, 0), (Key::DrawInfo, 1), (Key::DrawInfo, 2)]
        );
    }

    #[test]
    fn test_different_buffer_after_advance_and_same_after_cycle() {
        let mut slots = FrameSlots::new(2);
        let mut create = counter();
        let frame0 = *slots.get_or_create(Key::Uniforms, uniforms(), &mut create).unwrap();

        slots.advance_frame(CompletionToken::signaled()).unwrap();
        let frame1 = *slots.get_or_create(Key::Uniforms, uniforms(), &mut create).unwrap();
        assert_ne!(frame0, frame1);

        slots.advance_frame(CompletionToken::signaled()).unwrap();
        let frame2 = *slots.get_or_create(Key::Uniforms, uniforms(), &mut create).unwrap();
        assert_eq!(frame0, frame2);
        assert_eq!(slots.get(Key::Uniforms, 1), Some(&frame1));
    }

    #[test]
    fn test_descriptor_mismatch_rejected() {
        let mut slots = FrameSlots::new(2);
        let mut create = counter();
        slots.get_or_create(Key::Uniforms, uniforms(), &mut create).unwrap();

        let bigger = SlotDescriptor::new(32, uniforms().usage);
        let err = slots
            .get_or_create(Key::Uniforms, bigger, &mut create)
            .unwrap_err();
        assert!(matches!(err, SimulationError::SlotDescriptorMismatch { .. }));
        assert!(err.to_string().contains("Uniforms"));
    }

    #[test]
    fn test_advance_waits_for_slot_about_to_be_reused() {
        let fences = FenceLog::default();
        let mut ring = FrameRing::new(2);
        let (frame0, _) = fences.token(0);
        let (frame1, _) = fences.token(1);
        let (frame2, _) = fences.token(2);

        // Index 1 has never been used, nothing to wait for.
        ring.advance(frame0).unwrap();
        assert!(fences.waited().is_empty());
        assert_eq!(ring.current(), 1);

        // Moving back to index 0 must wait for frame 0.
        ring.advance(frame1).unwrap();
        assert_eq!(fences.waited(), vec![0]);
        assert_eq!(ring.current(), 0);

        ring.advance(frame2).unwrap();
        assert_eq!(fences.waited(), vec![0, 1]);
    }

    #[test]
    fn test_single_frame_waits_for_retired_frame() {
        let fences = FenceLog::default();
        let mut ring = FrameRing::new(1);
        let (frame0, signaled) = fences.token(0);
        ring.advance(frame0).unwrap();
        assert!(signaled.load(std::sync::atomic::Ordering::Acquire));
        assert_eq!(fences.waited(), vec![0]);
        assert_eq!(ring.current(), 0);
    }
}
