//! Frame resource ring: N independent copies of all per-frame GPU-writable
//! data, cycled round-robin so the CPU can record future frames while the GPU
//! consumes prior ones.
//!
//! The single blocking point of the whole system lives here: before a slot is
//! reused, the ring waits until the GPU has passed the fence value stamped on
//! that slot the last time it was submitted. That bounds CPU lead-time to
//! `FRAME_RING_DEPTH - 1` frames and guarantees no slot is written while the
//! GPU may still read it.

use thiserror::Error;

use crate::frame::constants::{MaterialConstants, ObjectConstants, PassConstants};
use crate::frame::upload::UploadBuffer;
use crate::scene::geometry::MeshVertex;

/// Number of frame resource slots (frames the CPU may run ahead).
pub const FRAME_RING_DEPTH: usize = 3;

/// Failures while waiting on the GPU timeline. Both are fatal mid-run; the
/// wait must never silently hang.
#[derive(Debug, Error)]
pub enum FenceWaitError {
    #[error("timed out waiting for fence value {0}")]
    Timeout(u64),

    #[error("device failure while waiting for fence value {value}: {reason}")]
    Device { value: u64, reason: String },
}

/// The GPU's view of the monotonically increasing fence counter.
///
/// Production code backs this with a Vulkan timeline semaphore; tests use a
/// deterministic fake.
pub trait GpuTimeline {
    /// Highest fence value the GPU has completed.
    fn completed_value(&self) -> u64;

    /// Block until `value` is reached. Implementations must use a bounded
    /// timeout and report device loss as an error rather than hanging.
    fn wait_for(&self, value: u64) -> Result<(), FenceWaitError>;
}

/// One generation's worth of CPU-writable frame data.
pub struct FrameResourceSlot {
    pub object_constants: UploadBuffer<ObjectConstants>,
    pub material_constants: UploadBuffer<MaterialConstants>,
    pub pass_constants: UploadBuffer<PassConstants>,
    /// Destination of the wave simulation's per-frame vertex output.
    pub dynamic_vertices: UploadBuffer<MeshVertex>,
    /// Fence value the GPU will signal when it finishes consuming this slot's
    /// last submission. Zero means the slot has never been submitted.
    pub fence_value: u64,
}

impl FrameResourceSlot {
    fn new(object_count: usize, material_count: usize, dynamic_vertex_count: usize) -> Self {
        Self {
            object_constants: UploadBuffer::constant(object_count),
            material_constants: UploadBuffer::constant(material_count),
            pass_constants: UploadBuffer::constant(1),
            dynamic_vertices: UploadBuffer::packed(dynamic_vertex_count),
            fence_value: 0,
        }
    }
}

/// Round-robin ring of [`FrameResourceSlot`]s.
pub struct FrameResourceRing {
    slots: Vec<FrameResourceSlot>,
    current: usize,
}

impl FrameResourceRing {
    /// Build the ring. Buffer capacities are fixed here; registration is
    /// complete before the first frame, and indices never grow past these
    /// counts.
    pub fn new(object_count: usize, material_count: usize, dynamic_vertex_count: usize) -> Self {
        let slots = (0..FRAME_RING_DEPTH)
            .map(|_| FrameResourceSlot::new(object_count, material_count, dynamic_vertex_count))
            .collect();
        Self { slots, current: 0 }
    }

    /// Advance to the next slot and return its index. Slots are selected
    /// strictly round-robin; `advance` from slot `i` always lands on
    /// `(i + 1) % FRAME_RING_DEPTH`.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % FRAME_RING_DEPTH;
        self.current
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Slot that frame number `frame` maps to.
    pub fn slot_index_for(frame: u64) -> usize {
        (frame % FRAME_RING_DEPTH as u64) as usize
    }

    pub fn current(&self) -> &FrameResourceSlot {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameResourceSlot {
        &mut self.slots[self.current]
    }

    pub fn slot(&self, index: usize) -> &FrameResourceSlot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut FrameResourceSlot {
        &mut self.slots[index]
    }

    /// Block until the GPU is done with the current slot's previous use.
    ///
    /// Returns immediately when the slot was never submitted (stamped value
    /// 0) or the GPU has already passed the stamped value; otherwise this is
    /// the one place the render thread sleeps.
    pub fn wait_until_ready(&self, timeline: &impl GpuTimeline) -> Result<(), FenceWaitError> {
        let stamped = self.slots[self.current].fence_value;
        if stamped != 0 && timeline.completed_value() < stamped {
            timeline.wait_for(stamped)?;
        }
        Ok(())
    }

    /// Stamp the fence value that will mark this slot's submission complete.
    pub fn retire_current(&mut self, fence_value: u64) {
        debug_assert!(
            fence_value > self.slots[self.current].fence_value,
            "fence values must be monotonically increasing"
        );
        self.slots[self.current].fence_value = fence_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Deterministic timeline fake that records whether a blocking wait
    /// happened.
    pub(crate) struct FakeTimeline {
        pub completed: Cell<u64>,
        pub waits: Cell<u32>,
    }

    impl FakeTimeline {
        pub(crate) fn new(completed: u64) -> Self {
            Self {
                completed: Cell::new(completed),
                waits: Cell::new(0),
            }
        }
    }

    impl GpuTimeline for FakeTimeline {
        fn completed_value(&self) -> u64 {
            self.completed.get()
        }

        fn wait_for(&self, value: u64) -> Result<(), FenceWaitError> {
            self.waits.set(self.waits.get() + 1);
            // The fake GPU catches up instantly.
            self.completed.set(self.completed.get().max(value));
            Ok(())
        }
    }

    fn small_ring() -> FrameResourceRing {
        FrameResourceRing::new(4, 2, 8)
    }

    #[test]
    fn test_round_robin_wraps_to_same_slot() {
        let mut ring = small_ring();
        let mut seen = Vec::new();
        for _ in 0..2 * FRAME_RING_DEPTH {
            seen.push(ring.advance());
        }
        // Slot i and slot i + N are the same underlying buffer set.
        for i in 0..FRAME_RING_DEPTH {
            assert_eq!(seen[i], seen[i + FRAME_RING_DEPTH]);
        }
        for frame in 0..12u64 {
            assert_eq!(
                FrameResourceRing::slot_index_for(frame),
                FrameResourceRing::slot_index_for(frame + FRAME_RING_DEPTH as u64)
            );
        }
    }

    #[test]
    fn test_wait_skipped_for_unused_slot() {
        let ring = small_ring();
        let timeline = FakeTimeline::new(0);
        // Slot never submitted: stamped value is 0, wait must not block.
        ring.wait_until_ready(&timeline).unwrap();
        assert_eq!(timeline.waits.get(), 0);
    }

    #[test]
    fn test_wait_skipped_when_value_already_reached() {
        let mut ring = small_ring();
        ring.retire_current(5);
        let timeline = FakeTimeline::new(5);
        ring.wait_until_ready(&timeline).unwrap();
        assert_eq!(timeline.waits.get(), 0);
    }

    #[test]
    fn test_wait_blocks_only_when_gpu_is_behind() {
        let mut ring = small_ring();
        ring.retire_current(7);
        let timeline = FakeTimeline::new(3);
        ring.wait_until_ready(&timeline).unwrap();
        assert_eq!(timeline.waits.get(), 1);
        assert_eq!(timeline.completed.get(), 7);
    }

    #[test]
    fn test_slot_buffers_are_sized_from_registration_counts() {
        let ring = small_ring();
        let slot = ring.slot(0);
        assert_eq!(slot.object_constants.len(), 4);
        assert_eq!(slot.material_constants.len(), 2);
        assert_eq!(slot.pass_constants.len(), 1);
        assert_eq!(slot.dynamic_vertices.len(), 8);
        assert_eq!(slot.fence_value, 0);
    }
}
