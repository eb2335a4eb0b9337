//! Vulkan synchronization primitives for GPU/CPU coordination.
//!
//! Binary semaphores order swapchain acquisition against rendering and
//! presentation on the GPU. The timeline semaphore is the production
//! [`GpuTimeline`]: the queue signals it with each frame's fence value and
//! the frame resource ring waits on it before reusing a slot.

use ash::{vk, Device};

use crate::frame::ring::{FenceWaitError, GpuTimeline};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Ten seconds; a wait exceeding this means the device is lost or the
/// submission logic is broken.
const WAIT_TIMEOUT_NS: u64 = 10_000_000_000;

/// Monotonic CPU-GPU fence built on a Vulkan timeline semaphore.
pub struct TimelineFence {
    device: Device,
    semaphore: vk::Semaphore,
}

impl TimelineFence {
    /// Create the timeline with initial value 0.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::builder()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::builder().push_next(&mut type_info);

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Host-side signal. Used when a frame bails out before submission so
    /// its stamped fence value still gets reached.
    pub fn signal(&self, value: u64) -> VulkanResult<()> {
        let signal_info = vk::SemaphoreSignalInfo::builder()
            .semaphore(self.semaphore)
            .value(value);
        unsafe {
            self.device
                .signal_semaphore(&signal_info)
                .map_err(VulkanError::Api)
        }
    }
}

impl GpuTimeline for TimelineFence {
    fn completed_value(&self) -> u64 {
        // A query failure reads as "nothing completed"; the subsequent wait
        // will surface the real error.
        unsafe {
            self.device
                .get_semaphore_counter_value(self.semaphore)
                .unwrap_or(0)
        }
    }

    fn wait_for(&self, value: u64) -> Result<(), FenceWaitError> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::builder()
            .semaphores(&semaphores)
            .values(&values);

        let result = unsafe { self.device.wait_semaphores(&wait_info, WAIT_TIMEOUT_NS) };
        match result {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(FenceWaitError::Timeout(value)),
            Err(e) => Err(FenceWaitError::Device {
                value,
                reason: format!("{:?}", e),
            }),
        }
    }
}

impl Drop for TimelineFence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Per-frame binary semaphores for swapchain coordination.
pub struct FrameSync {
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
}

impl FrameSync {
    pub fn new(device: Device) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device)?;
        Ok(Self {
            image_available,
            render_finished,
        })
    }
}
