//! Vulkan rendering backend.
//!
//! RAII wrappers over ash following a strict ownership order: the context
//! owns instance/device/surface, everything else holds a cloned `ash::Device`
//! and cleans itself up in `Drop`. The backend consumes the device-free draw
//! list; all scene and frame logic stays outside this module.

pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod window;

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Backend initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for an allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Shader bytecode could not be loaded
    #[error("Shader load failed for '{path}': {reason}")]
    ShaderLoad { path: String, reason: String },

    /// Texture image could not be loaded or decoded
    #[error("Texture load failed for '{path}': {reason}")]
    TextureLoad { path: String, reason: String },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

pub use context::VulkanContext;
pub use descriptor::SamplerKind;
pub use renderer::{TextureDesc, VulkanRenderer};
pub use sync::TimelineFence;
pub use window::{Window, WindowError};
