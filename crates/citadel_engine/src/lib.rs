//! # Citadel Engine
//!
//! A small Vulkan scene renderer built around a multi-buffered frame
//! resource ring.
//!
//! The engine splits each frame into three phases that never overlap in
//! their data access:
//!
//! - **Update**: simulation and constant propagation write into the current
//!   ring slot's CPU shadows. Only objects and materials whose dirty counter
//!   is nonzero are rewritten.
//! - **Draw-list build**: the scene registry is flattened into
//!   backend-neutral commands, bucketed into the fixed layer order. Constant
//!   addressing is resolved to byte offsets here.
//! - **Render**: the Vulkan backend flushes the slot's shadows into mapped
//!   GPU buffers, records the command list, and submits with the frame's
//!   fence value signaled on a timeline semaphore.
//!
//! The ring is three slots deep, so the CPU runs up to three frames ahead of
//! the GPU and only blocks when it laps itself.

pub mod core;
pub mod foundation;
pub mod frame;
pub mod render;
pub mod scene;
pub mod sim;

/// Common imports for engine users
pub mod prelude {
    pub use crate::core::config::{AppConfig, ConfigError};
    pub use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
    pub use crate::foundation::time::Timer;
    pub use crate::frame::{
        FramePipeline, FrameResourceRing, GpuTimeline, PassInputs, WaterSim, FRAME_RING_DEPTH,
    };
    pub use crate::render::camera::{Camera, FirstPersonController};
    pub use crate::render::draw::DrawList;
    pub use crate::render::vulkan::{VulkanError, VulkanRenderer, Window};
    pub use crate::scene::{
        Geometry, GeometryId, MaterialId, MaterialParams, RenderItemDesc, RenderLayer,
        SceneRegistry, Topology, VertexData, VertexSource,
    };
    pub use crate::sim::waves::Waves;
}
