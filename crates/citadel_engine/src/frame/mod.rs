//! Frame lifecycle: constant record layouts, CPU upload shadows, the frame
//! resource ring, and the per-frame update phase that ties them together.

pub mod constants;
pub mod ring;
pub mod update;
pub mod upload;

pub use constants::{Light, MaterialConstants, ObjectConstants, PassConstants, MAX_LIGHTS};
pub use ring::{
    FenceWaitError, FrameResourceRing, FrameResourceSlot, GpuTimeline, FRAME_RING_DEPTH,
};
pub use update::{FramePipeline, PassInputs, WaterSim};
pub use upload::{UploadBuffer, CONSTANT_ALIGNMENT};
