//! Rendering: camera, procedural meshes, draw-list construction, and the
//! Vulkan backend.

pub mod camera;
pub mod draw;
pub mod mesh_gen;
pub mod vulkan;

pub use camera::{Camera, FirstPersonController};
pub use draw::{DrawCommand, DrawList, LayerDraws};
pub use mesh_gen::MeshData;
