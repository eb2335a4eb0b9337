//! Geometry storage: shared vertex/index buffers with named submesh ranges.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

/// Stable identifier of a registered geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub(crate) usize);

impl GeometryId {
    /// Dense index into the registry's geometry array.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named sub-range within a geometry's shared index/vertex buffers.
#[derive(Debug, Clone, Copy)]
pub struct Submesh {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

/// Standard vertex layout: position, normal, texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texc: [f32; 2],
}

/// Billboard vertex: world-space anchor point plus sprite extent. The
/// geometry stage expands each point into a camera-facing quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BillboardVertex {
    pub position: [f32; 3],
    pub size: [f32; 2],
}

/// CPU-side vertex data for one geometry.
#[derive(Debug, Clone)]
pub enum VertexData {
    /// Immutable standard-layout vertices, uploaded once.
    Standard(Vec<MeshVertex>),
    /// Immutable billboard points, uploaded once.
    Billboard(Vec<BillboardVertex>),
    /// No static vertex buffer: the vertices are produced per frame (the
    /// water surface). Only the vertex count is fixed.
    Dynamic { vertex_count: usize },
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Standard(v) => v.len(),
            Self::Billboard(v) => v.len(),
            Self::Dynamic { vertex_count } => *vertex_count,
        }
    }
}

/// Which vertex buffer a geometry draws from.
///
/// Static geometry always points at its own upload. Dynamic geometry is
/// repointed every frame at the ring slot whose buffer holds the latest
/// simulation output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSource {
    Static,
    FrameSlot(usize),
}

/// One vertex/index buffer pair shared by any number of named submeshes.
#[derive(Debug)]
pub struct Geometry {
    pub name: String,
    pub vertices: VertexData,
    pub indices: Vec<u16>,
    pub vertex_source: VertexSource,
    submeshes: HashMap<String, Submesh>,
}

impl Geometry {
    pub fn new(name: impl Into<String>, vertices: VertexData, indices: Vec<u16>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            vertex_source: VertexSource::Static,
            submeshes: HashMap::new(),
        }
    }

    /// Register a named submesh range. Returns `self` for chained building.
    pub fn with_submesh(mut self, name: impl Into<String>, submesh: Submesh) -> Self {
        self.submeshes.insert(name.into(), submesh);
        self
    }

    /// Convenience for the common single-submesh case covering everything.
    pub fn with_full_range_submesh(self, name: impl Into<String>) -> Self {
        let submesh = Submesh {
            index_count: self.indices.len() as u32,
            start_index: 0,
            base_vertex: 0,
        };
        self.with_submesh(name, submesh)
    }

    pub fn submesh(&self, name: &str) -> Option<&Submesh> {
        self.submeshes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_range_submesh_covers_indices() {
        let geo = Geometry::new(
            "quad",
            VertexData::Standard(vec![
                MeshVertex {
                    position: [0.0; 3],
                    normal: [0.0, 1.0, 0.0],
                    texc: [0.0; 2],
                };
                4
            ]),
            vec![0, 1, 2, 0, 2, 3],
        )
        .with_full_range_submesh("quad");

        let sm = geo.submesh("quad").unwrap();
        assert_eq!(sm.index_count, 6);
        assert_eq!(sm.start_index, 0);
        assert_eq!(sm.base_vertex, 0);
        assert!(geo.submesh("missing").is_none());
    }

    #[test]
    fn test_dynamic_vertex_data_reports_fixed_count() {
        let geo = Geometry::new("water", VertexData::Dynamic { vertex_count: 128 * 128 }, vec![]);
        assert_eq!(geo.vertices.vertex_count(), 128 * 128);
        assert_eq!(geo.vertex_source, VertexSource::Static);
    }
}
