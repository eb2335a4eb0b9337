//! Scene registry: the single owner of geometry, materials, and render items.
//!
//! Name-based lookup happens only at registration time; at runtime everything
//! is addressed by dense, permanent indices. Those indices are the offsets
//! into every frame resource slot's constant arrays, which is what keeps
//! per-object/per-material constant access O(1) without a lookup.

pub mod geometry;
pub mod material;
pub mod render_item;

use std::collections::HashMap;

use thiserror::Error;

use crate::foundation::math::Mat4;

pub use geometry::{BillboardVertex, Geometry, GeometryId, MeshVertex, Submesh, VertexData, VertexSource};
pub use material::{Material, MaterialId, MaterialParams};
pub use render_item::{RenderItem, RenderItemHandle, RenderLayer, Topology};

/// Registration-time errors. All of these indicate a scene-construction bug;
/// none can occur after startup.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("geometry '{0}' is already registered")]
    DuplicateGeometry(String),

    #[error("material '{0}' is already registered")]
    DuplicateMaterial(String),

    #[error("unknown geometry '{0}'")]
    UnknownGeometry(String),

    #[error("unknown material '{0}'")]
    UnknownMaterial(String),

    #[error("geometry '{geometry}' has no submesh '{submesh}'")]
    UnknownSubmesh { geometry: String, submesh: String },
}

/// Everything needed to register one render item.
pub struct RenderItemDesc<'a> {
    pub geometry: &'a str,
    pub submesh: &'a str,
    pub material: &'a str,
    pub world: Mat4,
    pub tex_transform: Mat4,
    pub topology: Topology,
    pub layer: RenderLayer,
}

/// Owns all scene collections; passed by reference to the update and draw
/// phases. Render items live in an arena and are referenced by index from the
/// per-layer draw lists.
#[derive(Default)]
pub struct SceneRegistry {
    geometries: Vec<Geometry>,
    geometry_names: HashMap<String, GeometryId>,

    materials: Vec<Material>,
    material_names: HashMap<String, MaterialId>,

    items: Vec<RenderItem>,
    layers: [Vec<RenderItemHandle>; 4],
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geometry under its embedded name.
    pub fn register_geometry(&mut self, geometry: Geometry) -> Result<GeometryId, SceneError> {
        if self.geometry_names.contains_key(&geometry.name) {
            return Err(SceneError::DuplicateGeometry(geometry.name.clone()));
        }
        let id = GeometryId(self.geometries.len());
        self.geometry_names.insert(geometry.name.clone(), id);
        self.geometries.push(geometry);
        Ok(id)
    }

    /// Register a material; the returned id's index is permanent.
    pub fn register_material(
        &mut self,
        name: &str,
        params: MaterialParams,
        texture_slot: usize,
    ) -> Result<MaterialId, SceneError> {
        if self.material_names.contains_key(name) {
            return Err(SceneError::DuplicateMaterial(name.to_string()));
        }
        let id = MaterialId(self.materials.len());
        self.materials
            .push(Material::new(name.to_string(), params, texture_slot, id.0));
        self.material_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Create a render item. Geometry, submesh, and material are resolved by
    /// name here, once; the item stores indices from then on. The layer is a
    /// registration-time decision and cannot change later.
    pub fn add_render_item(&mut self, desc: RenderItemDesc<'_>) -> Result<RenderItemHandle, SceneError> {
        let geometry_id = self
            .geometry_names
            .get(desc.geometry)
            .copied()
            .ok_or_else(|| SceneError::UnknownGeometry(desc.geometry.to_string()))?;
        let material_id = self
            .material_names
            .get(desc.material)
            .copied()
            .ok_or_else(|| SceneError::UnknownMaterial(desc.material.to_string()))?;

        let submesh = *self.geometries[geometry_id.0]
            .submesh(desc.submesh)
            .ok_or_else(|| SceneError::UnknownSubmesh {
                geometry: desc.geometry.to_string(),
                submesh: desc.submesh.to_string(),
            })?;

        let handle = RenderItemHandle(self.items.len());
        self.items.push(RenderItem::new(
            handle.0,
            desc.world,
            desc.tex_transform,
            material_id,
            geometry_id,
            desc.topology,
            desc.layer,
            submesh.index_count,
            submesh.start_index,
            submesh.base_vertex,
        ));
        self.layers[desc.layer.index()].push(handle);
        Ok(handle)
    }

    pub fn geometry(&self, id: GeometryId) -> &Geometry {
        &self.geometries[id.0]
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> &mut Geometry {
        &mut self.geometries[id.0]
    }

    pub fn geometry_id(&self, name: &str) -> Option<GeometryId> {
        self.geometry_names.get(name).copied()
    }

    pub fn geometries(&self) -> impl Iterator<Item = (GeometryId, &Geometry)> {
        self.geometries.iter().enumerate().map(|(i, g)| (GeometryId(i), g))
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    pub fn material_mut(&mut self, id: MaterialId) -> &mut Material {
        &mut self.materials[id.0]
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    pub fn materials_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    pub fn item(&self, handle: RenderItemHandle) -> &RenderItem {
        &self.items[handle.0]
    }

    pub fn item_mut(&mut self, handle: RenderItemHandle) -> &mut RenderItem {
        &mut self.items[handle.0]
    }

    pub fn items(&self) -> impl Iterator<Item = &RenderItem> {
        self.items.iter()
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut RenderItem> {
        self.items.iter_mut()
    }

    /// Render items of one layer, in registration order.
    pub fn layer_items(&self, layer: RenderLayer) -> &[RenderItemHandle] {
        &self.layers[layer.index()]
    }

    /// Number of registered render items; sizes the per-slot object-constant
    /// arrays.
    pub fn object_count(&self) -> usize {
        self.items.len()
    }

    /// Number of registered materials; sizes the per-slot material-constant
    /// arrays.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::geometry::VertexData;

    fn quad_geometry(name: &str) -> Geometry {
        Geometry::new(
            name,
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
        .with_full_range_submesh("quad")
    }

    fn flat_params() -> MaterialParams {
        MaterialParams {
            diffuse_albedo: [1.0; 4],
            fresnel_r0: [0.02; 3],
            roughness: 0.25,
        }
    }

    #[test]
    fn test_material_indices_are_dense_and_stable() {
        let mut scene = SceneRegistry::new();
        let ids: Vec<MaterialId> = (0..7)
            .map(|i| {
                scene
                    .register_material(&format!("mat{i}"), flat_params(), i)
                    .unwrap()
            })
            .collect();

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.index(), i);
        }

        // Dirty/clean cycles never move an index.
        for _ in 0..5 {
            for id in &ids {
                scene.material_mut(*id).mark_dirty();
                scene.material_mut(*id).frames_dirty = 0;
            }
        }
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(scene.material(*id).index(), i);
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut scene = SceneRegistry::new();
        scene.register_material("brick", flat_params(), 0).unwrap();
        assert!(matches!(
            scene.register_material("brick", flat_params(), 1),
            Err(SceneError::DuplicateMaterial(_))
        ));

        scene.register_geometry(quad_geometry("wall")).unwrap();
        assert!(matches!(
            scene.register_geometry(quad_geometry("wall")),
            Err(SceneError::DuplicateGeometry(_))
        ));
    }

    #[test]
    fn test_add_render_item_resolves_names_once() {
        let mut scene = SceneRegistry::new();
        scene.register_geometry(quad_geometry("wall")).unwrap();
        scene.register_material("brick", flat_params(), 2).unwrap();

        let handle = scene
            .add_render_item(RenderItemDesc {
                geometry: "wall",
                submesh: "quad",
                material: "brick",
                world: Mat4::identity(),
                tex_transform: Mat4::identity(),
                topology: Topology::TriangleList,
                layer: RenderLayer::AlphaTested,
            })
            .unwrap();

        let item = scene.item(handle);
        assert_eq!(item.object_index(), 0);
        assert_eq!(item.index_count, 6);
        assert_eq!(item.layer, RenderLayer::AlphaTested);
        assert_eq!(scene.layer_items(RenderLayer::AlphaTested), &[handle]);
        assert!(scene.layer_items(RenderLayer::Opaque).is_empty());

        assert!(matches!(
            scene.add_render_item(RenderItemDesc {
                geometry: "wall",
                submesh: "nope",
                material: "brick",
                world: Mat4::identity(),
                tex_transform: Mat4::identity(),
                topology: Topology::TriangleList,
                layer: RenderLayer::Opaque,
            }),
            Err(SceneError::UnknownSubmesh { .. })
        ));
    }
}
