//! Static scene construction: terrain, water, the castle, the maze, and the
//! tree billboards, plus the material set, texture heap layout, and light rig.
//!
//! Everything here is layout data. All per-frame behavior lives in the
//! engine; this module only registers geometry, materials, and render items
//! once at startup.

use std::path::Path;

use citadel_engine::foundation::math::{scaling, translation, Mat4};
use citadel_engine::foundation::rng::XorShiftRng;
use citadel_engine::frame::Light;
use citadel_engine::render::mesh_gen;
use citadel_engine::render::vulkan::{SamplerKind, TextureDesc};
use citadel_engine::scene::geometry::BillboardVertex;
use citadel_engine::scene::{
    Geometry, GeometryId, MaterialId, MaterialParams, RenderItemDesc, RenderLayer, SceneError,
    SceneRegistry, Topology, VertexData,
};

/// Wave field dimensions and solver tuning.
pub const WAVE_ROWS: usize = 128;
pub const WAVE_COLS: usize = 128;
pub const WAVE_SPATIAL_STEP: f32 = 1.0;
pub const WAVE_TIME_STEP: f32 = 0.03;
pub const WAVE_SPEED: f32 = 4.0;
pub const WAVE_DAMPING: f32 = 0.2;

pub const AMBIENT_LIGHT: [f32; 4] = [1.25, 0.5, 0.35, 1.0];
/// Doubles as the clear color.
pub const FOG_COLOR: [f32; 4] = [0.0, 1.0, 1.0, 0.5];
pub const FOG_START: f32 = 15.0;
pub const FOG_RANGE: f32 = 175.0;

const TREE_COUNT: usize = 64;
const TREE_SIZE: [f32; 2] = [40.0, 40.0];
const TREE_HEIGHT: f32 = 24.0;

/// Handles the per-frame water simulation needs after construction.
pub struct SceneHandles {
    pub water_geometry: GeometryId,
    pub water_material: MaterialId,
}

pub fn build_scene(scene: &mut SceneRegistry) -> Result<SceneHandles, SceneError> {
    register_materials(scene)?;
    let water_geometry = register_geometries(scene)?;
    let water_material = scene
        .material_id("water")
        .ok_or_else(|| SceneError::UnknownMaterial("water".to_string()))?;

    add_water_and_terrain(scene)?;
    add_trees(scene)?;
    add_castle(scene)?;
    add_maze(scene)?;

    log::info!(
        "Scene built: {} geometries, {} materials, {} render items",
        scene.geometries().count(),
        scene.material_count(),
        scene.object_count()
    );

    Ok(SceneHandles {
        water_geometry,
        water_material,
    })
}

fn register_materials(scene: &mut SceneRegistry) -> Result<(), SceneError> {
    let matte = |albedo: [f32; 4], fresnel: f32, roughness: f32| MaterialParams {
        diffuse_albedo: albedo,
        fresnel_r0: [fresnel; 3],
        roughness,
    };

    scene.register_material("grass", matte([1.0; 4], 0.01, 0.125), 0)?;
    // Faked water: real transparency tooling (environment reflection) is out
    // of scope, so a half-alpha albedo on the blend layer stands in.
    scene.register_material("water", matte([1.0, 1.0, 1.0, 0.5], 0.1, 0.0), 1)?;
    scene.register_material("brick", matte([1.0; 4], 0.02, 0.25), 2)?;
    scene.register_material("marble", matte([1.0; 4], 0.02, 0.25), 3)?;
    scene.register_material("wood", matte([1.0; 4], 0.02, 0.25), 4)?;
    scene.register_material("crystal", matte([1.0; 4], 0.02, 0.25), 5)?;
    scene.register_material("tree_sprites", matte([1.0; 4], 0.01, 0.125), 6)?;
    Ok(())
}

/// Returns the water geometry id; everything else is looked up by name at
/// render-item registration.
fn register_geometries(scene: &mut SceneRegistry) -> Result<GeometryId, SceneError> {
    // Terrain: flat plateau with the outer ring carved down into a moat.
    let mut land = mesh_gen::grid(720.0, 720.0, 225, 225);
    for vertex in &mut land.vertices {
        let [x, _, z] = vertex.position;
        vertex.position[1] = if x.abs() > 175.0 || z.abs() > 200.0 {
            -10.0
        } else {
            6.0
        };
    }
    let land_indices = land.indices16();
    scene.register_geometry(
        Geometry::new("land", VertexData::Standard(land.vertices), land_indices)
            .with_full_range_submesh("grid"),
    )?;

    // Water: index grid only; vertices come from the wave solver each frame.
    let water_indices = water_grid_indices(WAVE_ROWS, WAVE_COLS);
    let water_geometry = scene.register_geometry(
        Geometry::new(
            "water",
            VertexData::Dynamic {
                vertex_count: WAVE_ROWS * WAVE_COLS,
            },
            water_indices,
        )
        .with_full_range_submesh("grid"),
    )?;

    // Unit primitives, scaled per render item.
    for (name, mesh) in [
        ("wall", mesh_gen::cuboid(1.0, 1.0, 1.0)),
        ("corner", mesh_gen::cylinder(1.0, 1.0, 1.0, 15, 10)),
        ("cone", mesh_gen::cone(1.0, 1.0, 15, 10)),
        ("pyramid", mesh_gen::pyramid(1.0, 1.0)),
        ("diamond", mesh_gen::diamond(1.0, 1.0)),
    ] {
        let indices = mesh.indices16();
        scene.register_geometry(
            Geometry::new(name, VertexData::Standard(mesh.vertices), indices)
                .with_full_range_submesh(name),
        )?;
    }

    // One point per tree; the geometry stage expands them into quads.
    let mut rng = XorShiftRng::new(0x0f0e_5eed);
    let mut points = Vec::with_capacity(TREE_COUNT);
    for i in 0..TREE_COUNT {
        let (x, z) = tree_position(i, &mut rng);
        points.push(BillboardVertex {
            position: [x, TREE_HEIGHT, z],
            size: TREE_SIZE,
        });
    }
    let indices = (0..TREE_COUNT as u16).collect();
    scene.register_geometry(
        Geometry::new("tree_sprites", VertexData::Billboard(points), indices)
            .with_full_range_submesh("points"),
    )?;

    Ok(water_geometry)
}

/// Trees sit in four bands around the moat: the left and right strips, then
/// the near edge split into halves, then the far edge.
fn tree_position(i: usize, rng: &mut XorShiftRng) -> (f32, f32) {
    if i < TREE_COUNT / 4 {
        (
            rng.float_in_range(-150.0, -120.0),
            rng.float_in_range(-180.0, 180.0),
        )
    } else if i < TREE_COUNT / 2 {
        (
            rng.float_in_range(120.0, 150.0),
            rng.float_in_range(-180.0, 180.0),
        )
    } else if i < 3 * TREE_COUNT / 4 {
        let x = if i % 2 == 0 {
            rng.float_in_range(-130.0, -10.0)
        } else {
            rng.float_in_range(10.0, 130.0)
        };
        (x, rng.float_in_range(-180.0, -160.0))
    } else {
        (
            rng.float_in_range(-100.0, 100.0),
            rng.float_in_range(160.0, 180.0),
        )
    }
}

fn water_grid_indices(m: usize, n: usize) -> Vec<u16> {
    debug_assert!(m * n < u16::MAX as usize);
    let mut indices = Vec::with_capacity(6 * (m - 1) * (n - 1));
    for i in 0..m - 1 {
        for j in 0..n - 1 {
            let a = (i * n + j) as u16;
            let b = (i * n + j + 1) as u16;
            let c = ((i + 1) * n + j) as u16;
            let d = ((i + 1) * n + j + 1) as u16;
            indices.extend_from_slice(&[a, b, c, c, b, d]);
        }
    }
    indices
}

fn add_water_and_terrain(scene: &mut SceneRegistry) -> Result<(), SceneError> {
    scene.add_render_item(RenderItemDesc {
        geometry: "water",
        submesh: "grid",
        material: "water",
        world: scaling(6.0, 1.0, 6.0),
        tex_transform: scaling(30.0, 30.0, 1.0),
        topology: Topology::TriangleList,
        layer: RenderLayer::Transparent,
    })?;

    scene.add_render_item(RenderItemDesc {
        geometry: "land",
        submesh: "grid",
        material: "grass",
        world: Mat4::identity(),
        tex_transform: scaling(5.0, 5.0, 1.0),
        topology: Topology::TriangleList,
        layer: RenderLayer::Opaque,
    })?;
    Ok(())
}

fn add_trees(scene: &mut SceneRegistry) -> Result<(), SceneError> {
    scene.add_render_item(RenderItemDesc {
        geometry: "tree_sprites",
        submesh: "points",
        material: "tree_sprites",
        world: Mat4::identity(),
        tex_transform: Mat4::identity(),
        topology: Topology::PointList,
        layer: RenderLayer::AlphaTestedBillboards,
    })?;
    Ok(())
}

/// Unit-wall render item on the alpha-tested layer.
fn add_wall(
    scene: &mut SceneRegistry,
    material: &str,
    geometry: &str,
    world: Mat4,
    tex_transform: Mat4,
) -> Result<(), SceneError> {
    scene.add_render_item(RenderItemDesc {
        geometry,
        submesh: geometry,
        material,
        world,
        tex_transform,
        topology: Topology::TriangleList,
        layer: RenderLayer::AlphaTested,
    })?;
    Ok(())
}

fn add_castle(scene: &mut SceneRegistry) -> Result<(), SceneError> {
    // Base plinth and the drawbridge across the moat.
    add_wall(
        scene,
        "brick",
        "wall",
        translation(0.0, 6.0, 0.0) * scaling(220.0, 8.0, 280.0),
        scaling(11.0, 11.0, 11.0),
    )?;
    add_wall(
        scene,
        "wood",
        "wall",
        translation(0.0, 9.0, -137.5) * scaling(30.0, 6.0, 45.0),
        Mat4::identity(),
    )?;

    // Pyramid in the inner courtyard, crowned by a floating diamond.
    add_wall(
        scene,
        "crystal",
        "pyramid",
        translation(0.0, 16.0, 100.0) * scaling(20.0, 12.0, 20.0),
        Mat4::identity(),
    )?;

    // Three solid curtain walls; the fourth side holds the gate.
    for i in 0..3 {
        let along_x = i % 2 == 1;
        let (sx, sz) = if along_x {
            (180.0, 12.0)
        } else {
            (12.0, 240.0)
        };
        let (px, pz) = if along_x {
            (0.0, 120.0)
        } else {
            (-90.0 + i as f32 * 90.0, 0.0)
        };
        add_wall(
            scene,
            "brick",
            "wall",
            translation(px, 30.0, pz) * scaling(sx, 40.0, sz),
            scaling(10.0, 2.0, 1.0),
        )?;
    }

    // Gate wall: two full-height segments flanking a shorter lintel.
    for i in 0..3 {
        let lintel = i % 2 == 1;
        let sx = if lintel { 30.0 } else { 80.0 };
        let sy = if lintel { 15.0 } else { 40.0 };
        let py = if lintel { 42.5 } else { 30.0 };
        add_wall(
            scene,
            "brick",
            "wall",
            translation(-55.0 + 55.0 * i as f32, py, -120.0) * scaling(sx, sy, 10.0),
            scaling(6.0, 2.0, 1.0),
        )?;
    }

    // Merlons along all four wall tops.
    let merlon_tex = scaling(0.5, 0.25, 1.0);
    for i in 0..5 {
        let side_z = 80.0 - 40.0 * i as f32;
        let front_x = -60.0 + 30.0 * i as f32;
        add_wall(
            scene,
            "brick",
            "wall",
            translation(-90.0, 52.5, side_z) * scaling(12.0, 5.0, 15.0),
            merlon_tex,
        )?;
        add_wall(
            scene,
            "brick",
            "wall",
            translation(90.0, 52.5, side_z) * scaling(12.0, 5.0, 15.0),
            merlon_tex,
        )?;
        add_wall(
            scene,
            "brick",
            "wall",
            translation(front_x, 52.5, -120.0) * scaling(15.0, 5.0, 10.0),
            merlon_tex,
        )?;
        add_wall(
            scene,
            "brick",
            "wall",
            translation(front_x, 52.5, 120.0) * scaling(15.0, 5.0, 12.0),
            merlon_tex,
        )?;
    }

    // Corner towers: cylinder shaft, cone roof, diamond finial.
    for i in 0..4 {
        let x = -90.0 + 180.0 * (i % 2) as f32;
        let z = 120.0 - 240.0 * (i / 2) as f32;
        add_wall(
            scene,
            "marble",
            "corner",
            translation(x, 30.0, z) * scaling(10.0, 70.0, 10.0),
            Mat4::identity(),
        )?;
        add_wall(
            scene,
            "marble",
            "cone",
            translation(x, 75.0, z) * scaling(9.0, 20.0, 9.0),
            Mat4::identity(),
        )?;
        add_wall(
            scene,
            "crystal",
            "diamond",
            translation(x, 100.0, z) * scaling(5.0, 8.0, 5.0),
            Mat4::identity(),
        )?;
    }

    // The diamond floating over the courtyard pyramid.
    add_wall(
        scene,
        "crystal",
        "diamond",
        translation(0.0, 30.0, 100.0) * scaling(7.5, 12.0, 7.5),
        Mat4::identity(),
    )?;

    Ok(())
}

/// Maze wall table: (x extent, z extent, x center, z center). Wall height and
/// elevation are uniform.
const MAZE_WALLS: [(f32, f32, f32, f32); 61] = [
    // Outer boundary
    (54.0, 1.5, 40.0, -90.0),
    (54.0, 1.5, -40.0, -90.0),
    (54.0, 1.5, 40.0, 90.0),
    (54.0, 1.5, -40.0, 90.0),
    (1.5, 180.0, 67.0, 0.0),
    (1.5, 180.0, -67.0, 0.0),
    // Entrance corridor
    (20.0, 1.5, 21.0, -80.0),
    (22.0, 1.5, 56.0, -80.0),
    (42.0, 1.5, -34.0, -80.0),
    (1.5, 31.5, 45.0, -65.0),
    (1.5, 41.5, 31.0, -60.0),
    (1.5, 31.5, -13.0, -65.0),
    (1.5, 31.5, -55.0, -65.0),
    (1.5, 26.5, -16.0, -103.0),
    (1.5, 26.5, 16.0, -103.0),
    (30.0, 1.5, -40.0, -60.0),
    (10.0, 1.5, 50.0, -65.0),
    (42.5, 1.5, -46.0, -30.0),
    (67.5, 1.5, 20.0, -30.0),
    (1.5, 31.5, -25.0, -45.0),
    (1.5, 35.5, 12.0, -48.0),
    (20.0, 1.5, 21.5, -55.0),
    // Mid section
    (42.5, 1.5, -46.0, 0.0),
    (42.5, 1.5, -34.0, -15.0),
    (1.5, 31.5, -13.0, -15.0),
    (1.5, 41.5, 31.0, 5.0),
    (24.0, 1.5, 55.0, -15.0),
    (24.0, 1.5, 43.0, 0.0),
    (24.0, 1.5, 19.0, -15.0),
    (36.0, 1.5, 49.0, 25.0),
    (1.5, 15.0, 49.0, 7.5),
    (32.5, 1.5, 2.5, 0.0),
    (1.5, 30.0, 0.0, 15.0),
    // North-west chambers
    (32.5, 1.5, -41.0, 80.0),
    (1.5, 20.0, -41.0, 70.0),
    (13.5, 1.5, -47.0, 60.0),
    (1.5, 11.5, -53.0, 66.0),
    (13.5, 1.5, -27.0, 57.0),
    (1.5, 11.5, -33.0, 63.0),
    (13.5, 1.5, -27.0, 69.0),
    (1.5, 11.5, -21.0, 63.0),
    (32.5, 1.5, -41.0, 35.0),
    (1.5, 20.0, -41.0, 25.0),
    (13.5, 1.5, -47.0, 15.0),
    (1.5, 11.5, -53.0, 21.0),
    (17.5, 1.5, -20.0, 9.0),
    (1.5, 11.5, -28.0, 15.0),
    (17.5, 1.5, -20.0, 21.0),
    (1.5, 11.5, -12.0, 15.0),
    (35.0, 1.5, -49.0, 47.0),
    (1.5, 61.5, -13.0, 60.0),
    (13.5, 1.5, -6.0, 30.0),
    // North-east chambers
    (1.5, 31.5, 13.0, 75.0),
    (36.5, 1.5, 6.0, 45.0),
    (16.5, 1.5, 23.0, 25.0),
    (1.5, 21.5, 24.0, 55.0),
    (1.5, 15.0, 24.0, 82.5),
    (27.5, 1.5, 37.0, 65.0),
    (1.5, 15.0, 39.0, 72.5),
    (1.5, 25.0, 42.0, 37.5),
    (12.5, 1.5, 48.0, 40.0),
];

fn add_maze(scene: &mut SceneRegistry) -> Result<(), SceneError> {
    let tex_transform = scaling(6.0, 4.0, 4.0);
    for &(sx, sz, px, pz) in &MAZE_WALLS {
        add_wall(
            scene,
            "grass",
            "wall",
            translation(px, 25.0, pz) * scaling(sx, 30.0, sz),
            tex_transform,
        )?;
    }
    Ok(())
}

/// Texture heap layout, one slot per material's fixed index.
pub fn texture_descs(texture_dir: &Path) -> Vec<TextureDesc> {
    let single = |slot: usize, file: &str, sampler: SamplerKind| TextureDesc {
        slot,
        files: vec![texture_dir.join(file)],
        sampler,
    };

    let mut descs = vec![
        single(0, "grass.png", SamplerKind::AnisotropicWrap),
        single(1, "water.png", SamplerKind::AnisotropicWrap),
        single(2, "brick.png", SamplerKind::AnisotropicWrap),
        single(3, "marble.png", SamplerKind::AnisotropicWrap),
        single(4, "wood.png", SamplerKind::AnisotropicWrap),
        single(5, "crystal.png", SamplerKind::AnisotropicWrap),
    ];
    // Tree sprite variants load as one array texture; the geometry shader
    // picks a layer per tree.
    descs.push(TextureDesc {
        slot: 6,
        files: (0..4).map(|i| texture_dir.join(format!("tree{i}.png"))).collect(),
        sampler: SamplerKind::AnisotropicClamp,
    });
    descs
}

/// Three directional lights plus the green tower beacons and blue accents.
pub fn light_rig() -> Vec<Light> {
    let mut lights = vec![
        Light::directional([0.57735, -0.57735, 2.57735], [0.3; 3]),
        Light::directional([-0.57735, -0.57735, 0.57735], [0.3; 3]),
        Light::directional([-0.707, -0.707, -5.707], [0.15; 3]),
    ];

    let green = [0.0, 1.0, 0.0];
    let blue = [0.0, 0.0, 1.0];
    for position in [
        [0.0, 30.0, 10.0],
        [-30.0, 100.0, -35.0],
        [30.0, 100.0, -35.0],
        [-30.0, 100.0, 35.0],
        [30.0, 100.0, 35.0],
    ] {
        lights.push(Light::point(position, green, 5.0, 50.0));
    }
    for position in [
        [-10.0, 40.0, -42.0],
        [0.0, 15.0, 100.0],
        [-20.0, 40.0, -10.0],
        [20.0, 40.0, -10.0],
    ] {
        lights.push(Light::point(position, blue, 5.0, 50.0));
    }
    lights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_builds_with_expected_counts() {
        let mut scene = SceneRegistry::new();
        build_scene(&mut scene).unwrap();

        assert_eq!(scene.material_count(), 7);
        // water + land + trees + castle (42) + maze (62)
        assert_eq!(scene.object_count(), 3 + 42 + 62);
        assert_eq!(scene.layer_items(RenderLayer::Transparent).len(), 1);
        assert_eq!(scene.layer_items(RenderLayer::Opaque).len(), 1);
        assert_eq!(scene.layer_items(RenderLayer::AlphaTestedBillboards).len(), 1);
        assert_eq!(scene.layer_items(RenderLayer::AlphaTested).len(), 104);
    }

    #[test]
    fn test_water_indices_tile_the_full_grid() {
        let indices = water_grid_indices(WAVE_ROWS, WAVE_COLS);
        assert_eq!(indices.len(), 6 * (WAVE_ROWS - 1) * (WAVE_COLS - 1));
        let max = *indices.iter().max().unwrap() as usize;
        assert_eq!(max, WAVE_ROWS * WAVE_COLS - 1);
    }

    #[test]
    fn test_terrain_is_carved_into_moat_and_plateau() {
        let mut scene = SceneRegistry::new();
        build_scene(&mut scene).unwrap();
        let land = scene.geometry_id("land").unwrap();
        let VertexData::Standard(vertices) = &scene.geometry(land).vertices else {
            panic!("land should be static standard geometry");
        };
        let heights: Vec<f32> = vertices.iter().map(|v| v.position[1]).collect();
        assert!(heights.iter().any(|&y| y == 6.0));
        assert!(heights.iter().any(|&y| y == -10.0));
        assert!(heights.iter().all(|&y| y == 6.0 || y == -10.0));
    }

    #[test]
    fn test_trees_stay_inside_their_bands() {
        let mut scene = SceneRegistry::new();
        build_scene(&mut scene).unwrap();
        let trees = scene.geometry_id("tree_sprites").unwrap();
        let VertexData::Billboard(points) = &scene.geometry(trees).vertices else {
            panic!("trees should be billboard geometry");
        };
        assert_eq!(points.len(), TREE_COUNT);
        for point in points {
            let [x, y, z] = point.position;
            assert_eq!(y, TREE_HEIGHT);
            // Every band lies outside the castle footprint.
            assert!(x.abs() >= 10.0 || z.abs() >= 160.0);
        }
    }

    #[test]
    fn test_texture_heap_matches_material_slots() {
        let mut scene = SceneRegistry::new();
        build_scene(&mut scene).unwrap();
        let descs = texture_descs(Path::new("textures"));
        for name in ["grass", "water", "brick", "marble", "wood", "crystal", "tree_sprites"] {
            let id = scene.material_id(name).unwrap();
            let slot = scene.material(id).texture_slot;
            assert!(descs.iter().any(|d| d.slot == slot), "no texture for {name}");
        }
        assert_eq!(descs.last().unwrap().files.len(), 4);
    }

    #[test]
    fn test_light_rig_shape() {
        let lights = light_rig();
        assert_eq!(lights.len(), 12);
        assert!(lights[..3].iter().all(|l| l.falloff_start == 1.0));
        assert!(lights[3..].iter().all(|l| l.falloff_end == 50.0));
    }
}
