//! Procedural mesh generation for the parametric shapes the scene is built
//! from. All generators produce standard-layout vertices with outward normals
//! and [0, 1] texture coordinates.

use crate::foundation::math::{constants::PI, Vec3};
use crate::scene::geometry::MeshVertex;

/// Generated mesh: vertices plus 32-bit indices. Scenes with small meshes
/// narrow the indices to 16 bits at upload time.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Narrow to 16-bit indices. Every mesh in the scene stays well under
    /// 65k vertices, so a wider index would only waste bandwidth.
    pub fn indices16(&self) -> Vec<u16> {
        self.indices
            .iter()
            .map(|&i| {
                debug_assert!(i <= u16::MAX as u32);
                i as u16
            })
            .collect()
    }
}

fn vertex(px: f32, py: f32, pz: f32, nx: f32, ny: f32, nz: f32, u: f32, v: f32) -> MeshVertex {
    MeshVertex {
        position: [px, py, pz],
        normal: [nx, ny, nz],
        texc: [u, v],
    }
}

/// Flat grid in the xz plane centered at the origin, `m` columns by `n` rows
/// of vertices. The caller displaces heights afterwards if the surface is not
/// flat.
pub fn grid(width: f32, depth: f32, m: usize, n: usize) -> MeshData {
    debug_assert!(m >= 2 && n >= 2);
    let half_width = 0.5 * width;
    let half_depth = 0.5 * depth;

    let dx = width / (n - 1) as f32;
    let dz = depth / (m - 1) as f32;
    let du = 1.0 / (n - 1) as f32;
    let dv = 1.0 / (m - 1) as f32;

    let mut mesh = MeshData::default();
    mesh.vertices.reserve(m * n);
    for i in 0..m {
        let z = half_depth - i as f32 * dz;
        for j in 0..n {
            let x = -half_width + j as f32 * dx;
            mesh.vertices
                .push(vertex(x, 0.0, z, 0.0, 1.0, 0.0, j as f32 * du, i as f32 * dv));
        }
    }

    mesh.indices.reserve((m - 1) * (n - 1) * 6);
    for i in 0..m - 1 {
        for j in 0..n - 1 {
            let a = (i * n + j) as u32;
            let b = (i * n + j + 1) as u32;
            let c = ((i + 1) * n + j) as u32;
            let d = ((i + 1) * n + j + 1) as u32;
            mesh.indices.extend_from_slice(&[a, b, c, c, b, d]);
        }
    }
    mesh
}

/// Axis-aligned box centered at the origin: 24 vertices so every face gets
/// its own normals and texture coordinates.
pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshData {
    let w = 0.5 * width;
    let h = 0.5 * height;
    let d = 0.5 * depth;

    let vertices = vec![
        // Front (-z)
        vertex(-w, -h, -d, 0.0, 0.0, -1.0, 0.0, 1.0),
        vertex(-w, h, -d, 0.0, 0.0, -1.0, 0.0, 0.0),
        vertex(w, h, -d, 0.0, 0.0, -1.0, 1.0, 0.0),
        vertex(w, -h, -d, 0.0, 0.0, -1.0, 1.0, 1.0),
        // Back (+z)
        vertex(-w, -h, d, 0.0, 0.0, 1.0, 1.0, 1.0),
        vertex(w, -h, d, 0.0, 0.0, 1.0, 0.0, 1.0),
        vertex(w, h, d, 0.0, 0.0, 1.0, 0.0, 0.0),
        vertex(-w, h, d, 0.0, 0.0, 1.0, 1.0, 0.0),
        // Top (+y)
        vertex(-w, h, -d, 0.0, 1.0, 0.0, 0.0, 1.0),
        vertex(-w, h, d, 0.0, 1.0, 0.0, 0.0, 0.0),
        vertex(w, h, d, 0.0, 1.0, 0.0, 1.0, 0.0),
        vertex(w, h, -d, 0.0, 1.0, 0.0, 1.0, 1.0),
        // Bottom (-y)
        vertex(-w, -h, -d, 0.0, -1.0, 0.0, 1.0, 1.0),
        vertex(w, -h, -d, 0.0, -1.0, 0.0, 0.0, 1.0),
        vertex(w, -h, d, 0.0, -1.0, 0.0, 0.0, 0.0),
        vertex(-w, -h, d, 0.0, -1.0, 0.0, 1.0, 0.0),
        // Left (-x)
        vertex(-w, -h, d, -1.0, 0.0, 0.0, 0.0, 1.0),
        vertex(-w, h, d, -1.0, 0.0, 0.0, 0.0, 0.0),
        vertex(-w, h, -d, -1.0, 0.0, 0.0, 1.0, 0.0),
        vertex(-w, -h, -d, -1.0, 0.0, 0.0, 1.0, 1.0),
        // Right (+x)
        vertex(w, -h, -d, 1.0, 0.0, 0.0, 0.0, 1.0),
        vertex(w, h, -d, 1.0, 0.0, 0.0, 0.0, 0.0),
        vertex(w, h, d, 1.0, 0.0, 0.0, 1.0, 0.0),
        vertex(w, -h, d, 1.0, 0.0, 0.0, 1.0, 1.0),
    ];

    let indices = vec![
        0, 1, 2, 0, 2, 3, // front
        4, 5, 6, 4, 6, 7, // back
        8, 9, 10, 8, 10, 11, // top
        12, 13, 14, 12, 14, 15, // bottom
        16, 17, 18, 16, 18, 19, // left
        20, 21, 22, 20, 22, 23, // right
    ];

    MeshData { vertices, indices }
}

/// Cylinder along the y axis, centered at the origin, with end caps. A top
/// radius of zero produces a cone.
pub fn cylinder(
    bottom_radius: f32,
    top_radius: f32,
    height: f32,
    slice_count: usize,
    stack_count: usize,
) -> MeshData {
    debug_assert!(slice_count >= 3 && stack_count >= 1);
    let mut mesh = MeshData::default();

    let stack_height = height / stack_count as f32;
    let radius_step = (top_radius - bottom_radius) / stack_count as f32;
    let d_theta = 2.0 * PI / slice_count as f32;

    for i in 0..=stack_count {
        let y = -0.5 * height + i as f32 * stack_height;
        let r = bottom_radius + i as f32 * radius_step;

        for j in 0..=slice_count {
            let theta = j as f32 * d_theta;
            let (sin, cos) = theta.sin_cos();

            // Normal from the slant: tangent down the side crossed with the
            // ring tangent.
            let dr = bottom_radius - top_radius;
            let bitangent = Vec3::new(dr * cos, -height, dr * sin);
            let tangent = Vec3::new(-sin, 0.0, cos);
            let normal = tangent.cross(&bitangent).normalize();

            mesh.vertices.push(vertex(
                r * cos,
                y,
                r * sin,
                normal.x,
                normal.y,
                normal.z,
                j as f32 / slice_count as f32,
                1.0 - i as f32 / stack_count as f32,
            ));
        }
    }

    let ring = (slice_count + 1) as u32;
    for i in 0..stack_count as u32 {
        for j in 0..slice_count as u32 {
            mesh.indices.extend_from_slice(&[
                i * ring + j,
                (i + 1) * ring + j,
                (i + 1) * ring + j + 1,
                i * ring + j,
                (i + 1) * ring + j + 1,
                i * ring + j + 1,
            ]);
        }
    }

    build_cylinder_cap(&mut mesh, top_radius, 0.5 * height, slice_count, true);
    build_cylinder_cap(&mut mesh, bottom_radius, -0.5 * height, slice_count, false);
    mesh
}

fn build_cylinder_cap(mesh: &mut MeshData, radius: f32, y: f32, slice_count: usize, top: bool) {
    let base = mesh.vertices.len() as u32;
    let d_theta = 2.0 * PI / slice_count as f32;
    let ny = if top { 1.0 } else { -1.0 };

    for j in 0..=slice_count {
        let theta = j as f32 * d_theta;
        let x = radius * theta.cos();
        let z = radius * theta.sin();
        mesh.vertices
            .push(vertex(x, y, z, 0.0, ny, 0.0, x * 0.5 + 0.5, z * 0.5 + 0.5));
    }
    let center = mesh.vertices.len() as u32;
    mesh.vertices.push(vertex(0.0, y, 0.0, 0.0, ny, 0.0, 0.5, 0.5));

    for j in 0..slice_count as u32 {
        if top {
            mesh.indices.extend_from_slice(&[center, base + j + 1, base + j]);
        } else {
            mesh.indices.extend_from_slice(&[center, base + j, base + j + 1]);
        }
    }
}

/// Cone along the y axis: cylinder degenerated to a point at the top.
pub fn cone(bottom_radius: f32, height: f32, slice_count: usize, stack_count: usize) -> MeshData {
    cylinder(bottom_radius, 0.0, height, slice_count, stack_count)
}

/// Square pyramid: apex on +y, base centered at the origin.
pub fn pyramid(base: f32, height: f32) -> MeshData {
    let b = 0.5 * base;
    let apex = Vec3::new(0.0, height, 0.0);
    let corners = [
        Vec3::new(-b, 0.0, -b),
        Vec3::new(b, 0.0, -b),
        Vec3::new(b, 0.0, b),
        Vec3::new(-b, 0.0, b),
    ];

    let mut mesh = MeshData::default();
    for side in 0..4 {
        let a = corners[side];
        let c = corners[(side + 1) % 4];
        let normal = (apex - a).cross(&(c - a)).normalize();
        let base_index = mesh.vertices.len() as u32;
        mesh.vertices.push(vertex(a.x, a.y, a.z, normal.x, normal.y, normal.z, 0.0, 1.0));
        mesh.vertices.push(vertex(c.x, c.y, c.z, normal.x, normal.y, normal.z, 1.0, 1.0));
        mesh.vertices
            .push(vertex(apex.x, apex.y, apex.z, normal.x, normal.y, normal.z, 0.5, 0.0));
        mesh.indices.extend_from_slice(&[base_index, base_index + 2, base_index + 1]);
    }

    // Base, facing down.
    let base_index = mesh.vertices.len() as u32;
    for (i, corner) in corners.iter().enumerate() {
        let (u, v) = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)][i];
        mesh.vertices
            .push(vertex(corner.x, corner.y, corner.z, 0.0, -1.0, 0.0, u, v));
    }
    mesh.indices.extend_from_slice(&[
        base_index,
        base_index + 1,
        base_index + 2,
        base_index,
        base_index + 2,
        base_index + 3,
    ]);
    mesh
}

/// Octahedral diamond: two square pyramids joined at the girdle, centered at
/// the origin.
pub fn diamond(girdle: f32, height: f32) -> MeshData {
    let g = 0.5 * girdle;
    let h = 0.5 * height;
    let top = Vec3::new(0.0, h, 0.0);
    let bottom = Vec3::new(0.0, -h, 0.0);
    let corners = [
        Vec3::new(-g, 0.0, -g),
        Vec3::new(g, 0.0, -g),
        Vec3::new(g, 0.0, g),
        Vec3::new(-g, 0.0, g),
    ];

    let mut mesh = MeshData::default();
    for side in 0..4 {
        let a = corners[side];
        let c = corners[(side + 1) % 4];

        let upper_normal = (top - a).cross(&(c - a)).normalize();
        let base_index = mesh.vertices.len() as u32;
        mesh.vertices
            .push(vertex(a.x, a.y, a.z, upper_normal.x, upper_normal.y, upper_normal.z, 0.0, 0.5));
        mesh.vertices
            .push(vertex(c.x, c.y, c.z, upper_normal.x, upper_normal.y, upper_normal.z, 1.0, 0.5));
        mesh.vertices
            .push(vertex(top.x, top.y, top.z, upper_normal.x, upper_normal.y, upper_normal.z, 0.5, 0.0));
        mesh.indices.extend_from_slice(&[base_index, base_index + 2, base_index + 1]);

        let lower_normal = (c - a).cross(&(bottom - a)).normalize();
        let base_index = mesh.vertices.len() as u32;
        mesh.vertices
            .push(vertex(a.x, a.y, a.z, lower_normal.x, lower_normal.y, lower_normal.z, 0.0, 0.5));
        mesh.vertices
            .push(vertex(c.x, c.y, c.z, lower_normal.x, lower_normal.y, lower_normal.z, 1.0, 0.5));
        mesh.vertices.push(vertex(
            bottom.x,
            bottom.y,
            bottom.z,
            lower_normal.x,
            lower_normal.y,
            lower_normal.z,
            0.5,
            1.0,
        ));
        mesh.indices.extend_from_slice(&[base_index, base_index + 1, base_index + 2]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle_winding_consistent(mesh: &MeshData) -> bool {
        // Every face normal should roughly agree with its vertex normals.
        mesh.indices.chunks_exact(3).all(|tri| {
            let p = |i: usize| Vec3::from(mesh.vertices[tri[i] as usize].position);
            let n = |i: usize| Vec3::from(mesh.vertices[tri[i] as usize].normal);
            let face = (p(1) - p(0)).cross(&(p(2) - p(0)));
            if face.norm() < 1e-8 {
                return true;
            }
            let avg = (n(0) + n(1) + n(2)) / 3.0;
            face.normalize().dot(&avg) > 0.0
        })
    }

    #[test]
    fn test_grid_dimensions_and_extent() {
        let mesh = grid(720.0, 720.0, 225, 225);
        assert_eq!(mesh.vertices.len(), 225 * 225);
        assert_eq!(mesh.indices.len(), 224 * 224 * 6);

        let first = mesh.vertices[0];
        assert_relative_eq!(first.position[0], -360.0);
        assert_relative_eq!(first.position[2], 360.0);
        let last = mesh.vertices[225 * 225 - 1];
        assert_relative_eq!(last.position[0], 360.0);
        assert_relative_eq!(last.position[2], -360.0);
        assert_relative_eq!(last.texc[0], 1.0);
        assert_relative_eq!(last.texc[1], 1.0);
    }

    #[test]
    fn test_cuboid_has_distinct_face_normals() {
        let mesh = cuboid(2.0, 4.0, 6.0);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(triangle_winding_consistent(&mesh));

        for v in &mesh.vertices {
            assert!(v.position[0].abs() <= 1.0 + 1e-6);
            assert!(v.position[1].abs() <= 2.0 + 1e-6);
            assert!(v.position[2].abs() <= 3.0 + 1e-6);
        }
    }

    #[test]
    fn test_cylinder_ring_radii_interpolate() {
        let mesh = cylinder(2.0, 1.0, 10.0, 20, 4);
        assert!(triangle_winding_consistent(&mesh));

        // Bottom ring sits at radius 2, top ring at radius 1.
        let bottom = &mesh.vertices[0];
        let r0 = (bottom.position[0].powi(2) + bottom.position[2].powi(2)).sqrt();
        assert_relative_eq!(r0, 2.0, epsilon = 1e-4);
        let top = &mesh.vertices[4 * 21];
        let r4 = (top.position[0].powi(2) + top.position[2].powi(2)).sqrt();
        assert_relative_eq!(r4, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cone_converges_to_apex() {
        let mesh = cone(3.0, 8.0, 16, 2);
        let apex_ring = &mesh.vertices[2 * 17];
        let r = (apex_ring.position[0].powi(2) + apex_ring.position[2].powi(2)).sqrt();
        assert_relative_eq!(r, 0.0, epsilon = 1e-4);
        assert_relative_eq!(apex_ring.position[1], 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_pyramid_and_diamond_are_closed_shapes() {
        let pyramid = pyramid(6.0, 4.0);
        assert_eq!(pyramid.indices.len(), 4 * 3 + 6);
        assert!(triangle_winding_consistent(&pyramid));

        let diamond = diamond(2.0, 3.0);
        assert_eq!(diamond.indices.len(), 8 * 3);
        assert!(triangle_winding_consistent(&diamond));
    }

    #[test]
    fn test_indices16_narrowing() {
        let mesh = cuboid(1.0, 1.0, 1.0);
        let narrow = mesh.indices16();
        assert_eq!(narrow.len(), mesh.indices.len());
        assert_eq!(narrow[0] as u32, mesh.indices[0]);
    }
}
