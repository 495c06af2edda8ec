//! Software preview renderer: orthographic three-quarter view, flat shading,
//! depth buffer, transparent background.

use glam::{Mat4, Vec2, Vec3};
use image::{Rgba, RgbaImage};

/// Triangles beyond this are not drawn; the preview stays bounded in time.
pub(crate) const MAX_PREVIEW_TRIANGLES: usize = 250_000;

const BASE_COLOR: Vec3 = Vec3::new(0.74, 0.76, 0.80);
const AMBIENT: f32 = 0.3;
const DIFFUSE: f32 = 0.7;

/// World-space geometry collected from every mesh instance.
#[derive(Debug, Default)]
pub(crate) struct PreviewMesh {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}
impl PreviewMesh {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.triangles.len() >= MAX_PREVIEW_TRIANGLES
    }

    /// Append one primitive's triangles, re-based onto the shared vertex list.
    pub fn extend(&mut self, positions: &[Vec3], triangles: impl IntoIterator<Item = [u32; 3]>) {
        let Ok(base) = u32::try_from(self.positions.len()) else { return };
        let count = positions.len() as u32;
        self.positions.extend_from_slice(positions);
        let room = MAX_PREVIEW_TRIANGLES.saturating_sub(self.triangles.len());
        self.triangles.extend(
            triangles
                .into_iter()
                .filter(|t| t.iter().all(|&i| i < count))
                .take(room)
                .map(|[a, b, c]| [a + base, b + base, c + base]),
        );
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Rasterise `mesh`, framing the box `min..max`, into a `size`×`size` image.
pub(crate) fn render(mesh: &PreviewMesh, min: Vec3, max: Vec3, size: u32) -> RgbaImage {
    let size = size.max(1);
    let mut image = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0]));
    let mut depth = vec![f32::INFINITY; size as usize * size as usize];

    let center = (min + max) * 0.5;
    let radius = ((max - min).length() * 0.5).max(1e-4);
    let toward_camera = Vec3::new(1.0, 0.8, 1.2).normalize();
    let light = Vec3::new(0.4, 1.0, 0.6).normalize();
    let view = Mat4::look_at_rh(center + toward_camera * radius * 4.0, center, Vec3::Y);
    // A little margin so silhouettes never touch the edge.
    let extent = radius * 1.05;
    let projection = Mat4::orthographic_rh(-extent, extent, -extent, extent, radius, radius * 8.0);
    let view_projection = projection * view;
    let scale = size as f32;

    let screen: Vec<Vec3> = mesh
        .positions
        .iter()
        .map(|p| {
            let ndc = view_projection.project_point3(*p);
            Vec3::new((ndc.x + 1.0) * 0.5 * scale, (1.0 - ndc.y) * 0.5 * scale, ndc.z)
        })
        .collect();

    for &[a, b, c] in &mesh.triangles {
        let (wa, wb, wc) = (mesh.positions[a as usize], mesh.positions[b as usize], mesh.positions[c as usize]);
        let Some(mut normal) = (wb - wa).cross(wc - wa).try_normalize() else { continue };
        if normal.dot(toward_camera) < 0.0 {
            normal = -normal;
        }
        let shade = AMBIENT + DIFFUSE * normal.dot(light).max(0.0);
        let color = (BASE_COLOR * shade * 255.0).round().clamp(Vec3::ZERO, Vec3::splat(255.0));
        let pixel = Rgba([color.x as u8, color.y as u8, color.z as u8, 255]);

        let (sa, sb, sc) = (screen[a as usize], screen[b as usize], screen[c as usize]);
        let area = edge(sa.truncate(), sb.truncate(), sc.truncate());
        if area.abs() < f32::EPSILON {
            continue;
        }
        let lo = sa.min(sb).min(sc).floor().max(Vec3::ZERO);
        let hi = sa.max(sb).max(sc).ceil().min(Vec3::splat(scale - 1.0));
        if lo.x > hi.x || lo.y > hi.y {
            continue;
        }
        for y in lo.y as u32..=hi.y as u32 {
            for x in lo.x as u32..=hi.x as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w = Vec3::new(
                    edge(sb.truncate(), sc.truncate(), p),
                    edge(sc.truncate(), sa.truncate(), p),
                    edge(sa.truncate(), sb.truncate(), p),
                ) / area;
                if w.min_element() < 0.0 {
                    continue;
                }
                let z = w.x * sa.z + w.y * sb.z + w.z * sc.z;
                let index = y as usize * size as usize + x as usize;
                if z < depth[index] {
                    depth[index] = z;
                    image.put_pixel(x, y, pixel);
                }
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cube() -> PreviewMesh {
        let positions: Vec<Vec3> = (0..8)
            .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32) - 0.5)
            .collect();
        let mut mesh = PreviewMesh::default();
        #[rustfmt::skip]
        let faces = [
            [0, 1, 3], [0, 3, 2], [4, 6, 7], [4, 7, 5],
            [0, 4, 5], [0, 5, 1], [2, 3, 7], [2, 7, 6],
            [0, 2, 6], [0, 6, 4], [1, 5, 7], [1, 7, 3],
        ];
        mesh.extend(&positions, faces);
        mesh
    }

    #[test]
    fn test_render_cube() {
        let image = render(&cube(), Vec3::splat(-0.5), Vec3::splat(0.5), 64);
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(32, 32)[3], 255, "centre is covered");
        assert_eq!(image.get_pixel(0, 0)[3], 0, "corner is background");
        // Three visible faces, three different shades.
        let shades: HashSet<_> = image.pixels().filter(|p| p[3] == 255).map(|p| p[0]).collect();
        assert!(shades.len() >= 3, "{shades:?}");
    }

    #[test]
    fn test_extend_filters_and_rebases() {
        let mut mesh = cube();
        mesh.extend(&[Vec3::ZERO, Vec3::X, Vec3::Y], [[0, 1, 2], [0, 1, 9]]);
        assert_eq!(mesh.positions.len(), 11);
        assert_eq!(mesh.triangles.len(), 13);
        assert_eq!(mesh.triangles[12], [8, 9, 10]);
    }

    #[test]
    fn test_degenerate_geometry_renders_nothing() {
        let mut mesh = PreviewMesh::default();
        mesh.extend(&[Vec3::ZERO, Vec3::X, Vec3::X * 2.0], [[0, 1, 2]]);
        let image = render(&mesh, Vec3::ZERO, Vec3::X * 2.0, 16);
        assert!(image.pixels().all(|p| p[3] == 0));
    }
}
