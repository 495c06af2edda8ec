//! glTF 2.0 models (`.glb` and `.gltf` with embedded buffers).

mod gltf;
mod raster;

use exn::ResultExt;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

use self::gltf::{Gltf, GltfError, component_size};
use self::raster::PreviewMesh;
use crate::error::{ErrorKind, Result};
use crate::models::{AssetType, Imported, SourceFile};
use crate::settings::ImportSettings;
use crate::thumbnail::encode_png;

const MODE_TRIANGLES: u32 = 4;
const MODE_TRIANGLE_STRIP: u32 = 5;
const MODE_TRIANGLE_FAN: u32 = 6;

/// Axis-aligned bounds in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}
impl Bounds {
    pub fn size(&self) -> [f32; 3] {
        (Vec3::from(self.max) - Vec3::from(self.min)).to_array()
    }

    pub fn center(&self) -> [f32; 3] {
        ((Vec3::from(self.max) + Vec3::from(self.min)) * 0.5).to_array()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub vertices: u64,
    pub triangles: u64,
    /// Distinct joints across all skins.
    pub bones: u32,
    pub animations: u32,
    /// Distinct materials used by primitives; the implicit default material
    /// counts once.
    pub materials: u32,
    /// Distinct textures referenced by the used materials.
    pub textures: u32,
    /// Mesh-bearing node instances in the scene.
    pub meshes: u32,
    /// `None` for scenes without geometry.
    pub bounds: Option<Bounds>,
}

#[derive(Default)]
struct Accumulator {
    vertices: u64,
    triangles: u64,
    meshes: u32,
    materials: BTreeSet<usize>,
    default_material: bool,
    min: Option<Vec3>,
    max: Option<Vec3>,
    preview: PreviewMesh,
    // Some primitive's vertices could not be read back.
    geometry_missing: bool,
}
impl Accumulator {
    fn include(&mut self, point: Vec3) {
        self.min = Some(self.min.map_or(point, |m| m.min(point)));
        self.max = Some(self.max.map_or(point, |m| m.max(point)));
    }
}

fn local_transform(node: &self::gltf::Node) -> Mat4 {
    if let Some(matrix) = node.matrix {
        return Mat4::from_cols_array(&matrix);
    }
    let translation = node.translation.map(Vec3::from).unwrap_or(Vec3::ZERO);
    let rotation = node.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY);
    let scale = node.scale.map(Vec3::from).unwrap_or(Vec3::ONE);
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Triangle index triples for one primitive, given its index list (or the
/// implicit `0..n` sequence) and topology.
fn triangulate(mode: u32, indices: &[u32]) -> Vec<[u32; 3]> {
    match mode {
        MODE_TRIANGLES => indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect(),
        MODE_TRIANGLE_STRIP => indices
            .windows(3)
            .enumerate()
            // Alternate winding so every strip triangle faces the same way.
            .map(|(i, t)| if i % 2 == 0 { [t[0], t[1], t[2]] } else { [t[1], t[0], t[2]] })
            .collect(),
        MODE_TRIANGLE_FAN => match indices.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|t| [hub, t[0], t[1]]).collect(),
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn triangle_count(mode: u32, index_count: usize) -> u64 {
    let count = match mode {
        MODE_TRIANGLES => index_count / 3,
        MODE_TRIANGLE_STRIP | MODE_TRIANGLE_FAN => index_count.saturating_sub(2),
        // Points and lines have no faces.
        _ => 0,
    };
    count as u64
}

/// Root nodes of the default scene. Documents without scenes treat every
/// node that is nobody's child as a root.
fn scene_roots(gltf: &Gltf) -> std::result::Result<Vec<usize>, GltfError> {
    let document = &gltf.document;
    if !document.scenes.is_empty() {
        let index = document.scene.unwrap_or(0);
        let scene = document.scenes.get(index).ok_or(GltfError::OutOfRange { kind: "scene", index })?;
        return Ok(scene.nodes.clone());
    }
    let children: BTreeSet<usize> = document.nodes.iter().flat_map(|node| node.children.iter().copied()).collect();
    Ok((0..document.nodes.len()).filter(|index| !children.contains(index)).collect())
}

fn walk(gltf: &Gltf) -> std::result::Result<Accumulator, GltfError> {
    let document = &gltf.document;
    let mut totals = Accumulator::default();
    let mut stack: Vec<(usize, Mat4)> = scene_roots(gltf)?.into_iter().rev().map(|root| (root, Mat4::IDENTITY)).collect();
    let mut visited = vec![false; document.nodes.len()];

    while let Some((index, parent)) = stack.pop() {
        let node = document.nodes.get(index).ok_or(GltfError::OutOfRange { kind: "node", index })?;
        // A node may only appear once in a scene; a cycle or shared child is malformed.
        if std::mem::replace(&mut visited[index], true) {
            continue;
        }
        let world = parent * local_transform(node);
        stack.extend(node.children.iter().rev().map(|&child| (child, world)));

        let Some(mesh_index) = node.mesh else { continue };
        let mesh = document.meshes.get(mesh_index).ok_or(GltfError::OutOfRange { kind: "mesh", index: mesh_index })?;
        totals.meshes += 1;
        for primitive in &mesh.primitives {
            match primitive.material {
                Some(material) if material < document.materials.len() => {
                    totals.materials.insert(material);
                },
                Some(material) => return Err(GltfError::OutOfRange { kind: "material", index: material }),
                None => totals.default_material = true,
            }
            // Without positions a primitive has no geometry to count.
            let Some(&position_index) = primitive.attributes.get("POSITION") else { continue };
            let position = gltf.accessor(position_index)?;
            if component_size(position.component_type).is_none() {
                return Err(GltfError::OutOfRange { kind: "component type", index: position.component_type as usize });
            }
            let mode = primitive.mode.unwrap_or(MODE_TRIANGLES);
            let index_accessor = primitive.indices.map(|i| gltf.accessor(i)).transpose()?;
            totals.vertices += position.count as u64;
            totals.triangles += triangle_count(mode, index_accessor.map_or(position.count, |a| a.count));

            match gltf.read_vec3(position) {
                Some(local) => {
                    let points: Vec<Vec3> = local.iter().map(|p| world.transform_point3(*p)).collect();
                    if !points.iter().all(|p| p.is_finite()) {
                        return Err(GltfError::NonFinite(position_index));
                    }
                    points.iter().for_each(|p| totals.include(*p));
                    if totals.preview.is_full() {
                        continue;
                    }
                    let indices = match index_accessor {
                        Some(accessor) => gltf.read_indices(accessor),
                        None => Some((0..points.len() as u32).collect()),
                    };
                    match indices {
                        Some(indices) => totals.preview.extend(&points, triangulate(mode, &indices)),
                        None => totals.geometry_missing = true,
                    }
                },
                None => {
                    totals.geometry_missing = true;
                    // Fall back to the declared accessor bounds, all eight corners.
                    if let (Some(min), Some(max)) = (position.min.as_deref(), position.max.as_deref())
                        && min.len() >= 3
                        && max.len() >= 3
                    {
                        for corner in 0..8 {
                            let pick = |axis: usize| if corner & (1 << axis) == 0 { min[axis] } else { max[axis] };
                            let point = world.transform_point3(Vec3::new(pick(0), pick(1), pick(2)));
                            if !point.is_finite() {
                                return Err(GltfError::NonFinite(position_index));
                            }
                            totals.include(point);
                        }
                    }
                },
            }
        }
    }
    Ok(totals)
}

#[instrument(skip_all, fields(file = %file.name, size = file.data.len()))]
pub(crate) fn import(file: SourceFile, settings: &ImportSettings) -> Result<Imported<ModelMetadata>> {
    file.ensure(AssetType::Model)?;
    let gltf = Gltf::parse(&file.data).or_raise(|| ErrorKind::decode(&file.name, "malformed glTF container"))?;
    let totals = walk(&gltf).or_raise(|| ErrorKind::decode(&file.name, "invalid scene graph"))?;
    let document = &gltf.document;

    let bones: BTreeSet<usize> = document.skins.iter().flat_map(|skin| skin.joints.iter().copied()).collect();
    let textures: BTreeSet<usize> = totals
        .materials
        .iter()
        .filter_map(|&index| document.materials.get(index))
        .flat_map(|material| material.texture_indices())
        .collect();
    let bounds = totals.min.zip(totals.max).map(|(min, max)| Bounds { min: min.to_array(), max: max.to_array() });

    let thumbnail = match totals.min.zip(totals.max) {
        Some((min, max)) if !totals.preview.is_empty() => {
            if totals.geometry_missing {
                warn!("some primitives have no readable vertex data; preview is partial");
            }
            let image = raster::render(&totals.preview, min, max, settings.thumbnail_edge());
            Some(encode_png(image, &file.name)?)
        },
        _ => None,
    };

    let metadata = ModelMetadata {
        vertices: totals.vertices,
        triangles: totals.triangles,
        bones: bones.len() as u32,
        animations: document.animations.len() as u32,
        materials: totals.materials.len() as u32 + u32::from(totals.default_material),
        textures: textures.len() as u32,
        meshes: totals.meshes,
        bounds,
    };
    debug!(
        vertices = metadata.vertices,
        triangles = metadata.triangles,
        materials = metadata.materials,
        thumbnail = thumbnail.is_some(),
        "parsed model"
    );
    Ok(Imported { data: file.data, metadata, thumbnail })
}
