//! Minimal glTF 2.0 reader: the GLB container, embedded buffers and the parts
//! of the JSON document needed for statistics and previews.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use derive_more::{Display, Error};
use glam::Vec3;
use serde::Deserialize;
use std::collections::HashMap;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_BYTE: u32 = 5120;
const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
const COMPONENT_SHORT: u32 = 5122;
const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const COMPONENT_FLOAT: u32 = 5126;

#[derive(Debug, Display, Error)]
pub(crate) enum GltfError {
    #[display("unsupported GLB version {_0}")]
    Version(#[error(not(source))] u32),
    #[display("container is truncated")]
    Truncated,
    #[display("first GLB chunk is not JSON")]
    MissingJson,
    #[display("invalid glTF JSON: {_0}")]
    Json(serde_json::Error),
    #[display("unsupported glTF asset version {_0}")]
    AssetVersion(#[error(not(source))] String),
    #[display("{kind} index {index} is out of range")]
    OutOfRange { kind: &'static str, index: usize },
    #[display("buffer {_0} has an invalid data URI")]
    DataUri(#[error(not(source))] usize),
    #[display("accessor {_0} has non-finite positions")]
    NonFinite(#[error(not(source))] usize),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Document {
    pub asset: AssetInfo,
    pub scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Buffer>,
    pub materials: Vec<Material>,
    pub textures: Vec<serde_json::Value>,
    pub skins: Vec<Skin>,
    pub animations: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AssetInfo {
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Scene {
    pub nodes: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Node {
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub matrix: Option<[f32; 16]>,
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Mesh {
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Primitive {
    pub attributes: HashMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub min: Option<Vec<f32>>,
    pub max: Option<Vec<f32>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Buffer {
    pub byte_length: usize,
    pub uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Material {
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    pub normal_texture: Option<TextureRef>,
    pub occlusion_texture: Option<TextureRef>,
    pub emissive_texture: Option<TextureRef>,
}
impl Material {
    pub fn texture_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let pbr = self.pbr_metallic_roughness.as_ref();
        [
            pbr.and_then(|p| p.base_color_texture.as_ref()),
            pbr.and_then(|p| p.metallic_roughness_texture.as_ref()),
            self.normal_texture.as_ref(),
            self.occlusion_texture.as_ref(),
            self.emissive_texture.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(|texture| texture.index)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PbrMetallicRoughness {
    pub base_color_texture: Option<TextureRef>,
    pub metallic_roughness_texture: Option<TextureRef>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TextureRef {
    pub index: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Skin {
    pub joints: Vec<usize>,
}

/// A parsed document together with whichever buffers could be resolved.
/// External (`.bin` file) buffers are `None`: the importer only sees one file.
#[derive(Debug)]
pub(crate) struct Gltf {
    pub document: Document,
    buffers: Vec<Option<Vec<u8>>>,
}
impl Gltf {
    /// Parse either a binary GLB container or a JSON glTF document.
    pub fn parse(data: &[u8]) -> Result<Self, GltfError> {
        if data.starts_with(GLB_MAGIC) { Self::from_glb(data) } else { Self::from_json(data, None) }
    }

    fn from_glb(data: &[u8]) -> Result<Self, GltfError> {
        let word = |offset: usize| -> Result<u32, GltfError> {
            data.get(offset..offset + 4)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u32::from_le_bytes)
                .ok_or(GltfError::Truncated)
        };
        let version = word(4)?;
        if version != 2 {
            return Err(GltfError::Version(version));
        }
        let length = (word(8)? as usize).min(data.len());

        let mut offset = 12;
        let mut json = None;
        let mut bin = None;
        while offset + 8 <= length {
            let chunk_length = word(offset)? as usize;
            let chunk_type = word(offset + 4)?;
            let start = offset + 8;
            let chunk = data.get(start..start + chunk_length).ok_or(GltfError::Truncated)?;
            match chunk_type {
                CHUNK_JSON if json.is_none() => json = Some(chunk),
                CHUNK_BIN if bin.is_none() => bin = Some(chunk),
                // Unknown chunk types must be ignored.
                _ => {},
            }
            if json.is_none() {
                return Err(GltfError::MissingJson);
            }
            // Chunks are 4-byte aligned.
            offset = start + chunk_length.next_multiple_of(4);
        }
        let json = json.ok_or(GltfError::MissingJson)?;
        Self::from_json(json, bin)
    }

    fn from_json(json: &[u8], bin: Option<&[u8]>) -> Result<Self, GltfError> {
        let document: Document = serde_json::from_slice(json).map_err(GltfError::Json)?;
        if !document.asset.version.starts_with("2.") {
            return Err(GltfError::AssetVersion(document.asset.version.clone()));
        }
        let buffers = document
            .buffers
            .iter()
            .enumerate()
            .map(|(index, buffer)| match buffer.uri.as_deref() {
                None if index == 0 => Ok(bin.map(<[u8]>::to_vec)),
                None => Ok(None),
                Some(uri) if uri.starts_with("data:") => {
                    let (_, payload) = uri.split_once(";base64,").ok_or(GltfError::DataUri(index))?;
                    BASE64.decode(payload).map(Some).map_err(|_| GltfError::DataUri(index))
                },
                Some(_) => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { document, buffers })
    }

    pub fn accessor(&self, index: usize) -> Result<&Accessor, GltfError> {
        self.document.accessors.get(index).ok_or(GltfError::OutOfRange { kind: "accessor", index })
    }

    /// Raw element slices of an accessor, one per element, honouring the
    /// buffer view's stride. `None` when the data lives outside this file,
    /// the accessor is sparse-only, or the ranges don't fit the buffer.
    fn elements(&self, accessor: &Accessor, element_size: usize) -> Option<Vec<&[u8]>> {
        let view = self.document.buffer_views.get(accessor.buffer_view?)?;
        let buffer = self.buffers.get(view.buffer)?.as_deref()?;
        let view_data = buffer.get(view.byte_offset..view.byte_offset.checked_add(view.byte_length)?)?;
        let stride = view.byte_stride.unwrap_or(element_size).max(element_size);
        (0..accessor.count)
            .map(|i| {
                let start = accessor.byte_offset.checked_add(i.checked_mul(stride)?)?;
                view_data.get(start..start.checked_add(element_size)?)
            })
            .collect()
    }

    /// Read a `VEC3`/`FLOAT` accessor (positions). Quantized positions are
    /// not decoded; callers fall back to the accessor bounds.
    pub fn read_vec3(&self, accessor: &Accessor) -> Option<Vec<Vec3>> {
        if accessor.component_type != COMPONENT_FLOAT || accessor.kind != "VEC3" {
            return None;
        }
        self.elements(accessor, 12)?
            .into_iter()
            .map(|bytes| {
                let f = |i: usize| bytes.get(i * 4..i * 4 + 4)?.try_into().ok().map(f32::from_le_bytes);
                Some(Vec3::new(f(0)?, f(1)?, f(2)?))
            })
            .collect()
    }

    /// Read a `SCALAR` unsigned integer accessor (indices).
    pub fn read_indices(&self, accessor: &Accessor) -> Option<Vec<u32>> {
        if accessor.kind != "SCALAR" {
            return None;
        }
        let size = match accessor.component_type {
            COMPONENT_UNSIGNED_BYTE => 1,
            COMPONENT_UNSIGNED_SHORT => 2,
            COMPONENT_UNSIGNED_INT => 4,
            _ => return None,
        };
        self.elements(accessor, size)?
            .into_iter()
            .map(|bytes| match *bytes {
                [b] => Some(u32::from(b)),
                [a, b] => Some(u32::from(u16::from_le_bytes([a, b]))),
                [a, b, c, d] => Some(u32::from_le_bytes([a, b, c, d])),
                _ => None,
            })
            .collect()
    }
}

/// Byte size of one accessor component, for validation.
pub(crate) fn component_size(component_type: u32) -> Option<usize> {
    match component_type {
        COMPONENT_BYTE | COMPONENT_UNSIGNED_BYTE => Some(1),
        COMPONENT_SHORT | COMPONENT_UNSIGNED_SHORT => Some(2),
        COMPONENT_UNSIGNED_INT | COMPONENT_FLOAT => Some(4),
        _ => None,
    }
}
