//! A glTF 2.0 importer for `.gltf` files with external buffers and for `.glb`
//! files with an embedded binary chunk.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3};
use tinyjson::JsonValue;

use crate::renderer::texture::TextureKind;
use crate::scene::{ImportError, RawMaterial, RawMesh, SceneGraph, SceneImporter, SceneNode};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F534A;
const GLB_CHUNK_BIN: u32 = 0x004E4942;

const MODE_TRIANGLES: usize = 4;

/// Accessors without a buffer view are zero filled, so nothing in the file
/// bounds their size.
const MAX_UNBACKED_ELEMENTS: usize = 1 << 24;
const MAX_NODE_DEPTH: usize = 256;

const COMPONENT_U8: usize = 5121;
const COMPONENT_U16: usize = 5123;
const COMPONENT_U32: usize = 5125;
const COMPONENT_F32: usize = 5126;

type JsonObject = HashMap<String, JsonValue>;

#[derive(Debug, Clone, Copy, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn parse_scene_file(&self, path: &Path) -> Result<SceneGraph, ImportError> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        if !matches!(extension.as_deref(), Some("gltf") | Some("glb")) {
            return Err(ImportError::invalid_scene(path, "unsupported file format"));
        }
        let bytes = fs::read(path).map_err(|err| ImportError::invalid_scene(path, err.to_string()))?;
        let directory = path.parent().unwrap_or_else(|| Path::new(""));

        let (json, bin_chunk) = if bytes.starts_with(GLB_MAGIC) {
            split_glb(&bytes).map_err(|reason| ImportError::invalid_scene(path, reason))?
        } else {
            (bytes.as_slice(), None)
        };
        let json = std::str::from_utf8(json)
            .map_err(|err| ImportError::invalid_scene(path, err.to_string()))?;

        load_gltf(json, bin_chunk, |uri| {
            fs::read(directory.join(uri)).map_err(|err| format!("buffer \"{uri}\": {err}"))
        })
        .map_err(|reason| ImportError::invalid_scene(path, reason))
    }
}

/// Splits a binary glTF container into its JSON and BIN chunks.
fn split_glb(bytes: &[u8]) -> Result<(&[u8], Option<&[u8]>), String> {
    let read_u32 = |offset: usize| -> Result<u32, String> {
        bytes
            .get(offset..offset + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| "truncated glb file".to_string())
    };
    let version = read_u32(4)?;
    if version != 2 {
        return Err(format!("unsupported glb version {version}"));
    }
    let length = (read_u32(8)? as usize).min(bytes.len());

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= length {
        let chunk_length = read_u32(offset)? as usize;
        let chunk_type = read_u32(offset + 4)?;
        let data = bytes
            .get(offset + 8..offset + 8 + chunk_length)
            .ok_or_else(|| "truncated glb chunk".to_string())?;
        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() => json = Some(data),
            GLB_CHUNK_BIN if bin.is_none() => bin = Some(data),
            _ => {}
        }
        // Chunks are padded to 4 bytes.
        offset += 8 + (chunk_length + 3) / 4 * 4;
    }
    let json = json.ok_or_else(|| "glb file has no JSON chunk".to_string())?;
    Ok((json, bin))
}

/// Parses the glTF JSON document into a scene graph. `bin_chunk` is the
/// buffer without an uri (the BIN chunk of GLBs), `read_uri` loads the
/// external buffers.
pub fn load_gltf(
    json: &str,
    bin_chunk: Option<&[u8]>,
    read_uri: impl Fn(&str) -> Result<Vec<u8>, String>,
) -> Result<SceneGraph, String> {
    let gltf: JsonValue = json.parse().map_err(|err| format!("invalid JSON: {err}"))?;
    let gltf: &JsonObject = gltf.get().ok_or("the document is not an object")?;

    let mut buffers = Vec::new();
    for (i, buffer) in optional_array(gltf, "buffers")?.iter().enumerate() {
        let buffer = object(buffer)?;
        let data = match buffer.get("uri") {
            Some(uri) => {
                let uri = string(uri)?;
                if uri.starts_with("data:") {
                    return Err("embedded data uris are not supported".to_string());
                }
                read_uri(uri)?
            }
            None if i == 0 => bin_chunk
                .ok_or("buffer 0 has no uri and there is no BIN chunk")?
                .to_vec(),
            None => return Err(format!("buffer {i} has no uri")),
        };
        let byte_length = take_usize(required(buffer, "byteLength")?)?;
        if data.len() < byte_length {
            return Err(format!(
                "buffer {i} is {} bytes, expected {byte_length}",
                data.len()
            ));
        }
        buffers.push(data);
    }

    let document = Document {
        buffers,
        buffer_views: optional_array(gltf, "bufferViews")?,
        accessors: optional_array(gltf, "accessors")?,
    };

    let mut meshes = Vec::new();
    let mut mesh_primitives = Vec::new();
    for (mesh_index, mesh) in optional_array(gltf, "meshes")?.iter().enumerate() {
        let mesh = object(mesh)?;
        let name = mesh.get("name").map(string).transpose()?;
        let mut primitive_indices = Vec::new();
        for primitive in array(mesh, "primitives")? {
            let primitive = object(primitive)?;
            let mode = primitive.get("mode").map(take_usize).transpose()?;
            if mode.unwrap_or(MODE_TRIANGLES) != MODE_TRIANGLES {
                log::warn!("skipping non-triangle primitive of mesh {mesh_index}");
                continue;
            }
            primitive_indices.push(meshes.len());
            meshes.push(document.load_primitive(primitive, name)?);
        }
        mesh_primitives.push(primitive_indices);
    }

    let nodes = optional_array(gltf, "nodes")?;
    let root_node_indices = match gltf.get("scenes") {
        Some(scenes) => {
            let scenes: &Vec<JsonValue> = scenes.get().ok_or("scenes is not an array")?;
            let scene = gltf.get("scene").map(take_usize).transpose()?.unwrap_or(0);
            let scene = object(scenes.get(scene).ok_or("the default scene does not exist")?)?;
            optional_array(scene, "nodes")?
                .iter()
                .map(take_usize)
                .collect::<Result<Vec<_>, _>>()?
        }
        None => {
            // Without scenes, every node that isn't somebody's child is a root.
            let mut is_child = vec![false; nodes.len()];
            for node in nodes {
                for child in optional_array(object(node)?, "children")? {
                    if let Some(flag) = is_child.get_mut(take_usize(child)?) {
                        *flag = true;
                    }
                }
            }
            (0..nodes.len()).filter(|&i| !is_child[i]).collect()
        }
    };
    let mut visiting = vec![false; nodes.len()];
    let children = root_node_indices
        .into_iter()
        .map(|i| load_node(nodes, &mesh_primitives, i, &mut visiting, 0))
        .collect::<Result<Vec<_>, _>>()?;

    let materials = load_materials(gltf)?;
    for mesh in &meshes {
        if let Some(material) = mesh.material {
            if material >= materials.len() {
                return Err(format!("material {material} does not exist"));
            }
        }
    }

    Ok(SceneGraph {
        root: SceneNode {
            name: None,
            meshes: Vec::new(),
            children,
        },
        meshes,
        materials,
    })
}

fn load_node(
    nodes: &[JsonValue],
    mesh_primitives: &[Vec<usize>],
    index: usize,
    visiting: &mut [bool],
    depth: usize,
) -> Result<SceneNode, String> {
    let node = object(nodes.get(index).ok_or_else(|| format!("node {index} does not exist"))?)?;
    if depth >= MAX_NODE_DEPTH {
        return Err(format!("node {index} is nested deeper than {MAX_NODE_DEPTH} levels"));
    }
    if visiting[index] {
        return Err(format!("node {index} is its own ancestor"));
    }
    visiting[index] = true;

    let meshes = match node.get("mesh").map(take_usize).transpose()? {
        Some(mesh) => mesh_primitives
            .get(mesh)
            .ok_or_else(|| format!("mesh {mesh} does not exist"))?
            .clone(),
        None => Vec::new(),
    };
    let children = optional_array(node, "children")?
        .iter()
        .map(|child| load_node(nodes, mesh_primitives, take_usize(child)?, visiting, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;

    visiting[index] = false;
    Ok(SceneNode {
        name: node.get("name").map(string).transpose()?.map(str::to_string),
        meshes,
        children,
    })
}

fn load_materials(gltf: &JsonObject) -> Result<Vec<RawMaterial>, String> {
    let textures = optional_array(gltf, "textures")?;
    let images = optional_array(gltf, "images")?;
    let texture_uri = |texture_info: &JsonValue| -> Result<Option<String>, String> {
        let index = take_usize(required(object(texture_info)?, "index")?)?;
        let texture = object(textures.get(index).ok_or_else(|| format!("texture {index} does not exist"))?)?;
        let Some(source) = texture.get("source") else {
            return Ok(None);
        };
        let source = take_usize(source)?;
        let image = object(images.get(source).ok_or_else(|| format!("image {source} does not exist"))?)?;
        match image.get("uri").map(string).transpose()? {
            Some(uri) if !uri.starts_with("data:") => Ok(Some(uri.to_string())),
            _ => {
                log::warn!("image {source} is embedded, only external image files are supported");
                Ok(None)
            }
        }
    };

    let mut materials = Vec::new();
    for material in optional_array(gltf, "materials")? {
        let material = object(material)?;
        let mut slots = Vec::new();
        if let Some(pbr) = material.get("pbrMetallicRoughness") {
            let pbr = object(pbr)?;
            slots.push((TextureKind::Diffuse, pbr.get("baseColorTexture")));
            slots.push((TextureKind::Specular, pbr.get("metallicRoughnessTexture")));
        }
        slots.push((TextureKind::Normal, material.get("normalTexture")));

        let mut textures = Vec::new();
        for (kind, texture_info) in slots {
            if let Some(uri) = texture_info.map(texture_uri).transpose()?.flatten() {
                textures.push((kind, uri));
            }
        }
        materials.push(RawMaterial { textures });
    }
    Ok(materials)
}

struct Document<'a> {
    buffers: Vec<Vec<u8>>,
    buffer_views: &'a [JsonValue],
    accessors: &'a [JsonValue],
}

/// Where an accessor's elements are, and how they're laid out.
struct AccessorView<'a> {
    data: &'a [u8],
    count: usize,
    components: usize,
    component_type: usize,
    normalized: bool,
    stride: usize,
}

impl AccessorView<'_> {
    fn component_size(&self) -> usize {
        match self.component_type {
            COMPONENT_U8 | 5120 => 1,
            COMPONENT_U16 | 5122 => 2,
            _ => 4,
        }
    }

    fn read_component(&self, element: usize, component: usize) -> &[u8] {
        let start = element * self.stride + component * self.component_size();
        &self.data[start..start + self.component_size()]
    }
}

impl Document<'_> {
    fn load_primitive(&self, primitive: &JsonObject, name: Option<&str>) -> Result<RawMesh, String> {
        let attributes = object(required(primitive, "attributes")?)?;
        let attribute = |semantic: &str| attributes.get(semantic).map(take_usize).transpose();

        let position = attribute("POSITION")?.ok_or("primitive has no POSITION attribute")?;
        let positions = self.read_vec3s(position)?;
        let vertex_count = positions.len();
        let check_length = |semantic: &str, len: usize| {
            if len == vertex_count {
                Ok(())
            } else {
                Err(format!("{semantic} has {len} elements, POSITION has {vertex_count}"))
            }
        };

        let normals = attribute("NORMAL")?.map(|i| self.read_vec3s(i)).transpose()?;
        let tex_coords = attribute("TEXCOORD_0")?
            .map(|i| self.read_floats(i, 2))
            .transpose()?
            .map(|values| values.chunks_exact(2).map(Vec2::from_slice).collect::<Vec<_>>());
        let tangents = attribute("TANGENT")?.map(|i| self.read_floats(i, 4)).transpose()?;
        if let Some(normals) = &normals {
            check_length("NORMAL", normals.len())?;
        }
        if let Some(tex_coords) = &tex_coords {
            check_length("TEXCOORD_0", tex_coords.len())?;
        }
        if let Some(tangents) = &tangents {
            check_length("TANGENT", tangents.len() / 4)?;
        }

        // glTF tangents are xyz + the handedness of the bitangent in w.
        let (tangents, bitangents) = match tangents {
            Some(values) => {
                let tangents = values.chunks_exact(4).map(Vec3::from_slice).collect::<Vec<_>>();
                let bitangents = normals.as_ref().map(|normals| {
                    normals
                        .iter()
                        .zip(values.chunks_exact(4))
                        .map(|(normal, t)| normal.cross(Vec3::from_slice(t)) * t[3])
                        .collect::<Vec<_>>()
                });
                (Some(tangents), bitangents)
            }
            None => (None, None),
        };

        let indices = match primitive.get("indices").map(take_usize).transpose()? {
            Some(accessor) => self.read_indices(accessor)?,
            None => (0..vertex_count as u32).collect(),
        };
        if indices.len() % 3 != 0 {
            return Err(format!("{} indices do not form whole triangles", indices.len()));
        }
        if let Some(index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(format!("index {index} is out of range of {vertex_count} vertices"));
        }

        Ok(RawMesh {
            name: name.map(str::to_string),
            positions,
            normals,
            tex_coords,
            tangents,
            bitangents,
            indices,
            material: primitive.get("material").map(take_usize).transpose()?,
        })
    }

    fn accessor_view(&self, index: usize) -> Result<Option<AccessorView<'_>>, String> {
        let accessor = object(self.accessors.get(index).ok_or_else(|| format!("accessor {index} does not exist"))?)?;
        if accessor.contains_key("sparse") {
            return Err(format!("accessor {index} is sparse, which is not supported"));
        }
        let count = take_usize(required(accessor, "count")?)?;
        let components = match string(required(accessor, "type")?)? {
            "SCALAR" => 1,
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" => 4,
            type_ => return Err(format!("unexpected accessor type \"{type_}\"")),
        };
        let component_type = take_usize(required(accessor, "componentType")?)?;
        let normalized = match accessor.get("normalized") {
            Some(value) => *value.get::<bool>().ok_or("normalized is not a boolean")?,
            None => false,
        };
        let Some(buffer_view) = accessor.get("bufferView") else {
            // Accessors without a buffer view are all zeros.
            if count > MAX_UNBACKED_ELEMENTS {
                return Err(format!("accessor {index} has too many elements ({count})"));
            }
            return Ok(None);
        };

        let buffer_view = take_usize(buffer_view)?;
        let view = object(self.buffer_views.get(buffer_view).ok_or_else(|| format!("buffer view {buffer_view} does not exist"))?)?;
        let buffer = take_usize(required(view, "buffer")?)?;
        let buffer = self.buffers.get(buffer).ok_or_else(|| format!("buffer {buffer} does not exist"))?;
        let view_offset = view.get("byteOffset").map(take_usize).transpose()?.unwrap_or(0);
        let view_length = take_usize(required(view, "byteLength")?)?;
        let view_data = view_offset
            .checked_add(view_length)
            .and_then(|end| buffer.get(view_offset..end))
            .ok_or_else(|| format!("buffer view {buffer_view} is out of bounds"))?;

        let mut accessor_view = AccessorView {
            data: &[],
            count,
            components,
            component_type,
            normalized,
            stride: 0,
        };
        let element_size = components * accessor_view.component_size();
        let stride = view.get("byteStride").map(take_usize).transpose()?.unwrap_or(element_size);
        if stride < element_size {
            return Err(format!(
                "buffer view {buffer_view} has a stride of {stride}, elements are {element_size} bytes"
            ));
        }
        let offset = accessor.get("byteOffset").map(take_usize).transpose()?.unwrap_or(0);
        let length = match count.checked_sub(1) {
            None => Some(0),
            Some(last) => last
                .checked_mul(stride)
                .and_then(|start| start.checked_add(element_size)),
        };
        accessor_view.data = length
            .and_then(|length| offset.checked_add(length))
            .and_then(|end| view_data.get(offset..end))
            .ok_or_else(|| format!("accessor {index} is out of bounds"))?;
        accessor_view.stride = stride;
        Ok(Some(accessor_view))
    }

    /// Reads a float accessor with `components` components per element into a
    /// flat list. Normalized integer components are converted to [0, 1].
    fn read_floats(&self, index: usize, components: usize) -> Result<Vec<f32>, String> {
        let Some(view) = self.accessor_view(index)? else {
            let count = take_usize(required(object(&self.accessors[index])?, "count")?)?;
            let length = count
                .checked_mul(components)
                .ok_or_else(|| format!("accessor {index} has too many elements ({count})"))?;
            return Ok(vec![0.0; length]);
        };
        if view.components != components {
            return Err(format!(
                "accessor {index} has {} components, expected {components}",
                view.components
            ));
        }
        let convert: fn(&[u8]) -> f32 = match (view.component_type, view.normalized) {
            (COMPONENT_F32, _) => |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            (COMPONENT_U8, true) => |b| b[0] as f32 / 255.0,
            (COMPONENT_U16, true) => |b| u16::from_le_bytes([b[0], b[1]]) as f32 / 65535.0,
            (type_, _) => return Err(format!("accessor {index} has unsupported component type {type_}")),
        };
        let mut values = Vec::with_capacity(view.count * components);
        for element in 0..view.count {
            for component in 0..components {
                values.push(convert(view.read_component(element, component)));
            }
        }
        Ok(values)
    }

    fn read_vec3s(&self, index: usize) -> Result<Vec<Vec3>, String> {
        let values = self.read_floats(index, 3)?;
        Ok(values.chunks_exact(3).map(Vec3::from_slice).collect())
    }

    fn read_indices(&self, index: usize) -> Result<Vec<u32>, String> {
        let Some(view) = self.accessor_view(index)? else {
            return Err(format!("index accessor {index} has no buffer view"));
        };
        if view.components != 1 {
            return Err(format!("index accessor {index} is not SCALAR"));
        }
        let convert: fn(&[u8]) -> u32 = match view.component_type {
            COMPONENT_U8 => |b| b[0] as u32,
            COMPONENT_U16 => |b| u16::from_le_bytes([b[0], b[1]]) as u32,
            COMPONENT_U32 => |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            type_ => return Err(format!("index accessor {index} has unsupported component type {type_}")),
        };
        Ok((0..view.count)
            .map(|element| convert(view.read_component(element, 0)))
            .collect())
    }
}

fn required<'a>(object: &'a JsonObject, key: &str) -> Result<&'a JsonValue, String> {
    object.get(key).ok_or_else(|| format!("missing required field \"{key}\""))
}

fn object(value: &JsonValue) -> Result<&JsonObject, String> {
    value.get().ok_or_else(|| "expected an object".to_string())
}

fn array<'a>(object: &'a JsonObject, key: &str) -> Result<&'a [JsonValue], String> {
    let value: &Vec<JsonValue> = required(object, key)?
        .get()
        .ok_or_else(|| format!("\"{key}\" is not an array"))?;
    Ok(value.as_slice())
}

fn optional_array<'a>(object: &'a JsonObject, key: &str) -> Result<&'a [JsonValue], String> {
    if object.contains_key(key) {
        array(object, key)
    } else {
        Ok(&[][..])
    }
}

fn string(value: &JsonValue) -> Result<&str, String> {
    value
        .get::<String>()
        .map(String::as_str)
        .ok_or_else(|| "expected a string".to_string())
}

/// Largest integer an f64 holds exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Return usize if JsonValue is a non-negative integer.
fn take_usize(value: &JsonValue) -> Result<usize, String> {
    let number: &f64 = value.get().ok_or("expected a number")?;
    if !(0.0..=MAX_EXACT_INTEGER).contains(number) || number.fract() != 0.0 {
        return Err(format!("expected an index, got {number}"));
    }
    Ok(*number as usize)
}
