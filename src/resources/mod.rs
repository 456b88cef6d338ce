use crate::{
    data_structures::{
        material::FlatMaterial,
        scene_graph::{Mesh, Node},
        transform::Transform,
    },
    error::{AssetError, ImportError},
    lesson::Asset,
    resources::{decode::decode_payload, mesh::MeshData},
};

/**
 * This module contains all logic for turning asset payloads into scene nodes.
 */
pub mod decode;
pub mod mesh;

/// Nesting limit for node hierarchies; deeper bundles are rejected.
pub const MAX_NODE_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct ImportOptions {
    /// Linear RGB every imported mesh is drawn with.
    pub surface_colour: [f32; 3],
    pub edge_threshold_degrees: f32,
}

/// Decodes and imports the asset of a lesson step.
pub fn load_asset(asset: &Asset, options: &ImportOptions) -> Result<Node, AssetError> {
    let bytes = decode_payload(&asset.payload)?;
    let mut root = import_mesh_bundle(&bytes, options)?;
    if root.name.is_empty() {
        root.name = asset.name.clone();
    }
    Ok(root)
}

/**
 * Parses a binary glTF bundle into a node hierarchy.
 *
 * Only triangle geometry is kept. Every mesh gets a fresh flat material in
 * `options.surface_colour`; vertex colours, textures and source materials
 * are discarded.
 */
pub fn import_mesh_bundle(bytes: &[u8], options: &ImportOptions) -> Result<Node, ImportError> {
    let gltf = gltf::Gltf::from_slice(bytes)?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .as_deref()
                .map(<[u8]>::to_vec)
                .ok_or(ImportError::MissingBuffer(buffer.index()))?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                decode_payload(uri).map_err(ImportError::EmbeddedBuffer)?
            }
            gltf::buffer::Source::Uri(uri) => {
                return Err(ImportError::ExternalBuffer(uri.to_string()));
            }
        };
        if data.len() < buffer.length() {
            return Err(ImportError::MissingBuffer(buffer.index()));
        }
        buffer_data.push(data);
    }

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or(ImportError::NoScene)?;

    let importer = BundleImporter {
        buffers: &buffer_data,
        options,
    };
    let mut roots = Vec::new();
    for node in scene.nodes() {
        roots.push(importer.to_node(node, 0)?);
    }

    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut container = Node::new(scene.name().unwrap_or_default(), Transform::new());
        for node in roots {
            container.add_child(node);
        }
        container
    };

    if root.mesh_count() == 0 {
        return Err(ImportError::NoMeshes);
    }
    log::debug!(
        "imported mesh bundle: {} buffers, {} meshes",
        buffer_data.len(),
        root.mesh_count()
    );
    Ok(root)
}

struct BundleImporter<'a> {
    buffers: &'a [Vec<u8>],
    options: &'a ImportOptions,
}

impl BundleImporter<'_> {
    fn to_node(&self, node: gltf::scene::Node, depth: usize) -> Result<Node, ImportError> {
        if depth >= MAX_NODE_DEPTH {
            return Err(ImportError::TooDeep(MAX_NODE_DEPTH));
        }
        let (translation, rotation, scale) = node.transform().decomposed();
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node-{}", node.index()));
        let mut scene_node = Node::new(name, Transform::from_decomposed(translation, rotation, scale));

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if let Some(data) = self.to_mesh_data(&mesh, &primitive) {
                    scene_node.add_mesh(Mesh::new(
                        data,
                        FlatMaterial::new(self.options.surface_colour),
                    ));
                }
            }
        }

        for child in node.children() {
            scene_node.add_child(self.to_node(child, depth + 1)?);
        }
        Ok(scene_node)
    }

    fn to_mesh_data(
        &self,
        mesh: &gltf::Mesh,
        primitive: &gltf::Primitive,
    ) -> Option<MeshData> {
        let name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh-{}", mesh.index()));
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "skipping {:?} primitive {} of {}",
                primitive.mode(),
                primitive.index(),
                name
            );
            return None;
        }

        let reader = primitive.reader(|buffer| self.buffers.get(buffer.index()).map(Vec::as_slice));
        let positions: Vec<[f32; 3]> = match reader.read_positions() {
            Some(positions) => positions.collect(),
            None => {
                log::warn!("primitive {} of {} has no positions", primitive.index(), name);
                return None;
            }
        };

        if reader.read_colors(0).is_some() {
            log::debug!("discarding vertex colours of {}", name);
        }
        if primitive.material().pbr_metallic_roughness().base_color_texture().is_some() {
            log::debug!("discarding base colour texture of {}", name);
        }

        let vertex_count = positions.len() as u32;
        let raw: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertex_count).collect(),
        };
        let mut indices = Vec::with_capacity(raw.len());
        let mut dropped = 0;
        for tri in raw.chunks_exact(3) {
            if tri.iter().all(|&i| i < vertex_count) {
                indices.extend_from_slice(tri);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!("{} has {} triangles with out of range indices", name, dropped);
        }
        if indices.is_empty() {
            return None;
        }

        Some(MeshData::new(
            name,
            positions,
            indices,
            self.options.edge_threshold_degrees,
        ))
    }
}

/// The unit box shown when a step has no usable asset.
pub fn placeholder_node(colour: [f32; 3], edge_threshold_degrees: f32) -> Node {
    Node::new("placeholder", Transform::new()).with_mesh(Mesh::new(
        mesh::cube("placeholder", 1.0, edge_threshold_degrees),
        FlatMaterial::new(colour),
    ))
}

/// A small sphere marking an annotation at `position`.
pub fn marker_node(position: [f32; 3], radius: f32, colour: [f32; 3]) -> Node {
    Node::new("annotation-marker", Transform::from_translation(position.into()))
        .with_mesh(Mesh::new(
            mesh::sphere("annotation-marker", radius, 16, 12),
            FlatMaterial::new(colour),
        ))
}
