#![allow(dead_code)]

use serde_json::json;
use topo_stage::{
    Asset, HeadlessBackend, Stage, Step, ViewerConfig,
    resources::{decode::encode_payload, mesh::MeshData},
};

pub(crate) const VIEWPORT: (u32, u32) = (800, 600);
pub(crate) const CENTRE: (f32, f32) = (400.0, 300.0);

/// Wraps a JSON chunk and an optional BIN chunk into a GLB container.
pub(crate) fn glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let pad = |v: &mut Vec<u8>, byte: u8| {
        while v.len() % 4 != 0 {
            v.push(byte);
        }
    };
    let mut json = json.to_vec();
    pad(&mut json, b' ');
    let mut bin = bin.to_vec();
    pad(&mut bin, 0);
    let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total = 12 + 8 + json.len() + bin_chunk;
    let mut out = Vec::new();
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
    }
    out
}

/// A bundle with an empty root node holding one child that carries `mesh`.
pub(crate) fn bundle_from_mesh(mesh: &MeshData, child_offset: [f32; 3]) -> Vec<u8> {
    let mut bin = Vec::new();
    for p in &mesh.positions {
        for c in p {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    let positions_len = bin.len();
    for i in &mesh.indices {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    let indices_len = bin.len() - positions_len;

    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in &mesh.positions {
        for k in 0..3 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }

    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "root", "children": [1] },
            { "name": mesh.name, "mesh": 0, "translation": child_offset }
        ],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": 5126,
                "count": mesh.positions.len(),
                "type": "VEC3",
                "min": min,
                "max": max
            },
            {
                "bufferView": 1,
                "componentType": 5125,
                "count": mesh.indices.len(),
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": positions_len, "target": 34962 },
            { "buffer": 0, "byteOffset": positions_len, "byteLength": indices_len, "target": 34963 }
        ],
        "buffers": [{ "byteLength": bin.len() }]
    });
    glb(document.to_string().as_bytes(), &bin)
}

pub(crate) fn asset(name: &str, bytes: &[u8]) -> Asset {
    Asset {
        name: name.to_string(),
        payload: encode_payload("model/gltf-binary", bytes),
        kind: "model/gltf-binary".to_string(),
    }
}

/// A unit cube at the origin, packaged as an asset.
pub(crate) fn cube_asset(name: &str) -> Asset {
    let mesh = topo_stage::resources::mesh::cube(name, 1.0, 1.0);
    asset(name, &bundle_from_mesh(&mesh, [0.0; 3]))
}

pub(crate) fn step_with(asset: Option<Asset>) -> Step {
    Step {
        title: None,
        description: "step".to_string(),
        asset,
        annotations: Vec::new(),
    }
}

pub(crate) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("Failed to build a runtime for the import workers.")
}

/// A stage with a headless backend already mounted at [`VIEWPORT`].
pub(crate) fn mounted_stage(runtime: &tokio::runtime::Runtime) -> Stage<HeadlessBackend> {
    let mut stage = Stage::new(&ViewerConfig::default(), runtime.handle().clone());
    stage.mount(HeadlessBackend::new(VIEWPORT.0, VIEWPORT.1));
    stage
}

pub(crate) fn live_meshes(stage: &Stage<HeadlessBackend>) -> usize {
    use topo_stage::RenderBackend;
    stage.backend().map(|b| b.live_meshes()).unwrap_or(0)
}
