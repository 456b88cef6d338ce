use std::collections::{BTreeMap, HashMap};

use cgmath::{InnerSpace, Vector3};

/**
 * CPU-side geometry of one drawable mesh.
 *
 * Only positions and triangle indices survive import; colour and texture
 * channels are dropped before a `MeshData` is built. `edge_indices` holds
 * pairs of vertex indices forming the edge-line overlay.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub edge_indices: Vec<u32>,
}

impl MeshData {
    pub fn new(
        name: impl Into<String>,
        positions: Vec<[f32; 3]>,
        indices: Vec<u32>,
        edge_threshold_degrees: f32,
    ) -> Self {
        let edge_indices = feature_edges(&positions, &indices, edge_threshold_degrees);
        Self {
            name: name.into(),
            positions,
            indices,
            edge_indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterates triangles as corner positions, skipping out-of-range indices.
    pub fn triangles(&self) -> impl Iterator<Item = [Vector3<f32>; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|c| {
            let a = self.positions.get(c[0] as usize)?;
            let b = self.positions.get(c[1] as usize)?;
            let c = self.positions.get(c[2] as usize)?;
            Some([(*a).into(), (*b).into(), (*c).into()])
        })
    }
}

/// Axis aligned cube centred on the origin, 8 vertices and 12 triangles.
pub fn cube(name: &str, size: f32, edge_threshold_degrees: f32) -> MeshData {
    let h = size * 0.5;
    let positions = vec![
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];
    #[rustfmt::skip]
    let indices = vec![
        4, 5, 6, 4, 6, 7, // +z
        1, 0, 3, 1, 3, 2, // -z
        1, 2, 6, 1, 6, 5, // +x
        0, 4, 7, 0, 7, 3, // -x
        3, 7, 6, 3, 6, 2, // +y
        0, 1, 5, 0, 5, 4, // -y
    ];
    MeshData::new(name, positions, indices, edge_threshold_degrees)
}

/// UV sphere centred on the origin with outward facing triangles.
pub fn sphere(name: &str, radius: f32, segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut positions = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for r in 0..=rings {
        let theta = r as f32 * std::f32::consts::PI / rings as f32;
        for s in 0..=segments {
            let phi = s as f32 * std::f32::consts::TAU / segments as f32;
            positions.push([
                radius * theta.sin() * phi.cos(),
                radius * theta.cos(),
                radius * theta.sin() * phi.sin(),
            ]);
        }
    }
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for r in 0..rings {
        for s in 0..segments {
            let a = r * (segments + 1) + s;
            let b = a + segments + 1;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    // Edge overlay on a smooth marker is noise.
    MeshData {
        name: name.to_string(),
        positions,
        indices,
        edge_indices: Vec::new(),
    }
}

/// Line-only square grid on the XZ plane, `size` wide with `divisions` cells
/// per side. It has no triangles.
pub fn grid(name: &str, size: f32, divisions: u32) -> MeshData {
    let divisions = divisions.max(1);
    let half = size * 0.5;
    let step = size / divisions as f32;
    let mut positions = Vec::with_capacity(((divisions + 1) * 4) as usize);
    let mut edge_indices = Vec::with_capacity(((divisions + 1) * 4) as usize);
    for i in 0..=divisions {
        let offset = -half + i as f32 * step;
        for line in [
            [[offset, 0.0, -half], [offset, 0.0, half]],
            [[-half, 0.0, offset], [half, 0.0, offset]],
        ] {
            edge_indices.push(positions.len() as u32);
            positions.push(line[0]);
            edge_indices.push(positions.len() as u32);
            positions.push(line[1]);
        }
    }
    MeshData {
        name: name.to_string(),
        positions,
        indices: Vec::new(),
        edge_indices,
    }
}

/**
 * Extracts the lines drawn by the edge overlay.
 *
 * An edge is kept when the normals of its two adjacent triangles differ by
 * more than `threshold_degrees`, or when only one triangle uses it. Vertices
 * are welded by position first so split normals/uvs don't create fake
 * boundaries.
 */
pub fn feature_edges(positions: &[[f32; 3]], indices: &[u32], threshold_degrees: f32) -> Vec<u32> {
    let threshold_dot = threshold_degrees.to_radians().cos();
    let quantize = |p: &[f32; 3]| {
        let q = |v: f32| (v * 1e4).round() as i64;
        (q(p[0]), q(p[1]), q(p[2]))
    };

    let mut welded: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let canonical: Vec<u32> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| *welded.entry(quantize(p)).or_insert(i as u32))
        .collect();

    // Edge -> (normal of first triangle, original endpoints)
    let mut open: BTreeMap<(u32, u32), (Vector3<f32>, [u32; 2])> = BTreeMap::new();
    let mut edges = Vec::new();

    for tri in indices.chunks_exact(3) {
        if tri.iter().any(|&i| i as usize >= positions.len()) {
            continue;
        }
        let [a, b, c]: [Vector3<f32>; 3] = [
            positions[tri[0] as usize].into(),
            positions[tri[1] as usize].into(),
            positions[tri[2] as usize].into(),
        ];
        let normal = (b - a).cross(c - a);
        if normal.magnitude2() <= f32::EPSILON {
            continue;
        }
        let normal = normal.normalize();
        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            let (ci, cj) = (canonical[tri[i] as usize], canonical[tri[j] as usize]);
            let key = (ci.min(cj), ci.max(cj));
            match open.remove(&key) {
                Some((other, ends)) => {
                    if normal.dot(other) <= threshold_dot {
                        edges.extend_from_slice(&ends);
                    }
                }
                None => {
                    open.insert(key, (normal, [tri[i], tri[j]]));
                }
            }
        }
    }
    // Unpaired edges sit on a boundary.
    edges.extend(open.into_values().flat_map(|(_, ends)| ends));
    edges
}
