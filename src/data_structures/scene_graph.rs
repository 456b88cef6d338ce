//! Scene graph and the single swap point for displayed contents.
//!
//! The graph holds exactly one displayed hierarchy: either the nodes decoded
//! from the current step's asset or the placeholder primitive. Annotation
//! markers hang off the root next to it and live until the next swap.
//!
//! Every device resource behind a mesh is owned by the graph. [`SceneGraph::swap`]
//! and [`SceneGraph::dispose`] are the only places they are released, and both
//! release each resource exactly once.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    backend::{GpuMeshId, RenderBackend},
    data_structures::{
        material::{EdgeOverlay, FlatMaterial},
        transform::Transform,
    },
    pick::{MeshSnapshot, PickTarget},
    render::DrawItem,
    resources::mesh::MeshData,
};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a mesh for picking and annotation references.
///
/// Ids are process-unique and never reused, so a reference taken before a
/// swap can't alias a mesh attached after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object-{}", self.0)
    }
}

/// A drawable mesh: shared CPU geometry, material state and its device handle.
#[derive(Debug)]
pub struct Mesh {
    id: ObjectId,
    pub data: Arc<MeshData>,
    pub material: FlatMaterial,
    pub edges: EdgeOverlay,
    gpu: Option<GpuMeshId>,
}

impl Mesh {
    pub fn new(data: MeshData, material: FlatMaterial) -> Self {
        Self {
            id: ObjectId::fresh(),
            data: Arc::new(data),
            material,
            edges: EdgeOverlay::default(),
            gpu: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn gpu(&self) -> Option<GpuMeshId> {
        self.gpu
    }

    fn upload(&mut self, backend: &mut dyn RenderBackend) -> bool {
        if self.gpu.is_some() {
            return false;
        }
        self.gpu = Some(backend.upload_mesh(&self.data));
        true
    }

    /// Releases the device buffers. A second call is a no-op.
    fn release(&mut self, backend: &mut dyn RenderBackend) -> bool {
        match self.gpu.take() {
            Some(id) => {
                if let Err(e) = backend.release_mesh(id) {
                    log::warn!("releasing {:?} of mesh {} failed: {}", id, self.id, e);
                }
                true
            }
            None => false,
        }
    }
}

/// Visits every mesh of a hierarchy. Used for cross-cutting material changes.
pub trait MeshVisitor {
    fn visit(&mut self, mesh: &mut Mesh);
}

impl<F: FnMut(&mut Mesh)> MeshVisitor for F {
    fn visit(&mut self, mesh: &mut Mesh) {
        self(mesh)
    }
}

/// A transformable node holding zero or more meshes and child nodes.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub local: Transform,
    meshes: Vec<Mesh>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, local: Transform) -> Self {
        Self {
            name: name.into(),
            local,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Number of meshes in this node and all descendants.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(Node::mesh_count).sum::<usize>()
    }

    pub fn visit_meshes_mut(&mut self, visitor: &mut dyn MeshVisitor) {
        for mesh in self.meshes.iter_mut() {
            visitor.visit(mesh);
        }
        for child in self.children.iter_mut() {
            child.visit_meshes_mut(visitor);
        }
    }

    /// Calls `f` with every mesh and its world matrix, parents first.
    pub fn walk(&self, parent_world: Matrix4<f32>, f: &mut dyn FnMut(&Mesh, Matrix4<f32>)) {
        let world = parent_world * self.local.to_matrix();
        for mesh in &self.meshes {
            f(mesh, world);
        }
        for child in &self.children {
            child.walk(world, f);
        }
    }

    fn upload(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let mut uploaded = 0;
        self.visit_meshes_mut(&mut |mesh: &mut Mesh| {
            if mesh.upload(&mut *backend) {
                uploaded += 1;
            }
        });
        uploaded
    }

    fn release(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let mut released = 0;
        self.visit_meshes_mut(&mut |mesh: &mut Mesh| {
            if mesh.release(&mut *backend) {
                released += 1;
            }
        });
        released
    }
}

/// What the displayed hierarchy came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentKind {
    Placeholder,
    Asset { name: String },
}

/// A complete hierarchy ready to be swapped in.
#[derive(Debug)]
pub struct SceneContents {
    pub kind: ContentKind,
    pub root: Node,
}

impl SceneContents {
    pub fn asset(name: impl Into<String>, root: Node) -> Self {
        Self {
            kind: ContentKind::Asset { name: name.into() },
            root,
        }
    }

    pub fn placeholder(root: Node) -> Self {
        Self {
            kind: ContentKind::Placeholder,
            root,
        }
    }
}

/// Counts reported by a swap, mostly for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapReport {
    pub released: usize,
    pub attached: usize,
    pub uploaded: usize,
}

pub struct SceneGraph {
    contents: SceneContents,
    markers: Vec<Node>,
    generation: u64,
}

impl SceneGraph {
    pub fn new(initial: SceneContents) -> Self {
        Self {
            contents: initial,
            markers: Vec::new(),
            generation: 0,
        }
    }

    /**
     * Replaces the displayed hierarchy.
     *
     * Device resources of the old contents and of all markers are released
     * before the new contents are uploaded. Without a backend (unmounted)
     * there is nothing on the device; uploads happen on the next mount.
     */
    pub fn swap(
        &mut self,
        contents: SceneContents,
        mut backend: Option<&mut dyn RenderBackend>,
    ) -> SwapReport {
        let mut old = std::mem::replace(&mut self.contents, contents);
        let old_markers = std::mem::take(&mut self.markers);

        let mut report = SwapReport::default();
        if let Some(backend) = backend.as_deref_mut() {
            report.released += old.root.release(backend);
            for mut marker in old_markers {
                report.released += marker.release(backend);
            }
            report.uploaded = self.contents.root.upload(backend);
        }
        drop(old);

        report.attached = self.contents.root.mesh_count();
        self.generation += 1;
        log::debug!(
            "swapped in {:?}: released {} meshes, attached {}",
            self.contents.kind,
            report.released,
            report.attached
        );
        report
    }

    /// Hangs a marker off the root until the next swap.
    pub fn insert_marker(&mut self, mut marker: Node, backend: Option<&mut dyn RenderBackend>) {
        if let Some(backend) = backend {
            marker.upload(backend);
        }
        self.markers.push(marker);
    }

    /// Uploads every mesh that has no device resources yet.
    pub fn upload(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let mut uploaded = self.contents.root.upload(backend);
        for marker in self.markers.iter_mut() {
            uploaded += marker.upload(backend);
        }
        uploaded
    }

    /// Releases all device resources while keeping the CPU-side tree.
    ///
    /// Idempotent: meshes already released are skipped.
    pub fn dispose(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let mut released = self.contents.root.release(backend);
        for marker in self.markers.iter_mut() {
            released += marker.release(backend);
        }
        released
    }

    /// Visits every mesh currently present, markers included.
    pub fn visit_meshes_mut(&mut self, visitor: &mut dyn MeshVisitor) {
        self.contents.root.visit_meshes_mut(visitor);
        for marker in self.markers.iter_mut() {
            marker.visit_meshes_mut(visitor);
        }
    }

    /// Pickable meshes with their world matrices, frozen at call time.
    ///
    /// Markers are not pickable.
    pub fn snapshot(&self) -> MeshSnapshot {
        let mut targets = Vec::new();
        self.contents
            .root
            .walk(Matrix4::identity(), &mut |mesh, world| {
                targets.push(PickTarget {
                    object_id: mesh.id(),
                    world,
                    data: Arc::clone(&mesh.data),
                });
            });
        MeshSnapshot {
            generation: self.generation,
            targets,
        }
    }

    /// Everything with device resources, in draw order.
    pub fn draw_list(&self) -> Vec<DrawItem> {
        let mut items = Vec::new();
        let mut push = |mesh: &Mesh, world: Matrix4<f32>| {
            if let Some(gpu) = mesh.gpu() {
                items.push(DrawItem {
                    gpu,
                    world: world.into(),
                    material: mesh.material,
                    edges: mesh.edges,
                });
            }
        };
        self.contents.root.walk(Matrix4::identity(), &mut push);
        for marker in &self.markers {
            marker.walk(Matrix4::identity(), &mut push);
        }
        items
    }

    pub fn kind(&self) -> &ContentKind {
        &self.contents.kind
    }

    pub fn root(&self) -> &Node {
        &self.contents.root
    }

    pub fn markers(&self) -> &[Node] {
        &self.markers
    }

    /// Meshes of the displayed hierarchy, markers excluded.
    pub fn mesh_count(&self) -> usize {
        self.contents.root.mesh_count()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::HeadlessBackend, resources::mesh::cube};

    fn cube_node(name: &str) -> Node {
        Node::new(name, Transform::new())
            .with_mesh(Mesh::new(cube(name, 1.0, 1.0), FlatMaterial::new([1.0; 3])))
    }

    fn two_mesh_asset() -> SceneContents {
        let mut root = cube_node("a");
        root.add_child(cube_node("b"));
        SceneContents::asset("pair", root)
    }

    #[test]
    fn swap_releases_everything_before_attaching() {
        let mut backend = HeadlessBackend::new(640, 480);
        let mut graph = SceneGraph::new(SceneContents::placeholder(cube_node("placeholder")));
        graph.upload(&mut backend);
        assert_eq!(backend.live_meshes(), 1);

        let report = graph.swap(two_mesh_asset(), Some(&mut backend));
        assert_eq!(report.released, 1);
        assert_eq!(report.attached, 2);
        assert_eq!(backend.live_meshes(), 2);
        assert_eq!(graph.kind(), &ContentKind::Asset { name: "pair".into() });
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut backend = HeadlessBackend::new(640, 480);
        let mut graph = SceneGraph::new(two_mesh_asset());
        graph.upload(&mut backend);
        assert_eq!(graph.dispose(&mut backend), 2);
        assert_eq!(graph.dispose(&mut backend), 0);
        assert_eq!(backend.live_meshes(), 0);
        assert_eq!(backend.release_failures(), 0);
    }

    #[test]
    fn markers_do_not_survive_a_swap() {
        let mut backend = HeadlessBackend::new(640, 480);
        let mut graph = SceneGraph::new(SceneContents::placeholder(cube_node("placeholder")));
        graph.upload(&mut backend);
        graph.insert_marker(cube_node("marker"), Some(&mut backend));
        assert_eq!(backend.live_meshes(), 2);

        graph.swap(two_mesh_asset(), Some(&mut backend));
        assert!(graph.markers().is_empty());
        assert_eq!(backend.live_meshes(), 2);
    }

    #[test]
    fn snapshot_outlives_swap() {
        let mut graph = SceneGraph::new(two_mesh_asset());
        let snapshot = graph.snapshot();
        graph.swap(SceneContents::placeholder(cube_node("placeholder")), None);
        assert_eq!(snapshot.targets.len(), 2);
        assert_ne!(snapshot.generation, graph.generation());
    }

    #[test]
    fn world_matrices_compose_parent_first() {
        let mut root = Node::new("root", Transform::from_translation([1.0, 0.0, 0.0].into()));
        root.add_child(
            Node::new("child", Transform::from_translation([0.0, 2.0, 0.0].into()))
                .with_mesh(Mesh::new(cube("c", 1.0, 1.0), FlatMaterial::new([1.0; 3]))),
        );
        let graph = SceneGraph::new(SceneContents::asset("nested", root));
        let snapshot = graph.snapshot();
        let world = snapshot.targets[0].world;
        assert_eq!(world.w.x, 1.0);
        assert_eq!(world.w.y, 2.0);
    }

    #[test]
    fn draw_list_skips_meshes_without_device_resources() {
        let graph = SceneGraph::new(two_mesh_asset());
        assert!(graph.draw_list().is_empty());
    }
}
