//! The device seam between the scene runtime and a renderer.
//!
//! The scene graph uploads geometry through a [`RenderBackend`] and gets an
//! opaque [`GpuMeshId`] back; releasing that id is the only way device buffers
//! go away. [`crate::context::Context`] implements it on top of wgpu,
//! [`HeadlessBackend`] keeps books without a GPU so lifecycle rules can be
//! checked anywhere.

use std::collections::BTreeMap;

use crate::{error::BackendError, render::Frame, resources::mesh::MeshData};

/// Handle to the device buffers of one uploaded mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuMeshId(pub u64);

pub trait RenderBackend {
    /// Creates vertex, index and edge buffers for `mesh`.
    fn upload_mesh(&mut self, mesh: &MeshData) -> GpuMeshId;

    /// Destroys the buffers behind `id`.
    fn release_mesh(&mut self, id: GpuMeshId) -> Result<(), BackendError>;

    /// Number of meshes currently holding device buffers.
    fn live_meshes(&self) -> usize;

    /// Size of the output surface in pixels.
    fn viewport(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Issues one draw pass.
    fn draw(&mut self, frame: &Frame) -> Result<(), BackendError>;

    /// Lets go of the output surface. Later draws are skipped.
    fn release_surface(&mut self) -> Result<(), BackendError>;
}

/// What the headless backend saw in the last frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub items: usize,
    pub translucent_items: usize,
    pub edge_overlays: usize,
}

#[derive(Debug)]
struct HeadlessMesh {
    triangles: usize,
    edges: usize,
}

/// Bookkeeping backend without a device.
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u64,
    live: BTreeMap<GpuMeshId, HeadlessMesh>,
    uploads: usize,
    releases: usize,
    release_failures: usize,
    frames: u64,
    last_frame: Option<FrameStats>,
    size: (u32, u32),
    surface_attached: bool,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            next_id: 0,
            live: BTreeMap::new(),
            uploads: 0,
            releases: 0,
            release_failures: 0,
            frames: 0,
            last_frame: None,
            size: (width, height),
            surface_attached: true,
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    /// Releases of ids that were unknown or already released.
    pub fn release_failures(&self) -> usize {
        self.release_failures
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }

    pub fn surface_attached(&self) -> bool {
        self.surface_attached
    }

    /// Triangles currently held across all live meshes.
    pub fn live_triangles(&self) -> usize {
        self.live.values().map(|m| m.triangles).sum()
    }

    pub fn is_live(&self, id: GpuMeshId) -> bool {
        self.live.contains_key(&id)
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> GpuMeshId {
        self.next_id += 1;
        let id = GpuMeshId(self.next_id);
        self.live.insert(
            id,
            HeadlessMesh {
                triangles: mesh.triangle_count(),
                edges: mesh.edge_indices.len() / 2,
            },
        );
        self.uploads += 1;
        id
    }

    fn release_mesh(&mut self, id: GpuMeshId) -> Result<(), BackendError> {
        match self.live.remove(&id) {
            Some(_) => {
                self.releases += 1;
                Ok(())
            }
            None => {
                self.release_failures += 1;
                Err(BackendError::Surface(format!("{:?} is not live", id)))
            }
        }
    }

    fn live_meshes(&self) -> usize {
        self.live.len()
    }

    fn viewport(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
        }
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), BackendError> {
        if !self.surface_attached {
            return Err(BackendError::Surface("surface released".to_string()));
        }
        if let Some(stale) = frame.items.iter().find(|item| !self.live.contains_key(&item.gpu)) {
            return Err(BackendError::Surface(format!(
                "draw references released {:?}",
                stale.gpu
            )));
        }
        self.last_frame = Some(FrameStats {
            items: frame.items.len(),
            translucent_items: frame.items.iter().filter(|i| !i.material.is_opaque()).count(),
            edge_overlays: frame
                .items
                .iter()
                .filter(|i| i.edges.visible && self.live.get(&i.gpu).is_some_and(|m| m.edges > 0))
                .count(),
        });
        self.frames += 1;
        Ok(())
    }

    fn release_surface(&mut self) -> Result<(), BackendError> {
        if !self.surface_attached {
            return Err(BackendError::Surface("surface already detached".to_string()));
        }
        self.surface_attached = false;
        Ok(())
    }
}
