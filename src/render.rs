//! Frame composition and the per-frame scheduler.
//!
//! [`RenderLoop`] is an explicit start/stop scheduler. The host calls
//! [`RenderLoop::tick`] once per display refresh; a stopped loop ignores
//! ticks, so teardown only has to stop the loop before the surface goes.
//!
//! Each tick advances camera damping and then issues one draw pass over a
//! [`Frame`] built from what the scene graph holds at that moment. Opaque
//! items are drawn first, translucent ones after them, farthest first.

use std::cmp::Ordering;

use cgmath::{InnerSpace, Vector3};
use instant::{Duration, Instant};

use crate::{
    backend::{GpuMeshId, RenderBackend},
    camera::CameraRig,
    data_structures::{
        material::{EdgeOverlay, FlatMaterial},
        scene_graph::SceneGraph,
    },
    error::BackendError,
};

/// One mesh to draw with its world matrix and current material state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub gpu: GpuMeshId,
    pub world: [[f32; 4]; 4],
    pub material: FlatMaterial,
    pub edges: EdgeOverlay,
}

impl DrawItem {
    fn origin(&self) -> Vector3<f32> {
        Vector3::new(self.world[3][0], self.world[3][1], self.world[3][2])
    }
}

/// Everything a backend needs for one draw pass.
#[derive(Clone, Debug)]
pub struct Frame {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 3],
    /// Linear RGB.
    pub clear_colour: [f32; 3],
    pub items: Vec<DrawItem>,
}

impl Frame {
    pub fn compose(camera: &CameraRig, scene: &SceneGraph, clear_colour: [f32; 3]) -> Self {
        let eye = camera.position();
        let (mut items, mut translucent): (Vec<DrawItem>, Vec<DrawItem>) = scene
            .draw_list()
            .into_iter()
            .partition(|item| item.material.is_opaque());
        translucent.sort_by(|a, b| {
            let da = (a.origin() - eye).magnitude2();
            let db = (b.origin() - eye).magnitude2();
            db.partial_cmp(&da).unwrap_or(Ordering::Equal)
        });
        items.append(&mut translucent);

        Self {
            view_proj: camera.uniform().view_proj,
            eye: eye.into(),
            clear_colour,
            items,
        }
    }

    /// Items drawn with depth writes, in draw order.
    pub fn opaque(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|item| item.material.is_opaque())
    }

    /// Blended or depth-read-only items, farthest first.
    pub fn translucent(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|item| !item.material.is_opaque())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop is stopped; nothing was touched.
    Idle,
    Drawn { items: usize },
}

#[derive(Debug)]
pub struct RenderLoop {
    clear_colour: [f32; 3],
    running: bool,
    last_tick: Option<Instant>,
    frames: u64,
}

impl RenderLoop {
    pub fn new(clear_colour: [f32; 3]) -> Self {
        Self {
            clear_colour,
            running: false,
            last_tick: None,
            frames: 0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            log::debug!("render loop started");
        }
        self.running = true;
        self.last_tick = None;
    }

    /// Cancels scheduling. Ticks after this are no-ops until the next start.
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("render loop stopped after {} frames", self.frames);
        }
        self.running = false;
        self.last_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tick(
        &mut self,
        now: Instant,
        camera: &mut CameraRig,
        scene: &SceneGraph,
        backend: &mut dyn RenderBackend,
    ) -> Result<TickOutcome, BackendError> {
        if !self.running {
            return Ok(TickOutcome::Idle);
        }
        let dt = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_tick = Some(now);

        camera.update(dt);
        let frame = Frame::compose(camera, scene, self.clear_colour);
        backend.draw(&frame)?;
        self.frames += 1;
        Ok(TickOutcome::Drawn {
            items: frame.items.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::HeadlessBackend,
        config::ViewerConfig,
        data_structures::{
            material::MaterialStateController,
            scene_graph::{Mesh, Node, SceneContents},
            transform::Transform,
        },
        resources::mesh::cube,
    };

    fn scene(backend: &mut HeadlessBackend) -> SceneGraph {
        let mut root = Node::new("root", Transform::new())
            .with_mesh(Mesh::new(cube("near", 1.0, 1.0), FlatMaterial::new([1.0; 3])));
        root.add_child(
            Node::new("far", Transform::from_translation([0.0, 0.0, -5.0].into()))
                .with_mesh(Mesh::new(cube("far", 1.0, 1.0), FlatMaterial::new([1.0; 3]))),
        );
        let mut graph = SceneGraph::new(SceneContents::asset("two", root));
        graph.upload(backend);
        graph
    }

    #[test]
    fn meshes_without_depth_writes_skip_the_opaque_pass() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut graph = scene(&mut backend);
        graph.visit_meshes_mut(&mut |mesh: &mut Mesh| {
            if mesh.name() == "far" {
                mesh.material.depth_write = false;
            }
        });
        let camera = CameraRig::new(&ViewerConfig::default());

        let frame = Frame::compose(&camera, &graph, [0.0; 3]);
        assert_eq!(frame.opaque().count(), 1);
        assert_eq!(frame.translucent().count(), 1);
        assert_eq!(frame.items[1].world[3][2], -5.0);
    }

    #[test]
    fn stopped_loop_does_not_draw() {
        let mut backend = HeadlessBackend::new(64, 64);
        let graph = scene(&mut backend);
        let mut camera = CameraRig::new(&ViewerConfig::default());
        let mut render_loop = RenderLoop::new([0.0; 3]);

        let outcome = render_loop
            .tick(Instant::now(), &mut camera, &graph, &mut backend)
            .unwrap();
        assert_eq!(outcome, TickOutcome::Idle);

        render_loop.start();
        let outcome = render_loop
            .tick(Instant::now(), &mut camera, &graph, &mut backend)
            .unwrap();
        assert_eq!(outcome, TickOutcome::Drawn { items: 2 });

        render_loop.stop();
        render_loop
            .tick(Instant::now(), &mut camera, &graph, &mut backend)
            .unwrap();
        assert_eq!(backend.frames(), 1);
        assert_eq!(render_loop.frames(), 1);
    }

    #[test]
    fn translucent_items_come_last_far_to_near() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut graph = scene(&mut backend);
        MaterialStateController::new(0.5, [0.0; 3]).apply_xray(&mut graph, true);
        let camera = CameraRig::new(&ViewerConfig::default());

        let frame = Frame::compose(&camera, &graph, [0.0; 3]);
        assert_eq!(frame.opaque().count(), 0);
        assert_eq!(frame.translucent().count(), 2);
        assert_eq!(frame.items[0].world[3][2], -5.0);
    }
}
