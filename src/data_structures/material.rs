//! Flat materials and the wireframe/x-ray view modes.
//!
//! Every mesh is drawn with a uniform, unlit [`FlatMaterial`]. Wireframe is an
//! [`EdgeOverlay`] drawn on top of the mesh rather than a rasterisation mode
//! of the base material. X-ray only touches opacity, blending and depth
//! writes. The two modes touch disjoint fields, so the order in which they
//! are applied never matters.

use crate::data_structures::scene_graph::{Mesh, MeshVisitor, SceneGraph};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlatMaterial {
    /// Linear RGB.
    pub colour: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    /// Meshes that don't write depth go through the translucent pipeline,
    /// which tests depth but never writes it.
    pub depth_write: bool,
}

impl FlatMaterial {
    pub fn new(colour: [f32; 3]) -> Self {
        Self {
            colour,
            opacity: 1.0,
            transparent: false,
            depth_write: true,
        }
    }

    /// Drawn in the opaque pass with depth writes.
    pub fn is_opaque(&self) -> bool {
        !self.transparent && self.depth_write
    }

    pub fn rgba(&self) -> [f32; 4] {
        [self.colour[0], self.colour[1], self.colour[2], self.opacity]
    }
}

/// Edge lines drawn over a mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeOverlay {
    pub visible: bool,
    /// Linear RGB.
    pub colour: [f32; 3],
}

impl Default for EdgeOverlay {
    fn default() -> Self {
        Self {
            visible: false,
            colour: [0.0, 0.0, 0.0],
        }
    }
}

/// Toggles the edge overlay of each visited mesh.
pub struct WireframeVisitor {
    pub visible: bool,
}

impl MeshVisitor for WireframeVisitor {
    fn visit(&mut self, mesh: &mut Mesh) {
        mesh.edges.visible = self.visible;
    }
}

/// Makes each visited mesh translucent without depth writes, or restores it.
pub struct XrayVisitor {
    pub enabled: bool,
    pub opacity: f32,
}

impl MeshVisitor for XrayVisitor {
    fn visit(&mut self, mesh: &mut Mesh) {
        let material = &mut mesh.material;
        if self.enabled {
            material.opacity = self.opacity;
            material.transparent = true;
            material.depth_write = false;
        } else {
            material.opacity = 1.0;
            material.transparent = false;
            material.depth_write = true;
        }
    }
}

/// The process-local view toggles set by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub wireframe_enabled: bool,
    pub xray_enabled: bool,
}

/**
 * Remembers the current toggles and applies them to every mesh in the graph.
 *
 * Each call walks the graph as it is at call time, so meshes swapped in
 * later are covered by calling [`reapply`](Self::reapply) after the swap.
 */
pub struct MaterialStateController {
    state: ViewState,
    xray_opacity: f32,
    edge_colour: [f32; 3],
}

impl MaterialStateController {
    pub fn new(xray_opacity: f32, edge_colour: [f32; 3]) -> Self {
        Self {
            state: ViewState::default(),
            xray_opacity,
            edge_colour,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn apply_wireframe(&mut self, scene: &mut SceneGraph, enabled: bool) {
        self.state.wireframe_enabled = enabled;
        let edge_colour = self.edge_colour;
        scene.visit_meshes_mut(&mut |mesh: &mut Mesh| mesh.edges.colour = edge_colour);
        scene.visit_meshes_mut(&mut WireframeVisitor { visible: enabled });
    }

    pub fn apply_xray(&mut self, scene: &mut SceneGraph, enabled: bool) {
        self.state.xray_enabled = enabled;
        scene.visit_meshes_mut(&mut XrayVisitor {
            enabled,
            opacity: self.xray_opacity,
        });
    }

    /// Re-applies both toggles, e.g. to freshly swapped in contents.
    pub fn reapply(&mut self, scene: &mut SceneGraph) {
        let ViewState {
            wireframe_enabled,
            xray_enabled,
        } = self.state;
        self.apply_wireframe(scene, wireframe_enabled);
        self.apply_xray(scene, xray_enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::{
            scene_graph::{Node, SceneContents},
            transform::Transform,
        },
        resources::mesh::cube,
    };

    fn graph() -> SceneGraph {
        let mut root = Node::new("root", Transform::new())
            .with_mesh(Mesh::new(cube("a", 1.0, 1.0), FlatMaterial::new([0.7; 3])));
        root.add_child(
            Node::new("child", Transform::new())
                .with_mesh(Mesh::new(cube("b", 1.0, 1.0), FlatMaterial::new([0.7; 3]))),
        );
        SceneGraph::new(SceneContents::asset("pair", root))
    }

    fn collect(scene: &mut SceneGraph) -> Vec<(FlatMaterial, EdgeOverlay)> {
        let mut out = Vec::new();
        scene.visit_meshes_mut(&mut |mesh: &mut Mesh| out.push((mesh.material, mesh.edges)));
        out
    }

    #[test]
    fn wireframe_is_idempotent_and_total() {
        let mut scene = graph();
        let mut controller = MaterialStateController::new(0.5, [0.0; 3]);
        controller.apply_wireframe(&mut scene, true);
        let once = collect(&mut scene);
        controller.apply_wireframe(&mut scene, true);
        let twice = collect(&mut scene);
        assert_eq!(once, twice);
        assert!(once.iter().all(|(_, edges)| edges.visible));
    }

    #[test]
    fn xray_round_trip_restores_exactly() {
        let mut scene = graph();
        let mut controller = MaterialStateController::new(0.5, [0.0; 3]);
        controller.apply_xray(&mut scene, true);
        for (material, _) in collect(&mut scene) {
            assert_eq!(material.opacity, 0.5);
            assert!(!material.depth_write);
            assert!(material.transparent);
        }
        controller.apply_xray(&mut scene, false);
        for (material, _) in collect(&mut scene) {
            assert_eq!(material.opacity, 1.0);
            assert!(material.depth_write);
            assert!(!material.transparent);
        }
    }

    #[test]
    fn modes_commute() {
        let mut a = graph();
        let mut b = graph();
        let mut ca = MaterialStateController::new(0.5, [0.0; 3]);
        let mut cb = MaterialStateController::new(0.5, [0.0; 3]);
        ca.apply_wireframe(&mut a, true);
        ca.apply_xray(&mut a, true);
        cb.apply_xray(&mut b, true);
        cb.apply_wireframe(&mut b, true);
        assert_eq!(collect(&mut a), collect(&mut b));
        assert_eq!(ca.state(), cb.state());
    }
}
