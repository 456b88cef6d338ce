//! Turning picks into annotations.

use crate::{
    backend::RenderBackend,
    data_structures::scene_graph::SceneGraph,
    lesson::{Annotation, Step},
    pick::PickHit,
    resources::marker_node,
};

/// Creates annotations and their markers.
///
/// The author only touches the in-memory step and the scene graph; storing
/// the annotation is up to whoever owns the lesson.
#[derive(Clone, Debug)]
pub struct AnnotationAuthor {
    placeholder_text: String,
    marker_radius: f32,
    marker_colour: [f32; 3],
}

impl AnnotationAuthor {
    pub fn new(placeholder_text: impl Into<String>, marker_radius: f32, marker_colour: [f32; 3]) -> Self {
        Self {
            placeholder_text: placeholder_text.into(),
            marker_radius,
            marker_colour,
        }
    }

    /**
     * Records `hit` as a new annotation on `step` and marks it in the scene.
     *
     * The position is copied out of the hit and never recomputed, so the
     * annotation stays where it was placed even if the step's model changes.
     */
    pub fn author(
        &self,
        hit: &PickHit,
        step: &mut Step,
        scene: &mut SceneGraph,
        backend: Option<&mut dyn RenderBackend>,
    ) -> Annotation {
        let annotation = Annotation {
            id: uuid::Uuid::new_v4().to_string(),
            position: hit.point.into(),
            text: self.placeholder_text.clone(),
            object_id: Some(hit.object_id.to_string()),
        };
        step.annotations.push(annotation.clone());
        self.place_marker(annotation.position, scene, backend);
        log::info!(
            "annotation {} created at {:?} on {}",
            annotation.id,
            annotation.position,
            hit.object_id
        );
        annotation
    }

    /// Shows a marker for an existing annotation.
    pub fn place_marker(
        &self,
        position: [f32; 3],
        scene: &mut SceneGraph,
        backend: Option<&mut dyn RenderBackend>,
    ) {
        let marker = marker_node(position, self.marker_radius, self.marker_colour);
        scene.insert_marker(marker, backend);
    }
}
