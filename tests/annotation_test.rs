mod common;

use std::{cell::RefCell, rc::Rc};

use common::test_utils::{CENTRE, cube_asset, mounted_stage, runtime, step_with};
use instant::{Duration, Instant};
use topo_stage::{Annotation, data_structures::scene_graph::ContentKind};

fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
    for k in 0..3 {
        assert!(
            (actual[k] - expected[k]).abs() < 1e-3,
            "{:?} is not close to {:?}",
            actual,
            expected
        );
    }
}

#[test]
fn centre_pick_annotates_the_front_face() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut step = step_with(Some(cube_asset("cube")));
    stage.load_step(&step);
    stage.wait_for_import();
    let created = Rc::new(RefCell::new(Vec::<Annotation>::new()));
    let sink = created.clone();
    stage.on_annotation_created(move |a| sink.borrow_mut().push(a.clone()));

    let annotation = stage.annotate_at(CENTRE, &mut step).expect("centre should hit the cube");

    assert_close(annotation.position, [0.0, 0.25, 0.5]);
    let cube_id = stage.scene().root().children()[0].meshes()[0].id();
    assert_eq!(annotation.object_id, Some(cube_id.to_string()));
    assert!(!annotation.id.is_empty());
    assert_eq!(step.annotations, vec![annotation.clone()]);
    assert_eq!(stage.scene().markers().len(), 1);
    assert_eq!(created.borrow().as_slice(), &[annotation]);
}

#[test]
fn new_markers_follow_the_active_view_modes() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut step = step_with(None);
    stage.load_step(&step);
    stage.set_xray(true);
    stage.set_wireframe(true);

    stage.annotate_at(CENTRE, &mut step).unwrap();
    stage.tick(Instant::now()).unwrap();
    let first = stage.backend().unwrap().last_frame().unwrap().clone();

    // Setting the same modes again must not change anything.
    stage.set_xray(true);
    stage.set_wireframe(true);
    stage.tick(Instant::now()).unwrap();
    let second = stage.backend().unwrap().last_frame().unwrap().clone();

    assert_eq!(first.items, 2);
    assert_eq!(first.translucent_items, 2);
    assert_eq!(first, second);
    let marker = &stage.scene().markers()[0].meshes()[0];
    assert!(marker.material.transparent);
    assert!(!marker.material.depth_write);
    assert!(marker.edges.visible);
}

#[test]
fn miss_creates_nothing() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut step = step_with(None);
    stage.load_step(&step);
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    stage.on_annotation_created(move |_| *counter.borrow_mut() += 1);

    assert!(stage.annotate_at((2.0, 2.0), &mut step).is_none());

    assert!(step.annotations.is_empty());
    assert!(stage.scene().markers().is_empty());
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn unmounted_stage_cannot_pick() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.unmount();
    let mut step = step_with(None);

    assert!(stage.pick(CENTRE).is_none());
    assert!(stage.annotate_at(CENTRE, &mut step).is_none());
}

#[test]
fn markers_are_not_pickable() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut step = step_with(None);
    stage.load_step(&step);

    let first = stage.annotate_at(CENTRE, &mut step).unwrap();
    let second = stage.annotate_at(CENTRE, &mut step).unwrap();

    // The second pick goes through the first marker to the same surface point.
    assert_close(second.position, first.position);
    assert_eq!(second.object_id, first.object_id);
    assert_ne!(second.id, first.id);
    assert_eq!(stage.scene().markers().len(), 2);
}

#[test]
fn double_activation_needs_two_quick_presses() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut step = step_with(None);
    stage.load_step(&step);
    let t0 = Instant::now();

    assert!(stage.double_activate(CENTRE, t0, &mut step).is_none());
    assert!(
        stage
            .double_activate(CENTRE, t0 + Duration::from_millis(120), &mut step)
            .is_some()
    );
    assert_eq!(step.annotations.len(), 1);

    // Too slow: two separate single clicks.
    let later = t0 + Duration::from_secs(5);
    assert!(stage.double_activate(CENTRE, later, &mut step).is_none());
    assert!(
        stage
            .double_activate(CENTRE, later + Duration::from_secs(2), &mut step)
            .is_none()
    );
    assert_eq!(step.annotations.len(), 1);
}

#[test]
fn markers_are_restored_with_frozen_positions() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut annotated = step_with(Some(cube_asset("cube")));
    stage.load_step(&annotated);
    stage.wait_for_import();
    let annotation = stage.annotate_at(CENTRE, &mut annotated).unwrap();

    stage.load_step(&step_with(None));
    assert!(stage.scene().markers().is_empty());

    stage.load_step(&annotated);
    // Markers come back with the model, not before.
    assert!(stage.scene().markers().is_empty());
    stage.wait_for_import();

    assert_eq!(
        stage.scene().kind(),
        &ContentKind::Asset { name: "cube".to_string() }
    );
    assert_eq!(stage.scene().markers().len(), 1);
    let marker = &stage.scene().markers()[0];
    assert_close(marker.local.position.into(), annotation.position);
    assert_eq!(annotated.annotations, vec![annotation]);
}
