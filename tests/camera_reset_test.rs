mod common;

use cgmath::{InnerSpace, Vector3};
use common::test_utils::{CENTRE, mounted_stage, runtime, step_with};
use instant::{Duration, Instant};
use topo_stage::camera::{CANONICAL_POSITION, CANONICAL_TARGET};

fn settle(stage: &mut topo_stage::Stage<topo_stage::HeadlessBackend>) {
    let mut now = Instant::now();
    for _ in 0..120 {
        now += Duration::from_millis(16);
        stage.tick(now).unwrap();
    }
}

#[test]
fn reset_restores_the_canonical_pose() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.load_step(&step_with(None));

    stage.camera_mut().rotate(180.0, -40.0);
    stage.camera_mut().pan(25.0, 10.0);
    stage.camera_mut().zoom(-3.0);
    settle(&mut stage);
    assert!((stage.camera().position() - CANONICAL_POSITION).magnitude() > 0.1);

    stage.reset_camera();

    assert!((stage.camera().position() - CANONICAL_POSITION).magnitude() < 1e-5);
    assert!((stage.camera().target() - CANONICAL_TARGET).magnitude() < 1e-5);
    // Nothing still being damped pulls it away again.
    settle(&mut stage);
    assert!((stage.camera().position() - CANONICAL_POSITION).magnitude() < 1e-4);
}

#[test]
fn orbiting_away_changes_what_is_picked() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.load_step(&step_with(None));
    let front = stage.pick(CENTRE).unwrap().point;

    stage.camera_mut().pan(0.0, 400.0);
    settle(&mut stage);
    let moved = stage.pick(CENTRE).map(|hit| hit.point);

    stage.reset_camera();
    let again = stage.pick(CENTRE).unwrap().point;

    assert_ne!(moved, Some(front));
    assert!((again - front).magnitude() < 1e-4);
    assert!((front - Vector3::new(0.0, 0.25, 0.5)).magnitude() < 1e-3);
}
