mod common;

use common::test_utils::{cube_asset, live_meshes, mounted_stage, runtime, step_with};
use instant::Instant;
use topo_stage::{
    AssetError, DecodeError, ImportApplied, ImportError, LoadStatus, RenderBackend,
    data_structures::scene_graph::ContentKind, render::TickOutcome,
    resources::decode::encode_payload,
};

#[test]
fn step_without_asset_shows_placeholder_at_once() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);

    let status = stage.load_step(&step_with(None));

    assert_eq!(status, LoadStatus::Placeholder);
    assert_eq!(stage.scene().kind(), &ContentKind::Placeholder);
    assert_eq!(stage.scene().mesh_count(), 1);
    assert_eq!(live_meshes(&stage), 1);
    assert!(stage.wait_for_import().is_none());
}

#[test]
fn swapping_assets_releases_the_previous_model() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);

    stage.load_step(&step_with(Some(cube_asset("a"))));
    assert!(matches!(stage.wait_for_import(), Some(ImportApplied::Applied(_))));
    assert_eq!(
        stage.scene().kind(),
        &ContentKind::Asset { name: "a".to_string() }
    );
    let first_root_mesh = stage.scene().root().children()[0].meshes()[0].gpu();

    stage.load_step(&step_with(Some(cube_asset("b"))));
    let Some(ImportApplied::Applied(report)) = stage.wait_for_import() else {
        panic!("second import was not applied");
    };

    assert_eq!(report.released, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(
        stage.scene().kind(),
        &ContentKind::Asset { name: "b".to_string() }
    );
    assert_eq!(live_meshes(&stage), 1);
    let backend = stage.backend().unwrap();
    assert!(!backend.is_live(first_root_mesh.unwrap()));
    assert_eq!(backend.release_failures(), 0);
    // Placeholder, then "a", then "b"; only "b" is still on the device.
    assert_eq!(backend.uploads(), 3);
    assert_eq!(backend.releases(), 2);
    assert_eq!(backend.live_triangles(), 12);
}

#[test]
fn corrupt_payload_falls_back_to_placeholder() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.load_step(&step_with(Some(cube_asset("good"))));
    stage.wait_for_import();

    let mut broken = cube_asset("broken");
    broken.payload = encode_payload("model/gltf-binary", b"not a mesh bundle");
    stage.load_step(&step_with(Some(broken)));

    match stage.wait_for_import() {
        Some(ImportApplied::Fallback { error, .. }) => {
            assert!(matches!(error, AssetError::Import(ImportError::Malformed(_))))
        }
        other => panic!("expected a fallback, got {:?}", other),
    }
    assert_eq!(stage.scene().kind(), &ContentKind::Placeholder);
    assert_eq!(live_meshes(&stage), 1);
}

#[test]
fn payload_without_separator_falls_back_to_placeholder() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    let mut broken = cube_asset("broken");
    broken.payload = "AAAA".to_string();

    stage.load_step(&step_with(Some(broken)));

    match stage.wait_for_import() {
        Some(ImportApplied::Fallback { error, .. }) => {
            assert!(matches!(error, AssetError::Decode(DecodeError::MissingSeparator)))
        }
        other => panic!("expected a fallback, got {:?}", other),
    }
    assert_eq!(stage.scene().kind(), &ContentKind::Placeholder);
}

#[test]
fn unmount_releases_meshes_and_surface() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.load_step(&step_with(Some(cube_asset("a"))));
    stage.wait_for_import();
    assert!(stage.render_loop().is_running());

    let backend = stage.unmount().expect("stage was mounted");

    assert_eq!(backend.live_meshes(), 0);
    assert!(!backend.surface_attached());
    assert_eq!(backend.release_failures(), 0);
    assert!(!stage.is_mounted());
    assert!(!stage.render_loop().is_running());
    assert!(stage.unmount().is_none());
    assert!(matches!(stage.tick(Instant::now()), Ok(TickOutcome::Idle)));
}

#[test]
fn remount_uploads_current_contents() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.load_step(&step_with(Some(cube_asset("a"))));
    stage.wait_for_import();
    stage.unmount();

    stage.mount(topo_stage::HeadlessBackend::new(640, 480));

    assert_eq!(live_meshes(&stage), 1);
    assert!(matches!(
        stage.tick(Instant::now()),
        Ok(TickOutcome::Drawn { items: 1 })
    ));
}

#[test]
fn view_toggles_survive_a_swap() {
    let rt = runtime();
    let mut stage = mounted_stage(&rt);
    stage.set_xray(true);
    stage.set_wireframe(true);

    stage.load_step(&step_with(Some(cube_asset("a"))));
    stage.wait_for_import();
    stage.tick(Instant::now()).unwrap();

    let frame = stage.backend().unwrap().last_frame().unwrap().clone();
    assert_eq!(frame.items, 1);
    assert_eq!(frame.translucent_items, 1);
    assert_eq!(frame.edge_overlays, 1);

    stage.set_xray(false);
    stage.set_wireframe(false);
    stage.tick(Instant::now()).unwrap();
    let frame = stage.backend().unwrap().last_frame().unwrap().clone();
    assert_eq!(frame.translucent_items, 0);
    assert_eq!(frame.edge_overlays, 0);
}
