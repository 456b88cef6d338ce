//! The stage: what a host mounts to show one lesson step at a time.
//!
//! All scene mutation happens through `&mut Stage`, i.e. on the thread that
//! owns it. Decoding and importing an asset runs on a blocking worker of the
//! tokio runtime; the finished node tree is sent back over a channel and
//! swapped in by [`Stage::poll_imports`] (called from every tick).
//!
//! Each import request carries a version stamp. Only the result matching the
//! latest request is applied, so a slow import for a step the user already
//! left can never replace newer contents.

use futures::{StreamExt, channel::mpsc};
use instant::{Duration, Instant};

use crate::{
    annotation::AnnotationAuthor,
    backend::RenderBackend,
    camera::CameraRig,
    config::{ViewerConfig, linear_rgb},
    data_structures::{
        material::{MaterialStateController, ViewState},
        scene_graph::{Node, SceneContents, SceneGraph, SwapReport},
    },
    error::{AssetError, BackendError},
    lesson::{Annotation, Asset, Step},
    pick::{DoubleClick, PickHit, PickingService},
    render::{RenderLoop, TickOutcome},
    resources::{ImportOptions, load_asset, placeholder_node},
};

/// Identifies one import request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImportTicket {
    pub version: u64,
}

/// A finished import as delivered by the worker.
#[derive(Debug)]
pub struct ImportOutcome {
    pub version: u64,
    pub asset_name: String,
    pub result: Result<Node, AssetError>,
}

/// What [`Stage::load_step`] did right away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// The step has no asset; the placeholder is already displayed.
    Placeholder,
    /// Decoding in the background; the current contents stay until it lands.
    Pending(ImportTicket),
}

/// What happened to a finished import.
#[derive(Debug)]
pub enum ImportApplied {
    /// A newer request was issued since; the result was dropped.
    Stale { version: u64, latest: u64 },
    Applied(SwapReport),
    /// The asset could not be loaded and the placeholder is shown instead.
    Fallback { report: SwapReport, error: AssetError },
}

/// Runs decode and import off the owning thread and stamps the results.
pub struct Importer {
    runtime: tokio::runtime::Handle,
    options: ImportOptions,
    latest: u64,
    in_flight: usize,
    sender: mpsc::UnboundedSender<ImportOutcome>,
    receiver: mpsc::UnboundedReceiver<ImportOutcome>,
}

impl Importer {
    pub fn new(runtime: tokio::runtime::Handle, options: ImportOptions) -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            runtime,
            options,
            latest: 0,
            in_flight: 0,
            sender,
            receiver,
        }
    }

    /// Starts a new request. Everything requested earlier becomes stale.
    pub fn request(&mut self, asset: Asset) -> ImportTicket {
        let ticket = self.invalidate();
        let sender = self.sender.clone();
        let options = self.options.clone();
        self.in_flight += 1;
        self.runtime.spawn_blocking(move || {
            let result = load_asset(&asset, &options);
            let outcome = ImportOutcome {
                version: ticket.version,
                asset_name: asset.name,
                result,
            };
            if sender.unbounded_send(outcome).is_err() {
                log::debug!("import {} finished after the stage was dropped", ticket.version);
            }
        });
        ticket
    }

    /// Bumps the version without starting any work.
    pub fn invalidate(&mut self) -> ImportTicket {
        self.latest += 1;
        ImportTicket {
            version: self.latest,
        }
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn is_current(&self, version: u64) -> bool {
        version == self.latest
    }

    /// Requests whose results haven't been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Next finished import, if one is waiting.
    pub fn try_next(&mut self) -> Option<ImportOutcome> {
        match self.receiver.try_next() {
            Ok(Some(outcome)) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(outcome)
            }
            _ => None,
        }
    }

    /// Blocks until the next import finishes. `None` if nothing is in flight.
    pub fn wait_next(&mut self) -> Option<ImportOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = futures::executor::block_on(self.receiver.next())?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(outcome)
    }
}

/// Called with every annotation the stage creates.
pub type AnnotationCallback = Box<dyn FnMut(&Annotation)>;

pub struct Stage<B: RenderBackend> {
    scene: SceneGraph,
    materials: MaterialStateController,
    camera: CameraRig,
    picking: PickingService,
    author: AnnotationAuthor,
    render_loop: RenderLoop,
    importer: Importer,
    gesture: DoubleClick,
    backend: Option<B>,
    placeholder_colour: [f32; 3],
    edge_threshold_degrees: f32,
    /// Annotation positions of the step being loaded, shown once it swaps in.
    pending_markers: Vec<[f32; 3]>,
    on_annotation: Option<AnnotationCallback>,
}

fn as_dyn<B: RenderBackend>(backend: &mut Option<B>) -> Option<&mut dyn RenderBackend> {
    backend.as_mut().map(|b| b as &mut dyn RenderBackend)
}

impl<B: RenderBackend> Stage<B> {
    pub fn new(config: &ViewerConfig, runtime: tokio::runtime::Handle) -> Self {
        let placeholder_colour = linear_rgb(config.placeholder_colour);
        let options = ImportOptions {
            surface_colour: linear_rgb(config.surface_colour),
            edge_threshold_degrees: config.edge_threshold_degrees,
        };
        Self {
            scene: SceneGraph::new(SceneContents::placeholder(placeholder_node(
                placeholder_colour,
                config.edge_threshold_degrees,
            ))),
            materials: MaterialStateController::new(
                config.xray_opacity,
                linear_rgb(config.edge_colour),
            ),
            camera: CameraRig::new(config),
            picking: PickingService::new(),
            author: AnnotationAuthor::new(
                config.annotation_placeholder.clone(),
                config.marker_radius,
                linear_rgb(config.marker_colour),
            ),
            render_loop: RenderLoop::new(linear_rgb(config.clear_colour)),
            importer: Importer::new(runtime, options),
            gesture: DoubleClick::new(
                Duration::from_millis(config.double_click_millis),
                config.double_click_slop_px,
            ),
            backend: None,
            placeholder_colour,
            edge_threshold_degrees: config.edge_threshold_degrees,
            pending_markers: Vec::new(),
            on_annotation: None,
        }
    }

    /// Attaches an output surface and starts rendering.
    pub fn mount(&mut self, mut backend: B) {
        if let Some(previous) = self.unmount() {
            log::warn!("mounting over a mounted stage, dropping the previous backend");
            drop(previous);
        }
        let uploaded = self.scene.upload(&mut backend);
        let (width, height) = backend.viewport();
        self.camera.resize(width, height);
        self.backend = Some(backend);
        self.render_loop.start();
        log::info!("stage mounted at {}x{}, {} meshes uploaded", width, height, uploaded);
    }

    /**
     * Stops rendering and gives the backend back.
     *
     * The tick is cancelled first, then device resources and the surface are
     * released. Release failures are logged and otherwise ignored.
     */
    pub fn unmount(&mut self) -> Option<B> {
        self.render_loop.stop();
        let mut backend = self.backend.take()?;
        let released = self.scene.dispose(&mut backend);
        if let Err(e) = backend.release_surface() {
            log::warn!("releasing the output surface failed: {}", e);
        }
        log::info!("stage unmounted, {} meshes released", released);
        Some(backend)
    }

    pub fn is_mounted(&self) -> bool {
        self.backend.is_some()
    }

    /// Shows `step`. Steps without an asset switch to the placeholder at once.
    pub fn load_step(&mut self, step: &Step) -> LoadStatus {
        self.pending_markers = step.annotations.iter().map(|a| a.position).collect();
        match &step.asset {
            Some(asset) => {
                let ticket = self.importer.request(asset.clone());
                log::debug!("import {} requested for {}", ticket.version, asset.name);
                LoadStatus::Pending(ticket)
            }
            None => {
                // Anything still importing belongs to a step we have left.
                self.importer.invalidate();
                self.show_placeholder();
                LoadStatus::Placeholder
            }
        }
    }

    /// Applies every finished import. Returns how many were received.
    pub fn poll_imports(&mut self) -> usize {
        let mut received = 0;
        while let Some(outcome) = self.importer.try_next() {
            self.apply_import(outcome);
            received += 1;
        }
        received
    }

    /// Blocks until the next in-flight import finishes and applies it.
    pub fn wait_for_import(&mut self) -> Option<ImportApplied> {
        let outcome = self.importer.wait_next()?;
        Some(self.apply_import(outcome))
    }

    pub fn apply_import(&mut self, outcome: ImportOutcome) -> ImportApplied {
        if !self.importer.is_current(outcome.version) {
            log::debug!(
                "discarding import {} of {}, latest is {}",
                outcome.version,
                outcome.asset_name,
                self.importer.latest()
            );
            return ImportApplied::Stale {
                version: outcome.version,
                latest: self.importer.latest(),
            };
        }
        match outcome.result {
            Ok(root) => {
                let report = self.swap(SceneContents::asset(outcome.asset_name, root));
                ImportApplied::Applied(report)
            }
            Err(error) => {
                log::warn!(
                    "could not load {}, showing placeholder: {}",
                    outcome.asset_name,
                    error
                );
                let report = self.show_placeholder();
                ImportApplied::Fallback { report, error }
            }
        }
    }

    fn show_placeholder(&mut self) -> SwapReport {
        let node = placeholder_node(self.placeholder_colour, self.edge_threshold_degrees);
        self.swap(SceneContents::placeholder(node))
    }

    fn swap(&mut self, contents: SceneContents) -> SwapReport {
        let report = self.scene.swap(contents, as_dyn(&mut self.backend));
        for position in std::mem::take(&mut self.pending_markers) {
            self.author
                .place_marker(position, &mut self.scene, as_dyn(&mut self.backend));
        }
        self.materials.reapply(&mut self.scene);
        report
    }

    pub fn set_wireframe(&mut self, enabled: bool) {
        self.materials.apply_wireframe(&mut self.scene, enabled);
    }

    pub fn set_xray(&mut self, enabled: bool) {
        self.materials.apply_xray(&mut self.scene, enabled);
    }

    pub fn view_state(&self) -> ViewState {
        self.materials.state()
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(width, height);
        }
        self.camera.resize(width, height);
    }

    pub fn on_annotation_created(&mut self, callback: impl FnMut(&Annotation) + 'static) {
        self.on_annotation = Some(Box::new(callback));
    }

    /// Feeds a primary press into the double-click detector and annotates
    /// the pick under `pointer` when it completes one.
    pub fn double_activate(
        &mut self,
        pointer: (f32, f32),
        now: Instant,
        step: &mut Step,
    ) -> Option<Annotation> {
        if !self.gesture.press(now, pointer) {
            return None;
        }
        self.annotate_at(pointer, step)
    }

    /// Picks under `pointer` and records an annotation on a hit.
    pub fn annotate_at(&mut self, pointer: (f32, f32), step: &mut Step) -> Option<Annotation> {
        let hit = self.pick(pointer)?;
        let annotation =
            self.author
                .author(&hit, step, &mut self.scene, as_dyn(&mut self.backend));
        // The new marker picks up the current view modes.
        self.materials.reapply(&mut self.scene);
        if let Some(callback) = self.on_annotation.as_mut() {
            callback(&annotation);
        }
        Some(annotation)
    }

    /// Nearest hit under `pointer` against a snapshot taken now.
    pub fn pick(&self, pointer: (f32, f32)) -> Option<PickHit> {
        let viewport = self.backend.as_ref()?.viewport();
        let snapshot = self.scene.snapshot();
        let hit = self.picking.pick(pointer, viewport, &self.camera, &snapshot);
        if hit.is_none() {
            log::debug!("pick at {:?} missed", pointer);
        }
        hit
    }

    /// One frame: land finished imports, advance the camera, draw.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, BackendError> {
        self.poll_imports();
        match self.backend.as_mut() {
            Some(backend) => self
                .render_loop
                .tick(now, &mut self.camera, &self.scene, backend),
            None => Ok(TickOutcome::Idle),
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }
}

impl<B: RenderBackend> Drop for Stage<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}
