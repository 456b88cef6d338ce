//! topo-stage
//!
//! Scene and asset runtime for stepping through 3D lesson pages. Each step
//! embeds one binary mesh bundle as a base64 data URI; the runtime decodes it
//! off the render thread, swaps it into a single-owner scene graph, and lets
//! the viewer toggle edge overlays and x-ray, orbit the camera and drop point
//! annotations by double clicking the model.
//!
//! High-level modules
//! - `stage`: the facade a host mounts (load steps, toggles, annotations)
//! - `resources`: payload decoding and mesh bundle import
//! - `data_structures`: scene graph, flat materials, transforms
//! - `camera`: damped orbit camera with a canonical reset pose
//! - `pick`: CPU ray picking and the double-click gesture
//! - `annotation`: turning picks into annotations and markers
//! - `render`: frame composition and the start/stop render loop
//! - `backend`: the device seam, plus a headless backend for tests
//! - `context` / `pipelines`: the wgpu backend
//! - `flow`: a winit host shell
//!

pub mod annotation;
pub mod backend;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod lesson;
pub mod pick;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod stage;

// Re-exports commonly used types for convenience in downstream code.
pub use backend::{HeadlessBackend, RenderBackend};
pub use config::ViewerConfig;
pub use error::{AssetError, BackendError, DecodeError, ImportError};
pub use lesson::{Annotation, Asset, Lesson, Step};
pub use stage::{ImportApplied, LoadStatus, Stage};
