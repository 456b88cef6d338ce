//! Scene data: the node hierarchy, its transforms and materials.
//!
//! - `scene_graph` holds the displayed hierarchy and owns its device resources
//! - `material` contains flat materials, the edge overlay and view-mode visitors
//! - `transform` holds per-node local transforms
//! - `texture` wraps the depth attachment used by the GPU backend

pub mod material;
pub mod scene_graph;
pub mod texture;
pub mod transform;
