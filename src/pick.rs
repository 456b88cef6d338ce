//! Object picking and selection.
//!
//! Picking is done on the CPU: the pointer position is unprojected into a
//! world-space ray which is tested against every triangle of a frozen
//! [`MeshSnapshot`]. Per mesh, a world-space bounding box rejects misses
//! before the triangle test runs.
//!
//! The snapshot holds shared handles to the geometry, so a scene swap that
//! happens while a pick is in flight can't pull the data out from under it.

use std::sync::Arc;

use cgmath::{ElementWise, InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4};
use instant::{Duration, Instant};

use crate::{
    camera::CameraRig, data_structures::scene_graph::ObjectId, resources::mesh::MeshData,
};

/// Triangles closer to parallel than this are ignored.
const PARALLEL_EPSILON: f32 = 1e-7;

/// A ray in world space with a normalized direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn point_at(&self, t: f32) -> Vector3<f32> {
        self.origin + self.direction * t
    }

    /**
     * Möller–Trumbore ray/triangle test.
     *
     * Both faces count as a hit; imported meshes are not guaranteed to be
     * consistently wound. Returns the distance along the ray.
     */
    pub fn intersect_triangle(&self, [a, b, c]: [Vector3<f32>; 3]) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t > PARALLEL_EPSILON).then_some(t)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| {
            (
                Vector3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
                Vector3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
            )
        });
        Some(Self { min, max })
    }

    /// Slab test. Returns the entry distance, which is zero when the origin
    /// is inside the box.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let inv_dir = Vector3::new(
            1.0 / ray.direction.x,
            1.0 / ray.direction.y,
            1.0 / ray.direction.z,
        );
        let t_min = (self.min - ray.origin).mul_element_wise(inv_dir);
        let t_max = (self.max - ray.origin).mul_element_wise(inv_dir);

        let t_near = t_min.x.min(t_max.x).max(t_min.y.min(t_max.y)).max(t_min.z.min(t_max.z));
        let t_far = t_min.x.max(t_max.x).min(t_min.y.max(t_max.y)).min(t_min.z.max(t_max.z));

        if t_near <= t_far && t_far >= 0.0 {
            Some(t_near.max(0.0))
        } else {
            None
        }
    }
}

/// One pickable mesh as it was when the snapshot was taken.
#[derive(Debug, Clone)]
pub struct PickTarget {
    pub object_id: ObjectId,
    pub world: Matrix4<f32>,
    pub data: Arc<MeshData>,
}

/// Pickable meshes of one scene generation.
#[derive(Debug, Clone, Default)]
pub struct MeshSnapshot {
    pub generation: u64,
    pub targets: Vec<PickTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// World-space intersection point.
    pub point: Vector3<f32>,
    pub object_id: ObjectId,
    /// Distance from the camera along the ray.
    pub distance: f32,
}

/// Converts a pointer position in pixels into a world-space ray from the eye.
///
/// Returns `None` for an empty viewport or a singular camera.
pub fn screen_to_ray(pointer: (f32, f32), viewport: (u32, u32), camera: &CameraRig) -> Option<Ray> {
    let (width, height) = (viewport.0 as f32, viewport.1 as f32);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let ndc_x = (2.0 * pointer.0) / width - 1.0;
    let ndc_y = 1.0 - (2.0 * pointer.1) / height;

    let inverse = (camera.projection_matrix() * camera.view_matrix()).invert()?;
    let unproject = |z: f32| {
        let p = inverse * Vector4::new(ndc_x, ndc_y, z, 1.0);
        p.truncate() / p.w
    };
    let direction = unproject(1.0) - unproject(-1.0);
    if direction.magnitude2() <= f32::EPSILON {
        return None;
    }
    Some(Ray::new(camera.position(), direction))
}

/// Resolves pointer positions to the nearest surface point.
#[derive(Debug, Default)]
pub struct PickingService;

impl PickingService {
    pub fn new() -> Self {
        Self
    }

    /// Nearest hit among the snapshot's meshes, or `None` when the ray
    /// misses everything.
    pub fn pick(
        &self,
        pointer: (f32, f32),
        viewport: (u32, u32),
        camera: &CameraRig,
        snapshot: &MeshSnapshot,
    ) -> Option<PickHit> {
        let ray = screen_to_ray(pointer, viewport, camera)?;
        self.cast(&ray, snapshot)
    }

    pub fn cast(&self, ray: &Ray, snapshot: &MeshSnapshot) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;
        for target in &snapshot.targets {
            let to_world = |p: Vector3<f32>| (target.world * p.extend(1.0)).truncate();
            let bounds = Aabb::from_points(
                target.data.positions.iter().map(|p| to_world(Vector3::from(*p))),
            );
            let Some(entry) = bounds.and_then(|b| b.intersect_ray(ray)) else {
                continue;
            };
            if best.is_some_and(|hit| hit.distance < entry) {
                continue;
            }

            for [a, b, c] in target.data.triangles() {
                let Some(t) = ray.intersect_triangle([to_world(a), to_world(b), to_world(c)]) else {
                    continue;
                };
                if best.is_none_or(|hit| t < hit.distance) {
                    best = Some(PickHit {
                        point: ray.point_at(t),
                        object_id: target.object_id,
                        distance: t,
                    });
                }
            }
        }
        best
    }
}

/// Pairs pointer presses into double activations.
///
/// Two presses count when they are at most `interval` apart and within
/// `slop` pixels of each other. A detected pair is consumed, so a third
/// press starts over.
#[derive(Debug)]
pub struct DoubleClick {
    interval: Duration,
    slop: f32,
    last: Option<(Instant, (f32, f32))>,
}

impl DoubleClick {
    pub fn new(interval: Duration, slop: f32) -> Self {
        Self {
            interval,
            slop,
            last: None,
        }
    }

    /// Records a press and reports whether it completes a double activation.
    pub fn press(&mut self, at: Instant, pointer: (f32, f32)) -> bool {
        if let Some((previous, position)) = self.last.take() {
            let dx = pointer.0 - position.0;
            let dy = pointer.1 - position.1;
            let close = (dx * dx + dy * dy).sqrt() <= self.slop;
            if close && at.saturating_duration_since(previous) <= self.interval {
                return true;
            }
        }
        self.last = Some((at, pointer));
        false
    }
}

impl Default for DoubleClick {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 4.0)
    }
}
