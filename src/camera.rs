//! Orbit camera with damping and a canonical reset pose.
//!
//! The camera orbits `target` at `distance`, oriented by `yaw` (around +Y)
//! and `pitch` (elevation). Pointer input only accumulates deltas; the render
//! loop calls [`CameraRig::update`] once per tick, which applies a damped
//! share of them.

use cgmath::{
    EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3, Zero, perspective,
};

use crate::config::ViewerConfig;

pub const CANONICAL_POSITION: Vector3<f32> = Vector3::new(0.0, 1.4, 2.8);
pub const CANONICAL_TARGET: Vector3<f32> = Vector3::new(0.0, 0.0, 0.0);

const MIN_DISTANCE: f32 = 0.05;
const MAX_DISTANCE: f32 = 500.0;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.001;
/// Pending deltas below this are dropped to let damping settle.
const SETTLE_EPSILON: f32 = 1e-6;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// The uniform uploaded for the vertex shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

#[derive(Clone, Debug)]
pub struct CameraRig {
    target: Vector3<f32>,
    eye: Vector3<f32>,
    distance: f32,
    yaw: f32,
    pitch: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    pending_pan: Vector3<f32>,
    pending_zoom: f32,
    damping: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    pan_speed: f32,
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl CameraRig {
    pub fn new(config: &ViewerConfig) -> Self {
        let mut rig = Self {
            target: CANONICAL_TARGET,
            eye: CANONICAL_POSITION,
            distance: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_pan: Vector3::zero(),
            pending_zoom: 1.0,
            damping: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            aspect: 1.0,
            fovy: Rad(config.fov_y_degrees.to_radians()),
            znear: config.z_near,
            zfar: config.z_far,
        };
        rig.reset();
        rig
    }

    /// Puts position and target back to the canonical pose and drops any
    /// motion still being damped out.
    pub fn reset(&mut self) {
        self.pending_yaw = 0.0;
        self.pending_pitch = 0.0;
        self.pending_pan = Vector3::zero();
        self.pending_zoom = 1.0;
        self.set_pose(CANONICAL_POSITION, CANONICAL_TARGET);
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn set_pose(&mut self, eye: Vector3<f32>, target: Vector3<f32>) {
        let offset = eye - target;
        self.distance = offset.magnitude().max(MIN_DISTANCE);
        self.pitch = (offset.y / self.distance).clamp(-1.0, 1.0).asin();
        self.yaw = offset.x.atan2(offset.z);
        self.target = target;
        self.eye = eye;
    }

    /// Orbit by a pointer drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_yaw -= dx * self.rotate_speed;
        self.pending_pitch += dy * self.rotate_speed;
    }

    /// Moves target and eye along the view plane by a pointer drag in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let forward = (self.target - self.eye).normalize();
        let right = forward.cross(Vector3::unit_y()).normalize();
        let up = right.cross(forward).normalize();
        let scale = self.distance * self.pan_speed;
        self.pending_pan += (right * -dx + up * dy) * scale;
    }

    /// Positive steps zoom in, negative steps zoom out.
    pub fn zoom(&mut self, steps: f32) {
        self.pending_zoom *= self.zoom_speed.powf(steps);
    }

    /**
     * Advances damping by one tick.
     *
     * With damping factor `d`, a share `d` of each pending rotation and pan is
     * applied and the rest decays by `1 - d`. Zoom is applied in full.
     */
    pub fn update(&mut self, _dt: instant::Duration) {
        let share = if self.damping > 0.0 { self.damping } else { 1.0 };
        let moving = self.pending_yaw.abs() > SETTLE_EPSILON
            || self.pending_pitch.abs() > SETTLE_EPSILON
            || self.pending_pan.magnitude2() > SETTLE_EPSILON * SETTLE_EPSILON
            || (self.pending_zoom - 1.0).abs() > SETTLE_EPSILON;
        if !moving {
            self.pending_yaw = 0.0;
            self.pending_pitch = 0.0;
            self.pending_pan = Vector3::zero();
            self.pending_zoom = 1.0;
            return;
        }

        self.yaw += self.pending_yaw * share;
        self.pitch = (self.pitch + self.pending_pitch * share).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.target += self.pending_pan * share;
        self.distance = (self.distance * self.pending_zoom).clamp(MIN_DISTANCE, MAX_DISTANCE);

        self.pending_yaw *= 1.0 - share;
        self.pending_pitch *= 1.0 - share;
        self.pending_pan *= 1.0 - share;
        self.pending_zoom = 1.0;

        self.eye = self.target
            + Vector3::new(
                self.distance * self.yaw.sin() * self.pitch.cos(),
                self.distance * self.pitch.sin(),
                self.distance * self.yaw.cos() * self.pitch.cos(),
            );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.eye
    }

    pub fn target(&self) -> Vector3<f32> {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::from_vec(self.eye),
            Point3::from_vec(self.target),
            Vector3::unit_y(),
        )
    }

    /// OpenGL style projection (clip z in -1..1), used for unprojection.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: (OPENGL_TO_WGPU_MATRIX * self.projection_matrix() * self.view_matrix())
                .into(),
        }
    }
}
