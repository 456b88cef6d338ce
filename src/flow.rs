//! Host shell: a winit window around a [`Stage`].
//!
//! This is the minimal host the library needs to be usable on its own. It
//! owns the lesson, maps input onto the stage and hands every new annotation
//! to a caller supplied hook, which is where a real host would persist it.
//!
//! | Input                     | Action                   |
//! |---------------------------|--------------------------|
//! | left drag                 | orbit                    |
//! | right drag                | pan                      |
//! | wheel                     | zoom                     |
//! | left double click         | annotate the picked point|
//! | `W` / `X`                 | toggle wireframe / x-ray |
//! | `R`                       | reset camera             |
//! | Left / Right arrow        | previous / next step     |

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::{
    config::ViewerConfig,
    context::Context,
    error::BackendError,
    lesson::{Annotation, Lesson, Step},
    stage::Stage,
};

/// Pixels per wheel line when the platform reports pixel deltas.
const PIXELS_PER_LINE: f64 = 40.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButtonState {
    #[default]
    None,
    Left,
    Right,
}

pub struct App {
    config: ViewerConfig,
    lesson: Lesson,
    current: usize,
    stage: Stage<Context>,
    window: Option<Arc<Window>>,
    pressed: MouseButtonState,
    cursor: PhysicalPosition<f64>,
    // Dropped last: the stage holds a handle into it.
    runtime: tokio::runtime::Runtime,
}

impl App {
    pub fn new(
        lesson: Lesson,
        config: ViewerConfig,
        on_annotation: impl FnMut(&Annotation) + 'static,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        let mut stage = Stage::new(&config, runtime.handle().clone());
        stage.on_annotation_created(on_annotation);
        Ok(Self {
            config,
            lesson,
            current: 0,
            stage,
            window: None,
            pressed: MouseButtonState::None,
            cursor: PhysicalPosition::new(0.0, 0.0),
            runtime,
        })
    }

    fn show_step(&mut self, index: usize) {
        let Some(step) = self.lesson.steps.get(index) else {
            log::warn!("lesson has no step {}", index);
            return;
        };
        self.current = index;
        log::info!(
            "step {}/{}: {}",
            index + 1,
            self.lesson.steps.len(),
            step.title.as_deref().unwrap_or(&step.description)
        );
        self.stage.load_step(step);
    }

    fn current_step(&mut self) -> Option<&mut Step> {
        self.lesson.steps.get_mut(self.current)
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.logical_key.as_ref() {
            Key::Character(c) if c.eq_ignore_ascii_case("w") => {
                let enabled = !self.stage.view_state().wireframe_enabled;
                self.stage.set_wireframe(enabled);
            }
            Key::Character(c) if c.eq_ignore_ascii_case("x") => {
                let enabled = !self.stage.view_state().xray_enabled;
                self.stage.set_xray(enabled);
            }
            Key::Character(c) if c.eq_ignore_ascii_case("r") => self.stage.reset_camera(),
            Key::Named(NamedKey::ArrowRight) => {
                if self.current + 1 < self.lesson.steps.len() {
                    self.show_step(self.current + 1);
                }
            }
            Key::Named(NamedKey::ArrowLeft) => {
                if self.current > 0 {
                    self.show_step(self.current - 1);
                }
            }
            _ => (),
        }
    }

    fn handle_press(&mut self, button: MouseButton) {
        match button {
            MouseButton::Left => {
                self.pressed = MouseButtonState::Left;
                let pointer = (self.cursor.x as f32, self.cursor.y as f32);
                let now = Instant::now();
                let Some(step) = self.lesson.steps.get_mut(self.current) else {
                    return;
                };
                self.stage.double_activate(pointer, now, step);
            }
            MouseButton::Right => self.pressed = MouseButtonState::Right,
            _ => (),
        }
    }

    fn handle_cursor(&mut self, position: PhysicalPosition<f64>) {
        let dx = (position.x - self.cursor.x) as f32;
        let dy = (position.y - self.cursor.y) as f32;
        self.cursor = position;
        match self.pressed {
            MouseButtonState::Left => self.stage.camera_mut().rotate(dx, dy),
            MouseButtonState::Right => self.stage.camera_mut().pan(dx, dy),
            MouseButtonState::None => (),
        }
    }

    fn redraw(&mut self) {
        match self.stage.tick(Instant::now()) {
            Ok(_) => (),
            // Reconfigure the surface if it's lost or outdated
            Err(BackendError::SurfaceLost) => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.stage.resize(size.width, size.height);
                }
            }
            Err(e) => log::error!("Unable to render {}", e),
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes().with_title(self.lesson.meta.title.clone());
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let ctx = match self
            .runtime
            .block_on(Context::new(window.clone(), &self.config))
        {
            Ok(ctx) => ctx,
            Err(e) => {
                log::error!("App initialization failed. Cannot create the main context: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.stage.mount(ctx);
        self.window = Some(window.clone());
        self.show_step(self.current);
        window.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.stage.unmount();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.stage.resize(size.width, size.height),
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::CursorMoved { position, .. } => self.handle_cursor(position),
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.handle_press(button),
                ElementState::Released => self.pressed = MouseButtonState::None,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_LINE) as f32,
                };
                self.stage.camera_mut().zoom(lines);
            }
            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.stage.unmount();
        if let Some(step) = self.current_step() {
            log::debug!("leaving with {} annotations on the last step", step.annotations.len());
        }
    }
}

/// Opens a window on `lesson` and runs until it is closed.
pub fn run(
    lesson: Lesson,
    config: ViewerConfig,
    on_annotation: impl FnMut(&Annotation) + 'static,
) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        eprintln!("Warning: Could not initialize logger: {}", e);
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(lesson, config, on_annotation)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
