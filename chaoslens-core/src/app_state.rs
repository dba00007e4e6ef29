//! Application state: the viewport, zoom motion and the live/screenshot
//! configuration pair, owned in one place.

use std::path::PathBuf;

use crate::capture::{capture_with, default_capture_path, CaptureReport, CaptureRequest, CaptureTarget};
use crate::cancellation::CancellationChecker;
use crate::config::RenderConfig;
use crate::coords::{continuous_zoom_factor, pan, step_zoom_factor, zoom_at, FocusMode};
use crate::error::{CaptureError, CoreError};
use crate::progress::CaptureProgress;
use crate::saved_view::SavedViews;
use crate::settings::AppSettings;
use crate::shader::ShaderProgram;
use crate::sink::ImageSink;
use crate::Viewport;

/// Zoom keys currently held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoomMotion {
    pub zooming_in: bool,
    pub zooming_out: bool,
}

impl ZoomMotion {
    /// Direction of continuous zoom, if exactly one key is held.
    pub fn direction(self) -> Option<bool> {
        match (self.zooming_in, self.zooming_out) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }
}

pub struct AppState<P: ShaderProgram + Clone> {
    settings: AppSettings,
    viewport: Viewport,
    focus_mode: FocusMode,
    motion: ZoomMotion,
    live: RenderConfig<P>,
    screenshot: Option<RenderConfig<P>>,
}

impl<P: ShaderProgram + Clone> AppState<P> {
    /// Build state from settings, binding the live configuration to `program`.
    ///
    /// A program that fails to build is logged and left not-ready; the next
    /// recompile retries.
    pub fn new(settings: AppSettings, program: P) -> Result<Self, CoreError> {
        let viewport = settings.initial_viewport()?;
        let mut live = RenderConfig::new(program, settings.live_params(settings.system));
        if let Err(e) = live.program_mut().build() {
            log::error!("{} program failed to build: {}", live.name(), e);
        }
        live.apply_view(&viewport);

        Ok(Self {
            focus_mode: settings.focus_mode,
            settings,
            viewport,
            motion: ZoomMotion::default(),
            live,
            screenshot: None,
        })
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn live(&self) -> &RenderConfig<P> {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut RenderConfig<P> {
        &mut self.live
    }

    pub fn screenshot_config(&self) -> Option<&RenderConfig<P>> {
        self.screenshot.as_ref()
    }

    pub fn focus_mode(&self) -> FocusMode {
        self.focus_mode
    }

    pub fn toggle_focus_lock(&mut self) {
        self.focus_mode = match self.focus_mode {
            FocusMode::Pointer => FocusMode::LockedToCenter,
            FocusMode::LockedToCenter => FocusMode::Pointer,
        };
        log::debug!("focus mode: {:?}", self.focus_mode);
    }

    pub fn motion(&self) -> ZoomMotion {
        self.motion
    }

    pub fn set_zooming_in(&mut self, held: bool) {
        self.motion.zooming_in = held;
    }

    pub fn set_zooming_out(&mut self, held: bool) {
        self.motion.zooming_out = held;
    }

    /// Replace the live configuration.
    ///
    /// An existing screenshot configuration is rebuilt from the new live one and
    /// keeps whatever quality settings it shares with the old one.
    pub fn set_live(&mut self, config: RenderConfig<P>) {
        self.live = config;
        self.apply_view();

        if let Some(previous) = self.screenshot.take() {
            let mut shot = self.live.to_screenshot_config();
            shot.sync_from_screenshot_peer(&previous);
            self.screenshot = Some(shot);
        }
        log::info!("Switched to {}", self.live.name());
    }

    /// Advance continuous zoom by `dt` seconds.
    pub fn update(&mut self, dt: f64, pointer: (f64, f64)) -> Result<(), CoreError> {
        if let Some(zoom_in) = self.motion.direction() {
            let focus = self.focus_mode.resolve(&self.viewport, pointer);
            zoom_at(&mut self.viewport, focus, continuous_zoom_factor(dt, zoom_in))?;
            self.apply_view();
        }
        Ok(())
    }

    /// Discrete zoom steps; positive `steps` zoom in.
    pub fn scroll(&mut self, pointer: (f64, f64), steps: i32) -> Result<(), CoreError> {
        if steps == 0 {
            return Ok(());
        }
        let factor = step_zoom_factor(steps > 0).powi(steps.abs());
        let focus = self.focus_mode.resolve(&self.viewport, pointer);
        zoom_at(&mut self.viewport, focus, factor)?;
        self.apply_view();
        Ok(())
    }

    pub fn drag(&mut self, dx: f64, dy: f64) {
        pan(&mut self.viewport, dx, dy);
        self.apply_view();
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CoreError> {
        self.viewport.resize(width, height)?;
        self.apply_view();
        Ok(())
    }

    pub fn jump_to_view(&mut self, views: &SavedViews, name: &str) -> Result<(), CoreError> {
        views.jump_to(name, &mut self.viewport)?;
        self.apply_view();
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.apply_view();
    }

    /// Push the current view to the live program, recompiling if a define changed.
    pub fn apply_view(&mut self) {
        self.live.apply_view(&self.viewport);
        if let Err(e) = self.live.recompile_if_needed() {
            log::warn!("live program not ready: {}", e);
        }
    }

    /// Request for the current view at the configured screenshot size.
    pub fn screenshot_request(&self, path: Option<PathBuf>) -> CaptureRequest {
        CaptureRequest {
            path: path.unwrap_or_else(|| {
                default_capture_path(&self.settings.screenshot_dir, self.live.name())
            }),
            width: self.settings.screenshot_width,
            height: self.settings.screenshot_height,
            max_tile_size: self.settings.max_tile_size,
            viewport: self.viewport.clone(),
        }
    }

    /// Capture `request` with the screenshot configuration.
    ///
    /// The screenshot configuration is derived from the live one on first use
    /// and takes the live-only fields before every capture. Failures are logged
    /// and returned; they never disturb the live configuration.
    pub fn take_screenshot<T, S, C>(
        &mut self,
        request: &CaptureRequest,
        target: &mut T,
        quad: &T::Quad,
        sink: &S,
        cancel: &C,
        on_progress: impl FnMut(&CaptureProgress),
    ) -> Result<CaptureReport, CaptureError>
    where
        T: CaptureTarget<P>,
        S: ImageSink,
        C: CancellationChecker,
    {
        let live = &self.live;
        let shot = self
            .screenshot
            .get_or_insert_with(|| live.to_screenshot_config());
        shot.sync_from_live(live);

        let result = capture_with(request, shot, target, quad, sink, cancel, on_progress);
        if let Err(e) = &result {
            log::error!("Screenshot failed: {}", e);
        }
        result
    }
}
