//! Application settings, loaded from an optional JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{
    ConfigParams, DoublePendulumParams, IterativeMethodParams, MandelbrotParams, SupersamplingParams,
    SystemKind, SystemParams,
};
use crate::coords::FocusMode;
use crate::error::CoreError;
use crate::Viewport;

/// User-tunable settings. Every field is optional in the JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub window_width: u32,
    pub window_height: u32,
    /// Center and zoom are decimal strings so deep locations survive a round trip.
    pub center_x: String,
    pub center_y: String,
    pub zoom_scale: String,
    pub system: SystemKind,
    pub focus_mode: FocusMode,
    pub screenshot_width: u64,
    pub screenshot_height: u64,
    pub max_tile_size: u32,
    pub screenshot_dir: PathBuf,
    pub saved_views_path: PathBuf,
    pub mandelbrot: Option<MandelbrotParams>,
    pub double_pendulum: Option<DoublePendulumParams>,
    pub supersampling: Option<SupersamplingParams>,
    pub iterative: Option<IterativeMethodParams>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            center_x: "-0.5".to_string(),
            center_y: "0".to_string(),
            zoom_scale: "3".to_string(),
            system: SystemKind::Mandelbrot,
            focus_mode: FocusMode::default(),
            screenshot_width: 3840,
            screenshot_height: 2160,
            max_tile_size: crate::capture::DEFAULT_MAX_TILE_SIZE,
            screenshot_dir: PathBuf::from("screenshots"),
            saved_views_path: PathBuf::from("saved_views.ini"),
            mandelbrot: None,
            double_pendulum: None,
            supersampling: None,
            iterative: None,
        }
    }
}

impl AppSettings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let settings = Self::from_json(&text)?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(CoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn initial_viewport(&self) -> Result<Viewport, CoreError> {
        Viewport::from_strings(
            self.window_width,
            self.window_height,
            &self.zoom_scale,
            &self.center_x,
            &self.center_y,
        )
    }

    /// Live parameters for `kind` with any overrides from this file applied.
    pub fn live_params(&self, kind: SystemKind) -> ConfigParams {
        let mut params = ConfigParams::for_system(kind);
        match &mut params.system {
            SystemParams::Mandelbrot(p) => {
                if let Some(o) = &self.mandelbrot {
                    *p = o.clone();
                }
            }
            SystemParams::DoublePendulum(p) => {
                if let Some(o) = &self.double_pendulum {
                    *p = o.clone();
                }
            }
        }
        if let (Some(ss), Some(o)) = (&mut params.supersampling, &self.supersampling) {
            *ss = o.clone();
        }
        if let (Some(it), Some(o)) = (&mut params.iterative, &self.iterative) {
            *it = o.clone();
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupersamplingMode;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.max_tile_size, 2048);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let settings = AppSettings::from_json(
            r#"{ "screenshot_width": 5000, "system": "double-pendulum",
                 "supersampling": { "mode": "x4" } }"#,
        )
        .unwrap();
        assert_eq!(settings.screenshot_width, 5000);
        assert_eq!(settings.screenshot_height, 2160);
        assert_eq!(settings.system, SystemKind::DoublePendulum);

        let params = settings.live_params(SystemKind::DoublePendulum);
        let ss = params.supersampling.unwrap();
        assert_eq!(ss.mode, SupersamplingMode::X4);
        assert_eq!(ss.mean_diff_tolerance, SupersamplingParams::default().mean_diff_tolerance);
    }

    #[test]
    fn mixin_overrides_ignore_systems_without_them() {
        let settings = AppSettings {
            iterative: Some(IterativeMethodParams::default()),
            ..AppSettings::default()
        };
        let params = settings.live_params(SystemKind::Mandelbrot);
        assert!(params.iterative.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppSettings::load(&path), Err(CoreError::Settings(_))));
    }

    #[test]
    fn initial_viewport_parses_deep_strings() {
        let settings = AppSettings {
            zoom_scale: "1e-80".to_string(),
            center_x: "-1.7490000000000000000000000000000000001".to_string(),
            ..AppSettings::default()
        };
        let vp = settings.initial_viewport().unwrap();
        assert!(vp.precision_bits() > 64);
        assert_eq!(vp.window_width, 1280);
    }
}
