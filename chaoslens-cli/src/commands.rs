use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chaoslens_core::reference::{ReferenceProgram, ReferenceQuad, ReferenceTarget};
use chaoslens_core::{
    AppSettings, AppState, CaptureReport, CaptureTarget, NeverCancel, PngSink, SavedViews,
    ShaderProgram, DEFAULT_MAX_TILE_SIZE,
};
use chaoslens_gpu::{FullscreenQuad, GpuAvailability, GpuContext, GpuTileSurface, WgpuProgram};

use crate::args::{Backend, CaptureArgs, LocationArgs, ViewsAction};

/// Overlay location flags onto the settings' initial view.
fn apply_location(settings: &mut AppSettings, location: &LocationArgs) {
    if let Some(zoom) = &location.zoom {
        settings.zoom_scale = zoom.clone();
    }
    if let Some(x) = &location.center_x {
        settings.center_x = x.clone();
    }
    if let Some(y) = &location.center_y {
        settings.center_y = y.clone();
    }
}

/// Settings for a capture: the file, then a saved view, then explicit flags.
pub fn capture_settings(mut settings: AppSettings, args: &CaptureArgs) -> Result<AppSettings> {
    if let Some(name) = &args.view {
        let views = SavedViews::load(&settings.saved_views_path)?;
        let view = views
            .find(name)
            .with_context(|| format!("no saved view named '{name}'"))?;
        settings.zoom_scale = view.zoom_scale().to_string();
        let (x, y) = view.center();
        settings.center_x = x.to_string();
        settings.center_y = y.to_string();
    }
    apply_location(&mut settings, &args.location);

    if let Some(system) = args.system {
        settings.system = system;
    }
    if let Some(width) = args.width {
        settings.screenshot_width = width;
    }
    if let Some(height) = args.height {
        settings.screenshot_height = height;
    }
    if let Some(tile) = args.tile_size {
        settings.max_tile_size = tile;
    }
    Ok(settings)
}

pub fn capture(settings: AppSettings, args: &CaptureArgs) -> Result<CaptureReport> {
    let settings = capture_settings(settings, args)?;

    let gpu = match args.backend {
        Backend::Reference => None,
        Backend::Gpu | Backend::Auto => match pollster::block_on(GpuContext::try_init()) {
            GpuAvailability::Available(ctx) => Some(Arc::new(ctx)),
            GpuAvailability::Unavailable(reason) if args.backend == Backend::Gpu => {
                bail!("GPU backend requested but unavailable: {reason}")
            }
            GpuAvailability::Unavailable(reason) => {
                log::warn!("GPU unavailable ({reason}), falling back to the CPU backend");
                None
            }
        },
    };

    match gpu {
        Some(ctx) => {
            let program = WgpuProgram::for_system(Arc::clone(&ctx), settings.system)?;
            let state = AppState::new(settings, program)?;
            let quad = FullscreenQuad::new(&ctx);
            let mut surface = GpuTileSurface::new(ctx);
            run_capture(state, &mut surface, &quad, args)
        }
        None => {
            let state = AppState::new(settings, ReferenceProgram::new())?;
            let mut target = ReferenceTarget::new(DEFAULT_MAX_TILE_SIZE);
            run_capture(state, &mut target, &ReferenceQuad, args)
        }
    }
}

fn run_capture<P, T>(
    mut state: AppState<P>,
    target: &mut T,
    quad: &T::Quad,
    args: &CaptureArgs,
) -> Result<CaptureReport>
where
    P: ShaderProgram + Clone,
    T: CaptureTarget<P>,
{
    let request = state.screenshot_request(args.output.clone());
    let report = state
        .take_screenshot(&request, target, quad, &PngSink, &NeverCancel, |_| {})
        .with_context(|| format!("capture of {} failed", request.path.display()))?;
    Ok(report)
}

pub fn views(settings: AppSettings, action: &ViewsAction) -> Result<()> {
    let mut views = SavedViews::load(&settings.saved_views_path)?;
    match action {
        ViewsAction::List => {
            for view in views.views() {
                let (x, y) = view.center();
                println!("{}\tzoom {}\tcenter ({}, {})", view.name(), view.zoom_scale(), x, y);
            }
        }
        ViewsAction::Save { name, location } => {
            let mut settings = settings;
            apply_location(&mut settings, location);
            let viewport = settings.initial_viewport()?;
            let saved = views.save_new(name, &viewport)?;
            println!("saved '{}'", saved.name());
        }
        ViewsAction::Remove { name } => {
            let removed = views.remove_by_name(name)?;
            println!("removed '{}'", removed.name());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Cli, Command};
    use clap::Parser;

    fn capture_args(argv: &[&str]) -> CaptureArgs {
        let mut full = vec!["chaoslens", "capture"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Capture(args) => args,
            other => panic!("expected capture, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_saved_view_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings {
            saved_views_path: dir.path().join("views.ini"),
            ..AppSettings::default()
        };
        let mut views = SavedViews::load(&settings.saved_views_path).unwrap();
        let vp = chaoslens_core::Viewport::from_strings(10, 10, "0.01", "-1.25", "0.5").unwrap();
        views.save_new("spot", &vp).unwrap();

        let args = capture_args(&["--view", "spot", "--center-y", "-0.25", "--width", "640"]);
        let merged = capture_settings(settings, &args).unwrap();

        assert_eq!(merged.screenshot_width, 640);
        assert_eq!(merged.center_y, "-0.25");
        assert!((merged.center_x.parse::<f64>().unwrap() + 1.25).abs() < 1e-12);
        assert!((merged.zoom_scale.parse::<f64>().unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn unknown_view_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings {
            saved_views_path: dir.path().join("views.ini"),
            ..AppSettings::default()
        };
        assert!(capture_settings(settings, &capture_args(&["--view", "missing"])).is_err());
    }

    #[test]
    fn reference_capture_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.png");
        let args = capture_args(&[
            "--backend",
            "reference",
            "--width",
            "90",
            "--height",
            "50",
            "--tile-size",
            "32",
            "--output",
            output.to_str().unwrap(),
        ]);

        let report = capture(AppSettings::default(), &args).unwrap();
        assert_eq!(report.path, output);
        assert_eq!(report.tiles, 3 * 2);
        assert!(output.exists());
    }

    #[test]
    fn views_save_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings {
            saved_views_path: dir.path().join("views.ini"),
            ..AppSettings::default()
        };
        let location = LocationArgs {
            zoom: Some("0.5".to_string()),
            ..LocationArgs::default()
        };

        views(settings.clone(), &ViewsAction::Save { name: "a".to_string(), location }).unwrap();
        views(settings.clone(), &ViewsAction::List).unwrap();
        assert_eq!(SavedViews::load(&settings.saved_views_path).unwrap().len(), 1);

        views(settings.clone(), &ViewsAction::Remove { name: "a".to_string() }).unwrap();
        assert!(SavedViews::load(&settings.saved_views_path).unwrap().is_empty());
        assert!(views(settings, &ViewsAction::Remove { name: "a".to_string() }).is_err());
    }
}
