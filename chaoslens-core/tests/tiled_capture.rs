//! End-to-end tiled captures through the CPU backend and the PNG sink.

use std::path::{Path, PathBuf};

use chaoslens_core::reference::{ReferenceProgram, ReferenceQuad, ReferenceTarget, COMPILE_ERROR_TOKEN};
use chaoslens_core::{
    capture, capture_with, AtomicBoolChecker, CaptureError, CaptureProgress, CaptureRequest,
    NeverCancel, PngSink, RenderConfig, ShaderError, ShaderProgram, ShaderSources, SystemKind,
    UniformValue, Viewport,
};

fn config(kind: SystemKind) -> RenderConfig<ReferenceProgram> {
    let mut config = RenderConfig::for_system(ReferenceProgram::new(), kind);
    config.program_mut().build().unwrap();
    config
}

fn request(path: PathBuf, width: u64, height: u64, tile: u32) -> CaptureRequest {
    CaptureRequest {
        path,
        width,
        height,
        max_tile_size: tile,
        viewport: Viewport::from_f64(640, 480, 3.0, -0.5, 0.0).unwrap(),
    }
}

fn decode(path: &Path) -> (u32, u32, Vec<u8>) {
    let image = image::open(path).unwrap().to_rgba8();
    (image.width(), image.height(), image.into_raw())
}

// ============================================================================
// Seamless tiling
// ============================================================================

#[test]
fn tiled_capture_matches_single_tile_capture() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(256);

    let mut tiled = config(SystemKind::Mandelbrot);
    let report = capture(
        &request(dir.path().join("tiled.png"), 61, 37, 16),
        &mut tiled,
        &mut target,
        &ReferenceQuad,
        &PngSink,
    )
    .unwrap();
    assert_eq!(report.tiles, 4 * 3);

    let mut whole = config(SystemKind::Mandelbrot);
    capture(
        &request(dir.path().join("whole.png"), 61, 37, 64),
        &mut whole,
        &mut target,
        &ReferenceQuad,
        &PngSink,
    )
    .unwrap();

    assert_eq!(
        decode(&dir.path().join("tiled.png")),
        decode(&dir.path().join("whole.png"))
    );
}

#[test]
fn tiled_capture_matches_interactive_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(256);
    let mut config = config(SystemKind::DoublePendulum);

    let report = capture(
        &request(dir.path().join("frame.png"), 45, 29, 8),
        &mut config,
        &mut target,
        &ReferenceQuad,
        &PngSink,
    )
    .unwrap();

    // The capture left the program showing the whole image with no tile offset.
    let (_, _, pixels) = decode(&report.path);
    let frame = ReferenceTarget::render_frame(config.program(), 45, 29);
    assert_eq!(pixels, frame);
}

#[test]
fn output_is_top_row_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(256);
    let mut config = config(SystemKind::DoublePendulum);
    let mut req = request(dir.path().join("orient.png"), 40, 40, 16);
    req.viewport = Viewport::from_f64(640, 480, 2.0, 0.0, 0.0).unwrap();

    let report = capture(&req, &mut config, &mut target, &ReferenceQuad, &PngSink).unwrap();
    let (w, _, pixels) = decode(&report.path);
    let pixel = |x: u32, y: u32| {
        let i = ((y * w + x) * 4) as usize;
        [pixels[i], pixels[i + 1], pixels[i + 2]]
    };

    // Top-left is x < 0, y > 0: blue tint only.
    let top_left = pixel(0, 0);
    assert_eq!(top_left[2], 255);
    assert_ne!(top_left[0], 255);

    // Bottom-right is x > 0, y < 0: red tint only.
    let bottom_right = pixel(39, 39);
    assert_eq!(bottom_right[0], 255);
    assert_ne!(bottom_right[2], 255);
}

// ============================================================================
// Surface handling
// ============================================================================

#[test]
fn surface_is_allocated_once_and_released() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(256);
    let mut config = config(SystemKind::Mandelbrot);

    capture(
        &request(dir.path().join("once.png"), 50, 50, 10),
        &mut config,
        &mut target,
        &ReferenceQuad,
        &PngSink,
    )
    .unwrap();

    assert_eq!(target.allocations(), 1);
    assert_eq!(target.draws(), 25);
    assert!(!target.is_capturing());
}

#[test]
fn tile_size_is_clamped_to_backend_maximum() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(32);
    let mut config = config(SystemKind::Mandelbrot);

    let report = capture(
        &request(dir.path().join("clamped.png"), 70, 33, 4096),
        &mut config,
        &mut target,
        &ReferenceQuad,
        &PngSink,
    )
    .unwrap();

    assert_eq!(report.tile_size, 32);
    assert_eq!(report.tiles, 3 * 2);
    assert_eq!(decode(&report.path).0, 70);
}

#[test]
fn existing_files_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    let mut config = config(SystemKind::Mandelbrot);
    let path = dir.path().join("shot.png");

    let first = capture(&request(path.clone(), 8, 8, 8), &mut config, &mut target, &ReferenceQuad, &PngSink)
        .unwrap();
    let second = capture(&request(path.clone(), 8, 8, 8), &mut config, &mut target, &ReferenceQuad, &PngSink)
        .unwrap();

    assert_eq!(first.path, path);
    assert_eq!(second.path, dir.path().join("shot_1.png"));
}

#[test]
fn parent_directories_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    let mut config = config(SystemKind::Mandelbrot);
    let path = dir.path().join("a/b/deep.png");

    capture(&request(path.clone(), 4, 4, 4), &mut config, &mut target, &ReferenceQuad, &PngSink)
        .unwrap();
    assert!(path.exists());
}

// ============================================================================
// Failures write nothing
// ============================================================================

#[test]
fn draw_failure_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    target.fail_draw_at = Some(2);
    let mut config = config(SystemKind::Mandelbrot);
    let path = dir.path().join("broken.png");

    let err = capture(&request(path.clone(), 40, 40, 16), &mut config, &mut target, &ReferenceQuad, &PngSink)
        .unwrap_err();

    assert!(matches!(err, CaptureError::Gpu(_)));
    assert!(!path.exists());
    assert!(!target.is_capturing());
    assert_eq!(
        config.program().bound_uniforms().get("tile_offset"),
        Some(&UniformValue::UVec2([0, 0]))
    );
}

#[test]
fn broken_program_fails_before_any_surface_work() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    let program = ReferenceProgram::with_sources(ShaderSources::from_strings(
        "quad",
        &format!("fn main() {{ {COMPILE_ERROR_TOKEN} }}"),
    ));
    let mut config = RenderConfig::for_system(program, SystemKind::Mandelbrot);
    let path = dir.path().join("never.png");

    let err = capture(&request(path.clone(), 16, 16, 8), &mut config, &mut target, &ReferenceQuad, &PngSink)
        .unwrap_err();

    assert!(matches!(err, CaptureError::Shader(ShaderError::FragmentCompile(_))));
    assert_eq!(target.allocations(), 0);
    assert!(!path.exists());
}

#[test]
fn invalid_requests_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    let mut config = config(SystemKind::Mandelbrot);

    let zero_width = capture(&request(dir.path().join("z.png"), 0, 10, 8), &mut config, &mut target, &ReferenceQuad, &PngSink);
    assert!(matches!(zero_width, Err(CaptureError::InvalidDimensions { .. })));

    let zero_tile = capture(&request(dir.path().join("z.png"), 10, 10, 0), &mut config, &mut target, &ReferenceQuad, &PngSink);
    assert!(matches!(zero_tile, Err(CaptureError::ZeroTileSize)));

    let huge = capture(
        &request(dir.path().join("z.png"), u64::from(u32::MAX) + 1, 10, 8),
        &mut config,
        &mut target,
        &ReferenceQuad,
        &PngSink,
    );
    assert!(matches!(huge, Err(CaptureError::TooLarge { .. })));
    assert_eq!(target.allocations(), 0);
}

// ============================================================================
// Progress and cancellation
// ============================================================================

#[test]
fn progress_is_reported_after_every_tile() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    let mut config = config(SystemKind::Mandelbrot);
    let mut seen: Vec<CaptureProgress> = Vec::new();

    capture_with(
        &request(dir.path().join("progress.png"), 30, 20, 10),
        &mut config,
        &mut target,
        &ReferenceQuad,
        &PngSink,
        &NeverCancel,
        |p| seen.push(*p),
    )
    .unwrap();

    let completed: Vec<usize> = seen.iter().map(|p| p.completed_tiles).collect();
    assert_eq!(completed, (1..=6).collect::<Vec<_>>());
    assert!(seen.last().unwrap().is_complete());
    assert_eq!(seen.last().unwrap().percentage(), 100.0);
}

#[test]
fn cancellation_stops_between_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let mut target = ReferenceTarget::new(64);
    let mut config = config(SystemKind::Mandelbrot);
    let checker = AtomicBoolChecker::default();
    let path = dir.path().join("cancelled.png");

    let err = capture_with(
        &request(path.clone(), 30, 20, 10),
        &mut config,
        &mut target,
        &ReferenceQuad,
        &PngSink,
        &checker,
        |p| {
            if p.completed_tiles == 2 {
                checker.cancel();
            }
        },
    )
    .unwrap_err();

    assert!(matches!(err, CaptureError::Cancelled { completed: 2, total: 6 }));
    assert_eq!(target.draws(), 2);
    assert!(!path.exists());
    assert!(!target.is_capturing());
}
