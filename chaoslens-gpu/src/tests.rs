//! Tests against a real device; each one prints and returns when no GPU is present.

use std::sync::Arc;

use chaoslens_core::reference::{ReferenceProgram, ReferenceTarget};
use chaoslens_core::{
    capture, CaptureError, CaptureRequest, CaptureTarget, PngSink, RenderConfig, ShaderError,
    ShaderProgram, ShaderSources, SystemKind, SystemParams, Viewport,
};
use chaoslens_core::config::SupersamplingMode;

use crate::{FullscreenQuad, GpuAvailability, GpuContext, GpuTileSurface, UniformLayout, WgpuProgram};

fn context() -> Option<Arc<GpuContext>> {
    match pollster::block_on(GpuContext::try_init()) {
        GpuAvailability::Available(ctx) => Some(Arc::new(ctx)),
        GpuAvailability::Unavailable(reason) => {
            println!("Skipping test: no GPU available ({reason})");
            None
        }
    }
}

fn config(ctx: &Arc<GpuContext>, kind: SystemKind) -> RenderConfig<WgpuProgram> {
    let program = WgpuProgram::for_system(Arc::clone(ctx), kind).unwrap();
    let mut config = RenderConfig::new(program, chaoslens_core::ConfigParams::for_system(kind));
    config.program_mut().build().unwrap();
    config
}

/// Test that GPU initialization doesn't panic.
#[test]
fn gpu_init_does_not_panic() {
    pollster::block_on(async {
        match GpuContext::try_init().await {
            GpuAvailability::Available(ctx) => println!("GPU available: {}", ctx.adapter_info.name),
            GpuAvailability::Unavailable(reason) => println!("GPU unavailable: {reason}"),
        }
    });
}

#[test]
fn embedded_programs_build() {
    let Some(ctx) = context() else { return };
    for kind in [SystemKind::Mandelbrot, SystemKind::DoublePendulum] {
        let config = config(&ctx, kind);
        assert!(config.is_ready(), "{kind:?} failed to build");
    }
}

#[test]
fn fragment_errors_leave_program_not_ready() {
    let Some(ctx) = context() else { return };
    let sources = ShaderSources::from_strings(
        include_str!("shaders/fullscreen.wgsl"),
        "@fragment fn fs_main() -> @location(0) vec4<f32> { return undefined_thing; }",
    );
    let mut program = WgpuProgram::new(ctx, sources, UniformLayout::view());
    let err = program.build().unwrap_err();
    assert!(matches!(err, ShaderError::FragmentCompile(_)));
    assert!(!program.is_ready());
}

#[test]
fn recompile_keeps_uniforms() {
    let Some(ctx) = context() else { return };
    let mut config = config(&ctx, SystemKind::DoublePendulum);
    config.update(|p| {
        if let SystemParams::DoublePendulum(dp) = &mut p.system {
            dp.t_end = 7.5;
        }
        if let Some(ss) = &mut p.supersampling {
            ss.mode = SupersamplingMode::X8;
        }
    });
    assert!(config.needs_recompile());
    config.recompile().unwrap();
    assert!(config.is_ready());
    assert_eq!(config.program().uniform("t_end"), Some(&7.5f32.into()));

    // The fresh pipeline's buffer holds the replayed values, not zeros.
    let program = config.program();
    let bytes = program.read_uniform_buffer().unwrap();
    let f32_at = |name: &str| {
        let offset = program.layout().slot(name).unwrap().offset;
        f32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    };
    assert_eq!(f32_at("t_end"), 7.5);
    assert_eq!(f32_at("gravity"), 9.81);
}

#[test]
fn cloned_program_is_independent() {
    let Some(ctx) = context() else { return };
    let config = config(&ctx, SystemKind::Mandelbrot);
    let mut copy = config.clone();
    assert!(copy.is_ready());
    copy.program_mut().set_uniform("max_iterations", 17u32.into());
    assert_ne!(config.program().uniform("max_iterations"), Some(&17u32.into()));
}

#[test]
fn tile_size_above_device_limit_is_rejected() {
    let Some(ctx) = context() else { return };
    let mut surface = GpuTileSurface::new(Arc::clone(&ctx));
    let limit = surface.max_tile_dimension();
    assert!(matches!(
        surface.begin(limit.saturating_add(1)),
        Err(CaptureError::Gpu(_))
    ));
}

#[test]
fn gpu_tiles_match_untiled_capture() {
    let Some(ctx) = context() else { return };
    let dir = tempfile::tempdir().unwrap();
    let quad = FullscreenQuad::new(&ctx);
    let mut surface = GpuTileSurface::new(Arc::clone(&ctx));
    let viewport = Viewport::from_f64(800, 600, 3.0, -0.5, 0.0).unwrap();

    let mut run = |name: &str, tile: u32| {
        let mut config = config(&ctx, SystemKind::Mandelbrot);
        let request = CaptureRequest {
            path: dir.path().join(name),
            width: 300,
            height: 170,
            max_tile_size: tile,
            viewport: viewport.clone(),
        };
        let report = capture(&request, &mut config, &mut surface, &quad, &PngSink).unwrap();
        image::open(&report.path).unwrap().to_rgba8().into_raw()
    };

    let tiled = run("tiled.png", 64);
    let whole = run("whole.png", 512);
    assert_eq!(tiled.len(), 300 * 170 * 4);
    assert_eq!(tiled, whole);
}

#[test]
fn gpu_capture_matches_cpu_orientation() {
    let Some(ctx) = context() else { return };
    let dir = tempfile::tempdir().unwrap();
    let quad = FullscreenQuad::new(&ctx);
    let mut surface = GpuTileSurface::new(Arc::clone(&ctx));

    // Top rows (y near 1.3) escape quickly, bottom rows (y near 0.5) stay inside.
    let viewport = Viewport::from_f64(64, 64, 0.8, 0.0, 0.9).unwrap();
    let mut config = config(&ctx, SystemKind::Mandelbrot);
    let request = CaptureRequest {
        path: dir.path().join("orientation.png"),
        width: 64,
        height: 64,
        max_tile_size: 16,
        viewport: viewport.clone(),
    };
    let report = capture(&request, &mut config, &mut surface, &quad, &PngSink).unwrap();
    let image = image::open(&report.path).unwrap().to_rgba8();

    let mut cpu = RenderConfig::for_system(ReferenceProgram::new(), SystemKind::Mandelbrot);
    cpu.program_mut().build().unwrap();
    cpu.apply_view(&viewport);
    let frame = ReferenceTarget::render_frame(cpu.program(), 64, 64);

    // f32 and f64 iteration disagree only along the set boundary.
    let inside = |p: &[u8]| p[0] == 0 && p[1] == 0 && p[2] == 0;
    let mismatches = image
        .as_raw()
        .chunks(4)
        .zip(frame.chunks(4))
        .filter(|(gpu, cpu)| inside(gpu) != inside(cpu))
        .count();
    assert!(mismatches < 64 * 64 / 50, "{mismatches} pixels disagree");
}
