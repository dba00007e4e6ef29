//! Screenshot from the application state through the GPU backend.

use std::sync::Arc;

use chaoslens_core::{
    AppSettings, AppState, NeverCancel, PngSink, ShaderProgram, SystemKind, UniformValue,
};
use chaoslens_gpu::{FullscreenQuad, GpuAvailability, GpuContext, GpuTileSurface, WgpuProgram};

#[test]
fn screenshot_leaves_live_program_untouched() {
    let GpuAvailability::Available(ctx) = pollster::block_on(GpuContext::try_init()) else {
        println!("Skipping test: no GPU available");
        return;
    };
    let ctx = Arc::new(ctx);
    let dir = tempfile::tempdir().unwrap();

    let settings = AppSettings {
        window_width: 320,
        window_height: 200,
        screenshot_width: 150,
        screenshot_height: 90,
        max_tile_size: 64,
        screenshot_dir: dir.path().to_path_buf(),
        system: SystemKind::DoublePendulum,
        ..AppSettings::default()
    };
    let program = WgpuProgram::for_system(Arc::clone(&ctx), SystemKind::DoublePendulum).unwrap();
    let mut state = AppState::new(settings, program).unwrap();
    assert!(state.live().is_ready());

    let quad = FullscreenQuad::new(&ctx);
    let mut surface = GpuTileSurface::new(Arc::clone(&ctx));
    let request = state.screenshot_request(None);
    let report = state
        .take_screenshot(&request, &mut surface, &quad, &PngSink, &NeverCancel, |_| {})
        .unwrap();

    assert!(report.path.starts_with(dir.path()));
    assert_eq!(report.tiles, 3 * 2);
    let image = image::open(&report.path).unwrap();
    assert_eq!((image.width(), image.height()), (150, 90));

    // The screenshot program got the capture size; the live one kept the window.
    assert_eq!(
        state.live().program().uniform("window_size"),
        Some(&UniformValue::UVec2([320, 200]))
    );
    let shot = state.screenshot_config().unwrap();
    assert_eq!(
        shot.program().uniform("window_size"),
        Some(&UniformValue::UVec2([150, 90]))
    );
    assert_eq!(shot.program().get_define("SUPER_SAMPLING"), Some("32"));
}
