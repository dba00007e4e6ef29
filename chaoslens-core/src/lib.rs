pub mod app_state;
pub mod bigfloat;
pub mod cancellation;
pub mod capture;
pub mod config;
pub mod coords;
pub mod error;
pub mod precision;
pub mod progress;
pub mod reference;
pub mod saved_view;
pub mod settings;
pub mod shader;
pub mod sink;
pub mod tiles;
pub mod uniform;
pub mod viewport;

pub use app_state::{AppState, ZoomMotion};
pub use bigfloat::BigFloat;
pub use cancellation::{AtomicBoolChecker, CancellationChecker, NeverCancel};
pub use capture::{
    capture, capture_with, default_capture_path, CaptureReport, CaptureRequest, CaptureTarget,
    DEFAULT_MAX_TILE_SIZE,
};
pub use config::{ConfigParams, RenderConfig, SystemKind, SystemParams};
pub use coords::{
    frag_to_model, pixel_to_model, sample_to_model, tile_sample_to_model, zoom_at, FocusMode,
};
pub use error::{CaptureError, CoreError, ShaderError};
pub use precision::precision_bits_for_zoom;
pub use progress::CaptureProgress;
pub use saved_view::{SavedView, SavedViews};
pub use settings::AppSettings;
pub use shader::{ProgramState, ShaderProgram, ShaderSources, SourceLoader};
pub use sink::{ImageSink, PngSink};
pub use tiles::{TileGrid, TileRect};
pub use uniform::{UniformTable, UniformValue};
pub use viewport::Viewport;
