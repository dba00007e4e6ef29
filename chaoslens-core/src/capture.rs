//! Tiled Capture Engine.
//!
//! Renders an image of arbitrary size by drawing it tile by tile into one
//! reusable offscreen surface, reading each tile back and compositing it,
//! flipped, into a top-down RGBA buffer. Nothing is written unless every tile
//! succeeds.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cancellation::{CancellationChecker, NeverCancel};
use crate::config::RenderConfig;
use crate::error::{CaptureError, ShaderError};
use crate::progress::CaptureProgress;
use crate::shader::ShaderProgram;
use crate::sink::{unique_path, ImageSink};
use crate::tiles::{composite_tile_flipped, TileGrid, TileRect};
use crate::Viewport;

/// Default edge length of the reusable tile surface.
pub const DEFAULT_MAX_TILE_SIZE: u32 = 2048;

/// Largest dimension the encoder's signed pixel index can address.
pub const MAX_IMAGE_DIMENSION: u64 = i32::MAX as u64;

/// A rendering backend able to draw tiles into a reusable offscreen surface.
///
/// `begin` allocates the surface and remembers whatever target was active;
/// `end` releases it and restores that target. `end` is called on every path
/// out of a capture that reached `begin`.
pub trait CaptureTarget<P: ShaderProgram> {
    /// Opaque drawable geometry passed through to each draw.
    type Quad;

    /// Largest texture edge the backend supports.
    fn max_tile_dimension(&self) -> u32;

    fn begin(&mut self, tile_size: u32) -> Result<(), CaptureError>;

    /// Restrict drawing to the lower-left `width x height` region, clear, draw
    /// the quad with `program` and block until rendering completes.
    fn draw_tile(
        &mut self,
        program: &mut P,
        quad: &Self::Quad,
        width: u32,
        height: u32,
    ) -> Result<(), CaptureError>;

    /// Read `width * height * 4` bytes back, bottom row first.
    fn read_tile(&mut self, width: u32, height: u32, out: &mut [u8]) -> Result<(), CaptureError>;

    fn end(&mut self);
}

/// What to capture and where.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub path: PathBuf,
    pub width: u64,
    pub height: u64,
    pub max_tile_size: u32,
    /// Model-space view; rendered at `width x height` with the same center and zoom.
    pub viewport: Viewport,
}

/// Summary of a successful capture.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureReport {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tiles: usize,
    pub elapsed: Duration,
}

fn validate(request: &CaptureRequest) -> Result<(u32, u32), CaptureError> {
    let (width, height) = (request.width, request.height);
    if width == 0 || height == 0 {
        return Err(CaptureError::InvalidDimensions { width, height });
    }
    if request.max_tile_size == 0 {
        return Err(CaptureError::ZeroTileSize);
    }
    let too_large = CaptureError::TooLarge { width, height };
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(too_large);
    }
    width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(4))
        .filter(|bytes| usize::try_from(*bytes).is_ok())
        .ok_or(too_large)?;
    Ok((width as u32, height as u32))
}

fn allocate(what: &'static str, bytes: usize) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(bytes).map_err(|_| {
        log::error!("Out of memory allocating {} bytes for {}", bytes, what);
        CaptureError::OutOfMemory { what, bytes }
    })?;
    buffer.resize(bytes, 0);
    Ok(buffer)
}

/// Capture with no cancellation and no progress callback.
pub fn capture<P, T, S>(
    request: &CaptureRequest,
    config: &mut RenderConfig<P>,
    target: &mut T,
    quad: &T::Quad,
    sink: &S,
) -> Result<CaptureReport, CaptureError>
where
    P: ShaderProgram,
    T: CaptureTarget<P>,
    S: ImageSink,
{
    capture_with(request, config, target, quad, sink, &NeverCancel, |_| {})
}

/// Capture, checking `cancel` between tiles and reporting progress after each.
pub fn capture_with<P, T, S, C>(
    request: &CaptureRequest,
    config: &mut RenderConfig<P>,
    target: &mut T,
    quad: &T::Quad,
    sink: &S,
    cancel: &C,
    mut on_progress: impl FnMut(&CaptureProgress),
) -> Result<CaptureReport, CaptureError>
where
    P: ShaderProgram,
    T: CaptureTarget<P>,
    S: ImageSink,
    C: CancellationChecker,
{
    let started = Instant::now();
    let (width, height) = validate(request)?;

    let max_dimension = target.max_tile_dimension();
    let tile_size = if request.max_tile_size > max_dimension {
        log::debug!(
            "tile size {} exceeds the backend maximum, clamping to {}",
            request.max_tile_size,
            max_dimension
        );
        max_dimension
    } else {
        request.max_tile_size
    };

    let path = unique_path(&request.path);
    log::info!(
        "Taking screenshot {} ({}x{}, tiles of {})",
        path.display(),
        width,
        height,
        tile_size
    );

    let viewport = request
        .viewport
        .with_window_size(width, height)
        .map_err(|_| CaptureError::InvalidDimensions {
            width: request.width,
            height: request.height,
        })?;
    config.apply_view(&viewport);
    if let Err(e) = config.recompile_if_needed() {
        log::error!("Screenshot aborted, shader program unusable: {}", e);
        return Err(e.into());
    }
    if !config.is_ready() {
        return Err(ShaderError::NotReady.into());
    }

    let grid = TileGrid::new(width, height, tile_size)?;
    let mut image = allocate("output image", width as usize * height as usize * 4)?;
    let mut tile_buffer = allocate("tile readback", tile_size as usize * tile_size as usize * 4)?;

    target.begin(tile_size)?;
    let result = render_tiles(
        &grid,
        config,
        target,
        quad,
        &mut image,
        &mut tile_buffer,
        cancel,
        started,
        &mut on_progress,
    );
    target.end();
    config.set_tile_offset((0, 0));

    if let Err(e) = result {
        log::error!("Screenshot {} failed: {}", path.display(), e);
        return Err(e);
    }
    drop(tile_buffer);

    log::info!("Saving screenshot to {}", path.display());
    if let Err(e) = sink.write_rgba(&path, width, height, &image) {
        log::error!("Failed to save screenshot {}: {}", path.display(), e);
        return Err(e);
    }
    let elapsed = started.elapsed();
    log::info!(
        "Saved screenshot {} in {:.2}s",
        path.display(),
        elapsed.as_secs_f64()
    );

    Ok(CaptureReport {
        path,
        width,
        height,
        tile_size,
        tiles: grid.len(),
        elapsed,
    })
}

#[allow(clippy::too_many_arguments)]
fn render_tiles<P, T, C>(
    grid: &TileGrid,
    config: &mut RenderConfig<P>,
    target: &mut T,
    quad: &T::Quad,
    image: &mut [u8],
    tile_buffer: &mut [u8],
    cancel: &C,
    started: Instant,
    on_progress: &mut impl FnMut(&CaptureProgress),
) -> Result<(), CaptureError>
where
    P: ShaderProgram,
    T: CaptureTarget<P>,
    C: CancellationChecker,
{
    let mut progress = CaptureProgress::new(grid.len());

    for tile in grid.iter() {
        if cancel.is_cancelled() {
            return Err(CaptureError::Cancelled {
                completed: progress.completed_tiles,
                total: progress.total_tiles,
            });
        }

        render_tile(&tile, config, target, quad, &mut tile_buffer[..tile.byte_len()])?;
        composite_tile_flipped(
            image,
            grid.width(),
            grid.height(),
            &tile,
            &tile_buffer[..tile.byte_len()],
        );

        progress.completed_tiles += 1;
        progress.elapsed = started.elapsed();
        log::info!(
            "Processed {}/{} tiles",
            progress.completed_tiles,
            progress.total_tiles
        );
        on_progress(&progress);
    }
    Ok(())
}

fn render_tile<P, T>(
    tile: &TileRect,
    config: &mut RenderConfig<P>,
    target: &mut T,
    quad: &T::Quad,
    out: &mut [u8],
) -> Result<(), CaptureError>
where
    P: ShaderProgram,
    T: CaptureTarget<P>,
{
    config.set_tile_offset(tile.offset());
    target.draw_tile(config.program_mut(), quad, tile.width, tile.height)?;
    target.read_tile(tile.width, tile.height, out)
}

/// Default output path: `<dir>/<name>_<unix seconds>.png`.
pub fn default_capture_path(dir: &Path, name: &str) -> PathBuf {
    let seconds = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    dir.join(format!("{slug}_{seconds}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u64, height: u64, tile: u32) -> CaptureRequest {
        CaptureRequest {
            path: PathBuf::from("unused.png"),
            width,
            height,
            max_tile_size: tile,
            viewport: Viewport::from_f64(100, 100, 3.5, 0.0, 0.0).unwrap(),
        }
    }

    #[test]
    fn validation_rejects_zero_dimensions() {
        assert!(matches!(
            validate(&request(0, 10, 4)),
            Err(CaptureError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            validate(&request(10, 0, 4)),
            Err(CaptureError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn validation_rejects_zero_tile_size() {
        assert!(matches!(validate(&request(10, 10, 0)), Err(CaptureError::ZeroTileSize)));
    }

    #[test]
    fn validation_rejects_dimensions_beyond_i32() {
        assert!(matches!(
            validate(&request(MAX_IMAGE_DIMENSION + 1, 1, 4)),
            Err(CaptureError::TooLarge { .. })
        ));
    }

    #[test]
    fn validation_accepts_large_but_addressable_sizes() {
        assert_eq!(validate(&request(20_000, 20_000, 2048)).unwrap(), (20_000, 20_000));
    }

    #[test]
    fn default_path_uses_slug() {
        let path = default_capture_path(Path::new("shots"), "Double Pendulum");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("double_pendulum_"), "{name}");
        assert!(name.ends_with(".png"));
    }
}
