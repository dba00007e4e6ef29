use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ColorType, ImageFormat};
use tempfile::NamedTempFile;

use crate::error::CaptureError;

/// Destination for a finished capture: row-major, top-row-first RGBA8.
pub trait ImageSink {
    fn write_rgba(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), CaptureError>;
}

/// Encodes PNG files, creating parent directories as needed.
///
/// The image is encoded into a temporary file beside the target and renamed
/// into place, so a failed encode or write leaves no file at `path`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngSink;

impl ImageSink for PngSink {
    fn write_rgba(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<(), CaptureError> {
        let encode_err = |reason: String| CaptureError::Encode {
            path: path.to_path_buf(),
            reason,
        };
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(encode_err(format!(
                "expected {expected} bytes of RGBA for {width}x{height}, got {}",
                pixels.len()
            )));
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source| CaptureError::Io {
            path: parent.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let mut file = tempfile::Builder::new()
            .prefix(".chaoslens-")
            .suffix(".png.part")
            .tempfile_in(parent)
            .map_err(io_err)?;
        write_png(&mut file, width, height, pixels).map_err(encode_err)?;

        file.persist(path).map_err(|e| CaptureError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

fn write_png(file: &mut NamedTempFile, width: u32, height: u32, pixels: &[u8]) -> Result<(), String> {
    let mut writer = BufWriter::new(file.as_file_mut());
    image::write_buffer_with_format(
        &mut writer,
        pixels,
        width,
        height,
        ColorType::Rgba8,
        ImageFormat::Png,
    )
    .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

/// First of `path`, `stem_1.ext`, `stem_2.ext`, ... that does not exist yet.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    (1u64..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{stem}_{n}.{ext}"),
                None => format!("{stem}_{n}"),
            };
            parent.join(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_path_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        assert_eq!(unique_path(&path), path);
    }

    #[test]
    fn existing_paths_get_numbered_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(unique_path(&path), dir.path().join("shot_1.png"));

        std::fs::write(dir.path().join("shot_1.png"), b"x").unwrap();
        assert_eq!(unique_path(&path), dir.path().join("shot_2.png"));
    }

    #[test]
    fn suffix_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture");
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(unique_path(&path), dir.path().join("capture_1"));
    }

    #[test]
    fn png_sink_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.png");
        let pixels = vec![255u8; 3 * 2 * 4];
        PngSink.write_rgba(&path, 3, 2, &pixels).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.as_raw(), &pixels);
    }

    #[test]
    fn failed_encode_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.png");
        let pixels = vec![0u8; 10];

        let err = PngSink.write_rgba(&path, 3, 2, &pixels).unwrap_err();

        assert!(matches!(err, CaptureError::Encode { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn successful_write_leaves_only_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        PngSink.write_rgba(&path, 2, 2, &[7u8; 16]).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.png")]);
    }
}
