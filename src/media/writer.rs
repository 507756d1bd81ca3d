//! PNG output.

use crate::media::{MediaError, RgbFrame};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

/// Writes frames as `<output_dir>/<output_name>`.
#[derive(Debug, Clone)]
pub struct PngWriter {
    output_dir: PathBuf,
}

impl PngWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> Result<(), MediaError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| MediaError::io(&self.output_dir, e))
    }

    pub fn output_path(&self, frame: &RgbFrame) -> PathBuf {
        self.output_dir.join(&frame.output_name)
    }

    /// Encode and write one frame. Returns the written path.
    pub fn write(&self, frame: RgbFrame) -> Result<PathBuf, MediaError> {
        let path = self.output_path(&frame);
        let (width, height, actual) = (frame.width, frame.height, frame.pixels.len());
        let image = RgbImage::from_raw(width, height, frame.pixels).ok_or(
            MediaError::BufferSize {
                width,
                height,
                actual,
            },
        )?;
        image.save_with_format(&path, ImageFormat::Png)?;
        tracing::trace!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn frame(name: &str) -> RgbFrame {
        RgbFrame {
            width: 2,
            height: 2,
            pixels: vec![
                255, 0, 0, 0, 255, 0, //
                0, 0, 255, 255, 255, 255,
            ],
            output_name: name.to_string(),
        }
    }

    #[test]
    fn test_write_png() {
        let dir = tempdir().unwrap();
        let writer = PngWriter::new(dir.path().join("pngs"));
        writer.ensure_output_dir().unwrap();

        let path = writer.write(frame("clip.2_2.png")).unwrap();
        assert_eq!(path, dir.path().join("pngs").join("clip.2_2.png"));

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_write_rejects_wrong_buffer() {
        let dir = tempdir().unwrap();
        let writer = PngWriter::new(dir.path());
        let mut bad = frame("bad.png");
        bad.pixels.truncate(5);
        assert!(matches!(
            writer.write(bad),
            Err(MediaError::BufferSize { actual: 5, .. })
        ));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let writer = PngWriter::new(dir.path().join("absent"));
        let err = writer.write(frame("x.png")).unwrap_err();
        assert!(matches!(err, MediaError::Encode(_)));
    }
}
