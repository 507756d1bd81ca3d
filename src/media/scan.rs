//! Directory enumeration and filename parsing.
//!
//! An input file is a regular file with an accepted extension. Its name must
//! encode the frame size as `<name>.<width>_<height>.<ext>`, for example
//! `street.1920_1080.yuv`. Files with another extension are ignored; files
//! with an accepted extension but a bad name are reported as skipped.

use crate::media::MediaError;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};

/// One input frame discovered by the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// File name of the PNG this frame becomes
    pub output_name: String,
}

impl FrameDescriptor {
    /// Bytes in one I420 frame of this size
    pub fn frame_size(&self) -> Option<usize> {
        crate::media::i420_frame_size(self.width, self.height)
    }
}

/// A file the scan rejected before it entered the pipeline.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: MediaError,
}

/// Result of scanning one directory.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Accepted frames, sorted by path
    pub frames: Vec<FrameDescriptor>,
    pub skipped: Vec<SkippedFile>,
}

/// Filename matcher for a fixed set of extensions.
#[derive(Debug, Clone)]
pub struct FrameScanner {
    pattern: Regex,
    extensions: Vec<String>,
}

impl FrameScanner {
    /// Build a scanner for the given extensions (without the dot).
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, MediaError> {
        let extensions: Vec<String> = extensions
            .iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let alternatives = extensions
            .iter()
            .map(|e| regex::escape(e))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!(r"^(.+)\.(\d+)_(\d+)\.(?:{alternatives})$"))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            pattern,
            extensions,
        })
    }

    /// Whether `path` has one of the accepted extensions
    pub fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|accepted| ext.eq_ignore_ascii_case(accepted))
            })
    }

    /// Parse the frame size out of a candidate's file name.
    pub fn parse(&self, path: &Path) -> Result<FrameDescriptor, MediaError> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let captures = self
            .pattern
            .captures(&file)
            .ok_or_else(|| MediaError::NameMismatch { file: file.clone() })?;

        let invalid = |width: u64, height: u64| MediaError::InvalidDimensions {
            file: file.clone(),
            width,
            height,
        };
        // Digits that overflow u64 are reported as the largest value
        let width: u64 = captures[2].parse().unwrap_or(u64::MAX);
        let height: u64 = captures[3].parse().unwrap_or(u64::MAX);
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(invalid(width, height));
        };
        // I420 chroma planes are subsampled 2x2
        if w == 0 || h == 0 || w % 2 != 0 || h % 2 != 0 {
            return Err(invalid(width, height));
        }
        if crate::media::i420_frame_size(w, h).is_none() {
            return Err(invalid(width, height));
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(FrameDescriptor {
            path: path.to_path_buf(),
            width: w,
            height: h,
            output_name: format!("{stem}.png"),
        })
    }

    /// Enumerate `dir` (non-recursive).
    ///
    /// Only failure to read the directory itself is an error. Unreadable
    /// entries are logged and ignored.
    pub fn scan(&self, dir: &Path) -> Result<ScanOutcome, MediaError> {
        let entries = std::fs::read_dir(dir).map_err(|e| MediaError::io(dir, e))?;

        let mut outcome = ScanOutcome::default();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !self.is_candidate(&path) {
                continue;
            }
            match self.parse(&path) {
                Ok(descriptor) => outcome.frames.push(descriptor),
                Err(error) => outcome.skipped.push(SkippedFile { path, error }),
            }
        }

        outcome.frames.sort_by(|a, b| a.path.cmp(&b.path));
        outcome.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(outcome)
    }
}
