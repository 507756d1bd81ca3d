//! Raw YUV frames in, PNG files out.
//!
//! These are the collaborators the binary plugs into the generic pipeline:
//!
//! - [`scan`] enumerates `<stem>.<W>_<H>.yuv` files and parses their size
//! - [`frame`] reads one planar I420 frame and converts it to RGB
//! - [`writer`] encodes an RGB frame as `<stem>.png`
//!
//! Nothing here knows about queues or threads.

pub mod frame;
pub mod scan;
pub mod writer;

pub use frame::{i420_frame_size, RgbFrame, YuvFrame};
pub use scan::{FrameDescriptor, FrameScanner, ScanOutcome, SkippedFile};
pub use writer::PngWriter;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from scanning, reading, converting or writing frames
#[derive(Error, Debug)]
pub enum MediaError {
    /// The filename does not encode `<W>_<H>` before the extension
    #[error("{file}: name does not match <name>.<width>_<height>.<ext>")]
    NameMismatch { file: String },

    /// The encoded dimensions cannot describe an I420 frame
    #[error("{file}: invalid frame size {width}x{height}")]
    InvalidDimensions {
        file: String,
        width: u64,
        height: u64,
    },

    /// The file holds less than one full frame
    #[error("{path}: expected {expected} bytes for one frame, found {actual}")]
    ShortFrame {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// A pixel buffer does not match its declared dimensions
    #[error("pixel buffer of {actual} bytes does not fit {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        actual: usize,
    },

    /// Filesystem error on a specific path
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The accepted-extension list produced an unusable pattern
    #[error("invalid filename pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// PNG encoding or file write failure
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl MediaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MediaError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error comes from filename parsing during the scan
    pub fn is_scan_error(&self) -> bool {
        matches!(
            self,
            MediaError::NameMismatch { .. } | MediaError::InvalidDimensions { .. }
        )
    }
}
