//! Planar I420 frames and YUV to RGB conversion.
//!
//! Layout of one `W x H` frame: a full-resolution Y plane (`W*H` bytes)
//! followed by quarter-resolution U and V planes (`W/2 * H/2` bytes each).
//! Conversion uses the BT.601 limited-range integer approximation.

use crate::media::{FrameDescriptor, MediaError};
use std::fs::File;
use std::io::Read;

/// Bytes in one I420 frame, or `None` when the size cannot be addressed.
pub fn i420_frame_size(width: u32, height: u32) -> Option<usize> {
    let size = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)?
        / 2;
    // Vec allocations are capped at isize::MAX bytes
    (size <= isize::MAX as usize).then_some(size)
}

/// One raw frame read from disk.
#[derive(Debug, Clone)]
pub struct YuvFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub output_name: String,
}

impl YuvFrame {
    /// Read the first frame of the file described by `descriptor`.
    ///
    /// Trailing bytes beyond one frame are ignored. The file length is checked
    /// before anything is allocated, so a name that declares a huge frame
    /// costs nothing.
    pub fn read(descriptor: &FrameDescriptor) -> Result<Self, MediaError> {
        let expected = descriptor
            .frame_size()
            .ok_or_else(|| MediaError::InvalidDimensions {
                file: descriptor.path.display().to_string(),
                width: descriptor.width.into(),
                height: descriptor.height.into(),
            })?;
        let file =
            File::open(&descriptor.path).map_err(|e| MediaError::io(&descriptor.path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| MediaError::io(&descriptor.path, e))?
            .len();
        if file_len < expected as u64 {
            return Err(MediaError::ShortFrame {
                path: descriptor.path.clone(),
                expected,
                actual: usize::try_from(file_len).unwrap_or(usize::MAX),
            });
        }

        let mut data = Vec::with_capacity(expected);
        file.take(expected as u64)
            .read_to_end(&mut data)
            .map_err(|e| MediaError::io(&descriptor.path, e))?;

        if data.len() < expected {
            return Err(MediaError::ShortFrame {
                path: descriptor.path.clone(),
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width: descriptor.width,
            height: descriptor.height,
            data,
            output_name: descriptor.output_name.clone(),
        })
    }

    /// Wrap an in-memory buffer, checking its length.
    pub fn from_bytes(
        width: u32,
        height: u32,
        data: Vec<u8>,
        output_name: impl Into<String>,
    ) -> Result<Self, MediaError> {
        if i420_frame_size(width, height) != Some(data.len()) {
            return Err(MediaError::BufferSize {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            output_name: output_name.into(),
        })
    }

    /// Convert to packed 8-bit RGB.
    pub fn to_rgb(&self) -> Result<RgbFrame, MediaError> {
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(MediaError::InvalidDimensions {
                file: self.output_name.clone(),
                width: self.width.into(),
                height: self.height.into(),
            });
        }
        if i420_frame_size(self.width, self.height) != Some(self.data.len()) {
            return Err(MediaError::BufferSize {
                width: self.width,
                height: self.height,
                actual: self.data.len(),
            });
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let (cw, ch) = (w / 2, h / 2);
        let (y_plane, chroma) = self.data.split_at(w * h);
        let (u_plane, v_plane) = chroma.split_at(cw * ch);

        let mut pixels = Vec::with_capacity(w * h * 3);
        for row in 0..h {
            let y_row = &y_plane[row * w..(row + 1) * w];
            let c_offset = (row / 2) * cw;
            for (col, &y) in y_row.iter().enumerate() {
                let u = u_plane[c_offset + col / 2];
                let v = v_plane[c_offset + col / 2];
                pixels.extend_from_slice(&yuv_to_rgb(y, u, v));
            }
        }

        Ok(RgbFrame {
            width: self.width,
            height: self.height,
            pixels,
            output_name: self.output_name.clone(),
        })
    }
}

/// A decoded frame ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    /// Packed `RGBRGB...`, row-major
    pub pixels: Vec<u8>,
    pub output_name: String,
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// BT.601 limited-range YUV to RGB for a single sample.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        clamp_u8((298 * c + 409 * e + 128) >> 8),
        clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp_u8((298 * c + 516 * d + 128) >> 8),
    ]
}
