//! Test data builders for synthetic I420 frames

use std::path::{Path, PathBuf};

/// Builder for raw I420 frame files
pub struct FrameFileBuilder {
    stem: String,
    width: u32,
    height: u32,
    luma: u8,
    u: u8,
    v: u8,
    truncate_to: Option<usize>,
}

impl FrameFileBuilder {
    pub fn new(stem: &str, width: u32, height: u32) -> Self {
        Self {
            stem: stem.to_string(),
            width,
            height,
            luma: 126,
            u: 128,
            v: 128,
            truncate_to: None,
        }
    }

    pub fn color(mut self, y: u8, u: u8, v: u8) -> Self {
        self.luma = y;
        self.u = u;
        self.v = v;
        self
    }

    /// Keep only the first `len` bytes of the frame
    pub fn truncated(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}_{}.yuv", self.stem, self.width, self.height)
    }

    pub fn bytes(&self) -> Vec<u8> {
        let luma = (self.width * self.height) as usize;
        let chroma = luma / 4;
        let mut data = vec![self.luma; luma];
        data.extend(std::iter::repeat(self.u).take(chroma));
        data.extend(std::iter::repeat(self.v).take(chroma));
        if let Some(len) = self.truncate_to {
            data.truncate(len);
        }
        data
    }

    /// Write into `dir` and return the path
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.bytes()).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder() {
        let builder = FrameFileBuilder::new("clip", 4, 2);
        assert_eq!(builder.file_name(), "clip.4_2.yuv");
        assert_eq!(builder.bytes().len(), 12);
        assert_eq!(builder.truncated(5).bytes().len(), 5);
    }
}
