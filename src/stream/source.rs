//! Frame sources.

use crate::constants::stream::FRAME_EXTENSIONS;
use crate::error::{Error, Result};
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based position in the source.
    pub index: u64,
    /// Pixel data; annotation draws into it.
    pub image: RgbImage,
    /// File the frame came from, if any.
    pub origin: Option<PathBuf>,
}

impl Frame {
    /// A frame without a backing file.
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self {
            index,
            image,
            origin: None,
        }
    }

    /// Decode the image at `path` as frame `index`.
    pub fn load(index: u64, path: &Path) -> Result<Self> {
        let image = image::open(path)
            .map_err(|e| Error::FrameRead {
                path: path.to_path_buf(),
                source: e,
            })?
            .to_rgb8();
        Ok(Self {
            index,
            image,
            origin: Some(path.to_path_buf()),
        })
    }
}

/// Producer of frames for the stream processor.
pub trait FrameSource {
    /// Next frame, `Ok(None)` once exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Image files in a directory, read in lexical file-name order.
#[derive(Debug)]
pub struct DirectorySource {
    files: VecDeque<PathBuf>,
    produced: u64,
}

impl DirectorySource {
    /// List frame files in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        files.sort();

        debug!("Found {} frame file(s) in {}", files.len(), dir.display());
        Ok(Self {
            files: files.into(),
            produced: 0,
        })
    }

    /// Frames left to read.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };
        self.produced += 1;
        Frame::load(self.produced, &path).map(Some)
    }
}

/// Frames held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    images: VecDeque<RgbImage>,
    produced: u64,
}

impl MemorySource {
    /// Source yielding `images` in order.
    pub fn new(images: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            images: images.into_iter().collect(),
            produced: 0,
        }
    }

    /// Source yielding `count` blank frames of the given size.
    pub fn blank(count: usize, width: u32, height: u32) -> Self {
        Self::new((0..count).map(|_| RgbImage::new(width, height)))
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.images.pop_front().map(|image| {
            self.produced += 1;
            Frame::new(self.produced, image)
        }))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_source_lexical_order() {
        let dir = TempDir::new().unwrap();
        for name in ["b.png", "a.png", "c.jpg"] {
            RgbImage::new(4, 4).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 3);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert!(first.origin.unwrap().ends_with("a.png"));

        let second = source.next_frame().unwrap().unwrap();
        assert!(second.origin.unwrap().ends_with("b.png"));

        let third = source.next_frame().unwrap().unwrap();
        assert_eq!(third.index, 3);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_unreadable_frame_is_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();

        let mut source = DirectorySource::open(dir.path()).unwrap();
        assert!(matches!(source.next_frame(), Err(Error::FrameRead { .. })));
    }

    #[test]
    fn test_memory_source() {
        let mut source = MemorySource::blank(2, 2, 2);
        assert_eq!(source.next_frame().unwrap().unwrap().index, 1);
        assert_eq!(source.next_frame().unwrap().unwrap().index, 2);
        assert!(source.next_frame().unwrap().is_none());
    }
}
