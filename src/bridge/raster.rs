// In: src/bridge/raster.rs

//! The rasterizer boundary: where frames leave the pipeline as images and come
//! back in as color arrays.
//!
//! `FrameSink` and `FrameSource` are the collaborator contracts. Both are
//! `Send + Sync` because the pipelines call them from worker tasks.
//! `PngRasterizer` stores one `N.png` per frame (1-based, numeric order);
//! `MemoryFrameStore` keeps frames in memory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::codec::palette::Color;
use crate::error::ChromaError;

//==================================================================================
// 1. Frame Type & Collaborator Contracts
//==================================================================================

/// One frame as the rasterizer sees it: a `width * height` grid in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub colors: Vec<Color>,
}

impl RasterFrame {
    pub fn new(width: u32, height: u32, colors: Vec<Color>) -> Self {
        Self {
            width,
            height,
            colors,
        }
    }

    pub fn capacity(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Checks that the grid is complete.
    pub fn validate(&self) -> Result<(), ChromaError> {
        if self.colors.len() != self.capacity() {
            return Err(ChromaError::SourceUnavailable(format!(
                "frame of {}x{} carries {} colors, expected {}",
                self.width,
                self.height,
                self.colors.len(),
                self.capacity()
            )));
        }
        Ok(())
    }

    /// The frame as packed RGB8 bytes.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}

/// Encode-side collaborator: persists one drained frame. Frames may arrive out
/// of index order from concurrent writers.
pub trait FrameSink: Send + Sync {
    fn write_frame(&self, index: u64, frame: &RasterFrame) -> Result<(), ChromaError>;

    /// Called once after the last frame has been written.
    fn finish(&self) -> Result<(), ChromaError> {
        Ok(())
    }
}

/// Decode-side collaborator: yields frames by their 0-based stream position.
pub trait FrameSource: Send + Sync {
    fn frame_count(&self) -> Result<usize, ChromaError>;
    fn read_frame(&self, index: usize) -> Result<RasterFrame, ChromaError>;
}

//==================================================================================
// 2. PNG Directory Rasterizer
//==================================================================================

/// A directory of `1.png`, `2.png`, … holding one frame each.
#[derive(Debug, Clone)]
pub struct PngRasterizer {
    dir: PathBuf,
    /// Frame files in stream order. Only populated by `open`.
    frames: Vec<PathBuf>,
}

impl PngRasterizer {
    /// Prepares `dir` for writing, creating it if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, ChromaError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            frames: Vec::new(),
        })
    }

    /// Scans `dir` for numerically named PNG frames, ordered by their number.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ChromaError> {
        let dir = dir.as_ref().to_path_buf();
        let listing = fs::read_dir(&dir).map_err(|e| {
            ChromaError::SourceUnavailable(format!("cannot read frame directory {}: {}", dir.display(), e))
        })?;

        let mut numbered = Vec::new();
        for entry in listing {
            let path = entry?.path();
            let is_png = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false);
            let number = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok());
            match (is_png, number) {
                (true, Some(number)) => numbered.push((number, path)),
                _ => log::debug!("Ignoring non-frame file {}", path.display()),
            }
        }
        numbered.sort_by_key(|(number, _)| *number);

        log::info!("Found {} frame images in {}", numbered.len(), dir.display());
        Ok(Self {
            dir,
            frames: numbered.into_iter().map(|(_, path)| path).collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a frame index is written to.
    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}.png", index + 1))
    }
}

impl FrameSink for PngRasterizer {
    fn write_frame(&self, index: u64, frame: &RasterFrame) -> Result<(), ChromaError> {
        frame.validate()?;
        let path = self.frame_path(index);
        let file = File::create(&path).map_err(|e| {
            ChromaError::SourceUnavailable(format!("cannot create {}: {}", path.display(), e))
        })?;

        let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(frame.as_rgb_bytes())?;
        writer.finish()?;

        crate::log_metric!("event" = "frame_written", "frame" = index, "path" = path.display());
        Ok(())
    }
}

impl FrameSource for PngRasterizer {
    fn frame_count(&self) -> Result<usize, ChromaError> {
        Ok(self.frames.len())
    }

    fn read_frame(&self, index: usize) -> Result<RasterFrame, ChromaError> {
        let path = self.frames.get(index).ok_or_else(|| {
            ChromaError::SourceUnavailable(format!("no frame at index {}", index))
        })?;
        let file = File::open(path).map_err(|e| {
            ChromaError::SourceUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        let bytes = &buf[..info.buffer_size()];

        let colors: Vec<Color> = match info.color_type {
            png::ColorType::Rgb => bytes
                .chunks_exact(3)
                .map(|p| Color::new(p[0], p[1], p[2]))
                .collect(),
            png::ColorType::Rgba => bytes
                .chunks_exact(4)
                .map(|p| Color::new(p[0], p[1], p[2]))
                .collect(),
            png::ColorType::Grayscale => bytes.iter().map(|&g| Color::new(g, g, g)).collect(),
            png::ColorType::GrayscaleAlpha => bytes
                .chunks_exact(2)
                .map(|p| Color::new(p[0], p[0], p[0]))
                .collect(),
            png::ColorType::Indexed => {
                return Err(ChromaError::SourceUnavailable(format!(
                    "{} is palette-indexed and could not be expanded",
                    path.display()
                )))
            }
        };

        let frame = RasterFrame::new(info.width, info.height, colors);
        frame.validate()?;
        Ok(frame)
    }
}

//==================================================================================
// 3. In-Memory Store
//==================================================================================

/// Keeps every written frame in memory, keyed by frame index. Serves as both
/// sink and source, which makes it the natural test double. Reads look frames
/// up by that index, so a stream with a missing index fails to read there.
#[derive(Debug, Default)]
pub struct MemoryFrameStore {
    frames: Mutex<BTreeMap<u64, RasterFrame>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<RasterFrame>) -> Self {
        let map = frames
            .into_iter()
            .enumerate()
            .map(|(i, frame)| (i as u64, frame))
            .collect();
        Self {
            frames: Mutex::new(map),
        }
    }

    /// All frames in index order.
    pub fn frames(&self) -> Result<Vec<RasterFrame>, ChromaError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, ChromaError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ChromaError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, RasterFrame>>, ChromaError> {
        self.frames
            .lock()
            .map_err(|_| ChromaError::InternalError("frame store lock poisoned".to_string()))
    }
}

impl FrameSink for MemoryFrameStore {
    fn write_frame(&self, index: u64, frame: &RasterFrame) -> Result<(), ChromaError> {
        frame.validate()?;
        self.lock()?.insert(index, frame.clone());
        Ok(())
    }
}

impl FrameSource for MemoryFrameStore {
    fn frame_count(&self) -> Result<usize, ChromaError> {
        Ok(self.lock()?.len())
    }

    fn read_frame(&self, index: usize) -> Result<RasterFrame, ChromaError> {
        self.lock()?
            .get(&(index as u64))
            .cloned()
            .ok_or_else(|| ChromaError::SourceUnavailable(format!("no frame at index {}", index)))
    }
}
