// In: src/config.rs

//! The single source of truth for all chromapack configuration.
//!
//! `ChromaConfig` is created once at the application boundary (CLI flags or a
//! JSON file) and then passed down through the system as a shared, read-only
//! `Arc<ChromaConfig>`. Both pipeline orchestrators and the worker pools read
//! their geometry and concurrency budgets from it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ChromaError;

//==================================================================================
// I. The Unified ChromaConfig
//==================================================================================

/// The single, unified configuration for an encode or decode run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChromaConfig {
    /// Frame width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// **The size of each source read.** Every chunk becomes one worker task
    /// on the encode side.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    /// Number of worker threads executing chunk/frame transforms.
    /// `None` means the available hardware parallelism.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Upper bound on submitted-but-undelivered tasks before `submit` blocks.
    /// `None` means twice the worker count.
    #[serde(default)]
    pub max_pending_tasks: Option<usize>,

    /// Upper bound on frame writes queued at the rasterizer at once.
    /// `None` means the worker count.
    #[serde(default)]
    pub frame_write_concurrency: Option<usize>,

    /// Manhattan distance past which a decoded color is reported as off-palette.
    /// It is still resolved to its nearest entry.
    #[serde(default = "default_color_tolerance")]
    pub color_tolerance: u32,

    /// Prefix used to name decoded entries whose embedded name is empty.
    #[serde(default = "default_entry_name")]
    pub default_entry_name: String,

    /// Frames per second of a muxed video.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// The `ffmpeg` executable used to mux and demux video.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            chunk_size_bytes: default_chunk_size_bytes(),
            worker_threads: None,
            max_pending_tasks: None,
            frame_write_concurrency: None,
            color_tolerance: default_color_tolerance(),
            default_entry_name: default_entry_name(),
            frame_rate: default_frame_rate(),
            ffmpeg: default_ffmpeg(),
        }
    }
}

//==================================================================================
// II. Derived Values & Validation
//==================================================================================

impl ChromaConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChromaError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: ChromaConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no pipeline can run with.
    pub fn validate(&self) -> Result<(), ChromaError> {
        if self.width == 0 || self.height == 0 {
            return Err(ChromaError::InvalidConfig(format!(
                "frame geometry must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.chunk_size_bytes == 0 {
            return Err(ChromaError::InvalidConfig(
                "chunk_size_bytes must be at least 1".to_string(),
            ));
        }
        if self.frame_rate == 0 {
            return Err(ChromaError::InvalidConfig(
                "frame_rate must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("worker_threads", self.worker_threads),
            ("max_pending_tasks", self.max_pending_tasks),
            ("frame_write_concurrency", self.frame_write_concurrency),
        ] {
            if value == Some(0) {
                return Err(ChromaError::InvalidConfig(format!(
                    "{} must be at least 1 when set",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Colors per frame.
    pub fn capacity(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Payload bytes per frame (two nibbles, i.e. two colors, per byte).
    pub fn bytes_per_frame(&self) -> usize {
        self.capacity() / 2
    }

    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(available_parallelism)
    }

    pub fn effective_max_pending(&self) -> usize {
        self.max_pending_tasks
            .unwrap_or_else(|| self.effective_worker_threads() * 2)
    }

    pub fn effective_frame_write_concurrency(&self) -> usize {
        self.frame_write_concurrency
            .unwrap_or_else(|| self.effective_worker_threads())
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

/// 1 MiB, matching the read granularity of the encoder.
fn default_chunk_size_bytes() -> usize {
    1024 * 1024
}

fn default_color_tolerance() -> u32 {
    96
}

fn default_entry_name() -> String {
    "untitled".to_string()
}

fn default_frame_rate() -> u32 {
    30
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}
