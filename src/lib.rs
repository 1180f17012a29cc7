//! This file is the root of the `chromapack` Rust crate.
//!
//! chromapack stores arbitrary files as a sequence of fixed-size color frames:
//! every byte becomes two palette colors, and each file is wrapped in sentinel
//! colors that carry its name and mark its end. Frames are written as PNG
//! images or muxed into a lossless video through `ffmpeg`. Decoding tolerates
//! the small color drift lossy codecs introduce by matching each pixel to its
//! nearest palette entry.
//!
//! Its responsibilities are strictly limited to declaring the top-level modules
//! and re-exporting the types most callers need.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod chunk_pipeline;
pub mod codec;
pub mod config;
pub mod error;
pub mod kernels;
pub mod progress;

//==================================================================================
// 2. Public Re-exports
//==================================================================================
pub use bridge::{
    demux, DirectoryWriter, EntrySink, FrameSink, FrameSource, MemoryFrameStore, PngRasterizer,
    RasterFrame, VideoMuxer,
};
pub use chunk_pipeline::{DecodeReport, Decoder, EncodeReport, Encoder, WorkerPool};
pub use codec::{Color, DecodedEntry, Symbol};
pub use config::ChromaConfig;
pub use error::{ChromaError, Stage};
pub use progress::{LogProgress, NoProgress, ProgressObserver};
