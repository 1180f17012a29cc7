// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the boundary between the pure pipeline engine and the outside
// world: the filesystem on the way in, image files on the way out, and back.
// The engine only ever talks to the traits defined here.
//
// Data Flow (Encode):
//
//   1. [walk::list_files]          -> Ordered source files and their entry names
//         |
//         `-> bytes read by `chunk_pipeline::Encoder`
//
//   2. [raster::FrameSink]          -> Receives each full `RasterFrame`
//         |
//         `-> `PngRasterizer` writes `N.png`; `MemoryFrameStore` keeps it;
//             `video::VideoMuxer` pipes it into `ffmpeg` in index order
//
//
// Data Flow (Decode):
//
//   0. [video::demux]               -> (optional) splits a video into `N.png`
//
//   1. [raster::FrameSource]        -> Yields frames by 0-based stream position
//         |
//         `-> symbols resolved and reassembled by `chunk_pipeline::Decoder`
//
//   2. [writer::EntrySink]          -> Receives each reconstructed entry
//         |
//         `-> `DirectoryWriter` recreates the file tree
//
// The stateless API wraps both directions for callers that hold everything in
// memory.
// ====================================================================================
pub mod raster;
pub mod stateless_api;
pub mod video;
pub mod walk;
pub mod writer;

pub use raster::{FrameSink, FrameSource, MemoryFrameStore, PngRasterizer, RasterFrame};
pub use stateless_api::{decode_frames_to_entries, encode_entries_to_frames};
pub use video::{demux, VideoMuxer};
pub use walk::{entry_name, list_files};
pub use writer::{DirectoryWriter, EntrySink};
