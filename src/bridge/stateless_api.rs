// In: src/bridge/stateless_api.rs

use std::sync::Arc;

use crate::bridge::raster::{MemoryFrameStore, RasterFrame};
use crate::chunk_pipeline::orchestrator::{Decoder, Encoder};
use crate::codec::framer::DecodedEntry;
use crate::config::ChromaConfig;
use crate::error::ChromaError;

/// Encodes in-memory `(name, bytes)` entries into frames.
pub fn encode_entries_to_frames(
    entries: &[(&str, &[u8])],
    config: &ChromaConfig,
) -> Result<Vec<RasterFrame>, ChromaError> {
    let store = Arc::new(MemoryFrameStore::new());
    let mut encoder = Encoder::new(Arc::new(config.clone()), store.clone())?;
    for (name, data) in entries {
        encoder.encode_entry(name, *data)?;
    }
    encoder.finish()?;
    store.frames()
}

/// Decodes frames held in memory back into entries, in stream order.
pub fn decode_frames_to_entries(
    frames: Vec<RasterFrame>,
    config: &ChromaConfig,
) -> Result<Vec<DecodedEntry>, ChromaError> {
    let source = Arc::new(MemoryFrameStore::from_frames(frames));
    let mut entries: Vec<DecodedEntry> = Vec::new();
    Decoder::new(Arc::new(config.clone()), source)?.decode_into(&mut entries)?;
    Ok(entries)
}
