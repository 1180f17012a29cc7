// In: src/chunk_pipeline/orchestrator/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Pipeline Coordinators
// ====================================================================================
//
// Each coordinator owns the single-threaded codec state (the `FrameBuffer` on
// the encode side, the `StreamDecoder` on the decode side) and farms the pure,
// per-chunk kernels out to a `WorkerPool`. Results come back in key order, so
// the coordinator sees exactly the sequence a serial implementation would.
//
// Encode:
//
//   reader --(chunk_size_bytes)--> [chunk pool: bytes -> colors] --ordered-->
//     header / colors / trailer --> FrameBuffer --(full)--> [frame pool: FrameSink]
//
// Decode:
//
//   FrameSource --(frame index)--> [pool: read + nearest colors -> symbols]
//     --ordered--> StreamDecoder --(FILE_END)--> EntrySink
//
// On any failure the coordinator stops submitting, shuts its pools down (which
// waits for in-flight tasks) and returns a `PipelineError`.
// ====================================================================================

mod decoder;
mod encoder;

pub use decoder::{DecodeReport, Decoder};
pub use encoder::{EncodeReport, Encoder};
