//! The concurrent half of chromapack: a key-ordered worker pool and the two
//! pipeline coordinators built on it.

pub mod orchestrator;
pub mod worker_pool;

pub use orchestrator::{DecodeReport, Decoder, EncodeReport, Encoder};
pub use worker_pool::{ProgressReporter, TaskEvent, TaskTicket, WorkerPool};
