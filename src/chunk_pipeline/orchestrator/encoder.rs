// In: src/chunk_pipeline/orchestrator/encoder.rs

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::bridge::raster::{FrameSink, RasterFrame};
use crate::bridge::walk::{entry_name, list_files};
use crate::chunk_pipeline::worker_pool::WorkerPool;
use crate::codec::frame_buffer::FrameBuffer;
use crate::codec::framer::{entry_header, entry_trailer};
use crate::codec::palette::Color;
use crate::config::ChromaConfig;
use crate::error::{ChromaError, Stage};
use crate::kernels::encode_bytes_to_colors;
use crate::progress::ProgressObserver;

/// Totals for one finished encode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodeReport {
    pub entries: u64,
    pub bytes: u64,
    pub frames: u64,
}

/// Turns a sequence of named byte streams into a sequence of frames.
///
/// Entries are encoded one after another into a single logical color stream;
/// frames are cut from that stream as the `FrameBuffer` fills, so an entry can
/// start in the middle of a frame and span several frames.
pub struct Encoder {
    config: Arc<ChromaConfig>,
    chunk_pool: WorkerPool<Vec<Color>>,
    frame_pool: WorkerPool<()>,
    sink: Arc<dyn FrameSink>,
    buffer: FrameBuffer,
    next_chunk_key: u64,
    next_frame_index: u64,
    frames_written: u64,
    entries: u64,
    bytes: u64,
    failed: bool,
}

impl Encoder {
    pub fn new(config: Arc<ChromaConfig>, sink: Arc<dyn FrameSink>) -> Result<Self, ChromaError> {
        config.validate()?;
        let workers = config.effective_worker_threads();
        let chunk_pool = WorkerPool::new("chroma-encode", workers, config.effective_max_pending())?;
        let writes = config.effective_frame_write_concurrency();
        let frame_pool = WorkerPool::new("chroma-frames", writes, writes)?;

        log::info!(
            "Encoder ready: {}x{} frames ({} colors), {} KiB chunks, {} workers, {} concurrent frame writes",
            config.width,
            config.height,
            config.capacity(),
            config.chunk_size_bytes / 1024,
            workers,
            writes
        );

        Ok(Self {
            buffer: FrameBuffer::new(config.capacity()),
            config,
            chunk_pool,
            frame_pool,
            sink,
            next_chunk_key: 0,
            next_frame_index: 0,
            frames_written: 0,
            entries: 0,
            bytes: 0,
            failed: false,
        })
    }

    /// Routes the byte-level progress of the chunk workers to `observer`.
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.chunk_pool = self.chunk_pool.with_observer(observer);
        self
    }

    /// Frames handed to the sink so far, including ones still being written.
    pub fn frames_emitted(&self) -> u64 {
        self.next_frame_index
    }

    //==============================================================================
    // Public Encode API
    //==============================================================================

    /// Encodes one entry read from `reader` until EOF. Returns the entry's size
    /// in bytes.
    pub fn encode_entry<R: Read>(&mut self, name: &str, mut reader: R) -> Result<u64, ChromaError> {
        self.ensure_usable()?;
        self.encode_entry_inner(name, &mut reader)
            .map_err(|err| self.abort(err))
    }

    /// Encodes a single file, or every file below a directory in `list_files`
    /// order. Returns the number of payload bytes encoded.
    pub fn encode_path(&mut self, path: impl AsRef<Path>) -> Result<u64, ChromaError> {
        self.ensure_usable()?;
        let root = path.as_ref();
        let files = match list_files(root) {
            Ok(files) => files,
            Err(err) => return Err(self.abort(err)),
        };

        let total: u64 = files
            .iter()
            .filter_map(|file| fs::metadata(file).ok())
            .map(|meta| meta.len())
            .sum();
        self.chunk_pool
            .begin_progress(&format!("encode {}", root.display()), Some(total));
        log::info!(
            "Encoding {} file(s), {} bytes, from {}",
            files.len(),
            total,
            root.display()
        );

        let mut encoded = 0;
        for file in &files {
            let name = entry_name(root, file);
            let handle = match File::open(file) {
                Ok(handle) => handle,
                Err(e) => {
                    let err = ChromaError::SourceUnavailable(format!(
                        "cannot open {}: {}",
                        file.display(),
                        e
                    ));
                    return Err(self.abort(err));
                }
            };
            encoded += self.encode_entry(&name, BufReader::new(handle))?;
        }
        Ok(encoded)
    }

    /// Flushes the partial last frame, waits for every frame write and shuts
    /// the pools down.
    pub fn finish(mut self) -> Result<EncodeReport, ChromaError> {
        self.ensure_usable()?;
        match self.finish_inner() {
            Ok(report) => Ok(report),
            Err(err) => Err(self.abort(err)),
        }
    }

    //==============================================================================
    // Internal Helpers
    //==============================================================================

    fn encode_entry_inner<R: Read>(&mut self, name: &str, reader: &mut R) -> Result<u64, ChromaError> {
        self.push_colors(&entry_header(name))?;

        let chunk_size = self.config.chunk_size_bytes;
        let mut entry_bytes = 0u64;
        loop {
            let chunk = read_chunk(reader, chunk_size, name)?;
            if chunk.is_empty() {
                break;
            }
            let at_eof = chunk.len() < chunk_size;
            entry_bytes += chunk.len() as u64;

            let key = self.next_chunk_key;
            self.next_chunk_key += 1;
            self.chunk_pool.submit(key, move |progress| {
                let colors = encode_bytes_to_colors(&chunk);
                progress.report(chunk.len() as u64);
                Ok(colors)
            })?;

            for (_, colors) in self.chunk_pool.drain_ready()? {
                self.push_colors(&colors)?;
            }
            if at_eof {
                break;
            }
        }

        // Everything this entry submitted, in order, before its trailer.
        while let Some(item) = self.chunk_pool.next_ordered() {
            let (_, colors) = item?;
            self.push_colors(&colors)?;
        }
        self.push_colors(&[entry_trailer()])?;

        self.entries += 1;
        self.bytes += entry_bytes;
        log::info!("Encoded entry '{}' ({} bytes)", name, entry_bytes);
        Ok(entry_bytes)
    }

    fn push_colors(&mut self, mut colors: &[Color]) -> Result<(), ChromaError> {
        while !colors.is_empty() {
            let taken = self.buffer.fill_from(colors);
            colors = &colors[taken..];
            if self.buffer.is_full() {
                self.emit_frame()?;
            }
        }
        Ok(())
    }

    fn emit_frame(&mut self) -> Result<(), ChromaError> {
        let frame = RasterFrame::new(self.config.width, self.config.height, self.buffer.drain());
        let index = self.next_frame_index;
        self.next_frame_index += 1;

        let sink = Arc::clone(&self.sink);
        self.frame_pool
            .submit(index, move |_| sink.write_frame(index, &frame))?;
        log::debug!("Frame {} queued for writing", index);

        self.frames_written += self.frame_pool.drain_ready()?.len() as u64;
        Ok(())
    }

    fn finish_inner(&mut self) -> Result<EncodeReport, ChromaError> {
        if !self.buffer.is_empty() {
            self.emit_frame()?;
        }
        while let Some(item) = self.frame_pool.next_ordered() {
            item?;
            self.frames_written += 1;
        }
        self.chunk_pool.shutdown()?;
        self.frame_pool.shutdown()?;
        self.sink.finish()?;
        self.chunk_pool.finish_progress();

        let report = EncodeReport {
            entries: self.entries,
            bytes: self.bytes,
            frames: self.frames_written,
        };
        log_metric!(
            "event" = "encode_finished",
            "entries" = report.entries,
            "bytes" = report.bytes,
            "frames" = report.frames
        );
        log::info!(
            "Encode finished: {} entries, {} bytes, {} frames",
            report.entries,
            report.bytes,
            report.frames
        );
        Ok(report)
    }

    fn ensure_usable(&self) -> Result<(), ChromaError> {
        if self.failed {
            return Err(ChromaError::PoolClosed);
        }
        Ok(())
    }

    /// Stops the run: no further submissions, in-flight tasks are awaited.
    fn abort(&mut self, err: ChromaError) -> ChromaError {
        self.failed = true;
        for outcome in [self.chunk_pool.shutdown(), self.frame_pool.shutdown()] {
            if let Err(e) = outcome {
                log::debug!("Ignoring secondary failure during encode abort: {}", e);
            }
        }
        let partial = self.next_frame_index > 0;
        let err = err.in_pipeline(Stage::Encode, None, partial);
        log::error!("{}", err);
        err
    }
}

/// Reads up to `limit` bytes. A short chunk means EOF was reached.
fn read_chunk<R: Read>(reader: &mut R, limit: usize, name: &str) -> Result<Vec<u8>, ChromaError> {
    let mut chunk = Vec::with_capacity(limit);
    reader
        .take(limit as u64)
        .read_to_end(&mut chunk)
        .map_err(|e| ChromaError::SourceUnavailable(format!("cannot read entry '{}': {}", name, e)))?;
    Ok(chunk)
}
