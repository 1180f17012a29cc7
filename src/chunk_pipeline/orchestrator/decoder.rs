// In: src/chunk_pipeline/orchestrator/decoder.rs

use std::sync::Arc;

use serde::Serialize;

use crate::bridge::raster::FrameSource;
use crate::bridge::writer::EntrySink;
use crate::chunk_pipeline::worker_pool::WorkerPool;
use crate::codec::framer::{DecodedEntry, StreamDecoder};
use crate::config::ChromaConfig;
use crate::error::{ChromaError, Stage};
use crate::kernels::{decode_colors_to_symbols, DecodedSymbols};
use crate::progress::ProgressObserver;

/// Totals for one finished decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub frames: u64,
    pub entries: u64,
    pub bytes: u64,
    /// Colors further than `color_tolerance` from every palette entry.
    pub off_palette: u64,
    /// Zero nibbles skipped between entries (frame padding).
    pub padding: u64,
}

/// Reconstructs entries from a sequence of frames.
pub struct Decoder {
    config: Arc<ChromaConfig>,
    source: Arc<dyn FrameSource>,
    pool: WorkerPool<DecodedSymbols>,
}

impl Decoder {
    pub fn new(config: Arc<ChromaConfig>, source: Arc<dyn FrameSource>) -> Result<Self, ChromaError> {
        config.validate()?;
        let pool = WorkerPool::new(
            "chroma-decode",
            config.effective_worker_threads(),
            config.effective_max_pending(),
        )?;
        Ok(Self {
            config,
            source,
            pool,
        })
    }

    /// Routes per-frame progress to `observer`.
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.pool = self.pool.with_observer(observer);
        self
    }

    /// Decodes every frame of the source in order, handing each completed entry
    /// to `sink` as soon as its `FILE_END` is read. Payload outside any entry is
    /// handed out under `default_entry_name`. Any malformed symbol aborts the
    /// whole run; entries already handed out stay written.
    pub fn decode_into(mut self, sink: &mut dyn EntrySink) -> Result<DecodeReport, ChromaError> {
        let frame_count = self
            .source
            .frame_count()
            .map_err(|e| e.in_pipeline(Stage::Decode, None, false))?;
        self.pool.begin_progress("decode frames", Some(frame_count as u64));
        log::info!(
            "Decoding {} frames with {} workers",
            frame_count,
            self.pool.worker_count()
        );

        let mut decoder = StreamDecoder::new(self.config.default_entry_name.clone());
        let mut report = DecodeReport::default();
        let outcome = self.run(frame_count, &mut decoder, sink, &mut report);

        // Stops submissions and waits for in-flight frames either way.
        let shutdown = self.pool.shutdown();
        if let Err(err) = outcome {
            if let Err(e) = shutdown {
                log::debug!("Ignoring secondary failure during decode abort: {}", e);
            }
            let err = err.in_pipeline(Stage::Decode, None, report.entries > 0);
            log::error!("{}", err);
            return Err(err);
        }
        shutdown.map_err(|e| e.in_pipeline(Stage::Decode, None, report.entries > 0))?;
        self.pool.finish_progress();

        report.padding = decoder.skipped_symbols();
        log_metric!(
            "event" = "decode_finished",
            "frames" = report.frames,
            "entries" = report.entries,
            "off_palette" = report.off_palette
        );
        log::info!(
            "Decode finished: {} frames, {} entries, {} bytes",
            report.frames,
            report.entries,
            report.bytes
        );
        Ok(report)
    }

    fn run(
        &mut self,
        frame_count: usize,
        decoder: &mut StreamDecoder,
        sink: &mut dyn EntrySink,
        report: &mut DecodeReport,
    ) -> Result<(), ChromaError> {
        let tolerance = self.config.color_tolerance;
        for index in 0..frame_count {
            let source = Arc::clone(&self.source);
            self.pool.submit(index as u64, move |progress| {
                let frame = source.read_frame(index)?;
                frame.validate()?;
                let decoded = decode_colors_to_symbols(&frame.colors, tolerance);
                progress.report(1);
                Ok(decoded)
            })?;

            for (key, symbols) in self.pool.drain_ready()? {
                consume_frame(key, symbols, tolerance, decoder, sink, report)?;
            }
        }
        while let Some(item) = self.pool.next_ordered() {
            let (key, symbols) = item?;
            consume_frame(key, symbols, tolerance, decoder, sink, report)?;
        }

        let last_frame = (frame_count as u64).checked_sub(1);
        let trailing = decoder
            .finish()
            .map_err(|e| e.in_pipeline(Stage::Decode, last_frame, report.entries > 0))?;
        if let Some(entry) = trailing {
            deliver_entry(last_frame.unwrap_or(0), entry, sink, report)
                .map_err(|e| e.in_pipeline(Stage::Decode, last_frame, report.entries > 0))?;
        }
        Ok(())
    }
}

/// Feeds one frame's symbols, in order, through the stream decoder.
fn consume_frame(
    key: u64,
    decoded: DecodedSymbols,
    tolerance: u32,
    decoder: &mut StreamDecoder,
    sink: &mut dyn EntrySink,
    report: &mut DecodeReport,
) -> Result<(), ChromaError> {
    if decoded.off_palette > 0 {
        log::warn!(
            "Frame {}: {} color(s) beyond tolerance {}, resolved to the nearest palette entry",
            key,
            decoded.off_palette,
            tolerance
        );
    }
    report.off_palette += decoded.off_palette as u64;
    report.frames += 1;

    let fed = decoder.feed(&decoded.symbols, |entry| deliver_entry(key, entry, sink, report));
    fed.map_err(|e| e.in_pipeline(Stage::Decode, Some(key), report.entries > 0))
}

fn deliver_entry(
    key: u64,
    entry: DecodedEntry,
    sink: &mut dyn EntrySink,
    report: &mut DecodeReport,
) -> Result<(), ChromaError> {
    let name = entry.name.clone();
    let len = entry.data.len() as u64;
    sink.write_entry(entry)?;
    log::debug!("Frame {}: entry '{}' complete ({} bytes)", key, name, len);
    report.entries += 1;
    report.bytes += len;
    Ok(())
}
