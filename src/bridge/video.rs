// In: src/bridge/video.rs

//! The video boundary. Frames are piped as raw RGB24 into an external `ffmpeg`
//! process, which muxes them losslessly (FFV1); decoding asks `ffmpeg` to
//! split a video back into numbered PNG frames.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use crate::bridge::raster::{FrameSink, PngRasterizer, RasterFrame};
use crate::error::ChromaError;

//==================================================================================
// 1. Command Lines
//==================================================================================

/// Arguments that make `ffmpeg` read raw RGB24 frames on stdin and write an
/// FFV1 video to `output`.
pub fn mux_args(width: u32, height: u32, frame_rate: u32, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pixel_format",
        "rgb24",
        "-video_size",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(format!("{}x{}", width, height).into());
    args.push("-framerate".into());
    args.push(frame_rate.to_string().into());
    for arg in ["-i", "-", "-c:v", "ffv1"] {
        args.push(arg.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// Arguments that make `ffmpeg` write every frame of `video` as `N.png`
/// (1-based) into `frames_dir`.
pub fn demux_args(video: &Path, frames_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(video.as_os_str().to_owned());
    args.push(frames_dir.join("%d.png").into_os_string());
    args
}

//==================================================================================
// 2. In-Order Delivery
//==================================================================================

/// Restores index order for frames that arrive from concurrent writers.
/// Frames ahead of the next expected index are parked until the gap closes.
#[derive(Debug)]
pub struct ReorderingWriter<W: Write> {
    inner: W,
    next: u64,
    parked: BTreeMap<u64, Vec<u8>>,
}

impl<W: Write> ReorderingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            next: 0,
            parked: BTreeMap::new(),
        }
    }

    /// Index of the next frame to be written through.
    pub fn next_index(&self) -> u64 {
        self.next
    }

    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    pub fn push(&mut self, index: u64, bytes: Vec<u8>) -> Result<(), ChromaError> {
        if index < self.next || self.parked.contains_key(&index) {
            return Err(ChromaError::InternalError(format!(
                "frame {} delivered twice",
                index
            )));
        }
        if index > self.next {
            self.parked.insert(index, bytes);
            return Ok(());
        }
        self.write_through(&bytes)?;
        while let Some(bytes) = self.parked.remove(&self.next) {
            self.write_through(&bytes)?;
        }
        Ok(())
    }

    /// Flushes and hands back the inner writer. Parked frames mean a gap in
    /// the sequence and are an error.
    pub fn into_inner(mut self) -> Result<W, ChromaError> {
        if let Some(first) = self.parked.keys().next() {
            return Err(ChromaError::InternalError(format!(
                "frame {} never arrived; {} later frame(s) are stranded from {}",
                self.next,
                self.parked.len(),
                first
            )));
        }
        self.inner.flush().map_err(closed_input)?;
        Ok(self.inner)
    }

    fn write_through(&mut self, bytes: &[u8]) -> Result<(), ChromaError> {
        self.inner.write_all(bytes).map_err(closed_input)?;
        self.next += 1;
        Ok(())
    }
}

fn closed_input(err: std::io::Error) -> ChromaError {
    ChromaError::SourceUnavailable(format!("video muxer stopped reading frames: {}", err))
}

//==================================================================================
// 3. The Muxer Sink
//==================================================================================

struct MuxState {
    writer: Option<ReorderingWriter<ChildStdin>>,
    child: Option<Child>,
}

/// A `FrameSink` that streams frames into a child process's stdin in index
/// order. `finish` closes stdin and waits for the process to exit.
pub struct VideoMuxer {
    program: String,
    width: u32,
    height: u32,
    state: Mutex<MuxState>,
}

impl VideoMuxer {
    /// Spawns `ffmpeg` muxing `width`x`height` frames into `output`.
    pub fn open(
        ffmpeg: &str,
        width: u32,
        height: u32,
        frame_rate: u32,
        output: &Path,
    ) -> Result<Self, ChromaError> {
        let mut command = Command::new(ffmpeg);
        command
            .args(mux_args(width, height, frame_rate, output))
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        log::info!(
            "Muxing {}x{} frames at {} fps into {}",
            width,
            height,
            frame_rate,
            output.display()
        );
        Self::from_command(command, width, height)
    }

    /// Spawns `command` with a piped stdin that receives raw RGB24 frames.
    pub fn from_command(mut command: Command, width: u32, height: u32) -> Result<Self, ChromaError> {
        let program = command.get_program().to_string_lossy().into_owned();
        let mut child = command.stdin(Stdio::piped()).spawn().map_err(|e| {
            ChromaError::SourceUnavailable(format!("cannot start {}: {}", program, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChromaError::InternalError(format!("{} has no stdin", program)))?;

        Ok(Self {
            program,
            width,
            height,
            state: Mutex::new(MuxState {
                writer: Some(ReorderingWriter::new(stdin)),
                child: Some(child),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, MuxState>, ChromaError> {
        self.state
            .lock()
            .map_err(|_| ChromaError::InternalError("video muxer lock poisoned".to_string()))
    }
}

impl FrameSink for VideoMuxer {
    fn write_frame(&self, index: u64, frame: &RasterFrame) -> Result<(), ChromaError> {
        frame.validate()?;
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(ChromaError::InternalError(format!(
                "frame {} is {}x{} but the video is {}x{}",
                index, frame.width, frame.height, self.width, self.height
            )));
        }
        let mut state = self.lock()?;
        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| ChromaError::SourceUnavailable(format!("{} input already closed", self.program)))?;
        writer.push(index, frame.as_rgb_bytes().to_vec())?;
        log::debug!("Frame {} handed to {} ({} parked)", index, self.program, writer.parked());
        Ok(())
    }

    fn finish(&self) -> Result<(), ChromaError> {
        let mut state = self.lock()?;
        let frames = match state.writer.take() {
            Some(writer) => {
                let frames = writer.next_index();
                // Dropping stdin signals end of input.
                drop(writer.into_inner()?);
                frames
            }
            None => 0,
        };
        let Some(mut child) = state.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() {
            return Err(ChromaError::SourceUnavailable(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        log_metric!("event" = "video_muxed", "frames" = frames);
        Ok(())
    }
}

impl Drop for VideoMuxer {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.writer.take();
            if let Some(mut child) = state.child.take() {
                if let Err(e) = child.wait() {
                    log::debug!("Ignoring failure while reaping {}: {}", self.program, e);
                }
            }
        }
    }
}

//==================================================================================
// 4. Demuxing
//==================================================================================

/// Splits `video` into `frames_dir/1.png, 2.png, …` with `ffmpeg` and opens
/// the result as a frame source.
pub fn demux(ffmpeg: &str, video: &Path, frames_dir: &Path) -> Result<PngRasterizer, ChromaError> {
    if !video.is_file() {
        return Err(ChromaError::SourceUnavailable(format!(
            "video {} does not exist",
            video.display()
        )));
    }
    fs::create_dir_all(frames_dir)?;
    log::info!("Extracting frames of {} into {}", video.display(), frames_dir.display());

    let status = Command::new(ffmpeg)
        .args(demux_args(video, frames_dir))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| ChromaError::SourceUnavailable(format!("cannot start {}: {}", ffmpeg, e)))?;
    if !status.success() {
        return Err(ChromaError::SourceUnavailable(format!(
            "{} could not extract frames from {} ({})",
            ffmpeg,
            video.display(),
            status
        )));
    }
    PngRasterizer::open(frames_dir)
}
