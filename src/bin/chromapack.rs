// In: src/bin/chromapack.rs

//! Command-line front end: `chromapack encode` turns a file or directory into a
//! directory of numbered PNG frames or an FFV1 video, `chromapack decode` turns
//! either back into files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::*;
use log::LevelFilter;

use chromapack::{
    demux, ChromaConfig, ChromaError, Decoder, DirectoryWriter, Encoder, FrameSink, LogProgress,
    PngRasterizer, VideoMuxer,
};

/// Store files as color frames and get them back
#[derive(Parser)]
#[command(name = "chromapack", version = chromapack::VERSION)]
struct Cli {
    /// Log per-frame details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a file or directory into PNG frames or a video
    Encode {
        /// File or directory to encode
        input: PathBuf,

        /// Directory that receives 1.png, 2.png, ...
        #[arg(short, long, required_unless_present = "video")]
        out: Option<PathBuf>,

        /// Mux the frames into this video file with ffmpeg instead
        #[arg(long, conflicts_with = "out")]
        video: Option<PathBuf>,

        /// Video frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Frame width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Frame height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Bytes read per worker task
        #[arg(long)]
        chunk_size: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Decode a directory of PNG frames, or a video, back into files
    Decode {
        /// Directory holding the numbered frames, or a video file
        frames: PathBuf,

        /// Directory the files are restored into
        #[arg(short, long)]
        out: PathBuf,

        /// Where frames extracted from a video go (default: <video>_frames)
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    builder.parse_env("RUST_LOG");

    // Custom formatter: just print the level and message
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(buf, "[{}] {}", record.level(), record.args())
    });
    let _ = builder.try_init();
}

fn run(command: Command) -> Result<(), ChromaError> {
    match command {
        Command::Encode {
            input,
            out,
            video,
            fps,
            width,
            height,
            chunk_size,
            common,
        } => {
            let mut config = load_config(&common)?;
            if let Some(width) = width {
                config.width = width;
            }
            if let Some(height) = height {
                config.height = height;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size_bytes = chunk_size;
            }
            if let Some(fps) = fps {
                config.frame_rate = fps;
            }
            config.validate()?;
            let target = match (out, video) {
                (_, Some(video)) => Target::Video(video),
                (Some(out), None) => Target::Frames(out),
                (None, None) => {
                    return Err(ChromaError::InvalidConfig(
                        "either --out or --video is required".to_string(),
                    ))
                }
            };
            encode(&input, &target, config, common.json)
        }
        Command::Decode {
            frames,
            out,
            frames_dir,
            common,
        } => {
            let config = load_config(&common)?;
            let source = if frames.is_file() {
                let dir = frames_dir.unwrap_or_else(|| default_frames_dir(&frames));
                demux(&config.ffmpeg, &frames, &dir)?
            } else {
                PngRasterizer::open(&frames)?
            };
            decode(source, &out, config, common.json)
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<ChromaConfig, ChromaError> {
    let mut config = match &common.config {
        Some(path) => ChromaConfig::from_json_file(path)?,
        None => ChromaConfig::default(),
    };
    if common.threads.is_some() {
        config.worker_threads = common.threads;
    }
    config.validate()?;
    Ok(config)
}

/// Where encoded frames go.
enum Target {
    Frames(PathBuf),
    Video(PathBuf),
}

impl Target {
    fn path(&self) -> &Path {
        match self {
            Target::Frames(path) | Target::Video(path) => path,
        }
    }
}

/// `clip.mkv` -> `clip_frames` next to it.
fn default_frames_dir(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{}_frames", stem))
}

fn encode(input: &Path, target: &Target, config: ChromaConfig, json: bool) -> Result<(), ChromaError> {
    let sink: Arc<dyn FrameSink> = match target {
        Target::Frames(dir) => Arc::new(PngRasterizer::create(dir)?),
        Target::Video(file) => Arc::new(VideoMuxer::open(
            &config.ffmpeg,
            config.width,
            config.height,
            config.frame_rate,
            file,
        )?),
    };
    let mut encoder =
        Encoder::new(Arc::new(config), sink)?.with_observer(Box::new(LogProgress::default()));
    encoder.encode_path(input)?;
    let report = encoder.finish()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} file(s), {} bytes -> {} frame(s) in {}",
            "Encoded".green().bold(),
            report.entries,
            report.bytes,
            report.frames,
            target.path().display()
        );
    }
    Ok(())
}

fn decode(source: PngRasterizer, out: &Path, config: ChromaConfig, json: bool) -> Result<(), ChromaError> {
    let source = Arc::new(source);
    let mut writer = DirectoryWriter::new(out)?;
    let report = Decoder::new(Arc::new(config), source)?
        .with_observer(Box::new(LogProgress::default()))
        .decode_into(&mut writer)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} frame(s) -> {} file(s), {} bytes in {}",
            "Decoded".green().bold(),
            report.frames,
            report.entries,
            report.bytes,
            out.display()
        );
        if report.off_palette > 0 {
            println!(
                "{} {} color(s) were off-palette and resolved to their nearest entry",
                "warning:".yellow().bold(),
                report.off_palette
            );
        }
    }
    Ok(())
}
