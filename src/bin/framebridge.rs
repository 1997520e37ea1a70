use std::{fs, path::PathBuf, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framebridge::{
    ClipProbe, DecodeContext, DecodeOptions, DynamicImageAdapter, EngineLogLevel, FfmpegEngine,
    MediaType, RetrievalMode, ScalingAlgorithm, StreamSelection,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framebridge probe clip.mp4 --json\n  framebridge decode clip.mp4 --out frames --offset 10 --total 24 --progress\n  framebridge completions zsh > _framebridge";

#[derive(Debug, Parser)]
#[command(
    name = "framebridge",
    version,
    about = "Decode frames from encoded video clips",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar while writing frames.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the streams of a clip.
    #[command(
        about = "Print clip metadata",
        visible_alias = "info",
        after_help = "Examples:\n  framebridge probe clip.mp4\n  framebridge probe clip.mp4 --json"
    )]
    Probe {
        /// Input clip path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode frames into image files.
    #[command(
        about = "Decode frames to images",
        after_help = "Examples:\n  framebridge decode clip.mp4 --out frames\n  framebridge decode clip.mp4 --out frames --offset 12 --total 12 --ext jpg"
    )]
    Decode {
        /// Input clip path.
        input: PathBuf,
        /// Output directory for decoded frames.
        #[arg(long)]
        out: PathBuf,
        /// Number of leading frames to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Number of frames to decode; defaults to every remaining declared frame.
        #[arg(long)]
        total: Option<usize>,
        /// Output image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
        /// Decode this container stream instead of the first video stream.
        #[arg(long)]
        stream: Option<usize>,
        /// Retrieve exactly one frame per packet instead of draining the decoder.
        #[arg(long)]
        single_retrieve: bool,
        /// Scaling algorithm (fast-bilinear, bilinear, bicubic, point, area).
        #[arg(long, default_value = "bilinear")]
        scaling: String,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_scaling(value: &str) -> Option<ScalingAlgorithm> {
    match value.to_ascii_lowercase().as_str() {
        "fast-bilinear" | "fast_bilinear" => Some(ScalingAlgorithm::FastBilinear),
        "bilinear" => Some(ScalingAlgorithm::Bilinear),
        "bicubic" => Some(ScalingAlgorithm::Bicubic),
        "point" | "nearest" => Some(ScalingAlgorithm::Point),
        "area" => Some(ScalingAlgorithm::Area),
        _ => None,
    }
}

fn parse_extension(value: &str) -> Option<String> {
    let clean = value.trim_start_matches('.').to_ascii_lowercase();
    match clean.as_str() {
        "png" | "jpg" | "jpeg" | "bmp" | "tiff" => Some(clean),
        _ => None,
    }
}

fn media_type_name(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Video => "video",
        MediaType::Audio => "audio",
        MediaType::Subtitle => "subtitle",
        MediaType::Other => "other",
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: EngineLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        framebridge::set_engine_log_level(parsed);
    } else if global.verbose {
        framebridge::set_engine_log_level(EngineLogLevel::Debug);
    } else {
        framebridge::set_engine_log_level(EngineLogLevel::Error);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { input, json } => {
            let bytes = fs::read(&input)?;
            let metadata = ClipProbe::probe(&FfmpegEngine::new(), &bytes)?;
            if json {
                let streams: Vec<_> = metadata
                    .streams
                    .iter()
                    .map(|stream| {
                        json!({
                            "index": stream.index,
                            "type": media_type_name(stream.media_type),
                            "codec": stream.codec,
                            "width": stream.width,
                            "height": stream.height,
                            "declared_frames": stream.declared_frames,
                        })
                    })
                    .collect();
                let payload = json!({
                    "size_bytes": bytes.len(),
                    "video_streams": metadata.video_stream_count(),
                    "streams": streams,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Size: {} bytes", bytes.len());
                for stream in &metadata.streams {
                    if stream.media_type == MediaType::Video {
                        println!(
                            "Stream #{}: video {}x{}, {} frames [{}]",
                            stream.index,
                            stream.width,
                            stream.height,
                            stream.declared_frames,
                            stream.codec,
                        );
                    } else {
                        println!(
                            "Stream #{}: {} [{}]",
                            stream.index,
                            media_type_name(stream.media_type),
                            stream.codec,
                        );
                    }
                }
            }
        }
        Commands::Decode {
            input,
            out,
            offset,
            total,
            ext,
            stream,
            single_retrieve,
            scaling,
        } => {
            let ext_clean = parse_extension(&ext).ok_or(format!("unsupported --ext: {ext}"))?;
            let scaling =
                parse_scaling(&scaling).ok_or(format!("unsupported --scaling: {scaling}"))?;

            let mut options = DecodeOptions::new().with_scaling(scaling);
            if let Some(index) = stream {
                options = options.with_stream_selection(StreamSelection::Index(index));
            }
            if single_retrieve {
                options = options.with_retrieval_mode(RetrievalMode::Single);
            }

            if out.exists() {
                if !cli.global.overwrite {
                    return Err(format!(
                        "output directory already exists: {} (use --overwrite)",
                        out.display()
                    )
                    .into());
                }
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("writing into existing directory {}", out.display()).yellow()
                );
            }

            let bytes = fs::read(&input)?;
            let mut context = DecodeContext::open(FfmpegEngine::new(), &bytes, options)?;

            let total = match total {
                Some(total) => total,
                None => {
                    let declared = usize::try_from(context.frames()?)?;
                    declared.saturating_sub(offset)
                }
            };

            if cli.global.verbose {
                eprintln!(
                    "decoding {total} frame(s) after {offset} from stream #{} ({}x{})",
                    context.stream_index(),
                    context.width(),
                    context.height()
                );
            }

            let spinner = if cli.global.progress {
                let spinner = ProgressBar::new_spinner();
                spinner.set_message("decoding");
                spinner.enable_steady_tick(Duration::from_millis(100));
                Some(spinner)
            } else {
                None
            };
            let images = context.decode_frames(&bytes, offset, total, &DynamicImageAdapter)?;
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            fs::create_dir_all(&out)?;

            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new(images.len() as u64);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            for (position, image) in images.iter().enumerate() {
                let frame_number = offset + position;
                let output_path = out.join(format!("frame_{frame_number:06}.{ext_clean}"));
                if output_path.exists() && !cli.global.overwrite {
                    return Err(format!(
                        "output file already exists: {} (use --overwrite)",
                        output_path.display()
                    )
                    .into());
                }

                image.save(&output_path)?;

                if let Some(pb) = &progress_bar {
                    pb.inc(1);
                }
                if cli.global.verbose {
                    eprintln!("saved frame {} -> {}", frame_number, output_path.display());
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Decoded {} frame(s) to {}", images.len(), out.display()).green()
            );
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framebridge", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
