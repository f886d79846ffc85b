use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dialoguer::{Confirm, FuzzySelect, Input};
use indicatif::{ProgressBar, ProgressStyle};
use mosascii::{
    AppConfig, GlyphSource, GlyphTranscoder, Progress, ProgressPhase, RunSummary,
    TranscodeOptions, VideoOptions,
};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

fn load_config() -> Result<AppConfig> {
    // Look for mosascii.json in app support, current dir fallback, then built-in default
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::data_dir() {
        d.push("mosascii");
        d.push("mosascii.json");
        tried.push(d);
    }
    tried.push(PathBuf::from("mosascii.json"));

    for p in &tried {
        if p.exists() {
            let text =
                fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
            let cfg: AppConfig = serde_json::from_str(&text).context("parsing config json")?;

            if cfg.charset.is_empty() {
                return Err(anyhow!(
                    "Config file {} has an empty charset. At least one character is required.",
                    p.display()
                ));
            }

            return Ok(cfg);
        }
    }

    // Built-in defaults
    Ok(AppConfig::default())
}

#[derive(Parser, Debug)]
#[command(version, about = "Glyph-matching video/image to ASCII frame transcoder.")]
struct Args {
    /// Input video file, image, or directory of extracted frames
    input: Option<PathBuf>,

    /// Output directory for the generated files
    out: Option<PathBuf>,

    /// TTF/OTF font file to rasterize glyphs from
    #[arg(long)]
    font: Option<PathBuf>,

    /// Directory of pre-rendered glyph PNGs (named by code point)
    #[arg(long, conflicts_with = "font")]
    glyph_dir: Option<PathBuf>,

    /// Pixel side length of one block and of every glyph bitmap
    #[arg(long)]
    block_size: Option<u32>,

    /// Number of parallel transcode workers
    #[arg(long)]
    workers: Option<usize>,

    /// Frames per second when extracting from video
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many frames
    #[arg(long)]
    frame_cap: Option<usize>,

    /// Scale extracted frames to this pixel width
    #[arg(long)]
    max_width: Option<u32>,

    /// Start time for video conversion (e.g., 00:01:23.456 or 83.456)
    #[arg(long)]
    start: Option<String>,

    /// End time for video conversion (e.g., 00:01:23.456 or 83.456)
    #[arg(long)]
    end: Option<String>,

    /// Reassemble the matched rasters into an mp4 after transcoding
    #[arg(long, default_value_t = false)]
    assemble: bool,

    /// Keep extracted source frames
    #[arg(long, default_value_t = false)]
    keep_frames: bool,

    /// Export the rendered glyph atlas to this directory as PNGs
    #[arg(long)]
    dump_glyphs: Option<PathBuf>,

    /// Use default quality preset
    #[arg(long, default_value_t = false, conflicts_with_all = &["small", "large"])]
    default: bool,

    /// Use smaller default values for quality settings
    #[arg(long, short, default_value_t = false, conflicts_with_all = &["default", "large"])]
    small: bool,

    /// Use larger default values for quality settings
    #[arg(long, short, default_value_t = false, conflicts_with_all = &["default", "small"])]
    large: bool,

    /// Log details to standard output
    #[arg(long, default_value_t = false)]
    log_details: bool,
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    let is_interactive = !(args.default || args.small || args.large);

    // --- Interactive Prompts ---
    if args.input.is_none() {
        if !is_interactive {
            return Err(anyhow!("Input file must be provided when using a preset."));
        }
        let files = find_media_files()?;
        if files.is_empty() {
            return Err(anyhow!("No media files found in current directory."));
        }
        let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
            .with_prompt("Choose an input file")
            .default(0)
            .items(&files)
            .interact()?;
        args.input = Some(PathBuf::from(&files[selection]));
    }

    let input_path = args.input.as_ref().unwrap();

    let is_image_input = input_path.is_file()
        && matches!(
            input_path.extension().and_then(|s| s.to_str()),
            Some("png" | "jpg" | "jpeg")
        );

    let mut output_path = args.out.unwrap_or_else(|| PathBuf::from("."));

    // If input is a file, create a directory for the output
    if input_path.is_file() {
        let file_stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mosascii_output");
        output_path.push(file_stem);
    }

    // Load config and decide preset
    let cfg = load_config()?;
    let transcoder = GlyphTranscoder::with_config(cfg.clone())?;

    let active_preset_name = if args.small {
        "small"
    } else if args.large {
        "large"
    } else {
        cfg.default_preset.as_str()
    };

    let active = cfg
        .presets
        .get(active_preset_name)
        .ok_or_else(|| anyhow!(format!("Missing preset '{}' in config", active_preset_name)))?;

    if is_interactive {
        if args.block_size.is_none() {
            args.block_size = Some(
                Input::new()
                    .with_prompt("Block size (pixels)")
                    .default(active.block_size)
                    .interact()?,
            );
        }

        if args.workers.is_none() {
            args.workers = Some(
                Input::new()
                    .with_prompt("Worker count")
                    .default(active.workers)
                    .interact()?,
            );
        }

        if !is_image_input && input_path.is_file() {
            // Video-specific prompts
            if args.fps.is_none() {
                args.fps = Some(
                    Input::new()
                        .with_prompt("Frames per second (FPS)")
                        .default(active.fps)
                        .interact()?,
                );
            }
            if args.start.is_none() {
                args.start = Some(
                    Input::new()
                        .with_prompt("Start time (e.g., 00:00:05)")
                        .default("0".to_string())
                        .interact()?,
                );
            }
            if args.end.is_none() {
                args.end = Some(
                    Input::new()
                        .with_prompt("End time (e.g., 00:00:10) (optional)")
                        .default(String::new())
                        .interact()?,
                );
            }
        }
    }

    let block_size = args.block_size.unwrap_or(active.block_size);
    let workers = args.workers.unwrap_or(active.workers);
    let fps = args.fps.unwrap_or(active.fps);
    let max_width = args.max_width.or(active.max_width);

    if block_size == 0 {
        return Err(anyhow!("Block size must be a positive integer"));
    }
    if workers == 0 {
        return Err(anyhow!("Worker count must be a positive integer"));
    }

    // --- Glyph source ---
    let glyph_source = resolve_glyph_source(&args.font, &args.glyph_dir, is_interactive)?;

    // --- Execution ---
    fs::create_dir_all(&output_path).context("creating output dir")?;

    // Check if output directory already contains frames.
    let has_frames = WalkDir::new(output_path.join("frames"))
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|s| s.starts_with("frame_"))
        });

    if has_frames {
        if is_interactive
            && !Confirm::new()
                .with_prompt(format!(
                    "Output directory {} already contains frames. Overwrite?",
                    output_path.display()
                ))
                .default(false)
                .interact()?
        {
            println!("Operation cancelled.");
            return Ok(());
        }

        // Clean up existing frames
        for dir in ["frames", "text"] {
            let dir = output_path.join(dir);
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    if name.starts_with("frame_")
                        && (name.ends_with(".png") || name.ends_with(".txt"))
                    {
                        fs::remove_file(path)?;
                    }
                }
            }
        }
    }

    println!("Rendering glyph atlas...");
    let atlas = transcoder.build_atlas(&glyph_source, block_size)?;
    if let Some(glyph_out) = &args.dump_glyphs {
        mosascii::font::export_glyph_dir(&atlas, glyph_out)?;
        println!("Glyph atlas exported to {}", glyph_out.display());
    }

    let opts = TranscodeOptions {
        worker_count: workers,
        frame_cap: args.frame_cap,
        keep_frames: args.keep_frames,
        assemble: args.assemble,
    };

    let mut summary: Option<RunSummary> = None;
    if input_path.is_file() {
        if is_image_input {
            println!("Transcoding image...");
            let stem = input_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            transcoder.transcode_image(
                input_path,
                &output_path.join(format!("{}.png", stem)),
                &output_path.join(format!("{}.txt", stem)),
                &atlas,
            )?;
        } else {
            println!("Extracting video frames...");
            let video_opts = VideoOptions {
                fps,
                start: args.start.clone(),
                end: args.end.clone(),
                max_width,
            };

            // Create progress bar (will be initialized once we know total frames)
            let progress_bar: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
            let pb_clone = Arc::clone(&progress_bar);

            let run = transcoder.transcode_video_with_progress(
                input_path,
                &output_path,
                &atlas,
                &video_opts,
                &opts,
                Some(move |progress: Progress| {
                    if progress.phase != ProgressPhase::TranscodingFrames {
                        return;
                    }
                    let mut pb_guard = pb_clone.lock().unwrap();
                    if pb_guard.is_none() {
                        // Initialize progress bar on first callback
                        let pb = ProgressBar::new(progress.total as u64);
                        pb.set_style(
                            ProgressStyle::default_bar()
                                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
                                .unwrap()
                                .progress_chars("#>-"),
                        );
                        pb.set_message("Transcoding frames");
                        *pb_guard = Some(pb);
                    }
                    if let Some(ref pb) = *pb_guard {
                        pb.set_position(progress.completed as u64);
                    }
                }),
            )?;

            // Finish the progress bar
            let pb_opt = progress_bar.lock().unwrap().take();
            if let Some(pb) = pb_opt {
                pb.finish_with_message("Done");
            }
            summary = Some(run);
        }
    } else if input_path.is_dir() {
        println!("Transcoding directory of frames...");
        summary = Some(transcoder.transcode_frames_dir(input_path, &output_path, &atlas, &opts)?);
    } else {
        return Err(anyhow!("Input path does not exist"));
    }

    println!("\nASCII transcode complete in {}", output_path.display());

    if let Some(summary) = &summary {
        report_failures(summary);
    }

    // --- Create details.md ---
    let mut details = format!(
        "Version: {}\nFrames: {}\nBlock Size: {}\nWorkers: {}\nCharset Size: {}",
        env!("CARGO_PKG_VERSION"),
        summary.as_ref().map(|s| s.transcoded).unwrap_or(1),
        block_size,
        workers,
        atlas.len(),
    );

    if input_path.is_file() && !is_image_input {
        details.push_str(&format!("\nFPS: {}", fps));
    }

    let details_path = output_path.join("details.md");
    fs::write(details_path, &details).context("writing details file")?;

    if args.log_details {
        println!("\n--- Transcode Details ---");
        println!("{}", details);
    }

    Ok(())
}

fn report_failures(summary: &RunSummary) {
    if summary.failures.is_empty() {
        return;
    }
    eprintln!(
        "Warning: {} frame(s) failed: {}",
        summary.failures.len(),
        summary
            .failures
            .iter()
            .map(|f| f.index.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    for failure in &summary.failures {
        eprintln!("  frame {}: {}", failure.index, failure.error);
    }
}

fn resolve_glyph_source(
    font: &Option<PathBuf>,
    glyph_dir: &Option<PathBuf>,
    is_interactive: bool,
) -> Result<GlyphSource> {
    if let Some(dir) = glyph_dir {
        return Ok(GlyphSource::GlyphDir(dir.clone()));
    }
    if let Some(path) = font {
        return Ok(GlyphSource::FontFile(path.clone()));
    }
    if !is_interactive {
        return Err(anyhow!(
            "A glyph source (--font or --glyph-dir) must be provided when using a preset."
        ));
    }

    let fonts = find_font_files()?;
    if fonts.is_empty() {
        return Err(anyhow!(
            "No font files found in current directory. Pass --font or --glyph-dir."
        ));
    }
    let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt("Choose a font")
        .default(0)
        .items(&fonts)
        .interact()?;
    Ok(GlyphSource::FontFile(PathBuf::from(&fonts[selection])))
}

fn find_media_files() -> Result<Vec<String>> {
    Ok(WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().is_some_and(|ext| {
                    matches!(
                        ext.to_str(),
                        Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "png" | "jpg")
                    )
                })
        })
        .map(|e| e.path().to_str().unwrap_or("").to_string())
        .collect())
}

fn find_font_files() -> Result<Vec<String>> {
    Ok(WalkDir::new(".")
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| matches!(ext.to_str(), Some("ttf" | "otf")))
        })
        .map(|e| e.path().to_str().unwrap_or("").to_string())
        .collect())
}
