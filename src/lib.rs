//! # mosascii - Glyph-Matching ASCII Art Transcoder
//!
//! `mosascii` converts videos and images into ASCII-art renditions by
//! nearest-neighbor glyph matching: each frame is partitioned into
//! fixed-size pixel blocks and every block is replaced by the visually
//! closest glyph from a precomputed glyph atlas.
//!
//! ## Features
//!
//! - Build a glyph atlas from a TTF/OTF font or a directory of glyph bitmaps
//! - Deterministic L2 block matching with a stable first-wins tie-break
//! - Per-frame output as both a reconstructed raster and a character grid
//! - Parallel frame transcoding across a bounded worker pool
//! - Per-frame failure isolation with a post-run summary
//!
//! ## Example
//!
//! ```no_run
//! use mosascii::{GlyphSource, GlyphTranscoder, TranscodeOptions, VideoOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transcoder = GlyphTranscoder::new();
//! let atlas = transcoder.build_atlas(
//!     &GlyphSource::FontFile(Path::new("ComicMono.ttf").into()),
//!     10,
//! )?;
//! let summary = transcoder.transcode_video(
//!     Path::new("input.mp4"),
//!     Path::new("output"),
//!     &atlas,
//!     &VideoOptions::default(),
//!     &TranscodeOptions::default(),
//! )?;
//! println!("{} frames transcoded, {} failed", summary.transcoded, summary.failures.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress Reporting
//!
//! Video transcodes can report phase-by-phase progress for UI integration:
//!
//! ```no_run
//! use mosascii::{GlyphSource, GlyphTranscoder, Progress, ProgressPhase, TranscodeOptions, VideoOptions};
//! use std::path::Path;
//!
//! let transcoder = GlyphTranscoder::new();
//! let atlas = transcoder
//!     .build_atlas(&GlyphSource::GlyphDir(Path::new("glyphs").into()), 10)
//!     .unwrap();
//!
//! transcoder.transcode_video_with_progress(
//!     Path::new("video.mp4"),
//!     Path::new("output"),
//!     &atlas,
//!     &VideoOptions::default(),
//!     &TranscodeOptions::default(),
//!     Some(|progress: Progress| match progress.phase {
//!         ProgressPhase::ExtractingFrames => println!("Extracting frames..."),
//!         ProgressPhase::TranscodingFrames => {
//!             println!("Transcoding: {}/{} ({:.1}%)",
//!                 progress.completed, progress.total, progress.percentage);
//!         }
//!         ProgressPhase::EncodingVideo => println!("Encoding video..."),
//!         _ => {}
//!     }),
//! ).unwrap();
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub mod atlas;
pub mod error;
pub mod font;
pub mod matcher;
pub mod pipeline;
pub mod transcode;
pub mod video;

pub use atlas::{Glyph, GlyphAtlas};
pub use error::{
    AtlasError, BlockShapeError, FontError, FrameError, FrameSourceError, OutputWriteError,
    PipelineError,
};
pub use matcher::{match_block, MatchResult};
pub use pipeline::{
    DirFrameSource, Frame, FrameFailure, FrameSource, OutputSink, PipelineConfig, RunSummary,
    DEFAULT_WORKERS,
};
pub use transcode::{grid_to_text, transcode_frame};
pub use video::VideoOptions;

/// Represents the current phase of a transcode operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Extracting frames from video using ffmpeg
    ExtractingFrames,
    /// Matching frame blocks against the atlas
    TranscodingFrames,
    /// Reassembling matched rasters into a video
    EncodingVideo,
    /// Transcode completed successfully
    Complete,
}

/// Progress information for transcode operations
///
/// This struct provides detailed progress information that can be used
/// to display progress in UI applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Current phase of the transcode
    pub phase: ProgressPhase,
    /// Number of items completed in the current phase
    pub completed: usize,
    /// Total number of items in the current phase (0 if unknown/indeterminate)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0)
    pub percentage: f64,
    /// Human-readable message describing current status
    pub message: String,
}

impl Progress {
    /// Create a new progress update for extracting frames
    pub fn extracting_frames() -> Self {
        Self {
            phase: ProgressPhase::ExtractingFrames,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Extracting frames from video...".to_string(),
        }
    }

    /// Create a new progress update for frame transcoding
    pub fn transcoding_frames(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            phase: ProgressPhase::TranscodingFrames,
            completed,
            total,
            percentage,
            message: format!("Transcoding frame {} of {}", completed, total),
        }
    }

    /// Create a new progress update for video assembly
    pub fn encoding_video() -> Self {
        Self {
            phase: ProgressPhase::EncodingVideo,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Encoding output video...".to_string(),
        }
    }

    /// Create a completion progress update
    pub fn complete(total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!("Transcode complete: {} frames", total_frames),
        }
    }
}

/// Configuration preset defining quality settings
#[derive(Debug, Deserialize, Clone)]
pub struct Preset {
    pub block_size: u32,
    pub fps: u32,
    pub workers: usize,
    #[serde(default)]
    pub max_width: Option<u32>,
}

fn default_charset() -> String {
    font::DEFAULT_CHARSET.to_string()
}

/// Application configuration with presets and the matching character set
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub presets: HashMap<String, Preset>,
    pub default_preset: String,
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let default_json = r#"{
            "presets": {
                "default": {"block_size": 10, "fps": 24, "workers": 4},
                "small":   {"block_size": 20, "fps": 12, "workers": 2, "max_width": 640},
                "large":   {"block_size": 8,  "fps": 30, "workers": 8}
            },
            "default_preset": "default"
        }"#;
        serde_json::from_str(default_json).unwrap()
    }
}

/// Where the glyph bitmaps come from
#[derive(Debug, Clone)]
pub enum GlyphSource {
    /// Rasterize the configured charset from a TTF/OTF font file
    FontFile(PathBuf),
    /// Load pre-rendered bitmaps from a directory of code-point-named PNGs
    GlyphDir(PathBuf),
}

/// Options for a transcode run
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Number of parallel transcode workers
    pub worker_count: usize,
    /// Stop after this many frames, if set
    pub frame_cap: Option<usize>,
    /// Keep the extracted source frames after transcoding
    pub keep_frames: bool,
    /// Reassemble the matched rasters into an mp4 after transcoding
    pub assemble: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKERS,
            frame_cap: None,
            keep_frames: false,
            assemble: false,
        }
    }
}

impl TranscodeOptions {
    /// Create options with a specific worker count
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Create options with a frame cap
    pub fn with_frame_cap(mut self, frame_cap: usize) -> Self {
        self.frame_cap = Some(frame_cap);
        self
    }

    /// Create options from a preset
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            worker_count: preset.workers,
            frame_cap: None,
            keep_frames: false,
            assemble: false,
        }
    }
}

/// Main transcoder struct for glyph-matched ASCII art generation
pub struct GlyphTranscoder {
    config: AppConfig,
}

impl GlyphTranscoder {
    /// Create a new transcoder with default configuration
    pub fn new() -> Self {
        Self { config: AppConfig::default() }
    }

    /// Create a transcoder with custom configuration
    pub fn with_config(config: AppConfig) -> Result<Self> {
        if config.charset.is_empty() {
            return Err(anyhow!(
                "Config charset is empty. At least one character is required to build an atlas."
            ));
        }
        Ok(Self { config })
    }

    /// Load configuration from a file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text).context("parsing config json")?;
        Self::with_config(config)
    }

    /// Get the current configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get a preset by name
    pub fn get_preset(&self, name: &str) -> Option<&Preset> {
        self.config.presets.get(name)
    }

    /// Build the glyph atlas for a run.
    ///
    /// For a font source, the configured charset is rasterized at
    /// `block_size`; for a glyph directory, `block_size` must match the
    /// stored bitmap dimensions.
    pub fn build_atlas(&self, source: &GlyphSource, block_size: u32) -> Result<GlyphAtlas> {
        let atlas = match source {
            GlyphSource::FontFile(path) => {
                font::render_atlas(path, &self.config.charset, block_size)
                    .with_context(|| format!("rasterizing glyphs from {}", path.display()))?
            }
            GlyphSource::GlyphDir(path) => GlyphAtlas::load_dir(path)
                .with_context(|| format!("loading glyph directory {}", path.display()))?,
        };
        if atlas.glyph_width() != block_size || atlas.glyph_height() != block_size {
            return Err(anyhow!(
                "glyph bitmaps are {}x{} but block size {} was requested",
                atlas.glyph_width(),
                atlas.glyph_height(),
                block_size
            ));
        }
        Ok(atlas)
    }

    /// Transcode a single image to a matched raster and a character grid.
    pub fn transcode_image(
        &self,
        input: &Path,
        out_raster: &Path,
        out_text: &Path,
        atlas: &GlyphAtlas,
    ) -> Result<()> {
        let frame = image::open(input)
            .with_context(|| format!("opening {}", input.display()))?
            .to_luma8();
        let (raster, grid) = transcode_frame(&frame, atlas)?;
        raster
            .save(out_raster)
            .with_context(|| format!("writing {}", out_raster.display()))?;
        fs::write(out_text, grid_to_text(&grid))
            .with_context(|| format!("writing {}", out_text.display()))?;
        Ok(())
    }

    /// Transcode an existing directory of PNG frames.
    ///
    /// Rasters land in `out_dir/frames`, character grids in `out_dir/text`,
    /// each named by zero-padded frame index.
    pub fn transcode_frames_dir(
        &self,
        input_dir: &Path,
        out_dir: &Path,
        atlas: &GlyphAtlas,
        opts: &TranscodeOptions,
    ) -> Result<RunSummary> {
        let sink = OutputSink::new(out_dir.join("frames"), out_dir.join("text"));
        let mut source = DirFrameSource::new(input_dir);
        let config = PipelineConfig {
            worker_count: opts.worker_count,
            frame_cap: opts.frame_cap,
        };
        let summary = pipeline::run(
            &mut source,
            atlas,
            &sink,
            &config,
            None::<fn(usize, usize)>,
        )?;
        Ok(summary)
    }

    /// Transcode a video into per-frame rasters and character grids.
    pub fn transcode_video(
        &self,
        input: &Path,
        out_dir: &Path,
        atlas: &GlyphAtlas,
        video_opts: &VideoOptions,
        opts: &TranscodeOptions,
    ) -> Result<RunSummary> {
        self.transcode_video_with_progress(
            input,
            out_dir,
            atlas,
            video_opts,
            opts,
            None::<fn(Progress)>,
        )
    }

    /// Transcode a video with phase-by-phase progress reporting.
    ///
    /// Frames are extracted with ffmpeg into `out_dir/source_frames`, fanned
    /// out across the worker pool, and persisted as `out_dir/frames` (PNG
    /// rasters) and `out_dir/text` (character grids). The extracted source
    /// frames are removed afterwards unless `opts.keep_frames` is set; with
    /// `opts.assemble`, the matched rasters are re-encoded into
    /// `out_dir/video.mp4` at the extraction frame rate.
    pub fn transcode_video_with_progress<F>(
        &self,
        input: &Path,
        out_dir: &Path,
        atlas: &GlyphAtlas,
        video_opts: &VideoOptions,
        opts: &TranscodeOptions,
        progress_callback: Option<F>,
    ) -> Result<RunSummary>
    where
        F: Fn(Progress) + Send + Sync,
    {
        fs::create_dir_all(out_dir).context("creating output directory")?;
        let frames_dir = out_dir.join("source_frames");
        fs::create_dir_all(&frames_dir).context("creating frame extraction directory")?;

        if let Some(ref callback) = progress_callback {
            callback(Progress::extracting_frames());
        }
        video::extract_frames(input, &frames_dir, video_opts)?;

        let raster_dir = out_dir.join("frames");
        let sink = OutputSink::new(raster_dir.clone(), out_dir.join("text"));
        let mut source = DirFrameSource::new(&frames_dir);
        let config = PipelineConfig {
            worker_count: opts.worker_count,
            frame_cap: opts.frame_cap,
        };
        let summary = pipeline::run(
            &mut source,
            atlas,
            &sink,
            &config,
            progress_callback.as_ref().map(|callback| {
                move |completed: usize, total: usize| {
                    callback(Progress::transcoding_frames(completed, total))
                }
            }),
        )?;

        if opts.assemble {
            if let Some(ref callback) = progress_callback {
                callback(Progress::encoding_video());
            }
            video::assemble_video(&raster_dir, &out_dir.join("video.mp4"), video_opts.fps)?;
        }

        if !opts.keep_frames {
            fs::remove_dir_all(&frames_dir).context("removing extracted source frames")?;
        }

        if let Some(ref callback) = progress_callback {
            callback(Progress::complete(summary.transcoded));
        }
        Ok(summary)
    }
}

impl Default for GlyphTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_usable_presets() {
        let cfg = AppConfig::default();
        assert!(cfg.presets.contains_key(&cfg.default_preset));
        let preset = &cfg.presets["default"];
        assert!(preset.block_size > 0);
        assert!(preset.workers > 0);
        assert!(!cfg.charset.is_empty());
    }

    #[test]
    fn empty_charset_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.charset.clear();
        assert!(GlyphTranscoder::with_config(cfg).is_err());
    }

    #[test]
    fn options_inherit_preset_workers() {
        let cfg = AppConfig::default();
        let opts = TranscodeOptions::from_preset(&cfg.presets["large"]);
        assert_eq!(opts.worker_count, 8);
        assert_eq!(opts.frame_cap, None);
    }
}
