//! Frame fan-out: pulls frames sequentially from a source, dispatches
//! independent transcode tasks across a bounded rayon pool, and persists
//! each frame's raster and text artifacts keyed by frame index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::GrayImage;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::atlas::GlyphAtlas;
use crate::error::{FrameError, FrameSourceError, OutputWriteError, PipelineError};
use crate::transcode::{grid_to_text, transcode_frame};

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 4;

/// One raw frame pulled from the upstream source.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position in the source sequence.
    pub index: u64,
    pub pixels: GrayImage,
}

/// A sequential cursor over an ordered, finite frame sequence.
///
/// Pulling is strictly sequential; parallelism starts only after frames
/// have been collected. A pull may fail per-frame (upstream decode error)
/// without ending the sequence.
pub trait FrameSource {
    fn pull(&mut self) -> Option<Result<Frame, FrameSourceError>>;
}

/// Frame source over a directory of extracted PNG frames, in sorted
/// filename order.
pub struct DirFrameSource {
    paths: std::vec::IntoIter<PathBuf>,
    next_index: u64,
}

impl DirFrameSource {
    pub fn new(dir: &Path) -> Self {
        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|e| e == "png").unwrap_or(false))
            .collect();
        paths.sort();
        Self { paths: paths.into_iter(), next_index: 0 }
    }
}

impl FrameSource for DirFrameSource {
    fn pull(&mut self) -> Option<Result<Frame, FrameSourceError>> {
        let path = self.paths.next()?;
        let index = self.next_index;
        self.next_index += 1;

        let result = match image::open(&path) {
            Ok(img) => Ok(Frame { index, pixels: img.to_luma8() }),
            Err(e) => Err(FrameSourceError::Decode { index, path, source: e }),
        };
        Some(result)
    }
}

/// Destination for per-frame artifacts. Filenames embed the zero-padded
/// frame index, so sibling tasks always touch disjoint files.
#[derive(Debug, Clone)]
pub struct OutputSink {
    raster_dir: PathBuf,
    text_dir: PathBuf,
}

impl OutputSink {
    pub fn new(raster_dir: PathBuf, text_dir: PathBuf) -> Self {
        Self { raster_dir, text_dir }
    }

    /// Create both output directories. Must succeed before dispatch begins.
    pub fn prepare(&self) -> Result<(), PipelineError> {
        for dir in [&self.raster_dir, &self.text_dir] {
            fs::create_dir_all(dir).map_err(|e| PipelineError::OutputDir {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn raster_path(&self, index: u64) -> PathBuf {
        self.raster_dir.join(format!("frame_{:010}.png", index))
    }

    pub fn text_path(&self, index: u64) -> PathBuf {
        self.text_dir.join(format!("frame_{:010}.txt", index))
    }

    pub fn write_raster(&self, index: u64, raster: &GrayImage) -> Result<(), OutputWriteError> {
        let path = self.raster_path(index);
        raster
            .save(&path)
            .map_err(|e| OutputWriteError::Raster { path, source: e })
    }

    pub fn write_text(&self, index: u64, grid: &[String]) -> Result<(), OutputWriteError> {
        let path = self.text_path(index);
        fs::write(&path, grid_to_text(grid))
            .map_err(|e| OutputWriteError::Text { path, source: e })
    }
}

/// Run-scoped pipeline settings. The block size is not configured here: it
/// is the atlas glyph size.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of parallel transcode workers.
    pub worker_count: usize,
    /// Stop pulling frames after this many, if set.
    pub frame_cap: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { worker_count: DEFAULT_WORKERS, frame_cap: None }
    }
}

/// One frame that could not be fully processed, and why.
#[derive(Debug)]
pub struct FrameFailure {
    pub index: u64,
    pub error: FrameError,
}

/// Outcome of a pipeline run after all workers have drained.
#[derive(Debug)]
pub struct RunSummary {
    /// Frames whose raster and text artifacts were both written.
    pub transcoded: usize,
    /// Per-frame failures, in frame-index order. Never silently dropped.
    pub failures: Vec<FrameFailure>,
}

/// Transcode every frame the source yields and persist the results.
///
/// Collection is sequential (the upstream source is a single cursor);
/// dispatch is an independent parallel map over the collected frames on a
/// pool of exactly `worker_count` threads. Per-frame errors are recorded in
/// the summary without aborting sibling tasks; only output-directory
/// creation and worker-pool construction are fatal.
pub fn run<S, F>(
    source: &mut S,
    atlas: &GlyphAtlas,
    sink: &OutputSink,
    config: &PipelineConfig,
    progress: Option<F>,
) -> Result<RunSummary, PipelineError>
where
    S: FrameSource,
    F: Fn(usize, usize) + Send + Sync,
{
    sink.prepare()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_count.max(1))
        .build()?;

    // Collecting.
    let mut frames = Vec::new();
    let failures = Mutex::new(Vec::new());
    let mut pulled = 0usize;
    while config.frame_cap.map(|cap| pulled < cap).unwrap_or(true) {
        match source.pull() {
            Some(Ok(frame)) => frames.push(frame),
            Some(Err(e)) => {
                let index = match &e {
                    FrameSourceError::Decode { index, .. } => *index,
                    FrameSourceError::Read { index, .. } => *index,
                };
                failures
                    .lock()
                    .unwrap()
                    .push(FrameFailure { index, error: e.into() });
            }
            None => break,
        }
        pulled += 1;
    }

    // Dispatching and draining.
    let total = frames.len();
    let completed = AtomicUsize::new(0);
    let transcoded = AtomicUsize::new(0);
    pool.install(|| {
        frames.par_iter().for_each(|frame| {
            match process_frame(frame, atlas, sink) {
                Ok(()) => {
                    transcoded.fetch_add(1, Ordering::SeqCst);
                }
                Err(error) => {
                    failures
                        .lock()
                        .unwrap()
                        .push(FrameFailure { index: frame.index, error });
                }
            }
            let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref callback) = progress {
                callback(current, total);
            }
        });
    });

    let mut failures = failures.into_inner().unwrap();
    failures.sort_by_key(|f| f.index);
    Ok(RunSummary {
        transcoded: transcoded.into_inner(),
        failures,
    })
}

fn process_frame(frame: &Frame, atlas: &GlyphAtlas, sink: &OutputSink) -> Result<(), FrameError> {
    let (raster, grid) = transcode_frame(&frame.pixels, atlas)?;
    sink.write_raster(frame.index, &raster)?;
    sink.write_text(frame.index, &grid)?;
    Ok(())
}
