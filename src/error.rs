use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for the various reasons a glyph atlas could not be built.
///
/// All of these are fatal: an unusable atlas aborts a run before any frame
/// is processed.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// The glyph source yielded no glyphs at all.
    #[error("no glyphs found in {0}")]
    Empty(PathBuf),

    /// Two glyph bitmaps in the same source differ in width or height.
    /// Every glyph in an atlas must share the configured block size.
    #[error(
        "glyph '{ch}' is {found_w}x{found_h} but the atlas is {expected_w}x{expected_h}"
    )]
    InconsistentDimensions {
        ch: char,
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    /// A glyph entry could not be read or decoded. Unreadable entries are a
    /// hard failure rather than a silent skip.
    #[error("unreadable glyph entry {path}: {reason}")]
    UnreadableGlyph { path: PathBuf, reason: String },
}

/// A block handed to the matcher exceeds the atlas glyph dimensions.
///
/// The partitioner never produces such a block, so this only fires if a
/// caller bypasses it with a hand-built block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("block is {block_w}x{block_h} but atlas glyphs are {glyph_w}x{glyph_h}")]
pub struct BlockShapeError {
    pub block_w: u32,
    pub block_h: u32,
    pub glyph_w: u32,
    pub glyph_h: u32,
}

/// The upstream frame source failed to produce a frame's pixels.
#[derive(Error, Debug)]
pub enum FrameSourceError {
    /// A frame file exists but could not be decoded.
    #[error("failed to decode frame {index} at {path}")]
    Decode {
        index: u64,
        path: PathBuf,
        source: image::ImageError,
    },

    /// A frame file could not be read from disk.
    #[error("failed to read frame {index} at {path}")]
    Read {
        index: u64,
        path: PathBuf,
        source: io::Error,
    },
}

/// A frame's raster or text artifact could not be persisted.
#[derive(Error, Debug)]
pub enum OutputWriteError {
    #[error("failed to write raster {path}")]
    Raster {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to write text {path}")]
    Text { path: PathBuf, source: io::Error },
}

/// Union of everything that can go wrong while processing one frame.
///
/// These errors are isolated to their frame: the pipeline records them and
/// keeps processing the remaining frames.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Source(#[from] FrameSourceError),

    #[error(transparent)]
    Shape(#[from] BlockShapeError),

    #[error(transparent)]
    Write(#[from] OutputWriteError),
}

/// Fatal pipeline failures that abort the whole run before dispatch.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to create output directory {path}")]
    OutputDir { path: PathBuf, source: io::Error },

    #[error("failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Error type for glyph rasterization from a font file.
#[derive(Error, Debug)]
pub enum FontError {
    #[error("failed to read font file {path}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse font file {path}")]
    Parse { path: PathBuf },

    #[error(transparent)]
    Atlas(#[from] AtlasError),
}
