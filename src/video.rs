//! Video container glue: frame extraction and reassembly through the
//! ffmpeg command line tool. The core pipeline only ever sees directories
//! of PNG frames.

use std::path::Path;
use std::process::Command as ProcCommand;

use anyhow::{anyhow, Context, Result};

/// Options for pulling frames out of a video container.
#[derive(Debug, Clone)]
pub struct VideoOptions {
    /// Frames per second to extract.
    pub fps: u32,
    /// Start time (e.g., "00:01:23.456" or "83.456")
    pub start: Option<String>,
    /// End time (e.g., "00:01:23.456" or "83.456")
    pub end: Option<String>,
    /// Scale extracted frames to this pixel width, keeping aspect ratio.
    pub max_width: Option<u32>,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self { fps: 24, start: None, end: None, max_width: None }
    }
}

pub(crate) fn build_extraction_vf(fps: u32, max_width: Option<u32>) -> String {
    match max_width {
        Some(w) => format!("scale={}:-2,fps={}", w, fps),
        None => format!("fps={}", fps),
    }
}

/// Extract frames from `input` into `out_dir` as `frame_%010d.png`.
pub fn extract_frames(input: &Path, out_dir: &Path, opts: &VideoOptions) -> Result<()> {
    let out_pattern = out_dir.join("frame_%010d.png");
    let mut ffmpeg_args: Vec<String> = vec!["-loglevel".into(), "error".into()];

    if let Some(s) = opts.start.as_deref() {
        if !s.is_empty() && s != "0" {
            ffmpeg_args.push("-ss".into());
            ffmpeg_args.push(s.to_string());
        }
    }

    let mut cmd = ProcCommand::new("ffmpeg");
    cmd.args(&ffmpeg_args).arg("-i").arg(input);

    if let Some(duration) = clip_duration(opts.start.as_deref(), opts.end.as_deref()) {
        cmd.arg("-t").arg(duration);
    }

    cmd.arg("-vf")
        .arg(build_extraction_vf(opts.fps, opts.max_width))
        .arg(&out_pattern);

    let status = cmd.status().context("running ffmpeg")?;
    if !status.success() {
        return Err(anyhow!("ffmpeg frame extraction failed"));
    }
    Ok(())
}

/// Re-encode a directory of `frame_%010d.png` rasters into an mp4.
pub fn assemble_video(frames_dir: &Path, out_path: &Path, fps: u32) -> Result<()> {
    let in_pattern = frames_dir.join("frame_%010d.png");
    let status = ProcCommand::new("ffmpeg")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .arg("-framerate")
        .arg(fps.to_string())
        .arg("-start_number")
        .arg("0")
        .arg("-i")
        .arg(&in_pattern)
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg(out_path)
        .status()
        .context("running ffmpeg for video assembly")?;

    if !status.success() {
        return Err(anyhow!("ffmpeg video assembly failed"));
    }
    Ok(())
}

/// Duration to pass as ffmpeg `-t`, derived from the start/end window.
fn clip_duration(start: Option<&str>, end: Option<&str>) -> Option<String> {
    let end = end.filter(|e| !e.is_empty())?;
    match start.filter(|s| !s.is_empty() && *s != "0") {
        Some(start) => {
            let duration = parse_timestamp(end) - parse_timestamp(start);
            if duration > 0.0 {
                Some(duration.to_string())
            } else {
                None
            }
        }
        None => Some(end.to_string()),
    }
}

fn parse_timestamp(s: &str) -> f64 {
    s.split(':').rev().enumerate().fold(0.0, |acc, (i, v)| {
        acc + v.parse::<f64>().unwrap_or(0.0) * 60f64.powi(i as i32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_parse_in_seconds() {
        assert_eq!(parse_timestamp("83.5"), 83.5);
        assert_eq!(parse_timestamp("00:01:23"), 83.0);
        assert_eq!(parse_timestamp("2:05"), 125.0);
    }

    #[test]
    fn extraction_filter_includes_scale_only_when_requested() {
        assert_eq!(build_extraction_vf(24, None), "fps=24");
        assert_eq!(build_extraction_vf(30, Some(640)), "scale=640:-2,fps=30");
    }

    #[test]
    fn clip_duration_subtracts_start_from_end() {
        assert_eq!(clip_duration(Some("10"), Some("25")), Some("15".to_string()));
        assert_eq!(clip_duration(None, Some("25")), Some("25".to_string()));
        assert_eq!(clip_duration(Some("0"), Some("25")), Some("25".to_string()));
        assert_eq!(clip_duration(Some("30"), Some("25")), None);
        assert_eq!(clip_duration(Some("10"), None), None);
    }
}
