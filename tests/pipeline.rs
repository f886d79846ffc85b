use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::{GrayImage, Luma};
use mosascii::{
    pipeline, DirFrameSource, Frame, FrameError, FrameSource, FrameSourceError, Glyph, GlyphAtlas,
    OutputSink, PipelineConfig,
};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(label: &str) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "mosascii_{}_{}_{}",
            label,
            std::process::id(),
            stamp
        ));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Frame source backed by a pre-scripted pull sequence, for injecting
/// per-frame upstream failures.
struct ScriptedSource {
    pulls: VecDeque<Result<Frame, FrameSourceError>>,
}

impl ScriptedSource {
    fn new(pulls: Vec<Result<Frame, FrameSourceError>>) -> Self {
        Self { pulls: pulls.into() }
    }
}

impl FrameSource for ScriptedSource {
    fn pull(&mut self) -> Option<Result<Frame, FrameSourceError>> {
        self.pulls.pop_front()
    }
}

fn solid(w: u32, h: u32, v: u8) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([v]))
}

fn test_atlas() -> GlyphAtlas {
    GlyphAtlas::from_glyphs(vec![
        Glyph { ch: 'A', bitmap: solid(2, 2, 0) },
        Glyph { ch: 'B', bitmap: solid(2, 2, 255) },
    ])
    .unwrap()
}

fn gradient_frame(index: u64) -> Frame {
    let mut pixels = solid(8, 6, 0);
    for (i, p) in pixels.pixels_mut().enumerate() {
        p.0 = [((i as u64 * 31 + index * 97) % 256) as u8];
    }
    Frame { index, pixels }
}

fn read_outputs(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| {
            (
                p.file_name().unwrap().to_str().unwrap().to_string(),
                fs::read(&p).unwrap(),
            )
        })
        .collect();
    out.sort();
    out
}

fn run_with_workers(tmp: &TempDirGuard, label: &str, worker_count: usize) -> Vec<(String, Vec<u8>)> {
    let atlas = test_atlas();
    let sink = OutputSink::new(
        tmp.join(&format!("{}_raster", label)),
        tmp.join(&format!("{}_text", label)),
    );
    let mut source = ScriptedSource::new((0..6).map(|i| Ok(gradient_frame(i))).collect());
    let config = PipelineConfig { worker_count, frame_cap: None };
    let summary =
        pipeline::run(&mut source, &atlas, &sink, &config, None::<fn(usize, usize)>).unwrap();
    assert_eq!(summary.transcoded, 6);
    assert!(summary.failures.is_empty());

    let mut artifacts = read_outputs(&tmp.join(&format!("{}_raster", label)));
    artifacts.extend(read_outputs(&tmp.join(&format!("{}_text", label))));
    artifacts
}

#[test]
fn worker_count_does_not_change_outputs() {
    let tmp = TempDirGuard::new("independence");
    let serial = run_with_workers(&tmp, "serial", 1);
    let parallel = run_with_workers(&tmp, "parallel", 4);
    assert_eq!(serial, parallel);
}

#[test]
fn artifact_names_embed_zero_padded_index() {
    let tmp = TempDirGuard::new("naming");
    let sink = OutputSink::new(tmp.join("raster"), tmp.join("text"));
    assert_eq!(
        sink.raster_path(7).file_name().and_then(|s| s.to_str()),
        Some("frame_0000000007.png")
    );
    assert_eq!(
        sink.text_path(1234).file_name().and_then(|s| s.to_str()),
        Some("frame_0000001234.txt")
    );
}

#[test]
fn failed_frame_is_reported_but_does_not_abort_siblings() {
    let tmp = TempDirGuard::new("isolation");
    let atlas = test_atlas();
    let sink = OutputSink::new(tmp.join("raster"), tmp.join("text"));

    let pulls = (0..10)
        .map(|i| {
            if i == 3 {
                Err(FrameSourceError::Read {
                    index: i,
                    path: PathBuf::from("frame_0000000003.png"),
                    source: io::Error::new(io::ErrorKind::InvalidData, "truncated frame"),
                })
            } else {
                Ok(gradient_frame(i))
            }
        })
        .collect();
    let mut source = ScriptedSource::new(pulls);
    let config = PipelineConfig { worker_count: 4, frame_cap: None };
    let summary =
        pipeline::run(&mut source, &atlas, &sink, &config, None::<fn(usize, usize)>).unwrap();

    assert_eq!(summary.transcoded, 9);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].index, 3);
    assert!(matches!(summary.failures[0].error, FrameError::Source(_)));

    for i in 0..10u64 {
        let expected = i != 3;
        assert_eq!(sink.raster_path(i).exists(), expected, "raster {}", i);
        assert_eq!(sink.text_path(i).exists(), expected, "text {}", i);
    }
}

#[test]
fn write_failure_is_isolated_to_its_frame() {
    let tmp = TempDirGuard::new("write_failure");
    let atlas = test_atlas();
    let sink = OutputSink::new(tmp.join("raster"), tmp.join("text"));

    // A directory squatting on frame 2's raster path makes its save fail.
    fs::create_dir_all(sink.raster_path(2)).unwrap();

    let mut source = ScriptedSource::new((0..5).map(|i| Ok(gradient_frame(i))).collect());
    let config = PipelineConfig { worker_count: 4, frame_cap: None };
    let summary =
        pipeline::run(&mut source, &atlas, &sink, &config, None::<fn(usize, usize)>).unwrap();

    assert_eq!(summary.transcoded, 4);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].index, 2);
    assert!(matches!(summary.failures[0].error, FrameError::Write(_)));

    for i in 0..5u64 {
        let expected = i != 2;
        assert_eq!(sink.raster_path(i).is_file(), expected, "raster {}", i);
        assert_eq!(sink.text_path(i).exists(), expected, "text {}", i);
    }
}

#[test]
fn frame_cap_stops_collection_early() {
    let tmp = TempDirGuard::new("cap");
    let atlas = test_atlas();
    let sink = OutputSink::new(tmp.join("raster"), tmp.join("text"));

    let mut source = ScriptedSource::new((0..20).map(|i| Ok(gradient_frame(i))).collect());
    let config = PipelineConfig { worker_count: 2, frame_cap: Some(5) };
    let summary =
        pipeline::run(&mut source, &atlas, &sink, &config, None::<fn(usize, usize)>).unwrap();

    assert_eq!(summary.transcoded, 5);
    assert!(sink.text_path(4).exists());
    assert!(!sink.text_path(5).exists());
}

#[test]
fn dir_source_reads_frames_in_sorted_order_and_isolates_bad_files() {
    let tmp = TempDirGuard::new("dir_source");
    let frames_dir = tmp.join("frames");
    fs::create_dir_all(&frames_dir).unwrap();

    // Frame 0 dark, frame 1 corrupt, frame 2 bright.
    solid(4, 2, 0).save(frames_dir.join("frame_0000000000.png")).unwrap();
    fs::write(frames_dir.join("frame_0000000001.png"), b"not a png").unwrap();
    solid(4, 2, 255).save(frames_dir.join("frame_0000000002.png")).unwrap();

    let atlas = test_atlas();
    let sink = OutputSink::new(tmp.join("raster"), tmp.join("text"));
    let mut source = DirFrameSource::new(&frames_dir);
    let config = PipelineConfig { worker_count: 2, frame_cap: None };
    let summary =
        pipeline::run(&mut source, &atlas, &sink, &config, None::<fn(usize, usize)>).unwrap();

    assert_eq!(summary.transcoded, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].index, 1);

    assert_eq!(
        fs::read_to_string(sink.text_path(0)).unwrap(),
        "AA\n"
    );
    assert_eq!(
        fs::read_to_string(sink.text_path(2)).unwrap(),
        "BB\n"
    );
}

#[test]
fn progress_reports_every_completed_frame() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let tmp = TempDirGuard::new("progress");
    let atlas = test_atlas();
    let sink = OutputSink::new(tmp.join("raster"), tmp.join("text"));
    let mut source = ScriptedSource::new((0..4).map(|i| Ok(gradient_frame(i))).collect());
    let config = PipelineConfig { worker_count: 2, frame_cap: None };

    let calls = AtomicUsize::new(0);
    pipeline::run(
        &mut source,
        &atlas,
        &sink,
        &config,
        Some(|completed: usize, total: usize| {
            assert!(completed >= 1 && completed <= total);
            assert_eq!(total, 4);
            calls.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();
    assert_eq!(calls.into_inner(), 4);
}
