//! Drives the real ffmpeg-backed source and sink. Run with `--ignored`.

use std::path::Path;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use rotastab_core::discovery::VideoId;
use rotastab_core::pipeline::{Collaborators, Pipeline, PipelineConfig, PipelineState, ProgressSink};
use rotastab_core::services::{DurationProbe, FfmpegTools, NormalizeService};
use rotastab_core::video::{frames, FrameRead, MediaIo};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn frame(n: u32) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        Rgb([(x * 4) as u8, (y * 5) as u8, (n * 8) as u8])
    })
}

fn write_video(tools: &FfmpegTools, path: &Path, count: u32, fps: f64) {
    let mut sink = tools.open_sink(path, WIDTH, HEIGHT, fps).unwrap();
    for n in 0..count {
        sink.write_frame(&frame(n)).unwrap();
    }
    assert_eq!(sink.finish().unwrap(), count);
}

struct Silent;

impl ProgressSink for Silent {
    fn on_frame(&mut self, _processed: u32, _total: u32) {}
}

#[test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
fn sink_output_probes_back_with_same_shape() {
    let dir = TempDir::new().unwrap();
    let tools = FfmpegTools::default();
    let path = dir.path().join("clip.mp4");
    write_video(&tools, &path, 12, 30.0);

    let info = tools.probe(&path).unwrap();
    assert_eq!((info.width, info.height), (WIDTH, HEIGHT));
    assert_eq!(info.frame_count, 12);
    assert!((info.fps - 30.0).abs() < 1e-6);

    let duration = tools.duration(&path).unwrap();
    assert!((duration - 0.4).abs() < 0.05, "duration {duration}");
}

#[test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
fn source_decodes_every_frame() {
    let dir = TempDir::new().unwrap();
    let tools = FfmpegTools::default();
    let path = dir.path().join("clip.mp4");
    write_video(&tools, &path, 8, 60.0);

    let mut source = tools.open_source(&path).unwrap();
    let count = source.info().frame_count;
    let decoded: Vec<_> = frames(source.as_mut(), count)
        .map(|read| match read {
            FrameRead::Decoded(f) => f,
            FrameRead::Missing { index, error } => panic!("frame {index} missing: {error:?}"),
        })
        .collect();

    assert_eq!(decoded.len(), 8);
    for (n, f) in decoded.iter().enumerate() {
        assert_eq!(f.frame_number, n as u32);
        assert_eq!(f.image.dimensions(), (WIDTH, HEIGHT));
    }
}

#[test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
fn normalize_resamples_to_target_rate() {
    let dir = TempDir::new().unwrap();
    let tools = FfmpegTools::default();
    let input = dir.path().join("vfr.mp4");
    let output = dir.path().join("vfr_cfr.mp4");
    write_video(&tools, &input, 30, 30.0);

    tools.normalize(&input, &output, 60.0).unwrap();

    let info = tools.probe(&output).unwrap();
    assert!((info.fps - 60.0).abs() < 1e-6);
    assert!(info.frame_count >= 59, "frame count {}", info.frame_count);
}

#[test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
fn full_pipeline_keeps_frame_count_and_rate() {
    let dir = TempDir::new().unwrap();
    let tools = FfmpegTools::default();
    let input_dir = dir.path().join("videos");
    std::fs::create_dir_all(&input_dir).unwrap();
    let input = input_dir.join("song.mp4");
    write_video(&tools, &input, 20, 60.0);

    let config = PipelineConfig {
        input_dir,
        output_dir: dir.path().join("output"),
        ..PipelineConfig::default()
    };
    let collaborators = Collaborators {
        media: &tools,
        normalizer: &tools,
        muxer: &tools,
        duration_probe: Some(&tools),
    };
    let video = VideoId::from_path(&input).unwrap();
    let mut pipeline = Pipeline::new(&config, collaborators);
    let summary = pipeline.run(&video, &mut Silent).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.frames_written, 20);

    let out = tools.probe(&summary.stabilized_path).unwrap();
    assert_eq!(out.frame_count, 20);
    assert!((out.fps - 60.0).abs() < 1e-6);
    assert!(summary.final_path.unwrap().exists());
}
