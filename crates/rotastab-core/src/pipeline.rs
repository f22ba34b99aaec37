use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analysis::{AngleEstimator, CornerMarkerEstimator};
use crate::config::regions::SamplingGeometry;
use crate::correction::correct;
use crate::debug::DebugRenderer;
use crate::discovery::VideoId;
use crate::services::{DurationProbe, MuxService, NormalizeService};
use crate::video::frame::VideoInfo;
use crate::video::{frames, FrameRead, MediaIo};

/// Parameters for the stabilization pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where source videos are discovered and `_cfr` intermediates are written.
    pub input_dir: PathBuf,
    /// Where corrected videos are written.
    pub output_dir: PathBuf,
    /// Frame rate to normalize to instead of the probed source rate.
    pub target_frame_rate: Option<f64>,
    /// Placement of the calibration sample squares.
    pub sampling: SamplingGeometry,
    /// Directory to write debug frame images, or None to skip.
    pub debug_frames_dir: Option<PathBuf>,
    /// Save every Nth frame when debug frames are enabled.
    pub debug_every: u32,
    /// Font used for debug frame text.
    pub debug_font: Option<PathBuf>,
    /// Attach the source audio to the corrected video.
    pub mux_audio: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("videos"),
            output_dir: PathBuf::from("output"),
            target_frame_rate: None,
            sampling: SamplingGeometry::default(),
            debug_frames_dir: None,
            debug_every: 30,
            debug_font: None,
            mux_audio: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Probing,
    Normalizing,
    Processing,
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Probing => "probing",
            PipelineState::Normalizing => "normalizing",
            PipelineState::Processing => "processing",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a run ended in [`PipelineState::Failed`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline already ran (state: {0})")]
    NotIdle(PipelineState),
    #[error("failed to probe {path:?}")]
    Probe {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("sample regions do not fit the video")]
    Geometry(#[source] anyhow::Error),
    #[error("frame rate normalization failed")]
    Normalize(#[source] anyhow::Error),
    #[error("failed to open normalized video")]
    OpenSource(#[source] anyhow::Error),
    #[error("normalized video is {actual:?} but source is {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("failed to create output video")]
    OpenSink(#[source] anyhow::Error),
    #[error("failed to create debug frame directory")]
    DebugFrames(#[source] std::io::Error),
    #[error("failed to encode frame {frame_number}")]
    Encode {
        frame_number: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to finalize output video")]
    Finalize(#[source] anyhow::Error),
    #[error("audio mux failed")]
    Mux(#[source] anyhow::Error),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames_written: u32,
    pub frames_skipped: u32,
    /// Corrected video without audio.
    pub stabilized_path: PathBuf,
    /// Corrected video with the source audio, when muxing is enabled.
    pub final_path: Option<PathBuf>,
}

/// Receives per-frame progress of the processing loop.
pub trait ProgressSink {
    /// Called once per frame slot, decoded or not. `processed` increases by one each call.
    fn on_frame(&mut self, processed: u32, total: u32);

    /// Called when the slot at `index` could not be decoded.
    fn on_skipped(&mut self, _index: u32) {}
}

/// The external collaborators a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub media: &'a dyn MediaIo,
    pub normalizer: &'a dyn NormalizeService,
    pub muxer: &'a dyn MuxService,
    pub duration_probe: Option<&'a dyn DurationProbe>,
}

/// Stabilizes one input video: probe, normalize, correct every frame, mux audio.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    tools: Collaborators<'a>,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, tools: Collaborators<'a>) -> Self {
        Self {
            config,
            tools,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run every stage for `video`. A pipeline runs once; its final state is
    /// [`PipelineState::Done`] or [`PipelineState::Failed`].
    pub fn run(
        &mut self,
        video: &VideoId,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSummary, PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::NotIdle(self.state));
        }

        info!(video = video.file_name(), "pipeline starting");

        let result = self.run_stages(video, progress);
        match &result {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                info!(
                    video = video.file_name(),
                    frames_written = summary.frames_written,
                    frames_skipped = summary.frames_skipped,
                    "pipeline complete"
                );
            }
            Err(e) => {
                error!(
                    video = video.file_name(),
                    state = %self.state,
                    error = %error_chain(e),
                    "pipeline failed"
                );
                self.transition(PipelineState::Failed);
            }
        }
        result
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = %self.state, to = %next, "pipeline state change");
        self.state = next;
    }

    fn run_stages(
        &mut self,
        video: &VideoId,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSummary, PipelineError> {
        let config = self.config;
        let tools = self.tools;
        let source_path = video.source_path(&config.input_dir);

        self.transition(PipelineState::Probing);
        let info = tools
            .media
            .probe(&source_path)
            .map_err(|source| PipelineError::Probe {
                path: source_path.clone(),
                source,
            })?;
        let regions = config
            .sampling
            .regions(info.width, info.height)
            .map_err(PipelineError::Geometry)?;

        self.transition(PipelineState::Normalizing);
        let target_fps = config.target_frame_rate.unwrap_or(info.fps);
        let cfr_path = video.cfr_path(&config.input_dir);
        tools
            .normalizer
            .normalize(&source_path, &cfr_path, target_fps)
            .map_err(PipelineError::Normalize)?;

        self.transition(PipelineState::Processing);
        let stabilized_path = video.stabilized_path(&config.output_dir);
        let estimator = CornerMarkerEstimator::new(regions);
        let (frames_written, frames_skipped) =
            self.process(&cfr_path, &stabilized_path, &info, &estimator, progress)?;

        // `process` closed the source and sink before returning.
        self.report_durations(&source_path, &stabilized_path, info.fps);

        let final_path = if config.mux_audio {
            let final_path = video.with_audio_path(&config.output_dir);
            tools
                .muxer
                .mux(&stabilized_path, &source_path, &final_path)
                .map_err(PipelineError::Mux)?;
            Some(final_path)
        } else {
            None
        };

        Ok(RunSummary {
            frames_written,
            frames_skipped,
            stabilized_path,
            final_path,
        })
    }

    /// Correct every frame of `cfr_path` into `output`. Returns (written, skipped).
    ///
    /// Source and sink are owned here; any early return drops them, which
    /// releases their processes and file handles.
    fn process(
        &mut self,
        cfr_path: &Path,
        output: &Path,
        info: &VideoInfo,
        estimator: &dyn AngleEstimator,
        progress: &mut dyn ProgressSink,
    ) -> Result<(u32, u32), PipelineError> {
        let config = self.config;
        let tools = self.tools;

        let mut source = tools
            .media
            .open_source(cfr_path)
            .map_err(PipelineError::OpenSource)?;
        let normalized = *source.info();
        if (normalized.width, normalized.height) != (info.width, info.height) {
            return Err(PipelineError::DimensionMismatch {
                expected: (info.width, info.height),
                actual: (normalized.width, normalized.height),
            });
        }

        // Encode at the source's own rate, whatever rate the frames were resampled to.
        let mut sink = tools
            .media
            .open_sink(output, info.width, info.height, info.fps)
            .map_err(PipelineError::OpenSink)?;

        let debug_frames = match &config.debug_frames_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(PipelineError::DebugFrames)?;
                info!(?dir, "debug frames directory ready");
                Some((dir, DebugRenderer::new(config.debug_font.as_deref())))
            }
            None => None,
        };
        let debug_every = config.debug_every.max(1);

        let total = normalized.frame_count;
        info!(
            total,
            source_fps = info.fps,
            normalized_fps = normalized.fps,
            "processing frames"
        );

        let mut written = 0u32;
        let mut skipped = 0u32;

        for (slot, read) in frames(source.as_mut(), total).enumerate() {
            match read {
                FrameRead::Decoded(frame) => {
                    let angle = estimator.estimate(&frame);
                    let corrected = correct(&frame, angle);
                    debug!(frame_number = frame.frame_number, angle, "frame corrected");

                    sink.write_frame(&corrected.image)
                        .map_err(|source| PipelineError::Encode {
                            frame_number: frame.frame_number,
                            source,
                        })?;
                    written += 1;

                    if let Some((dir, renderer)) = &debug_frames {
                        if frame.frame_number % debug_every == 0 {
                            if let Err(e) =
                                renderer.save_frame(&frame, &corrected, estimator, angle, dir)
                            {
                                warn!(
                                    frame_number = frame.frame_number,
                                    error = %e,
                                    "failed to save debug frame"
                                );
                            }
                        }
                    }
                }
                FrameRead::Missing { index, error } => {
                    warn!(index, error = ?error, "error reading frame, skipping");
                    progress.on_skipped(index);
                    skipped += 1;
                }
            }
            progress.on_frame(slot as u32 + 1, total);
        }

        self.transition(PipelineState::Finalizing);
        drop(source);
        let encoded = sink.finish().map_err(PipelineError::Finalize)?;
        if encoded != written {
            warn!(encoded, written, "sink reported a different frame count");
        }

        Ok((written, skipped))
    }

    fn report_durations(&self, source_path: &Path, stabilized_path: &Path, fps: f64) {
        let Some(probe) = self.tools.duration_probe else {
            return;
        };

        let durations = (probe.duration(source_path), probe.duration(stabilized_path));
        let (source, stabilized) = match durations {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "duration probe failed");
                return;
            }
        };

        let frame_interval = 1.0 / fps;
        if (source - stabilized).abs() > frame_interval {
            warn!(
                source_seconds = source,
                stabilized_seconds = stabilized,
                "stabilized duration differs from source, audio may drift"
            );
        } else {
            info!(
                source_seconds = source,
                stabilized_seconds = stabilized,
                "durations match"
            );
        }
    }
}

/// `error: cause: root cause`, like anyhow's alternate formatting.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
