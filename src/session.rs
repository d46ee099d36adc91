use std::path::PathBuf;

use ffmpeg_pipe::{
    PipelineError,
    command::CommandPlanner,
    mixer::AudioMixer,
    pipelines::AudioPipelines,
    probe,
    track::{TrackState, TrackSummary},
};

use crate::{
    config::RecordingConfig,
    finish::{self, OutputLayout},
};

/// Files a finished session left in the output directory.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub artifacts: Vec<PathBuf>,
}

/// One recording: the audio pipelines plus the directories and finishing
/// steps around them.
pub struct Session {
    layout: OutputLayout,
    pipelines: AudioPipelines,
    split: bool,
    ffmpeg: Option<PathBuf>,
    show_logs: bool,
}

impl Session {
    pub async fn start(config: &RecordingConfig, frame_rate: f64) -> anyhow::Result<Self> {
        let ffmpeg = probe::locate_ffmpeg(config.ffmpeg_path.as_deref())?;
        if !config.split_audio_tracks {
            probe::precheck_audio_codec(&ffmpeg, &config.audio_codec).await?;
        }
        let planner = config.planner(&ffmpeg);
        Self::start_with_planner(config, frame_rate, Box::new(planner), Some(ffmpeg)).await
    }

    /// Starts a session whose tracks are encoded by `planner`.
    pub async fn start_with_planner(
        config: &RecordingConfig,
        frame_rate: f64,
        planner: Box<dyn CommandPlanner>,
        ffmpeg: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let name = config.output_name.clone().unwrap_or_else(default_name);
        let layout = OutputLayout::new(&config.output_dir, &name, &config.container);
        layout.prepare().await?;
        log::info!("Recording {} into {}", name, layout.work_dir().display());

        let pipelines = match AudioPipelines::start(
            planner.as_ref(),
            &layout.work_dir(),
            frame_rate,
            config.split_audio_tracks,
            &config.pipeline_options(),
        )
        .await
        {
            Ok(pipelines) => pipelines,
            Err(e) => {
                layout.cleanup().await;
                return Err(e.into());
            }
        };

        Ok(Self {
            layout,
            pipelines,
            split: config.split_audio_tracks,
            ffmpeg,
            show_logs: config.show_ffmpeg_logs,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn state(&self) -> TrackState {
        self.pipelines.state()
    }

    pub async fn push<M: AudioMixer + ?Sized>(&mut self, mixer: &mut M) -> Result<(), PipelineError> {
        self.pipelines.push(mixer).await
    }

    /// Drains and stops every track, then finishes the output files.
    ///
    /// On a fatal pipeline error the working directory is removed and the
    /// error is returned; partial output is not kept.
    pub async fn stop(&mut self) -> Result<SessionReport, PipelineError> {
        let summaries = match self.pipelines.stop().await {
            Ok(summaries) => summaries,
            Err(e @ PipelineError::InvalidState { .. }) => return Err(e),
            Err(e) => {
                self.layout.cleanup().await;
                return Err(e);
            }
        };

        for summary in &summaries {
            log::debug!(
                "{}: {} frames, {} bytes into {}",
                summary.track,
                summary.frames_written,
                summary.bytes_written,
                summary.output.display()
            );
        }

        let artifacts = self.finish(&summaries).await;
        self.layout.cleanup().await;
        Ok(SessionReport { artifacts })
    }

    async fn finish(&self, summaries: &[TrackSummary]) -> Vec<PathBuf> {
        if self.split {
            return finish::move_separate_files(&self.layout, summaries).await;
        }
        let Some(audio) = summaries.first() else {
            return Vec::new();
        };
        finish::combine(
            &self.layout,
            &audio.output,
            self.ffmpeg.as_deref(),
            self.show_logs,
        )
        .await
        .into_iter()
        .collect()
    }
}

fn default_name() -> String {
    format!("render_{}", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
