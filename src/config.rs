use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use ffmpeg_pipe::{
    command::FfmpegPlanner,
    input::InputKind,
    process::SpawnOptions,
    track::{MAX_AUDIO_BUFFERS, PipelineOptions},
};
use serde::Deserialize;

pub const CONFIG_ENV: &str = "RECORDER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "recorder.json";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Auto,
    NamedPipe,
    Stdin,
}

impl From<InputMode> for InputKind {
    fn from(mode: InputMode) -> Self {
        match mode {
            InputMode::Auto => InputKind::Auto,
            InputMode::NamedPipe => InputKind::NamedPipe,
            InputMode::Stdin => InputKind::Stdin,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Explicit ffmpeg executable; `PATH` is searched when unset or missing.
    pub ffmpeg_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Base name of the finished files; a timestamped name when unset.
    pub output_name: Option<String>,
    pub container: String,
    pub audio_codec: String,
    pub audio_filters: String,
    pub audio_options: BTreeMap<String, String>,
    pub split_audio_tracks: bool,
    pub show_ffmpeg_logs: bool,
    pub max_audio_buffers: usize,
    pub input: InputMode,
    pub pipe_open_timeout_ms: u64,
    pub frame_rate: f64,
    pub duration_secs: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            output_dir: PathBuf::from("videos"),
            output_name: None,
            container: "mp4".to_string(),
            audio_codec: "aac".to_string(),
            audio_filters: String::new(),
            audio_options: BTreeMap::new(),
            split_audio_tracks: false,
            show_ffmpeg_logs: false,
            max_audio_buffers: MAX_AUDIO_BUFFERS,
            input: InputMode::Auto,
            pipe_open_timeout_ms: 10_000,
            frame_rate: 60.0,
            duration_secs: 10.0,
        }
    }
}

impl RecordingConfig {
    /// Reads the file named by `RECORDER_CONFIG`, or `recorder.json`.
    /// A missing default file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.container.trim().is_empty() {
            anyhow::bail!("container must not be empty");
        }
        if self.audio_codec.trim().is_empty() {
            anyhow::bail!("audio_codec must not be empty");
        }
        if self.max_audio_buffers == 0 {
            anyhow::bail!("max_audio_buffers must be at least 1");
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            anyhow::bail!("frame_rate must be positive, got {}", self.frame_rate);
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            anyhow::bail!("duration_secs must be positive, got {}", self.duration_secs);
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            max_buffers: self.max_audio_buffers,
            queue_capacity: self.max_audio_buffers,
            spawn: SpawnOptions {
                input: self.input.into(),
                show_logs: self.show_ffmpeg_logs,
                pipe_open_timeout: Duration::from_millis(self.pipe_open_timeout_ms),
            },
        }
    }

    pub fn planner(&self, exec: &Path) -> FfmpegPlanner {
        let mut planner = FfmpegPlanner::new(exec);
        planner.container = self.container.clone();
        planner.audio_codec = self.audio_codec.clone();
        planner.audio_filters = self.audio_filters.clone();
        planner.audio_options = self.audio_options.clone();
        planner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recorder.json");
        std::fs::write(
            &path,
            r#"{
                "output_dir": "/tmp/renders",
                "audio_codec": "libopus",
                "audio_options": { "b:a": "160k" },
                "split_audio_tracks": true,
                "input": "stdin"
            }"#,
        )?;

        let config = RecordingConfig::from_file(&path)?;
        assert_eq!(config.output_dir, Path::new("/tmp/renders"));
        assert_eq!(config.audio_codec, "libopus");
        assert!(config.split_audio_tracks);
        assert_eq!(config.container, "mp4");
        assert_eq!(config.max_audio_buffers, MAX_AUDIO_BUFFERS);

        let options = config.pipeline_options();
        assert_eq!(options.spawn.input, InputKind::Stdin);
        assert_eq!(options.queue_capacity, MAX_AUDIO_BUFFERS);

        let planner = config.planner(Path::new("ffmpeg"));
        assert_eq!(planner.audio_options.get("b:a").map(String::as_str), Some("160k"));
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recorder.json");
        std::fs::write(&path, r#"{ "max_audio_buffers": 0 }"#)?;
        assert!(RecordingConfig::from_file(&path).is_err());

        std::fs::write(&path, r#"{ "input": "socket" }"#)?;
        assert!(RecordingConfig::from_file(&path).is_err());

        std::fs::write(&path, r#"{ "duration_secs": -5 }"#)?;
        let err = RecordingConfig::from_file(&path).expect_err("negative duration");
        assert!(format!("{:#}", err).contains("duration_secs"));

        let mut config = RecordingConfig::default();
        config.duration_secs = f64::NAN;
        assert!(config.validate().is_err());
        Ok(())
    }
}
