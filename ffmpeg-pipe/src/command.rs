use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{format::PcmFormat, track::Track};

/// Argument replaced by the input name (`-` or the FIFO path) when the
/// encoder is spawned. Only an argument equal to it is replaced.
pub const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl EncoderCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments with the input placeholder substituted. Paths and filter
    /// strings that merely contain `{input}` are passed through untouched.
    pub fn resolve_args(&self, input: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                if a == INPUT_PLACEHOLDER {
                    input.to_string()
                } else {
                    a.clone()
                }
            })
            .collect()
    }
}

/// Everything needed to launch one track's encoder.
#[derive(Clone, Debug)]
pub struct TrackPlan {
    pub track: Track,
    pub command: EncoderCommand,
    /// File the encoder writes.
    pub output: PathBuf,
}

/// Decides how each track is encoded and where it lands.
pub trait CommandPlanner: Send + Sync {
    fn plan(&self, track: Track, work_dir: &Path) -> anyhow::Result<TrackPlan>;
}

/// Plans ffmpeg invocations.
///
/// The combined track follows the user's codec, filters and encoder options.
/// Split tracks always go to 16-bit PCM WAV so they can be mixed downstream.
#[derive(Clone, Debug)]
pub struct FfmpegPlanner {
    pub exec: PathBuf,
    pub container: String,
    pub audio_codec: String,
    pub audio_filters: String,
    pub audio_options: BTreeMap<String, String>,
    pub format: PcmFormat,
}

impl FfmpegPlanner {
    pub fn new(exec: impl Into<PathBuf>) -> Self {
        Self {
            exec: exec.into(),
            container: "mp4".to_string(),
            audio_codec: "aac".to_string(),
            audio_filters: String::new(),
            audio_options: BTreeMap::new(),
            format: PcmFormat::default(),
        }
    }

    /// Encoder options as `-key value` pairs.
    fn encoder_option_args(&self) -> anyhow::Result<Vec<String>> {
        let mut args = Vec::with_capacity(self.audio_options.len() * 2);
        for (key, value) in &self.audio_options {
            let key = key.trim().trim_start_matches('-');
            if key.is_empty() || key.contains(char::is_whitespace) {
                anyhow::bail!("encoder \"{}\": invalid option name {:?}", self.audio_codec, key);
            }
            if value.trim().is_empty() {
                anyhow::bail!("encoder \"{}\": option {:?} has no value", self.audio_codec, key);
            }
            args.push(format!("-{}", key));
            args.push(value.trim().to_string());
        }
        Ok(args)
    }
}

impl CommandPlanner for FfmpegPlanner {
    fn plan(&self, track: Track, work_dir: &Path) -> anyhow::Result<TrackPlan> {
        let mut command = EncoderCommand::new(&self.exec)
            .arg("-y")
            .args(self.format.input_args(INPUT_PLACEHOLDER))
            // audio only, no progress lines
            .args(["-nostats", "-vn"]);

        let output = match track {
            Track::Combined => {
                let filters = self.audio_filters.trim();
                if !filters.is_empty() {
                    command = command.args(["-af", filters]);
                }
                command = command
                    .args(["-c:a", self.audio_codec.as_str(), "-strict", "-2"])
                    .args(self.encoder_option_args()?);
                work_dir.join(format!("{}.{}", track.file_stem(), self.container))
            }
            Track::Music | Track::Effects => {
                command = command
                    .args(["-c:a", "pcm_s16le", "-ar"])
                    .arg(self.format.sample_rate.to_string());
                work_dir.join(format!("{}.wav", track.file_stem()))
            }
        };

        let command = command.arg(output.to_string_lossy().into_owned());
        Ok(TrackPlan {
            track,
            command,
            output,
        })
    }
}
