use std::{collections::HashMap, path::Path};

use crate::{
    command::{EncoderCommand, INPUT_PLACEHOLDER, TrackPlan},
    mixer::AudioMixer,
    track::Track,
};

/// Fills every frame with its index followed by a per-track tag byte, and
/// remembers what it produced.
#[derive(Default)]
pub struct PatternMixer {
    produced: HashMap<Track, Vec<u8>>,
    frames: HashMap<Track, u64>,
}

impl PatternMixer {
    pub fn tag(track: Track) -> u8 {
        match track {
            Track::Combined => 0xC0,
            Track::Music => 0xAA,
            Track::Effects => 0x55,
        }
    }

    pub fn produced(&self, track: Track) -> &[u8] {
        self.produced.get(&track).map(Vec::as_slice).unwrap_or(&[])
    }

    fn fill_track(&mut self, track: Track, buf: &mut [u8]) {
        let index = self.frames.entry(track).or_default();
        buf.fill(Self::tag(track));
        let header = index.to_le_bytes();
        let n = header.len().min(buf.len());
        buf[..n].copy_from_slice(&header[..n]);
        *index += 1;
        self.produced.entry(track).or_default().extend_from_slice(buf);
    }
}

impl AudioMixer for PatternMixer {
    fn fill_master(&mut self, buf: &mut [u8]) {
        self.fill_track(Track::Combined, buf)
    }

    fn fill_music(&mut self, buf: &mut [u8]) {
        self.fill_track(Track::Music, buf)
    }

    fn fill_effects(&mut self, buf: &mut [u8]) {
        self.fill_track(Track::Effects, buf)
    }
}

/// `sh` stand-in encoder copying its named-pipe input to `output`.
pub fn cat_from_pipe(track: Track, output: &Path) -> TrackPlan {
    let command = EncoderCommand::new("sh").args([
        "-c".to_string(),
        "cat \"$0\" > \"$1\"".to_string(),
        INPUT_PLACEHOLDER.to_string(),
        output.to_string_lossy().into_owned(),
    ]);
    TrackPlan {
        track,
        command,
        output: output.to_path_buf(),
    }
}

/// `sh` stand-in encoder copying its stdin to `output`.
pub fn cat_from_stdin(track: Track, output: &Path) -> TrackPlan {
    let command = EncoderCommand::new("sh").args([
        "-c".to_string(),
        "cat > \"$0\"".to_string(),
        output.to_string_lossy().into_owned(),
    ]);
    TrackPlan {
        track,
        command,
        output: output.to_path_buf(),
    }
}

/// Encoder that reads `limit` bytes from the named pipe and dies with status 3.
pub fn dies_after(track: Track, limit: usize) -> TrackPlan {
    let command = EncoderCommand::new("sh").args([
        "-c".to_string(),
        format!("head -c {} \"$0\" > /dev/null; exit 3", limit),
        INPUT_PLACEHOLDER.to_string(),
    ]);
    TrackPlan {
        track,
        command,
        output: Path::new("/dev/null").to_path_buf(),
    }
}
