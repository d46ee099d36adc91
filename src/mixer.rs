use std::f32::consts::TAU;

use ffmpeg_pipe::{format::PcmFormat, mixer::AudioMixer};

/// Synthetic stand-in for the game mixer: a sine "music" bed plus a short
/// decaying click every `click_every` seconds as "effects".
///
/// Each signal path keeps its own clock, so filling the music and effects
/// paths on the same tick renders the same instant of both.
pub struct ToneMixer {
    format: PcmFormat,
    tone_hz: f32,
    click_every: f32,
    master_pos: u64,
    music_pos: u64,
    effects_pos: u64,
}

impl ToneMixer {
    pub fn new(format: PcmFormat) -> Self {
        Self {
            format,
            tone_hz: 440.0,
            click_every: 0.5,
            master_pos: 0,
            music_pos: 0,
            effects_pos: 0,
        }
    }

    fn music_at(&self, pos: u64) -> f32 {
        let t = pos as f32 / self.format.sample_rate as f32;
        0.2 * (TAU * self.tone_hz * t).sin()
    }

    fn effects_at(&self, pos: u64) -> f32 {
        let period = (self.click_every * self.format.sample_rate as f32) as u64;
        let since = pos % period.max(1);
        let decay = (-(since as f32) / 400.0).exp();
        if decay < 1e-4 {
            0.0
        } else {
            0.5 * decay * (TAU * 2_000.0 * since as f32 / self.format.sample_rate as f32).sin()
        }
    }

    fn render(
        buf: &mut [u8],
        channels: usize,
        pos: &mut u64,
        mut sample: impl FnMut(u64) -> f32,
    ) {
        for frame in buf.chunks_exact_mut(channels * 4) {
            let bytes = sample(*pos).to_le_bytes();
            for channel in frame.chunks_exact_mut(4) {
                channel.copy_from_slice(&bytes);
            }
            *pos += 1;
        }
    }
}

impl AudioMixer for ToneMixer {
    fn fill_master(&mut self, buf: &mut [u8]) {
        let mut pos = self.master_pos;
        let channels = self.format.channels as usize;
        Self::render(buf, channels, &mut pos, |p| self.music_at(p) + self.effects_at(p));
        self.master_pos = pos;
    }

    fn fill_music(&mut self, buf: &mut [u8]) {
        let mut pos = self.music_pos;
        let channels = self.format.channels as usize;
        Self::render(buf, channels, &mut pos, |p| self.music_at(p));
        self.music_pos = pos;
    }

    fn fill_effects(&mut self, buf: &mut [u8]) {
        let mut pos = self.effects_pos;
        let channels = self.format.channels as usize;
        Self::render(buf, channels, &mut pos, |p| self.effects_at(p));
        self.effects_pos = pos;
    }
}
