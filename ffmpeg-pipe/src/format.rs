/// Sample rate every encoder input is declared with.
pub const SAMPLE_RATE: u32 = 48_000;

/// Interleaved channel count.
pub const CHANNELS: u16 = 2;

/// Bytes per sample (`f32le`).
pub const BYTES_PER_SAMPLE: usize = 4;

/// Raw PCM layout fed into every encoder process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
        }
    }
}

impl PcmFormat {
    /// Size of one interleaved sample frame (all channels).
    pub fn block_align(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Bytes needed for `seconds` of audio, truncated to whole sample frames.
    pub fn bytes_for_seconds(&self, seconds: f64) -> usize {
        let frames = (self.sample_rate as f64 * seconds).floor();
        frames as usize * self.block_align()
    }

    /// Byte length of one render tick at `frame_rate` ticks per second.
    ///
    /// Returns `None` for rates that cannot produce a non-empty buffer.
    pub fn frame_bytes(&self, frame_rate: f64) -> Option<usize> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return None;
        }
        match self.bytes_for_seconds(1.0 / frame_rate) {
            0 => None,
            n => Some(n),
        }
    }

    /// ffmpeg arguments describing this layout as a raw input read from `input`.
    pub fn input_args(&self, input: &str) -> Vec<String> {
        vec![
            "-f".to_string(),
            "f32le".to_string(),
            "-acodec".to_string(),
            "pcm_f32le".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            self.channels.to_string(),
            "-i".to_string(),
            input.to_string(),
        ]
    }
}
