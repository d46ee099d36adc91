use crate::track::Track;

/// The audio-mixing engine, as seen by the pipelines.
///
/// Each method fills the whole buffer with the next frame of interleaved
/// `f32le` samples for its signal path. A mixer without dedicated music or
/// effects paths falls back to the master mix.
pub trait AudioMixer {
    fn fill_master(&mut self, buf: &mut [u8]);

    fn fill_music(&mut self, buf: &mut [u8]) {
        self.fill_master(buf)
    }

    fn fill_effects(&mut self, buf: &mut [u8]) {
        self.fill_master(buf)
    }

    fn fill(&mut self, track: Track, buf: &mut [u8]) {
        match track {
            Track::Combined => self.fill_master(buf),
            Track::Music => self.fill_music(buf),
            Track::Effects => self.fill_effects(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MasterOnly;

    impl AudioMixer for MasterOnly {
        fn fill_master(&mut self, buf: &mut [u8]) {
            buf.fill(7);
        }
    }

    #[test]
    fn test_paths_fall_back_to_master() {
        let mut mixer = MasterOnly;
        for track in [Track::Combined, Track::Music, Track::Effects] {
            let mut buf = [0u8; 4];
            mixer.fill(track, &mut buf);
            assert_eq!(buf, [7; 4]);
        }
    }
}
