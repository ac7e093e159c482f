//! Decoded audio units and WAV container handling
//!
//! The synthesis engine writes a mono or stereo 16-bit WAV file; this module
//! reads it back as raw samples and folds stereo down to mono.

use crate::error::{VoiceError, VoiceResult};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// One decoded utterance of linear PCM, produced exactly once per
/// successful synthesis request. Always mono after decode.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUnit {
    /// 16-bit signed samples
    pub samples: Vec<i16>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (always 1 after decode)
    pub channels: u16,
}

impl AudioUnit {
    /// An empty unit at the given rate (used when there is nothing to say).
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels: 1,
        }
    }

    /// Raw little-endian PCM bytes, as pushed over the streaming boundary.
    pub fn pcm_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.samples.len() * 2);
        for &s in &self.samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        buf
    }

    /// Playback duration of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode a WAV container into mono 16-bit samples plus the container's
/// sample rate.
///
/// Only 16-bit integer PCM is accepted. Stereo is downmixed by averaging
/// each sample pair with integer truncation; any other channel layout is
/// rejected.
pub fn decode_wav(reader: impl Read) -> VoiceResult<(Vec<i16>, u32)> {
    let mut wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(VoiceError::UnsupportedAudioFormat(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    match spec.channels {
        1 => {
            let samples = wav.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
            Ok((samples, spec.sample_rate))
        }
        2 => {
            let interleaved = wav.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
            Ok((downmix_stereo(&interleaved), spec.sample_rate))
        }
        n => Err(VoiceError::UnsupportedAudioFormat(format!(
            "expected 1 or 2 channels, got {}",
            n
        ))),
    }
}

/// Decode a WAV file from disk. Blocking; callers on an async runtime
/// offload this to a worker thread.
pub fn decode_wav_file(path: &Path) -> VoiceResult<(Vec<i16>, u32)> {
    let file = std::fs::File::open(path)
        .map_err(|e| VoiceError::Decode(format!("cannot open {}: {}", path.display(), e)))?;
    decode_wav(std::io::BufReader::new(file))
}

/// Average interleaved L/R pairs into mono, truncating like integer
/// division (no dithering).
fn downmix_stereo(interleaved: &[i16]) -> Vec<i16> {
    interleaved
        .chunks_exact(2)
        .map(|frame| ((frame[0] as i32 + frame[1] as i32) / 2) as i16)
        .collect()
}
