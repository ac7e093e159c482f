//! Streaming boundary for synthesized audio
//!
//! Piper has no incremental mode, so the "stream" is single-shot: one
//! [`AudioUnit`] per request, then the sequence ends. The host pipeline is
//! modelled by [`AudioSink`]: one `initialize` call describing the audio,
//! then raw PCM pushes. Re-segmenting the unit into smaller frames is the
//! consumer's business, not ours.

use crate::audio::AudioUnit;
use crate::error::VoiceResult;
use crate::synth::PiperTts;
use futures::stream::Stream;

/// Stream metadata delivered to an [`AudioSink`] before any PCM bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMeta {
    pub request_id: String,
    pub sample_rate: u32,
    pub num_channels: u16,
    pub mime_type: String,
    /// False for whole-utterance engines like Piper
    pub streaming: bool,
}

/// Consumer of synthesized audio: the host pipeline's output emitter.
/// `initialize` is called exactly once, before any `push`.
pub trait AudioSink: Send {
    fn initialize(&mut self, meta: StreamMeta) -> VoiceResult<()>;
    fn push(&mut self, pcm: &[u8]) -> VoiceResult<()>;
}

impl PiperTts {
    /// Single-shot stream: yields exactly one synthesis result, then ends.
    pub fn synthesize_stream(
        &self,
        text: impl Into<String>,
    ) -> impl Stream<Item = VoiceResult<AudioUnit>> + '_ {
        let text = text.into();
        futures::stream::once(async move { self.synthesize(&text).await })
    }

    /// Synthesize and deliver through an [`AudioSink`]: preflight, announce
    /// the format, then push the whole utterance as one PCM block.
    pub async fn synthesize_to_sink(
        &self,
        text: &str,
        sink: &mut dyn AudioSink,
    ) -> VoiceResult<()> {
        self.preflight()?;
        sink.initialize(StreamMeta {
            request_id: "piper-local".to_string(),
            sample_rate: self.config().sample_rate,
            num_channels: 1,
            mime_type: "audio/pcm".to_string(),
            streaming: false,
        })?;
        let unit = self.synthesize(text).await?;
        sink.push(&unit.pcm_bytes())?;
        Ok(())
    }
}
