//! # Piper Voice - Local TTS Bridge & Turn Latency Correlation
//!
//! Wraps the Piper speech synthesizer — a blocking, file-based external
//! process — as an async audio producer for a real-time voice pipeline, and
//! correlates per-turn STT/LLM/TTS latency metrics into one end-to-end
//! figure.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Session Driver (host)                   │
//! │  ┌──────────────┐                    ┌──────────────────┐  │
//! │  │   PiperTts   │  text → AudioUnit  │  LatencyTracker  │  │
//! │  │  (subprocess │───────────────────→│  (keyed STT/LLM/ │  │
//! │  │  + WAV read) │   one per request  │   TTS records)   │  │
//! │  └──────────────┘                    └──────────────────┘  │
//! │         ↓                                      ↓            │
//! │   AudioSink (PCM push)              CompletedLatency (log)  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two components are independent: the bridge never sees metric events
//! and the tracker never touches audio.

pub mod audio;
pub mod error;
pub mod latency;
pub mod stream;
pub mod synth;

pub use audio::{decode_wav, decode_wav_file, AudioUnit};
pub use error::{VoiceError, VoiceResult};
pub use latency::{CompletedLatency, LatencyTracker, MetricEvent};
pub use stream::{AudioSink, StreamMeta};
pub use synth::{PiperConfig, PiperTts};
