//! **Latency Correlation Tracker** — fold per-turn STT/LLM/TTS timing
//! events into one end-to-end latency figure.
//!
//! The host framework emits one metric event per pipeline stage, each
//! tagged with the turn's speech id. The tracker keys partial records by
//! that id and emits a [`CompletedLatency`] the moment all three parts have
//! arrived, removing the record so a key never completes twice.
//!
//! One tracker per session; events are observed from a single callback
//! context, so the table needs no internal locking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// One timing event from the host framework, classified at the boundary.
///
/// `Other` covers the framework's unrelated metric kinds (usage counters,
/// VAD stats, ...), which pass through the tracker silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Speech-to-text: end-of-utterance delay
    Recognition {
        duration: Duration,
        key: Option<String>,
    },
    /// Language model: time to first token
    Generation {
        duration: Duration,
        key: Option<String>,
    },
    /// Text-to-speech: time to first byte
    Synthesis {
        duration: Duration,
        key: Option<String>,
    },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatencyKind {
    Stt,
    Llm,
    Tts,
}

impl LatencyKind {
    fn as_str(self) -> &'static str {
        match self {
            LatencyKind::Stt => "STT",
            LatencyKind::Llm => "LLM",
            LatencyKind::Tts => "TTS",
        }
    }
}

/// All three stage latencies for one turn, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedLatency {
    pub key: String,
    pub stt_ms: f64,
    pub llm_ms: f64,
    pub tts_ms: f64,
    pub total_ms: f64,
}

/// Partial per-turn record; lives in the table until the third part lands.
#[derive(Debug)]
struct LatencyRecord {
    stt_ms: Option<f64>,
    llm_ms: Option<f64>,
    tts_ms: Option<f64>,
    created_at: Instant,
}

impl LatencyRecord {
    fn new() -> Self {
        Self {
            stt_ms: None,
            llm_ms: None,
            tts_ms: None,
            created_at: Instant::now(),
        }
    }
}

/// Correlates per-stage latency events by turn key. Owned by the session
/// driver; never a process-wide singleton.
#[derive(Debug)]
pub struct LatencyTracker {
    /// Session label for log lines (e.g. the room name)
    label: String,
    parts: HashMap<String, LatencyRecord>,
}

impl LatencyTracker {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parts: HashMap::new(),
        }
    }

    /// Observe one metric event. Returns the completed turn latency when
    /// this event supplies the last missing part for its key.
    ///
    /// Duplicate parts overwrite (last-write-wins); events without a key
    /// (or with an empty one) are logged but never stored.
    pub fn observe(&mut self, event: MetricEvent) -> Option<CompletedLatency> {
        let (kind, duration, key) = match event {
            MetricEvent::Recognition { duration, key } => (LatencyKind::Stt, duration, key),
            MetricEvent::Generation { duration, key } => (LatencyKind::Llm, duration, key),
            MetricEvent::Synthesis { duration, key } => (LatencyKind::Tts, duration, key),
            MetricEvent::Other => return None,
        };

        let ms = duration.as_secs_f64() * 1000.0;
        info!("[{}] {} latency: {:.2} ms", self.label, kind.as_str(), ms);

        let key = match key {
            Some(k) if !k.is_empty() => k,
            _ => return None,
        };

        let record = self.parts.entry(key.clone()).or_insert_with(LatencyRecord::new);
        match kind {
            LatencyKind::Stt => record.stt_ms = Some(ms),
            LatencyKind::Llm => record.llm_ms = Some(ms),
            LatencyKind::Tts => record.tts_ms = Some(ms),
        }

        let (stt_ms, llm_ms, tts_ms) = match (record.stt_ms, record.llm_ms, record.tts_ms) {
            (Some(s), Some(l), Some(t)) => (s, l, t),
            _ => return None,
        };

        let total_ms = stt_ms + llm_ms + tts_ms;
        info!(
            "[{}] Total latency for turn {}: STT={:.2}ms + LLM={:.2}ms + TTS={:.2}ms = {:.2}ms",
            self.label, key, stt_ms, llm_ms, tts_ms, total_ms
        );
        self.parts.remove(&key);

        Some(CompletedLatency {
            key,
            stt_ms,
            llm_ms,
            tts_ms,
            total_ms,
        })
    }

    /// Number of keys still waiting on at least one part.
    pub fn pending(&self) -> usize {
        self.parts.len()
    }

    /// Whether a partial record exists for the given key.
    pub fn has_pending(&self, key: &str) -> bool {
        self.parts.contains_key(key)
    }

    /// Drop partial records older than `max_age`; returns how many were
    /// evicted. Turns that never complete (e.g. interrupted mid-reply)
    /// otherwise stay in the table for the life of the tracker, so
    /// long-lived owners should sweep periodically.
    pub fn evict_older_than(&mut self, max_age: Duration) -> usize {
        let before = self.parts.len();
        self.parts.retain(|_, record| record.created_at.elapsed() < max_age);
        before - self.parts.len()
    }
}
