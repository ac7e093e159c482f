//! **Synthesis Bridge** — wrap the blocking, file-based Piper engine as an
//! async producer of one [`AudioUnit`] per request.
//!
//! Piper only does whole-utterance synthesis: it reads text on stdin and
//! writes a complete WAV to `--output_file`. The bridge hides that behind an
//! async call by spawning the engine with `tokio::process`, decoding the WAV
//! on a blocking worker, and scoping the output file to the call so it is
//! removed on every exit path — including cancellation, where
//! `kill_on_drop` tears the child down and the temp guard still fires.

use crate::audio::{decode_wav_file, AudioUnit};
use crate::error::{VoiceError, VoiceResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Configuration for the Piper synthesis engine.
///
/// Read-only shared state: concurrent synthesis calls borrow it freely, each
/// call owns its own temp file and child process.
#[derive(Debug, Clone)]
pub struct PiperConfig {
    /// Path to the piper executable
    pub binary_path: PathBuf,

    /// Path to the voice model (.onnx)
    pub model_path: PathBuf,

    /// Phoneme length scale; >1.0 slows speech down (default: 1.0)
    pub length_scale: f32,

    /// Output sample rate reported to consumers (default: 22050 Hz)
    pub sample_rate: u32,

    /// Directory for scratch WAV files; system temp dir when unset
    pub work_dir: Option<PathBuf>,
}

impl PiperConfig {
    pub fn new(binary_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model_path: model_path.into(),
            length_scale: 1.0,
            sample_rate: 22050,
            work_dir: None,
        }
    }

    /// Build from environment: PIPER_PATH, PIPER_MODEL_PATH (required),
    /// PIPER_LENGTH_SCALE, PIPER_SAMPLE_RATE.
    pub fn from_env() -> VoiceResult<Self> {
        let binary_path = std::env::var("PIPER_PATH").unwrap_or_else(|_| "piper".to_string());
        let model_path = std::env::var("PIPER_MODEL_PATH").map_err(|_| {
            VoiceError::SynthesisEngine("PIPER_MODEL_PATH is not set".to_string())
        })?;
        let mut config = Self::new(binary_path, model_path);
        if let Ok(scale) = std::env::var("PIPER_LENGTH_SCALE") {
            config.length_scale = scale
                .parse()
                .map_err(|_| VoiceError::SynthesisEngine(format!("bad PIPER_LENGTH_SCALE: {}", scale)))?;
        }
        if let Ok(rate) = std::env::var("PIPER_SAMPLE_RATE") {
            config.sample_rate = rate
                .parse()
                .map_err(|_| VoiceError::SynthesisEngine(format!("bad PIPER_SAMPLE_RATE: {}", rate)))?;
        }
        Ok(config)
    }

    pub fn with_length_scale(mut self, length_scale: f32) -> Self {
        self.length_scale = length_scale;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

/// Local Piper TTS bridge. One engine subprocess per synthesis call; no
/// state is shared between calls.
#[derive(Debug, Clone)]
pub struct PiperTts {
    config: PiperConfig,
}

impl PiperTts {
    pub fn new(config: PiperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PiperConfig {
        &self.config
    }

    /// Check the binary and model paths before touching the filesystem or
    /// spawning anything.
    pub fn preflight(&self) -> VoiceResult<()> {
        if !is_executable(&self.config.binary_path) {
            return Err(VoiceError::NotFound {
                what: "piper binary",
                path: self.config.binary_path.clone(),
            });
        }
        if !self.config.model_path.exists() {
            return Err(VoiceError::NotFound {
                what: "piper model",
                path: self.config.model_path.clone(),
            });
        }
        Ok(())
    }

    /// Synthesize one utterance to a mono 16-bit [`AudioUnit`].
    ///
    /// Blocking engine and file work run off the scheduler; the caller's
    /// task only awaits. Empty input skips the engine and returns an empty
    /// unit.
    pub async fn synthesize(&self, text: &str) -> VoiceResult<AudioUnit> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(AudioUnit::empty(self.config.sample_rate));
        }

        self.preflight()?;

        // Scoped output artifact: the TempPath guard deletes the file when
        // this call returns, errors out, or is cancelled mid-flight.
        let wav_path: TempPath = match self.config.work_dir {
            Some(ref dir) => tempfile::Builder::new()
                .prefix("piper-")
                .suffix(".wav")
                .tempfile_in(dir)?,
            None => tempfile::Builder::new()
                .prefix("piper-")
                .suffix(".wav")
                .tempfile()?,
        }
        .into_temp_path();

        self.run_engine(text, &wav_path).await?;

        let decode_path = wav_path.to_path_buf();
        let (samples, container_rate) =
            tokio::task::spawn_blocking(move || decode_wav_file(&decode_path))
                .await
                .map_err(|e| VoiceError::Decode(format!("decode task failed: {}", e)))??;

        debug!(
            "synthesized {} samples ({} Hz container, {} Hz configured)",
            samples.len(),
            container_rate,
            self.config.sample_rate
        );

        Ok(AudioUnit {
            samples,
            sample_rate: self.config.sample_rate,
            channels: 1,
        })
    }

    /// Run the engine subprocess: text on stdin, WAV to `out`.
    async fn run_engine(&self, text: &str, out: &Path) -> VoiceResult<()> {
        info!(
            "piper: synthesizing {} chars (length_scale={})",
            text.len(),
            self.config.length_scale
        );

        let mut child = Command::new(&self.config.binary_path)
            .arg("--model")
            .arg(&self.config.model_path)
            .arg("--length_scale")
            .arg(self.config.length_scale.to_string())
            .arg("--output_file")
            .arg(out)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VoiceError::SynthesisEngine(format!(
                    "failed to spawn {}: {}",
                    self.config.binary_path.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| VoiceError::SynthesisEngine(format!("failed to write stdin: {}", e)))?;
            // Dropping stdin closes the pipe so the engine sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| VoiceError::SynthesisEngine(format!("engine wait failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::SynthesisEngine(format!(
                "engine exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
