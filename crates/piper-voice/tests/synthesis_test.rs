//! Integration tests for the synthesis bridge, driven by fake engine
//! executables so no real Piper install is needed.
//!
//! Each test points `work_dir` at its own scratch directory and asserts the
//! engine's output artifact is gone afterwards, on success and on every
//! failure branch.

#![cfg(unix)]

use piper_voice::{AudioSink, PiperConfig, PiperTts, StreamMeta, VoiceError, VoiceResult};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Fake engine that drains stdin and copies a prepared WAV to --output_file.
fn copying_engine(dir: &Path, fixture: &Path) -> PathBuf {
    let body = format!(
        r##"#!/bin/sh
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output_file) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cat > /dev/null
cp "{}" "$out"
"##,
        fixture.display()
    );
    install_script(dir, "piper", &body)
}

/// Fake engine that fails with a diagnostic on stderr.
fn failing_engine(dir: &Path) -> PathBuf {
    install_script(
        dir,
        "piper",
        "#!/bin/sh\ncat > /dev/null\necho 'voice model load failed' >&2\nexit 1\n",
    )
}

/// Fake engine that writes a non-WAV file to --output_file.
fn corrupting_engine(dir: &Path) -> PathBuf {
    let body = r##"#!/bin/sh
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output_file) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
cat > /dev/null
echo "definitely not a wav" > "$out"
"##;
    install_script(dir, "piper", body)
}

fn touch(path: &Path) {
    fs::write(path, b"").unwrap();
}

fn dir_entry_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

struct Fixture {
    /// Holds bin/, model, fixture wav
    _bin_dir: TempDir,
    /// Scratch dir handed to the bridge as work_dir
    scratch: TempDir,
    tts: PiperTts,
}

fn fixture_with_engine(make_engine: impl FnOnce(&Path) -> PathBuf) -> Fixture {
    let bin_dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let engine = make_engine(bin_dir.path());
    let model = bin_dir.path().join("voice.onnx");
    touch(&model);

    let config = PiperConfig::new(engine, model)
        .with_sample_rate(22050)
        .with_work_dir(scratch.path());
    Fixture {
        _bin_dir: bin_dir,
        scratch,
        tts: PiperTts::new(config),
    }
}

#[tokio::test]
async fn synthesizes_one_mono_unit() {
    init_logging();
    let samples: Vec<i16> = vec![10, -20, 30, -40, 50];

    let fx = fixture_with_engine(|dir| {
        let fixture = dir.join("fixture.wav");
        write_wav(&fixture, 1, &[10, -20, 30, -40, 50]);
        copying_engine(dir, &fixture)
    });

    let unit = fx.tts.synthesize("hello there").await.unwrap();
    assert_eq!(unit.samples, samples);
    assert_eq!(unit.channels, 1);
    assert_eq!(unit.sample_rate, 22050);
    assert_eq!(dir_entry_count(fx.scratch.path()), 0, "artifact leaked");
}

#[tokio::test]
async fn stereo_output_is_downmixed_to_mono() {
    init_logging();
    let fx = fixture_with_engine(|dir| {
        let fixture = dir.join("fixture.wav");
        // Frames [100,200] and [4,-4] must average to [150, 0]
        write_wav(&fixture, 2, &[100, 200, 4, -4]);
        copying_engine(dir, &fixture)
    });

    let unit = fx.tts.synthesize("stereo voice").await.unwrap();
    assert_eq!(unit.samples, vec![150, 0]);
    assert_eq!(unit.channels, 1);
    assert_eq!(dir_entry_count(fx.scratch.path()), 0);
}

#[tokio::test]
async fn engine_failure_surfaces_stderr_and_cleans_up() {
    init_logging();
    let fx = fixture_with_engine(|dir| failing_engine(dir));

    let err = fx.tts.synthesize("hello").await.unwrap_err();
    match err {
        VoiceError::SynthesisEngine(msg) => {
            assert!(msg.contains("voice model load failed"), "stderr missing: {}", msg);
        }
        other => panic!("expected SynthesisEngine, got {:?}", other),
    }
    assert_eq!(dir_entry_count(fx.scratch.path()), 0, "artifact leaked on failure");
}

#[tokio::test]
async fn corrupt_engine_output_is_a_decode_error() {
    init_logging();
    let fx = fixture_with_engine(|dir| corrupting_engine(dir));

    let err = fx.tts.synthesize("hello").await.unwrap_err();
    assert!(matches!(err, VoiceError::Decode(_)), "got {:?}", err);
    assert_eq!(dir_entry_count(fx.scratch.path()), 0);
}

#[tokio::test]
async fn missing_binary_fails_before_any_filesystem_write() {
    init_logging();
    let scratch = TempDir::new().unwrap();
    let model_dir = TempDir::new().unwrap();
    let model = model_dir.path().join("voice.onnx");
    touch(&model);

    let config = PiperConfig::new("/nonexistent/piper", model).with_work_dir(scratch.path());
    let err = PiperTts::new(config).synthesize("hello").await.unwrap_err();

    match err {
        VoiceError::NotFound { what, path } => {
            assert_eq!(what, "piper binary");
            assert_eq!(path, PathBuf::from("/nonexistent/piper"));
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    // Eager preflight: no temp artifact was ever created.
    assert_eq!(dir_entry_count(scratch.path()), 0);
}

#[tokio::test]
async fn non_executable_binary_is_not_found() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let binary = dir.path().join("piper");
    touch(&binary); // exists but no exec bit
    let model = dir.path().join("voice.onnx");
    touch(&model);

    let err = PiperTts::new(PiperConfig::new(&binary, &model))
        .synthesize("hello")
        .await
        .unwrap_err();
    assert!(matches!(err, VoiceError::NotFound { what: "piper binary", .. }));
}

#[tokio::test]
async fn missing_model_is_not_found() {
    init_logging();
    let fx = fixture_with_engine(|dir| {
        let fixture = dir.join("fixture.wav");
        write_wav(&fixture, 1, &[1]);
        copying_engine(dir, &fixture)
    });

    let config = PiperConfig::new(
        fx.tts.config().binary_path.clone(),
        "/nonexistent/voice.onnx",
    );
    let err = PiperTts::new(config).synthesize("hello").await.unwrap_err();
    assert!(matches!(err, VoiceError::NotFound { what: "piper model", .. }));
}

#[tokio::test]
async fn cancellation_releases_the_artifact() {
    init_logging();
    let fx = fixture_with_engine(|dir| {
        install_script(dir, "piper", "#!/bin/sh\ncat > /dev/null\nsleep 30\n")
    });

    let result = tokio::time::timeout(Duration::from_millis(200), fx.tts.synthesize("hello")).await;
    assert!(result.is_err(), "engine should still have been running");

    // Dropping the synthesis future drops the temp guard and kills the child.
    assert_eq!(dir_entry_count(fx.scratch.path()), 0, "artifact leaked on cancel");
}

struct RecordingSink {
    meta: Option<StreamMeta>,
    pcm: Vec<u8>,
    pushes: usize,
}

impl AudioSink for RecordingSink {
    fn initialize(&mut self, meta: StreamMeta) -> VoiceResult<()> {
        self.meta = Some(meta);
        Ok(())
    }

    fn push(&mut self, pcm: &[u8]) -> VoiceResult<()> {
        assert!(self.meta.is_some(), "push before initialize");
        self.pcm.extend_from_slice(pcm);
        self.pushes += 1;
        Ok(())
    }
}

#[tokio::test]
async fn sink_gets_one_init_and_one_pcm_push() {
    init_logging();
    let fx = fixture_with_engine(|dir| {
        let fixture = dir.join("fixture.wav");
        write_wav(&fixture, 1, &[1, 2, 3]);
        copying_engine(dir, &fixture)
    });

    let mut sink = RecordingSink {
        meta: None,
        pcm: Vec::new(),
        pushes: 0,
    };
    fx.tts.synthesize_to_sink("hello", &mut sink).await.unwrap();

    let meta = sink.meta.unwrap();
    assert_eq!(meta.request_id, "piper-local");
    assert_eq!(meta.sample_rate, 22050);
    assert_eq!(meta.num_channels, 1);
    assert_eq!(meta.mime_type, "audio/pcm");
    assert!(!meta.streaming);

    assert_eq!(sink.pushes, 1);
    assert_eq!(sink.pcm.len(), 3 * 2, "3 samples of 16-bit PCM");
}

#[tokio::test]
async fn concurrent_requests_do_not_interfere() {
    init_logging();
    let fx = fixture_with_engine(|dir| {
        let fixture = dir.join("fixture.wav");
        write_wav(&fixture, 1, &[7; 16]);
        copying_engine(dir, &fixture)
    });

    let (a, b, c) = tokio::join!(
        fx.tts.synthesize("one"),
        fx.tts.synthesize("two"),
        fx.tts.synthesize("three"),
    );
    for unit in [a.unwrap(), b.unwrap(), c.unwrap()] {
        assert_eq!(unit.samples.len(), 16);
    }
    assert_eq!(dir_entry_count(fx.scratch.path()), 0);
}
