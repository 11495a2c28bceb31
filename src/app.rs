//! Replay application entry point.
//!
//! Builds a session from configured assets and feeds it recorded landmark
//! frames: frames.jsonl → session → gloss events as JSON lines.

use crate::classifier::candle_engine::CandleEngineFactory;
use crate::classifier::classify::Classifier;
use crate::classifier::labels::LabelSet;
use crate::config::Config;
use crate::error::{Result, SignflowError};
use crate::features::landmarks::LandmarkFrame;
use crate::features::scaler::FeatureScaler;
use crate::pipeline::session::RecognitionSession;
use std::io::{BufRead, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// How a recording is fed to the session.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Sleep between frames according to their timestamps.
    pub realtime: bool,
    /// Send whatever is pending once the recording ends.
    pub commit_at_end: bool,
}

/// Counters reported after a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: u64,
    pub skipped_lines: u64,
    pub events: u64,
}

/// Build a session from the assets named in `config`.
///
/// A missing or broken model or label file is fatal. A broken scaler only
/// degrades extraction to unscaled features.
pub fn build_session(config: &Config) -> Result<RecognitionSession> {
    config.validate()?;

    let model = config
        .assets
        .model
        .as_deref()
        .ok_or_else(|| SignflowError::ModelAsset {
            message: "no model configured (set assets.model or pass --model)".to_string(),
        })?;
    let factory = CandleEngineFactory::from_file(model)?;

    let labels = config
        .assets
        .labels
        .as_deref()
        .map(LabelSet::load)
        .transpose()?;
    if labels.is_none() {
        tracing::warn!("no label file configured, showing placeholder labels");
    }

    let scaler = config.assets.scaler.as_deref().and_then(|path| {
        load_scaler(path)
            .inspect_err(|e| tracing::warn!("feature scaler unavailable: {e}"))
            .ok()
    });

    let classifier =
        Classifier::new(Box::new(factory), config.classifier.clone()).with_labels(labels);
    Ok(RecognitionSession::new(config.clone(), classifier).with_scaler(scaler))
}

fn load_scaler(path: &Path) -> Result<FeatureScaler> {
    let json = std::fs::read_to_string(path).map_err(|e| SignflowError::ScalerAsset {
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    FeatureScaler::from_json(&json)
}

/// Parse one JSON-lines record; blank lines and `#` comments yield `None`.
pub fn parse_frame_line(line: &str, line_number: usize) -> Result<Option<LandmarkFrame>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| SignflowError::Other(format!("line {line_number}: {e}")))
}

/// Replay `frames` through `session`, writing every gloss event to `out`.
///
/// Malformed lines are logged and skipped.
pub fn run_replay<R, W>(
    session: RecognitionSession,
    frames: R,
    options: &ReplayOptions,
    out: W,
) -> Result<ReplaySummary>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let subscription = session.subscribe_events();
    let printer = thread::Builder::new()
        .name("signflow-printer".to_string())
        .spawn(move || -> Result<u64> {
            let mut out = out;
            let mut written = 0;
            while let Some(event) = subscription.recv() {
                serde_json::to_writer(&mut out, &event)?;
                writeln!(out)?;
                out.flush()?;
                written += 1;
            }
            Ok(written)
        })
        .map_err(|e| SignflowError::Spawn {
            message: format!("event printer: {e}"),
        })?;

    session.start()?;

    let mut summary = ReplaySummary::default();
    let mut previous_ms: Option<u64> = None;
    for (index, line) in frames.lines().enumerate() {
        let line = line?;
        let frame = match parse_frame_line(&line, index + 1) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("skipping frame: {e}");
                summary.skipped_lines += 1;
                continue;
            }
        };

        if options.realtime
            && let Some(previous) = previous_ms
        {
            thread::sleep(Duration::from_millis(
                frame.timestamp_ms.saturating_sub(previous),
            ));
        }
        previous_ms = Some(frame.timestamp_ms);

        if !session.push_landmarks(frame) {
            return Err(SignflowError::SessionNotRunning);
        }
        summary.frames += 1;
    }

    if !session.drain(Duration::from_secs(30)) {
        tracing::warn!("pipeline did not drain within 30s");
    }
    if options.commit_at_end && session.send() {
        tracing::debug!("committed pending sequence at end of recording");
    }
    session.stop();
    // Dropping the session drops the bus, which ends the printer.
    drop(session);

    summary.events = printer
        .join()
        .map_err(|_| SignflowError::Other("event printer panicked".to_string()))??;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify::ClassifierConfig;
    use crate::classifier::engine::{MockEngine, MockEngineFactory};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Writer whose buffer outlives the printer thread.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn frame_line(timestamp_ms: u64) -> String {
        let points: Vec<String> = (0..21)
            .map(|i| {
                format!(
                    r#"{{"x":{},"y":{},"z":0.0}}"#,
                    0.4 + i as f32 * 0.01,
                    0.6 - i as f32 * 0.01
                )
            })
            .collect();
        format!(
            r#"{{"right_hand":[{}],"timestamp_ms":{timestamp_ms}}}"#,
            points.join(",")
        )
    }

    fn mock_session(config: Config) -> RecognitionSession {
        let labels = LabelSet::new(vec!["HELLO".into(), "WORLD".into()]).unwrap();
        let classifier = Classifier::new(
            Box::new(MockEngineFactory::new(MockEngine::confident(2, 0, 0.95))),
            ClassifierConfig::default(),
        )
        .with_labels(Some(labels));
        RecognitionSession::new(config, classifier)
    }

    #[test]
    fn test_parse_frame_line() {
        assert!(parse_frame_line("", 1).unwrap().is_none());
        assert!(parse_frame_line("# recorded on device 2", 2).unwrap().is_none());

        let frame = parse_frame_line(&frame_line(40), 3).unwrap().unwrap();
        assert_eq!(frame.timestamp_ms, 40);
        assert_eq!(frame.right_hand.map(|h| h.len()), Some(21));
        assert!(frame.left_hand.is_none());

        let err = parse_frame_line("{not json", 7).unwrap_err();
        assert!(err.to_string().starts_with("line 7:"));
    }

    #[test]
    fn test_build_session_requires_model() {
        let err = build_session(&Config::default()).err().unwrap();
        assert!(matches!(err, SignflowError::ModelAsset { .. }));
    }

    #[test]
    fn test_build_session_rejects_missing_labels() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.safetensors");
        std::fs::write(&model, b"placeholder").unwrap();

        let mut config = Config::default();
        config.assets.model = Some(model);
        config.assets.labels = Some(dir.path().join("missing.json"));
        let err = build_session(&config).err().unwrap();
        assert!(matches!(err, SignflowError::LabelAsset { .. }));
    }

    #[test]
    fn test_replay_prints_sequence() {
        let mut config = Config::default();
        config.features.window_frames = 5;
        config.features.min_valid_frames = 3;
        config.stability.debounce_ms = 5;

        let mut recording = String::from("# header\n");
        for ts in 0..8 {
            recording.push_str(&frame_line(ts * 33));
            recording.push('\n');
        }
        recording.push_str("garbage\n");

        let out = SharedBuf::default();
        let summary = run_replay(
            mock_session(config),
            Cursor::new(recording),
            &ReplayOptions {
                realtime: false,
                commit_at_end: true,
            },
            out.clone(),
        )
        .unwrap();

        assert_eq!(summary.frames, 8);
        assert_eq!(summary.skipped_lines, 1);
        assert_eq!(summary.events, 1);

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let event: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(event["type"], "sequence_ready");
        assert_eq!(event["tokens"], serde_json::json!(["HELLO"]));
    }
}
